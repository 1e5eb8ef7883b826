//! The dashboard route handler.

use std::sync::{Arc, Mutex};

use axum::{
    Extension,
    extract::{FromRef, State},
};
use rusqlite::Connection;
use serde::Serialize;

use crate::{
    AppState, Error,
    account::get_total_account_balance,
    analytics::{
        PeriodTotals, first_day_of_month, format_month, last_day_of_month, monthly_totals,
        period_totals, spending_by_category,
    },
    auth::UserID,
    budget::get_budget_report,
    dashboard::charts::{DashboardChart, expenses_chart, net_income_chart},
    db::lock_connection,
    extract::{Json, Path},
    household::{HouseholdId, MemberRole, require_role},
    timezone::local_today,
};

/// The number of months shown in the net income chart.
const NET_INCOME_MONTHS: u32 = 12;

/// The state needed for the dashboard.
#[derive(Debug, Clone)]
pub struct DashboardState {
    /// The database connection for reading accounts and transactions.
    pub db_connection: Arc<Mutex<Connection>>,
    /// The local timezone as a canonical timezone name, e.g. "Pacific/Auckland".
    pub local_timezone: String,
}

impl FromRef<AppState> for DashboardState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
            local_timezone: state.local_timezone.clone(),
        }
    }
}

/// The budget totals for the current month.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BudgetTotals {
    /// The sum of all budgets.
    pub total_budgeted: f64,
    /// All spending in the month.
    pub total_spent: f64,
    /// The total budgeted minus the total spent.
    pub total_remaining: f64,
}

/// Everything the dashboard shows.
#[derive(Debug, Serialize)]
pub struct Dashboard {
    /// The sum of the balances of all accounts.
    pub total_account_balance: f64,
    /// The current month as `YYYY-MM`.
    pub month: String,
    /// Income, expenses and net for the current month.
    pub current_month: PeriodTotals,
    /// The budget totals for the current month.
    pub budget: BudgetTotals,
    /// The chart configurations.
    pub charts: Vec<DashboardChart>,
}

/// A route handler for the household dashboard.
pub async fn get_dashboard_endpoint(
    State(state): State<DashboardState>,
    Extension(user_id): Extension<UserID>,
    Path(household_id): Path<HouseholdId>,
) -> Result<Json<Dashboard>, Error> {
    let today = local_today(&state.local_timezone)?;
    let month_start = first_day_of_month(today);
    let month_end = last_day_of_month(today);

    let connection = lock_connection(&state.db_connection)?;
    require_role(household_id, user_id, MemberRole::Viewer, &connection)?;

    let total_account_balance = get_total_account_balance(household_id, &connection)?;
    let current_month = period_totals(household_id, month_start, month_end, &connection)?;
    let budget_report = get_budget_report(household_id, today, &connection)?;
    let monthly = monthly_totals(household_id, NET_INCOME_MONTHS, today, &connection)?;
    let spending = spending_by_category(household_id, month_start, month_end, &connection)?;

    Ok(Json(Dashboard {
        total_account_balance,
        month: format_month(today),
        current_month,
        budget: BudgetTotals {
            total_budgeted: budget_report.total_budgeted,
            total_spent: budget_report.total_spent,
            total_remaining: budget_report.total_remaining,
        },
        charts: vec![net_income_chart(&monthly)?, expenses_chart(&spending)?],
    }))
}
