//! Monthly budgets: how much of each category's budget has been spent.

use std::sync::{Arc, Mutex};

use axum::{
    Extension,
    extract::{FromRef, State},
};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use time::Date;

use crate::{
    AppState, Error,
    analytics::{
        active_months, first_day_of_month, format_month, last_day_of_month, parse_month,
        spending_by_category,
    },
    auth::UserID,
    category::{CategoryId, get_categories},
    db::lock_connection,
    extract::{Json, Path, Query},
    household::{HouseholdId, MemberRole, require_role},
    timezone::local_today,
};

/// The share of a budget at which a category is reported as near its limit.
pub const NEAR_LIMIT_PERCENT: f64 = 80.0;

/// How a category's spending compares to its budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BudgetStatus {
    /// The category has no budget.
    NoBudget,
    /// Less than [NEAR_LIMIT_PERCENT] of the budget is spent.
    Under,
    /// At least [NEAR_LIMIT_PERCENT] and at most all of the budget is spent.
    NearLimit,
    /// More than the budget is spent.
    Over,
}

/// The spending of one category against its budget for a month.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryBudget {
    /// The category.
    pub category_id: CategoryId,
    /// The category name.
    pub name: String,
    /// The monthly budget, if one is set.
    pub budget: Option<f64>,
    /// The amount spent as a positive number.
    pub spent: f64,
    /// The budget minus the amount spent, if a budget is set.
    pub remaining: Option<f64>,
    /// The amount spent as a percentage of a non-zero budget.
    pub percent_used: Option<f64>,
    /// How the spending compares to the budget.
    pub status: BudgetStatus,
}

/// A household's spending against its budgets for one month.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BudgetReport {
    /// The month as `YYYY-MM`.
    pub month: String,
    /// Categories that have a budget or spending in the month, by name.
    pub categories: Vec<CategoryBudget>,
    /// Spending without a category.
    pub uncategorized_spent: f64,
    /// The sum of all budgets.
    pub total_budgeted: f64,
    /// All spending in the month, uncategorized included.
    pub total_spent: f64,
    /// The total budgeted minus the total spent.
    pub total_remaining: f64,
}

/// Work out the percentage used and status for `spent` against `budget`.
pub fn budget_status(spent: f64, budget: Option<f64>) -> (Option<f64>, BudgetStatus) {
    let Some(budget) = budget else {
        return (None, BudgetStatus::NoBudget);
    };

    if budget <= 0.0 {
        let status = if spent > 0.0 {
            BudgetStatus::Over
        } else {
            BudgetStatus::Under
        };
        return (None, status);
    }

    let percent_used = spent * 100.0 / budget;
    let status = if percent_used > 100.0 {
        BudgetStatus::Over
    } else if percent_used >= NEAR_LIMIT_PERCENT {
        BudgetStatus::NearLimit
    } else {
        BudgetStatus::Under
    };

    (Some(percent_used), status)
}

/// Build the budget report for the month containing `month`.
///
/// # Errors
///
/// Returns an [Error::SqlError] if an SQL related error occurred.
pub fn get_budget_report(
    household_id: HouseholdId,
    month: Date,
    connection: &Connection,
) -> Result<BudgetReport, Error> {
    let spending = spending_by_category(
        household_id,
        first_day_of_month(month),
        last_day_of_month(month),
        connection,
    )?;

    let spent_in = |category_id: Option<CategoryId>| {
        spending
            .iter()
            .find(|category| category.category_id == category_id)
            .map(|category| category.total)
            .unwrap_or(0.0)
    };

    let categories: Vec<CategoryBudget> = get_categories(household_id, connection)?
        .into_iter()
        .filter_map(|category| {
            let spent = spent_in(Some(category.id));

            if category.budget.is_none() && spent <= 0.0 {
                return None;
            }

            let (percent_used, status) = budget_status(spent, category.budget);

            Some(CategoryBudget {
                category_id: category.id,
                name: category.name.to_string(),
                budget: category.budget,
                spent,
                remaining: category.budget.map(|budget| budget - spent),
                percent_used,
                status,
            })
        })
        .collect();

    let total_budgeted: f64 = categories.iter().filter_map(|category| category.budget).sum();
    let total_spent: f64 = spending.iter().map(|category| category.total).sum();

    Ok(BudgetReport {
        month: format_month(month),
        uncategorized_spent: spent_in(None),
        total_budgeted,
        total_spent,
        total_remaining: total_budgeted - total_spent,
        categories,
    })
}

/// The state needed for the budget report.
#[derive(Debug, Clone)]
pub struct BudgetState {
    /// The database connection for reading categories and transactions.
    pub db_connection: Arc<Mutex<Connection>>,
    /// The local timezone as a canonical timezone name, e.g. "Pacific/Auckland".
    pub local_timezone: String,
}

impl FromRef<AppState> for BudgetState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
            local_timezone: state.local_timezone.clone(),
        }
    }
}

/// The query string for the budget report.
#[derive(Debug, Default, Deserialize)]
pub struct BudgetQuery {
    /// The month as `YYYY-MM`.
    pub month: Option<String>,
}

/// A route handler for the budget report of a month.
///
/// Without a month, the most recent month with transactions is used, or the
/// current month if there are none.
pub async fn get_budget_endpoint(
    State(state): State<BudgetState>,
    Extension(user_id): Extension<UserID>,
    Path(household_id): Path<HouseholdId>,
    Query(query): Query<BudgetQuery>,
) -> Result<Json<BudgetReport>, Error> {
    let requested_month = query.month.as_deref().map(parse_month).transpose()?;
    let today = local_today(&state.local_timezone)?;

    let connection = lock_connection(&state.db_connection)?;
    require_role(household_id, user_id, MemberRole::Viewer, &connection)?;

    let month = match requested_month {
        Some(month) => month,
        None => match active_months(household_id, &connection)?.first() {
            Some(latest) => parse_month(latest)?,
            None => first_day_of_month(today),
        },
    };

    get_budget_report(household_id, month, &connection).map(Json)
}
