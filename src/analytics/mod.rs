//! Spending breakdowns and monthly trends for a household.

mod month;
mod queries;

use std::sync::{Arc, Mutex};

use axum::{
    Extension,
    extract::{FromRef, State},
};
use rusqlite::Connection;
use serde::Deserialize;
use time::Date;

use crate::{
    AppState, Error,
    auth::UserID,
    db::lock_connection,
    extract::{Json, Path, Query},
    household::{HouseholdId, MemberRole, require_role},
    timezone::local_today,
    transaction::check_date_range,
};

pub use month::{first_day_of_month, format_month, last_day_of_month, parse_month};
pub use queries::{
    CategorySpending, MonthlyTotal, PeriodTotals, active_months, monthly_totals, period_totals,
    spending_by_category,
};

/// The number of months returned by the monthly endpoint when not specified.
pub const DEFAULT_MONTHS: u32 = 12;

/// The state needed for the analytics endpoints.
#[derive(Debug, Clone)]
pub struct AnalyticsState {
    /// The database connection for reading transactions.
    pub db_connection: Arc<Mutex<Connection>>,
    /// The local timezone as a canonical timezone name, e.g. "Pacific/Auckland".
    pub local_timezone: String,
}

impl FromRef<AppState> for AnalyticsState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
            local_timezone: state.local_timezone.clone(),
        }
    }
}

/// The query string for spending by category.
#[derive(Debug, Default, Deserialize)]
pub struct DateRangeQuery {
    /// The first day to include, defaults to the start of the current month.
    pub from: Option<Date>,
    /// The last day to include, defaults to the end of the current month.
    pub to: Option<Date>,
}

/// The query string for monthly totals.
#[derive(Debug, Default, Deserialize)]
pub struct MonthsQuery {
    /// How many months to return, ending with the current month.
    pub months: Option<u32>,
}

/// A route handler for the spending per category over a date range.
pub async fn spending_by_category_endpoint(
    State(state): State<AnalyticsState>,
    Extension(user_id): Extension<UserID>,
    Path(household_id): Path<HouseholdId>,
    Query(query): Query<DateRangeQuery>,
) -> Result<Json<Vec<CategorySpending>>, Error> {
    let today = local_today(&state.local_timezone)?;
    let from = query.from.unwrap_or_else(|| first_day_of_month(today));
    let to = query.to.unwrap_or_else(|| last_day_of_month(today));
    check_date_range(Some(from), Some(to))?;

    let connection = lock_connection(&state.db_connection)?;
    require_role(household_id, user_id, MemberRole::Viewer, &connection)?;

    spending_by_category(household_id, from, to, &connection).map(Json)
}

/// A route handler for income and expenses per month.
pub async fn monthly_totals_endpoint(
    State(state): State<AnalyticsState>,
    Extension(user_id): Extension<UserID>,
    Path(household_id): Path<HouseholdId>,
    Query(query): Query<MonthsQuery>,
) -> Result<Json<Vec<MonthlyTotal>>, Error> {
    let today = local_today(&state.local_timezone)?;
    let connection = lock_connection(&state.db_connection)?;
    require_role(household_id, user_id, MemberRole::Viewer, &connection)?;

    monthly_totals(
        household_id,
        query.months.unwrap_or(DEFAULT_MONTHS),
        today,
        &connection,
    )
    .map(Json)
}

/// A route handler for the months that have transactions.
pub async fn active_months_endpoint(
    State(state): State<AnalyticsState>,
    Extension(user_id): Extension<UserID>,
    Path(household_id): Path<HouseholdId>,
) -> Result<Json<Vec<String>>, Error> {
    let connection = lock_connection(&state.db_connection)?;
    require_role(household_id, user_id, MemberRole::Viewer, &connection)?;

    active_months(household_id, &connection).map(Json)
}
