//! Detection of transactions that were probably recorded twice.

mod detector;

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
    transaction::get_transactions_in_range,
};

pub use detector::{DetectorOptions, DuplicatePair, find_duplicates};

/// The state needed to search for duplicate transactions.
#[derive(Debug, Clone)]
pub struct DuplicatesState {
    /// The database connection for reading transactions.
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for DuplicatesState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
        }
    }
}

/// The query string accepted by the duplicates endpoint.
#[derive(Debug, Default, Deserialize)]
pub struct DuplicatesQuery {
    /// The earliest date to search.
    pub from: Option<Date>,
    /// The latest date to search.
    pub to: Option<Date>,
    /// The maximum number of days between duplicates.
    pub window_days: Option<i64>,
    /// The minimum score of a reported pair.
    pub threshold: Option<f64>,
}

/// A route handler listing the likely duplicate transactions of a household.
pub async fn find_duplicates_endpoint(
    State(state): State<DuplicatesState>,
    Extension(user_id): Extension<UserID>,
    Path(household_id): Path<HouseholdId>,
    Query(query): Query<DuplicatesQuery>,
) -> Result<Json<Vec<DuplicatePair>>, Error> {
    let options = DetectorOptions::new(query.window_days, query.threshold)?;

    let transactions = {
        let connection = lock_connection(&state.db_connection)?;
        require_role(household_id, user_id, MemberRole::Viewer, &connection)?;
        get_transactions_in_range(household_id, query.from, query.to, &connection)?
    };

    Ok(Json(find_duplicates(&transactions, options)))
}

#[cfg(test)]
mod endpoint_tests {
    use axum::http::StatusCode;
    use serde_json::Value;
    use time::macros::date;

    use crate::{
        account::{AccountForm, create_account},
        endpoints::{self, format_endpoint},
        test_utils::TestApp,
        transaction::{TransactionForm, create_transaction},
    };

    #[tokio::test]
    async fn reports_duplicate_pair() {
        let app = TestApp::new();
        let (owner, cookies) = app.log_in_new_user("arthur@burrow.com", "Arthur").await;
        let household_id = app.insert_household("The Burrow", owner);
        {
            let connection = app.connection();
            let account = create_account(
                household_id,
                &AccountForm {
                    name: "Everyday".to_owned(),
                    balance: 0.0,
                    date: date!(2025 - 01 - 01),
                },
                &connection,
            )
            .unwrap();
            for (date, description) in [
                (date!(2025 - 02 - 01), "Flourish and Blotts"),
                (date!(2025 - 02 - 02), "FLOURISH & BLOTTS"),
                (date!(2025 - 02 - 02), "Honeydukes"),
            ] {
                create_transaction(
                    household_id,
                    owner,
                    &TransactionForm::new(account.id, -25.0, date, description),
                    date!(2025 - 02 - 10),
                    &connection,
                )
                .unwrap();
            }
        }

        let pairs: Vec<Value> = app
            .server
            .get(&format_endpoint(endpoints::DUPLICATES, &[&household_id]))
            .add_cookies(cookies)
            .await
            .json();

        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0]["first"]["description"], "Flourish and Blotts");
        assert_eq!(pairs[0]["second"]["description"], "FLOURISH & BLOTTS");
    }

    #[tokio::test]
    async fn invalid_threshold_is_bad_request() {
        let app = TestApp::new();
        let (owner, cookies) = app.log_in_new_user("arthur@burrow.com", "Arthur").await;
        let household_id = app.insert_household("The Burrow", owner);

        app.server
            .get(&format_endpoint(endpoints::DUPLICATES, &[&household_id]))
            .add_query_param("threshold", 2)
            .add_cookies(cookies)
            .await
            .assert_status(StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn huge_window_is_bad_request() {
        let app = TestApp::new();
        let (owner, cookies) = app.log_in_new_user("arthur@burrow.com", "Arthur").await;
        let household_id = app.insert_household("The Burrow", owner);

        let response = app
            .server
            .get(&format_endpoint(endpoints::DUPLICATES, &[&household_id]))
            .add_query_param("window_days", i64::MAX)
            .add_cookies(cookies)
            .await;

        response.assert_status(StatusCode::BAD_REQUEST);
        response.assert_json(&serde_json::json!({
            "error": "invalid query parameter: window_days must be between 0 and 365"
        }));
    }
}
