//! Route handlers for a household's transactions.

use std::sync::{Arc, Mutex};

use axum::{
    Extension,
    extract::{FromRef, State},
    http::StatusCode,
};
use rusqlite::Connection;

use crate::{
    AppState, Error,
    auth::UserID,
    db::lock_connection,
    extract::{Json, Path, Query},
    household::{HouseholdId, MemberRole, require_role},
    pagination::{Page, PaginationConfig},
    timezone::local_today,
    transaction::{
        Transaction, TransactionForm, TransactionId, TransactionQuery, create_transaction,
        delete_transaction, get_transaction, query_transactions, update_transaction,
    },
};

/// The state needed to manage transactions.
#[derive(Debug, Clone)]
pub struct TransactionState {
    /// The database connection for managing transactions.
    pub db_connection: Arc<Mutex<Connection>>,
    /// The local timezone as a canonical timezone name, e.g. "Pacific/Auckland".
    pub local_timezone: String,
    /// The config that controls how to page transactions.
    pub pagination_config: PaginationConfig,
}

impl FromRef<AppState> for TransactionState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
            local_timezone: state.local_timezone.clone(),
            pagination_config: state.pagination_config.clone(),
        }
    }
}

/// A route handler listing a household's transactions with filters and paging.
pub async fn list_transactions_endpoint(
    State(state): State<TransactionState>,
    Extension(user_id): Extension<UserID>,
    Path(household_id): Path<HouseholdId>,
    Query(query): Query<TransactionQuery>,
) -> Result<Json<Page<Transaction>>, Error> {
    let connection = lock_connection(&state.db_connection)?;
    require_role(household_id, user_id, MemberRole::Viewer, &connection)?;

    query_transactions(household_id, &query, &state.pagination_config, &connection).map(Json)
}

/// A route handler for recording a transaction.
pub async fn create_transaction_endpoint(
    State(state): State<TransactionState>,
    Extension(user_id): Extension<UserID>,
    Path(household_id): Path<HouseholdId>,
    Json(form): Json<TransactionForm>,
) -> Result<(StatusCode, Json<Transaction>), Error> {
    let today = local_today(&state.local_timezone)?;
    let connection = lock_connection(&state.db_connection)?;
    require_role(household_id, user_id, MemberRole::Member, &connection)?;

    let transaction = create_transaction(household_id, user_id, &form, today, &connection)
        .inspect_err(|error| {
            tracing::debug!("Could not create transaction in household {household_id}: {error}")
        })?;

    Ok((StatusCode::CREATED, Json(transaction)))
}

/// A route handler for getting a single transaction.
pub async fn get_transaction_endpoint(
    State(state): State<TransactionState>,
    Extension(user_id): Extension<UserID>,
    Path((household_id, transaction_id)): Path<(HouseholdId, TransactionId)>,
) -> Result<Json<Transaction>, Error> {
    let connection = lock_connection(&state.db_connection)?;
    require_role(household_id, user_id, MemberRole::Viewer, &connection)?;

    get_transaction(household_id, transaction_id, &connection).map(Json)
}

/// A route handler for updating a transaction.
pub async fn update_transaction_endpoint(
    State(state): State<TransactionState>,
    Extension(user_id): Extension<UserID>,
    Path((household_id, transaction_id)): Path<(HouseholdId, TransactionId)>,
    Json(form): Json<TransactionForm>,
) -> Result<Json<Transaction>, Error> {
    let today = local_today(&state.local_timezone)?;
    let connection = lock_connection(&state.db_connection)?;
    require_role(household_id, user_id, MemberRole::Member, &connection)?;

    update_transaction(household_id, transaction_id, &form, today, &connection).map(Json)
}

/// A route handler for deleting a transaction.
pub async fn delete_transaction_endpoint(
    State(state): State<TransactionState>,
    Extension(user_id): Extension<UserID>,
    Path((household_id, transaction_id)): Path<(HouseholdId, TransactionId)>,
) -> Result<StatusCode, Error> {
    let connection = lock_connection(&state.db_connection)?;
    require_role(household_id, user_id, MemberRole::Member, &connection)?;

    delete_transaction(household_id, transaction_id, &connection)?;

    Ok(StatusCode::NO_CONTENT)
}
