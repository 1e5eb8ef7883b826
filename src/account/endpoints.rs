//! Route handlers for a household's accounts.

use std::sync::{Arc, Mutex};

use axum::{
    Extension,
    extract::{FromRef, State},
    http::StatusCode,
};
use rusqlite::Connection;

use crate::{
    AppState, Error,
    account::{
        Account, AccountForm, AccountId, create_account, delete_account, get_account,
        get_accounts, update_account,
    },
    auth::UserID,
    db::lock_connection,
    extract::{Json, Path},
    household::{HouseholdId, MemberRole, require_role},
};

/// The state needed to manage accounts.
#[derive(Debug, Clone)]
pub struct AccountState {
    /// The database connection for managing accounts.
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for AccountState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
        }
    }
}

/// A route handler listing the accounts of a household.
pub async fn list_accounts_endpoint(
    State(state): State<AccountState>,
    Extension(user_id): Extension<UserID>,
    Path(household_id): Path<HouseholdId>,
) -> Result<Json<Vec<Account>>, Error> {
    let connection = lock_connection(&state.db_connection)?;
    require_role(household_id, user_id, MemberRole::Viewer, &connection)?;

    get_accounts(household_id, &connection).map(Json)
}

/// A route handler for getting a single account.
pub async fn get_account_endpoint(
    State(state): State<AccountState>,
    Extension(user_id): Extension<UserID>,
    Path((household_id, account_id)): Path<(HouseholdId, AccountId)>,
) -> Result<Json<Account>, Error> {
    let connection = lock_connection(&state.db_connection)?;
    require_role(household_id, user_id, MemberRole::Viewer, &connection)?;

    get_account(household_id, account_id, &connection).map(Json)
}

/// A route handler for creating an account.
pub async fn create_account_endpoint(
    State(state): State<AccountState>,
    Extension(user_id): Extension<UserID>,
    Path(household_id): Path<HouseholdId>,
    Json(form): Json<AccountForm>,
) -> Result<(StatusCode, Json<Account>), Error> {
    let connection = lock_connection(&state.db_connection)?;
    require_role(household_id, user_id, MemberRole::Member, &connection)?;

    let account = create_account(household_id, &form, &connection).inspect_err(|error| {
        tracing::debug!("Could not create account in household {household_id}: {error}")
    })?;

    Ok((StatusCode::CREATED, Json(account)))
}

/// A route handler for updating an account.
pub async fn update_account_endpoint(
    State(state): State<AccountState>,
    Extension(user_id): Extension<UserID>,
    Path((household_id, account_id)): Path<(HouseholdId, AccountId)>,
    Json(form): Json<AccountForm>,
) -> Result<Json<Account>, Error> {
    let connection = lock_connection(&state.db_connection)?;
    require_role(household_id, user_id, MemberRole::Member, &connection)?;

    update_account(household_id, account_id, &form, &connection).map(Json)
}

/// A route handler for deleting an account.
pub async fn delete_account_endpoint(
    State(state): State<AccountState>,
    Extension(user_id): Extension<UserID>,
    Path((household_id, account_id)): Path<(HouseholdId, AccountId)>,
) -> Result<StatusCode, Error> {
    let connection = lock_connection(&state.db_connection)?;
    require_role(household_id, user_id, MemberRole::Member, &connection)?;

    delete_account(household_id, account_id, &connection).inspect_err(|error| {
        tracing::debug!("Could not delete account {account_id}: {error}")
    })?;

    Ok(StatusCode::NO_CONTENT)
}
