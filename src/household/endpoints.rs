//! Route handlers for creating, listing, renaming and deleting households.

use std::sync::{Arc, Mutex};

use axum::{
    Extension,
    extract::{FromRef, State},
    http::StatusCode,
};
use rusqlite::Connection;
use serde::Deserialize;

use crate::{
    AppState, Error,
    auth::UserID,
    db::lock_connection,
    extract::{Json, Path},
    household::{
        Household, HouseholdId, HouseholdMembership, MemberRole, create_household,
        delete_household, get_household, get_households_for_user, rename_household,
        require_role,
    },
};

/// The state needed to manage households.
#[derive(Debug, Clone)]
pub struct HouseholdState {
    /// The database connection for managing households.
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for HouseholdState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
        }
    }
}

/// The request body for creating or renaming a household.
#[derive(Debug, Deserialize)]
pub struct HouseholdForm {
    /// The household name.
    pub name: String,
}

/// A route handler for creating a household owned by the current user.
pub async fn create_household_endpoint(
    State(state): State<HouseholdState>,
    Extension(user_id): Extension<UserID>,
    Json(form): Json<HouseholdForm>,
) -> Result<(StatusCode, Json<HouseholdMembership>), Error> {
    let connection = lock_connection(&state.db_connection)?;
    let household = create_household(&form.name, user_id, &connection)?;

    Ok((
        StatusCode::CREATED,
        Json(HouseholdMembership {
            household,
            role: MemberRole::Owner,
        }),
    ))
}

/// A route handler listing the current user's households.
pub async fn list_households_endpoint(
    State(state): State<HouseholdState>,
    Extension(user_id): Extension<UserID>,
) -> Result<Json<Vec<HouseholdMembership>>, Error> {
    let connection = lock_connection(&state.db_connection)?;

    get_households_for_user(user_id, &connection).map(Json)
}

/// A route handler for getting a household the current user is a member of.
pub async fn get_household_endpoint(
    State(state): State<HouseholdState>,
    Extension(user_id): Extension<UserID>,
    Path(household_id): Path<HouseholdId>,
) -> Result<Json<HouseholdMembership>, Error> {
    let connection = lock_connection(&state.db_connection)?;
    let role = require_role(household_id, user_id, MemberRole::Viewer, &connection)?;
    let household = get_household(household_id, &connection)?;

    Ok(Json(HouseholdMembership { household, role }))
}

/// A route handler for an owner to rename a household.
pub async fn rename_household_endpoint(
    State(state): State<HouseholdState>,
    Extension(user_id): Extension<UserID>,
    Path(household_id): Path<HouseholdId>,
    Json(form): Json<HouseholdForm>,
) -> Result<Json<Household>, Error> {
    let connection = lock_connection(&state.db_connection)?;
    require_role(household_id, user_id, MemberRole::Owner, &connection)?;

    rename_household(household_id, &form.name, &connection).map(Json)
}

/// A route handler for an owner to delete a household and everything in it.
pub async fn delete_household_endpoint(
    State(state): State<HouseholdState>,
    Extension(user_id): Extension<UserID>,
    Path(household_id): Path<HouseholdId>,
) -> Result<StatusCode, Error> {
    let connection = lock_connection(&state.db_connection)?;
    require_role(household_id, user_id, MemberRole::Owner, &connection)?;

    delete_household(household_id, &connection)?;
    tracing::info!("User {user_id} deleted household {household_id}");

    Ok(StatusCode::NO_CONTENT)
}
