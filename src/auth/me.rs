//! Endpoints for the logged in user to view and update their profile.

use std::sync::{Arc, Mutex};

use axum::{
    Extension,
    extract::{FromRef, State},
};
use rusqlite::Connection;
use serde::Deserialize;

use crate::{
    AppState, Error,
    auth::{User, UserID, get_user_by_id, user::update_user_profile},
    db::lock_connection,
    extract::Json,
};

/// The state needed to read and update the current user.
#[derive(Debug, Clone)]
pub struct CurrentUserState {
    /// The database connection for managing users.
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for CurrentUserState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
        }
    }
}

/// The fields of the current user that may be changed.
#[derive(Debug, Deserialize)]
pub struct UpdateUserForm {
    /// The new display name.
    pub name: Option<String>,
    /// Whether to receive the weekly summary email.
    pub weekly_summary: Option<bool>,
}

/// Get the logged in user.
pub async fn get_current_user(
    State(state): State<CurrentUserState>,
    Extension(user_id): Extension<UserID>,
) -> Result<Json<User>, Error> {
    let connection = lock_connection(&state.db_connection)?;

    get_user_by_id(user_id, &connection).map(Json)
}

/// Update the logged in user's name and/or weekly summary preference.
pub async fn update_current_user(
    State(state): State<CurrentUserState>,
    Extension(user_id): Extension<UserID>,
    Json(form): Json<UpdateUserForm>,
) -> Result<Json<User>, Error> {
    let connection = lock_connection(&state.db_connection)?;

    update_user_profile(
        user_id,
        form.name.as_deref(),
        form.weekly_summary,
        &connection,
    )
    .map(Json)
}
