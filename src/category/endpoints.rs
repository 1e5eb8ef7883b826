//! Route handlers for a household's categories.

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
    category::{
        Category, CategoryForm, CategoryId, create_category, delete_category, get_categories,
        get_category, update_category,
    },
    db::lock_connection,
    extract::{Json, Path},
    household::{HouseholdId, MemberRole, require_role},
};

/// The state needed to manage categories.
#[derive(Debug, Clone)]
pub struct CategoryState {
    /// The database connection for managing categories.
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for CategoryState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
        }
    }
}

/// A route handler listing the categories of a household.
pub async fn list_categories_endpoint(
    State(state): State<CategoryState>,
    Extension(user_id): Extension<UserID>,
    Path(household_id): Path<HouseholdId>,
) -> Result<Json<Vec<Category>>, Error> {
    let connection = lock_connection(&state.db_connection)?;
    require_role(household_id, user_id, MemberRole::Viewer, &connection)?;

    get_categories(household_id, &connection).map(Json)
}

/// A route handler for getting a single category.
pub async fn get_category_endpoint(
    State(state): State<CategoryState>,
    Extension(user_id): Extension<UserID>,
    Path((household_id, category_id)): Path<(HouseholdId, CategoryId)>,
) -> Result<Json<Category>, Error> {
    let connection = lock_connection(&state.db_connection)?;
    require_role(household_id, user_id, MemberRole::Viewer, &connection)?;

    get_category(household_id, category_id, &connection).map(Json)
}

/// A route handler for creating a category.
pub async fn create_category_endpoint(
    State(state): State<CategoryState>,
    Extension(user_id): Extension<UserID>,
    Path(household_id): Path<HouseholdId>,
    Json(form): Json<CategoryForm>,
) -> Result<(StatusCode, Json<Category>), Error> {
    let connection = lock_connection(&state.db_connection)?;
    require_role(household_id, user_id, MemberRole::Member, &connection)?;

    let category = create_category(household_id, &form, &connection)?;

    Ok((StatusCode::CREATED, Json(category)))
}

/// A route handler for updating a category.
pub async fn update_category_endpoint(
    State(state): State<CategoryState>,
    Extension(user_id): Extension<UserID>,
    Path((household_id, category_id)): Path<(HouseholdId, CategoryId)>,
    Json(form): Json<CategoryForm>,
) -> Result<Json<Category>, Error> {
    let connection = lock_connection(&state.db_connection)?;
    require_role(household_id, user_id, MemberRole::Member, &connection)?;

    update_category(household_id, category_id, &form, &connection).map(Json)
}

/// A route handler for deleting a category.
pub async fn delete_category_endpoint(
    State(state): State<CategoryState>,
    Extension(user_id): Extension<UserID>,
    Path((household_id, category_id)): Path<(HouseholdId, CategoryId)>,
) -> Result<StatusCode, Error> {
    let connection = lock_connection(&state.db_connection)?;
    require_role(household_id, user_id, MemberRole::Member, &connection)?;

    delete_category(household_id, category_id, &connection).inspect_err(|error| {
        tracing::debug!("Could not delete category {category_id}: {error}")
    })?;

    Ok(StatusCode::NO_CONTENT)
}
