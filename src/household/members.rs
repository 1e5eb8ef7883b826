//! Household membership: the database queries and the member endpoints.

use std::sync::{Arc, Mutex};

use axum::{
    Extension,
    extract::{FromRef, State},
    http::StatusCode,
};
use rusqlite::{Connection, Row};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::{
    AppState, Error,
    auth::UserID,
    db::lock_connection,
    extract::{Json, Path},
    household::{HouseholdId, MemberRole, require_role, role::role_from_column},
};

/// Create the table linking users to the households they are members of.
///
/// # Errors
///
/// This function will return an error if the SQL query failed.
pub fn create_membership_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS user_household (
                user_id INTEGER NOT NULL REFERENCES user(id) ON DELETE CASCADE,
                household_id INTEGER NOT NULL REFERENCES household(id) ON DELETE CASCADE,
                role TEXT NOT NULL CHECK (role IN ('OWNER', 'MEMBER', 'VIEWER')),
                joined_at TEXT NOT NULL,
                PRIMARY KEY (user_id, household_id)
                )",
        (),
    )?;

    connection.execute(
        "CREATE INDEX IF NOT EXISTS idx_user_household_household ON user_household(household_id)",
        (),
    )?;

    Ok(())
}

/// A user's membership of a household.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Member {
    /// The member's user ID.
    pub user_id: UserID,
    /// The member's email address.
    pub email: String,
    /// The member's display name.
    pub name: String,
    /// The member's role in the household.
    pub role: MemberRole,
    /// Whether the member wants the weekly summary email.
    pub weekly_summary: bool,
    /// When the user joined the household.
    #[serde(with = "time::serde::rfc3339")]
    pub joined_at: OffsetDateTime,
}

fn map_member_row(row: &Row) -> Result<Member, rusqlite::Error> {
    Ok(Member {
        user_id: UserID::new(row.get(0)?),
        email: row.get(1)?,
        name: row.get(2)?,
        role: role_from_column(row, 3)?,
        weekly_summary: row.get(4)?,
        joined_at: row.get(5)?,
    })
}

/// Insert a membership row without any checks.
pub(crate) fn insert_membership(
    household_id: HouseholdId,
    user_id: UserID,
    role: MemberRole,
    connection: &Connection,
) -> Result<(), Error> {
    connection
        .execute(
            "INSERT INTO user_household (user_id, household_id, role, joined_at)
             VALUES (?1, ?2, ?3, ?4)",
            (
                user_id.as_i64(),
                household_id,
                role.as_str(),
                OffsetDateTime::now_utc(),
            ),
        )
        .map_err(|error| match error {
            rusqlite::Error::SqliteFailure(sql_error, _)
                if sql_error.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY =>
            {
                Error::AlreadyMember
            }
            error => error.into(),
        })?;

    Ok(())
}

/// Add `user_id` to `household_id` with `role`.
///
/// # Errors
///
/// Returns [Error::AlreadyMember] if the user is already a member, or an SQL error.
pub fn add_member(
    household_id: HouseholdId,
    user_id: UserID,
    role: MemberRole,
    connection: &Connection,
) -> Result<(), Error> {
    insert_membership(household_id, user_id, role, connection)?;
    tracing::info!("User {user_id} joined household {household_id} as {role}");

    Ok(())
}

/// Get the members of a household, owners first and then by name.
///
/// # Errors
///
/// Returns an [Error::SqlError] if an SQL related error occurred.
pub fn get_members(
    household_id: HouseholdId,
    connection: &Connection,
) -> Result<Vec<Member>, Error> {
    connection
        .prepare(
            "SELECT user.id, user.email, user.name, user_household.role,
                    user.weekly_summary, user_household.joined_at
             FROM user_household
             INNER JOIN user ON user.id = user_household.user_id
             WHERE user_household.household_id = ?1
             ORDER BY CASE user_household.role
                        WHEN 'OWNER' THEN 0 WHEN 'MEMBER' THEN 1 ELSE 2 END,
                      user.name COLLATE NOCASE, user.id",
        )?
        .query_map([household_id], map_member_row)?
        .map(|maybe_member| maybe_member.map_err(Error::from))
        .collect()
}

fn get_member(
    household_id: HouseholdId,
    user_id: UserID,
    connection: &Connection,
) -> Result<Member, Error> {
    connection
        .prepare(
            "SELECT user.id, user.email, user.name, user_household.role,
                    user.weekly_summary, user_household.joined_at
             FROM user_household
             INNER JOIN user ON user.id = user_household.user_id
             WHERE user_household.household_id = ?1 AND user_household.user_id = ?2",
        )?
        .query_row((household_id, user_id.as_i64()), map_member_row)
        .map_err(|error| error.into())
}

fn count_owners(household_id: HouseholdId, connection: &Connection) -> Result<u32, Error> {
    connection
        .query_row(
            "SELECT COUNT(*) FROM user_household WHERE household_id = ?1 AND role = 'OWNER'",
            [household_id],
            |row| row.get(0),
        )
        .map_err(|error| error.into())
}

fn ensure_not_last_owner(
    member: &Member,
    household_id: HouseholdId,
    connection: &Connection,
) -> Result<(), Error> {
    if member.role == MemberRole::Owner && count_owners(household_id, connection)? <= 1 {
        return Err(Error::LastOwner);
    }

    Ok(())
}

/// Change the role of a member.
///
/// # Errors
///
/// Returns [Error::NotFound] if the user is not a member, [Error::LastOwner]
/// if the change would leave the household without an owner, or an SQL error.
pub fn update_member_role(
    household_id: HouseholdId,
    user_id: UserID,
    role: MemberRole,
    connection: &Connection,
) -> Result<Member, Error> {
    let member = get_member(household_id, user_id, connection)?;

    if role != MemberRole::Owner {
        ensure_not_last_owner(&member, household_id, connection)?;
    }

    connection.execute(
        "UPDATE user_household SET role = ?1 WHERE household_id = ?2 AND user_id = ?3",
        (role.as_str(), household_id, user_id.as_i64()),
    )?;

    Ok(Member { role, ..member })
}

/// Remove a member from a household.
///
/// # Errors
///
/// Returns [Error::NotFound] if the user is not a member, [Error::LastOwner]
/// if they are the only owner, or an SQL error.
pub fn remove_member(
    household_id: HouseholdId,
    user_id: UserID,
    connection: &Connection,
) -> Result<(), Error> {
    let member = get_member(household_id, user_id, connection)?;
    ensure_not_last_owner(&member, household_id, connection)?;

    connection.execute(
        "DELETE FROM user_household WHERE household_id = ?1 AND user_id = ?2",
        (household_id, user_id.as_i64()),
    )?;

    Ok(())
}

/// The state needed to manage household members.
#[derive(Debug, Clone)]
pub struct MemberState {
    /// The database connection for managing members.
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for MemberState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
        }
    }
}

/// The request body for changing a member's role.
#[derive(Debug, Deserialize)]
pub struct UpdateRoleForm {
    /// The new role, one of OWNER, MEMBER or VIEWER.
    pub role: String,
}

/// A route handler listing the members of a household.
pub async fn list_members_endpoint(
    State(state): State<MemberState>,
    Extension(user_id): Extension<UserID>,
    Path(household_id): Path<HouseholdId>,
) -> Result<Json<Vec<Member>>, Error> {
    let connection = lock_connection(&state.db_connection)?;
    require_role(household_id, user_id, MemberRole::Viewer, &connection)?;

    get_members(household_id, &connection).map(Json)
}

/// A route handler for an owner to change a member's role.
pub async fn update_member_role_endpoint(
    State(state): State<MemberState>,
    Extension(user_id): Extension<UserID>,
    Path((household_id, member_id)): Path<(HouseholdId, i64)>,
    Json(form): Json<UpdateRoleForm>,
) -> Result<Json<Member>, Error> {
    let connection = lock_connection(&state.db_connection)?;
    require_role(household_id, user_id, MemberRole::Owner, &connection)?;
    let role: MemberRole = form.role.parse()?;

    let member = update_member_role(household_id, UserID::new(member_id), role, &connection)?;
    tracing::info!(
        "User {user_id} changed the role of user {member_id} in household {household_id} to {role}"
    );

    Ok(Json(member))
}

/// A route handler for removing a member.
///
/// Owners may remove anyone. Any member may remove themself, i.e. leave the household.
pub async fn remove_member_endpoint(
    State(state): State<MemberState>,
    Extension(user_id): Extension<UserID>,
    Path((household_id, member_id)): Path<(HouseholdId, i64)>,
) -> Result<StatusCode, Error> {
    let member_id = UserID::new(member_id);
    let connection = lock_connection(&state.db_connection)?;

    let minimum_role = if member_id == user_id {
        MemberRole::Viewer
    } else {
        MemberRole::Owner
    };
    require_role(household_id, user_id, minimum_role, &connection)?;

    remove_member(household_id, member_id, &connection)?;
    tracing::info!("User {user_id} removed user {member_id} from household {household_id}");

    Ok(StatusCode::NO_CONTENT)
}
