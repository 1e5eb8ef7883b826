//! Households and the database queries for them.

use rusqlite::{Connection, Row};
use serde::Serialize;
use time::OffsetDateTime;

use crate::{
    Error,
    auth::UserID,
    database_id::DatabaseId,
    household::{MemberRole, members::insert_membership, role::role_from_column},
    transaction_type::seed_default_transaction_types,
};

/// Alias for the integer type used for household IDs.
pub type HouseholdId = DatabaseId;

/// A financial unit, e.g. a family or flatmates, that shares accounts,
/// categories and transactions.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Household {
    /// The ID of the household.
    pub id: HouseholdId,
    /// The display name of the household.
    pub name: String,
    /// When the household was created.
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// A household together with the requesting user's role in it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HouseholdMembership {
    /// The household.
    #[serde(flatten)]
    pub household: Household,
    /// The user's role in the household.
    pub role: MemberRole,
}

/// Create the household table.
///
/// # Errors
///
/// This function will return an error if the SQL query failed.
pub fn create_household_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS household (
                id INTEGER PRIMARY KEY,
                name TEXT NOT NULL,
                created_at TEXT NOT NULL
                )",
        (),
    )?;

    Ok(())
}

fn map_household_row(row: &Row) -> Result<Household, rusqlite::Error> {
    Ok(Household {
        id: row.get(0)?,
        name: row.get(1)?,
        created_at: row.get(2)?,
    })
}

fn validate_name(name: &str) -> Result<&str, Error> {
    let name = name.trim();

    if name.is_empty() {
        return Err(Error::EmptyName);
    }

    Ok(name)
}

/// Create a household owned by `owner`.
///
/// The owner's membership and the default transaction types are created in
/// the same SQL transaction as the household.
///
/// # Errors
///
/// Returns [Error::EmptyName] if `name` is blank, or an SQL error.
pub fn create_household(
    name: &str,
    owner: UserID,
    connection: &Connection,
) -> Result<Household, Error> {
    let name = validate_name(name)?;
    let transaction = connection.unchecked_transaction()?;

    let household = transaction
        .prepare(
            "INSERT INTO household (name, created_at) VALUES (?1, ?2)
             RETURNING id, name, created_at",
        )?
        .query_row((name, OffsetDateTime::now_utc()), map_household_row)?;

    insert_membership(household.id, owner, MemberRole::Owner, &transaction)?;
    seed_default_transaction_types(household.id, &transaction)?;

    transaction.commit()?;

    tracing::info!("User {owner} created household {}", household.id);

    Ok(household)
}

/// Get a household by its ID.
///
/// # Errors
///
/// Returns [Error::NotFound] if the household does not exist, or an SQL error.
pub fn get_household(
    household_id: HouseholdId,
    connection: &Connection,
) -> Result<Household, Error> {
    connection
        .prepare("SELECT id, name, created_at FROM household WHERE id = ?1")?
        .query_row([household_id], map_household_row)
        .map_err(|error| error.into())
}

/// Get every household.
///
/// # Errors
///
/// Returns an [Error::SqlError] if an SQL related error occurred.
pub fn get_all_households(connection: &Connection) -> Result<Vec<Household>, Error> {
    connection
        .prepare("SELECT id, name, created_at FROM household ORDER BY id")?
        .query_map([], map_household_row)?
        .map(|maybe_household| maybe_household.map_err(Error::from))
        .collect()
}

/// Get the households `user_id` is a member of, with their role in each,
/// ordered by name.
///
/// # Errors
///
/// Returns an [Error::SqlError] if an SQL related error occurred.
pub fn get_households_for_user(
    user_id: UserID,
    connection: &Connection,
) -> Result<Vec<HouseholdMembership>, Error> {
    connection
        .prepare(
            "SELECT household.id, household.name, household.created_at, user_household.role
             FROM household
             INNER JOIN user_household ON user_household.household_id = household.id
             WHERE user_household.user_id = ?1
             ORDER BY household.name COLLATE NOCASE, household.id",
        )?
        .query_map([user_id.as_i64()], |row| {
            Ok(HouseholdMembership {
                household: map_household_row(row)?,
                role: role_from_column(row, 3)?,
            })
        })?
        .map(|maybe_membership| maybe_membership.map_err(Error::from))
        .collect()
}

/// Change the name of a household.
///
/// # Errors
///
/// Returns [Error::EmptyName] if `name` is blank, [Error::NotFound] if the
/// household does not exist, or an SQL error.
pub fn rename_household(
    household_id: HouseholdId,
    name: &str,
    connection: &Connection,
) -> Result<Household, Error> {
    let name = validate_name(name)?;

    connection
        .prepare(
            "UPDATE household SET name = ?1 WHERE id = ?2
             RETURNING id, name, created_at",
        )?
        .query_row((name, household_id), map_household_row)
        .map_err(|error| error.into())
}

/// Delete a household and, through cascades, everything in it.
///
/// # Errors
///
/// Returns [Error::NotFound] if the household does not exist, or an SQL error.
pub fn delete_household(household_id: HouseholdId, connection: &Connection) -> Result<(), Error> {
    let rows_affected = connection.execute("DELETE FROM household WHERE id = ?1", [household_id])?;

    if rows_affected == 0 {
        return Err(Error::NotFound);
    }

    Ok(())
}
