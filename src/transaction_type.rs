//! Transaction types, e.g. "Income" or "Transfer", and their route handlers.
//!
//! The kind of a type decides how its transactions count towards totals:
//! transfers move money between a household's own accounts and are left out
//! of income, expense and budget figures.

use std::{
    fmt::Display,
    str::FromStr,
    sync::{Arc, Mutex},
};

use axum::{
    Extension,
    extract::{FromRef, State},
    http::StatusCode,
};
use rusqlite::{Connection, OptionalExtension, Row, types::Type};
use serde::{Deserialize, Serialize};

use crate::{
    AppState, Error,
    auth::UserID,
    database_id::DatabaseId,
    db::{lock_connection, map_duplicate_name},
    extract::{Json, Path},
    household::{HouseholdId, MemberRole, require_role},
};

/// Alias for the integer type used for transaction type IDs.
pub type TransactionTypeId = DatabaseId;

/// How transactions of a type count towards a household's totals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TransactionKind {
    /// Money earned.
    Income,
    /// Money spent.
    Expense,
    /// Money moved between accounts.
    Transfer,
}

impl TransactionKind {
    /// The kind as stored in the database.
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionKind::Income => "INCOME",
            TransactionKind::Expense => "EXPENSE",
            TransactionKind::Transfer => "TRANSFER",
        }
    }
}

impl Display for TransactionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "INCOME" => Ok(TransactionKind::Income),
            "EXPENSE" => Ok(TransactionKind::Expense),
            "TRANSFER" => Ok(TransactionKind::Transfer),
            other => Err(format!("unknown transaction kind \"{other}\"")),
        }
    }
}

/// A named transaction type belonging to a household.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransactionType {
    /// The id of the transaction type.
    pub id: TransactionTypeId,
    /// The household that owns the type.
    pub household_id: HouseholdId,
    /// The display name, e.g. "Salary".
    pub name: String,
    /// How transactions of this type count towards totals.
    pub kind: TransactionKind,
}

const DEFAULT_TRANSACTION_TYPES: [(&str, TransactionKind); 3] = [
    ("Income", TransactionKind::Income),
    ("Expense", TransactionKind::Expense),
    ("Transfer", TransactionKind::Transfer),
];

/// Create the transaction type table.
///
/// # Errors
///
/// This function will return an error if the SQL query failed.
pub fn create_transaction_type_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS transaction_type (
            id INTEGER PRIMARY KEY,
            household_id INTEGER NOT NULL REFERENCES household(id) ON DELETE CASCADE,
            name TEXT NOT NULL COLLATE NOCASE,
            kind TEXT NOT NULL CHECK (kind IN ('INCOME', 'EXPENSE', 'TRANSFER')),
            UNIQUE (household_id, name)
        )",
        (),
    )?;

    Ok(())
}

fn map_transaction_type_row(row: &Row) -> Result<TransactionType, rusqlite::Error> {
    let raw_kind: String = row.get(3)?;
    let kind = raw_kind
        .parse()
        .map_err(|error: String| rusqlite::Error::FromSqlConversionFailure(3, Type::Text, error.into()))?;

    Ok(TransactionType {
        id: row.get(0)?,
        household_id: row.get(1)?,
        name: row.get(2)?,
        kind,
    })
}

/// Add the default Income, Expense and Transfer types to a new household.
///
/// # Errors
///
/// Returns an [Error::SqlError] if an SQL related error occurred.
pub fn seed_default_transaction_types(
    household_id: HouseholdId,
    connection: &Connection,
) -> Result<(), Error> {
    let mut statement = connection
        .prepare("INSERT INTO transaction_type (household_id, name, kind) VALUES (?1, ?2, ?3)")?;

    for (name, kind) in DEFAULT_TRANSACTION_TYPES {
        statement.execute((household_id, name, kind.as_str()))?;
    }

    Ok(())
}

/// Create a transaction type.
///
/// # Errors
///
/// Returns [Error::EmptyName] for a blank name, [Error::DuplicateName] if the
/// name is taken, or an SQL error.
pub fn create_transaction_type(
    household_id: HouseholdId,
    name: &str,
    kind: TransactionKind,
    connection: &Connection,
) -> Result<TransactionType, Error> {
    let name = name.trim();

    if name.is_empty() {
        return Err(Error::EmptyName);
    }

    connection
        .prepare(
            "INSERT INTO transaction_type (household_id, name, kind) VALUES (?1, ?2, ?3)
             RETURNING id, household_id, name, kind",
        )?
        .query_row((household_id, name, kind.as_str()), map_transaction_type_row)
        .map_err(|error| map_duplicate_name(error, name))
}

/// Get all transaction types of a household ordered by name.
///
/// # Errors
///
/// Returns an [Error::SqlError] if an SQL related error occurred.
pub fn get_transaction_types(
    household_id: HouseholdId,
    connection: &Connection,
) -> Result<Vec<TransactionType>, Error> {
    connection
        .prepare(
            "SELECT id, household_id, name, kind FROM transaction_type
             WHERE household_id = ?1 ORDER BY name, id",
        )?
        .query_map([household_id], map_transaction_type_row)?
        .map(|maybe_type| maybe_type.map_err(Error::from))
        .collect()
}

/// Find a transaction type by name, ignoring case.
///
/// # Errors
///
/// Returns an [Error::SqlError] if an SQL related error occurred.
pub fn find_transaction_type_by_name(
    household_id: HouseholdId,
    name: &str,
    connection: &Connection,
) -> Result<Option<TransactionType>, Error> {
    connection
        .prepare(
            "SELECT id, household_id, name, kind FROM transaction_type
             WHERE household_id = ?1 AND name = ?2",
        )?
        .query_row((household_id, name.trim()), map_transaction_type_row)
        .optional()
        .map_err(Error::from)
}

/// Delete a transaction type.
///
/// # Errors
///
/// Returns [Error::NotFound] if the type does not exist in the household, or
/// [Error::ForeignKeyConstraint] if transactions still refer to it.
pub fn delete_transaction_type(
    household_id: HouseholdId,
    transaction_type_id: TransactionTypeId,
    connection: &Connection,
) -> Result<(), Error> {
    let rows_affected = connection.execute(
        "DELETE FROM transaction_type WHERE id = ?1 AND household_id = ?2",
        (transaction_type_id, household_id),
    )?;

    if rows_affected == 0 {
        return Err(Error::NotFound);
    }

    Ok(())
}

/// The state needed to manage transaction types.
#[derive(Debug, Clone)]
pub struct TransactionTypeState {
    /// The database connection for managing transaction types.
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for TransactionTypeState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
        }
    }
}

/// The request body for creating a transaction type.
#[derive(Debug, Deserialize)]
pub struct TransactionTypeForm {
    /// The type name.
    pub name: String,
    /// How transactions of this type count towards totals.
    pub kind: TransactionKind,
}

/// A route handler listing the transaction types of a household.
pub async fn list_transaction_types_endpoint(
    State(state): State<TransactionTypeState>,
    Extension(user_id): Extension<UserID>,
    Path(household_id): Path<HouseholdId>,
) -> Result<Json<Vec<TransactionType>>, Error> {
    let connection = lock_connection(&state.db_connection)?;
    require_role(household_id, user_id, MemberRole::Viewer, &connection)?;

    get_transaction_types(household_id, &connection).map(Json)
}

/// A route handler for creating a transaction type.
pub async fn create_transaction_type_endpoint(
    State(state): State<TransactionTypeState>,
    Extension(user_id): Extension<UserID>,
    Path(household_id): Path<HouseholdId>,
    Json(form): Json<TransactionTypeForm>,
) -> Result<(StatusCode, Json<TransactionType>), Error> {
    let connection = lock_connection(&state.db_connection)?;
    require_role(household_id, user_id, MemberRole::Member, &connection)?;

    let transaction_type = create_transaction_type(household_id, &form.name, form.kind, &connection)?;

    Ok((StatusCode::CREATED, Json(transaction_type)))
}

/// A route handler for deleting a transaction type.
pub async fn delete_transaction_type_endpoint(
    State(state): State<TransactionTypeState>,
    Extension(user_id): Extension<UserID>,
    Path((household_id, transaction_type_id)): Path<(HouseholdId, TransactionTypeId)>,
) -> Result<StatusCode, Error> {
    let connection = lock_connection(&state.db_connection)?;
    require_role(household_id, user_id, MemberRole::Member, &connection)?;

    delete_transaction_type(household_id, transaction_type_id, &connection)?;

    Ok(StatusCode::NO_CONTENT)
}
