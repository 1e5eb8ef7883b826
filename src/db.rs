//! Database initialization and connection helpers.

use std::sync::{Mutex, MutexGuard};

use rusqlite::{
    Connection, Transaction as SqlTransaction, TransactionBehavior, functions::FunctionFlags,
};

use crate::{
    Error,
    account::create_account_table,
    auth::create_user_table,
    category::create_category_table,
    household::{create_household_table, create_membership_table},
    invitation::create_invitation_table,
    transaction::create_transaction_table,
    transaction_type::create_transaction_type_table,
};

/// Enable foreign keys, register the SQL functions and create the tables for
/// the domain models if they do not exist.
///
/// Tables are created in a single exclusive transaction so a partially
/// initialized database is never left behind.
///
/// # Errors
/// Returns an error if a table cannot be created or if there is an SQL error.
pub fn initialize(connection: &Connection) -> Result<(), Error> {
    // Has no effect inside a transaction, so it must be set first.
    connection.pragma_update(None, "foreign_keys", "ON")?;
    register_functions(connection)?;

    let transaction = SqlTransaction::new_unchecked(connection, TransactionBehavior::Exclusive)?;

    create_user_table(&transaction)?;
    create_household_table(&transaction)?;
    create_membership_table(&transaction)?;
    create_account_table(&transaction)?;
    create_category_table(&transaction)?;
    create_transaction_type_table(&transaction)?;
    create_transaction_table(&transaction)?;
    create_invitation_table(&transaction)?;

    transaction.commit()?;

    Ok(())
}

/// Registers `unicode_lower(text)`.
///
/// SQLite's own `lower` and `LIKE` only fold ASCII letters.
fn register_functions(connection: &Connection) -> Result<(), Error> {
    connection.create_scalar_function(
        "unicode_lower",
        1,
        FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
        |context| {
            let text: Option<String> = context.get(0)?;
            Ok(text.map(|text| text.to_lowercase()))
        },
    )?;

    Ok(())
}

/// Acquire the lock on the shared database connection.
///
/// # Errors
/// Returns [Error::DatabaseLockError] if the lock is poisoned.
pub fn lock_connection(
    db_connection: &Mutex<Connection>,
) -> Result<MutexGuard<'_, Connection>, Error> {
    db_connection.lock().map_err(|error| {
        tracing::error!("could not acquire database lock: {error}");
        Error::DatabaseLockError
    })
}

/// Map a unique constraint violation on a household-scoped name to
/// [Error::DuplicateName], and any other error as usual.
pub(crate) fn map_duplicate_name(error: rusqlite::Error, name: &str) -> Error {
    match error {
        rusqlite::Error::SqliteFailure(sql_error, _)
            if sql_error.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE =>
        {
            Error::DuplicateName(name.to_owned())
        }
        error => error.into(),
    }
}
