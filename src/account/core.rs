//! Defines the account model and its database queries.

use rusqlite::{Connection, Row};
use serde::{Deserialize, Serialize};
use time::Date;

use crate::{Error, database_id::DatabaseId, db::map_duplicate_name, household::HouseholdId};

/// Alias for the integer type used for account IDs.
pub type AccountId = DatabaseId;

/// The amount of money available in a bank account or credit card.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Account {
    /// The id for the account.
    pub id: AccountId,
    /// The household that owns the account.
    pub household_id: HouseholdId,
    /// The name of the account, e.g. "Everyday" or the account number.
    pub name: String,
    /// The balance as of `date`.
    pub balance: f64,
    /// When the balance was last checked.
    pub date: Date,
}

/// The request body for creating or updating an account.
#[derive(Debug, Clone, Deserialize)]
pub struct AccountForm {
    /// The account name.
    pub name: String,
    /// The balance in dollars.
    pub balance: f64,
    /// The date when the balance was last checked.
    pub date: Date,
}

impl AccountForm {
    fn validated_name(&self) -> Result<&str, Error> {
        let name = self.name.trim();

        if name.is_empty() {
            return Err(Error::EmptyName);
        }

        if !self.balance.is_finite() {
            return Err(Error::InvalidAmount(self.balance.to_string()));
        }

        Ok(name)
    }
}

/// Create the account table.
///
/// # Errors
///
/// This function will return an error if the SQL query failed.
pub fn create_account_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS account (
            id INTEGER PRIMARY KEY,
            household_id INTEGER NOT NULL REFERENCES household(id) ON DELETE CASCADE,
            name TEXT NOT NULL,
            balance REAL NOT NULL,
            date TEXT NOT NULL,
            UNIQUE (household_id, name)
        )",
        (),
    )?;

    Ok(())
}

pub(crate) fn map_row_to_account(row: &Row) -> Result<Account, rusqlite::Error> {
    Ok(Account {
        id: row.get(0)?,
        household_id: row.get(1)?,
        name: row.get(2)?,
        balance: row.get(3)?,
        date: row.get(4)?,
    })
}

/// Create an account in `household_id`.
///
/// # Errors
///
/// Returns [Error::EmptyName] for a blank name, [Error::InvalidAmount] for a
/// non-finite balance, [Error::DuplicateName] if the household already has an
/// account with that name, or an SQL error.
pub fn create_account(
    household_id: HouseholdId,
    form: &AccountForm,
    connection: &Connection,
) -> Result<Account, Error> {
    let name = form.validated_name()?;

    connection
        .prepare(
            "INSERT INTO account (household_id, name, balance, date) VALUES (?1, ?2, ?3, ?4)
             RETURNING id, household_id, name, balance, date",
        )?
        .query_row(
            (household_id, name, form.balance, form.date),
            map_row_to_account,
        )
        .map_err(|error| map_duplicate_name(error, name))
}

/// Get an account that belongs to `household_id`.
///
/// # Errors
///
/// Returns [Error::NotFound] if the account does not exist in the household.
pub fn get_account(
    household_id: HouseholdId,
    account_id: AccountId,
    connection: &Connection,
) -> Result<Account, Error> {
    connection
        .prepare(
            "SELECT id, household_id, name, balance, date FROM account
             WHERE id = ?1 AND household_id = ?2",
        )?
        .query_row((account_id, household_id), map_row_to_account)
        .map_err(Error::from)
}

/// Get all accounts of a household ordered by name.
///
/// # Errors
///
/// Returns an [Error::SqlError] if an SQL related error occurred.
pub fn get_accounts(household_id: HouseholdId, connection: &Connection) -> Result<Vec<Account>, Error> {
    connection
        .prepare(
            "SELECT id, household_id, name, balance, date FROM account
             WHERE household_id = ?1 ORDER BY name COLLATE NOCASE, id",
        )?
        .query_map([household_id], map_row_to_account)?
        .map(|maybe_account| maybe_account.map_err(Error::from))
        .collect()
}

/// Replace the name, balance and date of an account.
///
/// # Errors
///
/// Returns the same validation errors as [create_account], or
/// [Error::NotFound] if the account does not exist in the household.
pub fn update_account(
    household_id: HouseholdId,
    account_id: AccountId,
    form: &AccountForm,
    connection: &Connection,
) -> Result<Account, Error> {
    let name = form.validated_name()?;

    connection
        .prepare(
            "UPDATE account SET name = ?1, balance = ?2, date = ?3
             WHERE id = ?4 AND household_id = ?5
             RETURNING id, household_id, name, balance, date",
        )?
        .query_row(
            (name, form.balance, form.date, account_id, household_id),
            map_row_to_account,
        )
        .map_err(|error| map_duplicate_name(error, name))
}

/// Delete an account.
///
/// # Errors
///
/// Returns [Error::NotFound] if the account does not exist in the household,
/// or [Error::ForeignKeyConstraint] if transactions still refer to it.
pub fn delete_account(
    household_id: HouseholdId,
    account_id: AccountId,
    connection: &Connection,
) -> Result<(), Error> {
    let rows_affected = connection.execute(
        "DELETE FROM account WHERE id = ?1 AND household_id = ?2",
        (account_id, household_id),
    )?;

    if rows_affected == 0 {
        return Err(Error::NotFound);
    }

    Ok(())
}

/// Get the total balance across all accounts of a household.
///
/// # Errors
///
/// Returns an [Error::SqlError] if an SQL related error occurred.
pub fn get_total_account_balance(
    household_id: HouseholdId,
    connection: &Connection,
) -> Result<f64, Error> {
    let total: f64 = connection
        .prepare("SELECT COALESCE(SUM(balance), 0) FROM account WHERE household_id = ?1")?
        .query_row([household_id], |row| row.get(0))?;

    Ok(total)
}

#[cfg(test)]
mod account_tests {
    use rusqlite::Connection;
    use time::macros::date;

    use crate::{
        Error,
        account::{
            AccountForm, create_account, delete_account, get_account, get_accounts,
            get_total_account_balance, update_account,
        },
        household::{HouseholdId, create_household},
        test_utils::{get_test_connection, insert_test_user},
    };

    fn setup() -> (Connection, HouseholdId) {
        let connection = get_test_connection();
        let owner = insert_test_user("arthur@burrow.com", &connection);
        let household = create_household("The Burrow", owner, &connection).unwrap();

        (connection, household.id)
    }

    fn form(name: &str, balance: f64) -> AccountForm {
        AccountForm {
            name: name.to_owned(),
            balance,
            date: date!(2025 - 03 - 01),
        }
    }

    #[test]
    fn create_account_trims_name() {
        let (connection, household_id) = setup();

        let account = create_account(household_id, &form(" Everyday ", 12.5), &connection).unwrap();

        assert_eq!(account.name, "Everyday");
        assert_eq!(account.household_id, household_id);
        assert_eq!(get_account(household_id, account.id, &connection), Ok(account));
    }

    #[test]
    fn create_account_rejects_blank_name() {
        let (connection, household_id) = setup();

        assert_eq!(
            create_account(household_id, &form("  ", 0.0), &connection),
            Err(Error::EmptyName)
        );
    }

    #[test]
    fn create_account_rejects_non_finite_balance() {
        let (connection, household_id) = setup();

        assert!(matches!(
            create_account(household_id, &form("Savings", f64::NAN), &connection),
            Err(Error::InvalidAmount(_))
        ));
    }

    #[test]
    fn duplicate_name_in_same_household_is_rejected() {
        let (connection, household_id) = setup();
        create_account(household_id, &form("Savings", 1.0), &connection).unwrap();

        assert_eq!(
            create_account(household_id, &form("Savings", 2.0), &connection),
            Err(Error::DuplicateName("Savings".to_owned()))
        );
    }

    #[test]
    fn same_name_in_other_household_is_allowed() {
        let (connection, household_id) = setup();
        let other_owner = insert_test_user("bill@shell.com", &connection);
        let other = create_household("Shell Cottage", other_owner, &connection).unwrap();
        create_account(household_id, &form("Savings", 1.0), &connection).unwrap();

        assert!(create_account(other.id, &form("Savings", 2.0), &connection).is_ok());
    }

    #[test]
    fn get_account_from_other_household_is_not_found() {
        let (connection, household_id) = setup();
        let other_owner = insert_test_user("bill@shell.com", &connection);
        let other = create_household("Shell Cottage", other_owner, &connection).unwrap();
        let account = create_account(household_id, &form("Savings", 1.0), &connection).unwrap();

        assert_eq!(
            get_account(other.id, account.id, &connection),
            Err(Error::NotFound)
        );
    }

    #[test]
    fn update_and_delete_account() {
        let (connection, household_id) = setup();
        let account = create_account(household_id, &form("Savings", 1.0), &connection).unwrap();

        let updated =
            update_account(household_id, account.id, &form("Rainy Day", 50.0), &connection)
                .unwrap();
        assert_eq!(updated.name, "Rainy Day");
        assert_eq!(updated.balance, 50.0);

        delete_account(household_id, account.id, &connection).unwrap();
        assert!(get_accounts(household_id, &connection).unwrap().is_empty());
        assert_eq!(
            delete_account(household_id, account.id, &connection),
            Err(Error::NotFound)
        );
    }

    #[test]
    fn total_balance_sums_household_accounts() {
        let (connection, household_id) = setup();
        create_account(household_id, &form("Everyday", 100.5), &connection).unwrap();
        create_account(household_id, &form("Savings", 250.75), &connection).unwrap();
        create_account(household_id, &form("Credit Card", -50.25), &connection).unwrap();

        assert_eq!(get_total_account_balance(household_id, &connection), Ok(301.0));
    }

    #[test]
    fn total_balance_is_zero_without_accounts() {
        let (connection, household_id) = setup();

        assert_eq!(get_total_account_balance(household_id, &connection), Ok(0.0));
    }
}
