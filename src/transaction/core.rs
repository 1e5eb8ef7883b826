//! Defines the core data models and database queries for transactions.

use rusqlite::{Connection, Row};
use serde::{Deserialize, Serialize};
use time::{Date, OffsetDateTime};

use crate::{
    Error,
    account::{AccountId, get_account},
    auth::UserID,
    category::{CategoryId, get_category},
    database_id::DatabaseId,
    household::HouseholdId,
    transaction_type::TransactionTypeId,
};

/// Alias for the integer type used for transaction IDs.
pub type TransactionId = DatabaseId;

// ============================================================================
// MODELS
// ============================================================================

/// An expense or income, i.e. an event where money was either spent or earned.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Transaction {
    /// The ID of the transaction.
    pub id: TransactionId,
    /// The household the transaction belongs to.
    pub household_id: HouseholdId,
    /// The account the money moved in or out of.
    pub account_id: AccountId,
    /// The category of the transaction, e.g. "Groceries".
    pub category_id: Option<CategoryId>,
    /// The type of the transaction, e.g. "Transfer".
    pub transaction_type_id: Option<TransactionTypeId>,
    /// The amount of money spent (negative) or earned (positive).
    pub amount: f64,
    /// When the transaction happened.
    pub date: Date,
    /// A text description of what the transaction was for.
    pub description: String,
    /// The hash identifying the CSV row the transaction was imported from.
    pub import_id: Option<i64>,
    /// The user who recorded the transaction, if they still exist.
    pub created_by: Option<UserID>,
    /// When the transaction was recorded.
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// The request body for creating or updating a transaction.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TransactionForm {
    /// The account the money moved in or out of.
    pub account_id: AccountId,
    /// The monetary amount of the transaction.
    ///
    /// Positive values represent income/credits, negative values represent
    /// expenses/debits.
    pub amount: f64,
    /// The date when the transaction occurred. Must not be in the future.
    pub date: Date,
    /// A human-readable description of the transaction.
    pub description: String,
    /// The category of the transaction.
    #[serde(default)]
    pub category_id: Option<CategoryId>,
    /// The type of the transaction.
    #[serde(default)]
    pub transaction_type_id: Option<TransactionTypeId>,
}

impl TransactionForm {
    /// Create a form without a category or type.
    pub fn new(account_id: AccountId, amount: f64, date: Date, description: &str) -> Self {
        Self {
            account_id,
            amount,
            date,
            description: description.to_owned(),
            category_id: None,
            transaction_type_id: None,
        }
    }
}

// ============================================================================
// DATABASE FUNCTIONS
// ============================================================================

/// Create the transaction table.
///
/// # Errors
///
/// This function will return an error if the SQL query failed.
pub fn create_transaction_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS \"transaction\" (
            id INTEGER PRIMARY KEY,
            household_id INTEGER NOT NULL REFERENCES household(id) ON DELETE CASCADE,
            account_id INTEGER NOT NULL REFERENCES account(id),
            category_id INTEGER REFERENCES category(id),
            transaction_type_id INTEGER REFERENCES transaction_type(id),
            amount REAL NOT NULL,
            date TEXT NOT NULL,
            description TEXT NOT NULL,
            import_id INTEGER,
            created_by INTEGER REFERENCES user(id) ON DELETE SET NULL,
            created_at TEXT NOT NULL,
            UNIQUE (household_id, import_id)
        )",
        (),
    )?;

    // Composite index for the date-ordered listing and the report queries.
    connection.execute(
        "CREATE INDEX IF NOT EXISTS idx_transaction_household_date
         ON \"transaction\"(household_id, date)",
        (),
    )?;

    Ok(())
}

/// The columns selected by [map_transaction_row], in order.
pub(crate) const TRANSACTION_COLUMNS: &str = "\"transaction\".id, \"transaction\".household_id, \
    \"transaction\".account_id, \"transaction\".category_id, \"transaction\".transaction_type_id, \
    \"transaction\".amount, \"transaction\".date, \"transaction\".description, \
    \"transaction\".import_id, \"transaction\".created_by, \"transaction\".created_at";

/// Map a database row selected with [TRANSACTION_COLUMNS] to a [Transaction].
pub(crate) fn map_transaction_row(row: &Row) -> Result<Transaction, rusqlite::Error> {
    Ok(Transaction {
        id: row.get(0)?,
        household_id: row.get(1)?,
        account_id: row.get(2)?,
        category_id: row.get(3)?,
        transaction_type_id: row.get(4)?,
        amount: row.get(5)?,
        date: row.get(6)?,
        description: row.get(7)?,
        import_id: row.get(8)?,
        created_by: row.get::<_, Option<i64>>(9)?.map(UserID::new),
        created_at: row.get(10)?,
    })
}

/// Check a transaction form against the household it is being saved in.
///
/// # Errors
///
/// Returns a:
/// - [Error::InvalidAmount] if the amount is NaN or infinite,
/// - [Error::FutureDate] if the date is after `today`,
/// - [Error::InvalidAccount], [Error::InvalidCategory] or
///   [Error::InvalidTransactionType] if a referenced row does not belong to
///   the household.
pub(crate) fn validate_transaction_form(
    household_id: HouseholdId,
    form: &TransactionForm,
    today: Date,
    connection: &Connection,
) -> Result<(), Error> {
    if !form.amount.is_finite() {
        return Err(Error::InvalidAmount(form.amount.to_string()));
    }

    if form.date > today {
        return Err(Error::FutureDate(form.date));
    }

    get_account(household_id, form.account_id, connection).map_err(|error| match error {
        Error::NotFound => Error::InvalidAccount(form.account_id),
        error => error,
    })?;

    if let Some(category_id) = form.category_id {
        get_category(household_id, category_id, connection).map_err(|error| match error {
            Error::NotFound => Error::InvalidCategory(category_id),
            error => error,
        })?;
    }

    if let Some(transaction_type_id) = form.transaction_type_id {
        let exists: bool = connection
            .prepare(
                "SELECT EXISTS (SELECT 1 FROM transaction_type WHERE id = ?1 AND household_id = ?2)",
            )?
            .query_row((transaction_type_id, household_id), |row| row.get(0))?;

        if !exists {
            return Err(Error::InvalidTransactionType(transaction_type_id));
        }
    }

    Ok(())
}

/// Insert a transaction without validating it.
///
/// Callers must have validated the referenced rows, e.g. with
/// [validate_transaction_form].
///
/// # Errors
///
/// Returns [Error::DuplicateImportId] if `import_id` already exists in the
/// household, or an SQL error.
pub(crate) fn insert_transaction(
    household_id: HouseholdId,
    created_by: Option<UserID>,
    form: &TransactionForm,
    import_id: Option<i64>,
    connection: &Connection,
) -> Result<Transaction, Error> {
    connection
        .prepare(&format!(
            "INSERT INTO \"transaction\" (household_id, account_id, category_id, transaction_type_id,
                amount, date, description, import_id, created_by, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
             RETURNING {TRANSACTION_COLUMNS}"
        ))?
        .query_row(
            (
                household_id,
                form.account_id,
                form.category_id,
                form.transaction_type_id,
                form.amount,
                form.date,
                form.description.trim(),
                import_id,
                created_by.map(|user_id| user_id.as_i64()),
                OffsetDateTime::now_utc(),
            ),
            map_transaction_row,
        )
        .map_err(Error::from)
}

/// Create a new transaction recorded by `created_by`.
///
/// `today` is the current date in the service's timezone.
///
/// # Errors
///
/// Returns the errors of [validate_transaction_form], or an SQL error.
pub fn create_transaction(
    household_id: HouseholdId,
    created_by: UserID,
    form: &TransactionForm,
    today: Date,
    connection: &Connection,
) -> Result<Transaction, Error> {
    validate_transaction_form(household_id, form, today, connection)?;

    insert_transaction(household_id, Some(created_by), form, None, connection)
}

/// Get a transaction that belongs to `household_id`.
///
/// # Errors
///
/// Returns [Error::NotFound] if the transaction does not exist in the household.
pub fn get_transaction(
    household_id: HouseholdId,
    transaction_id: TransactionId,
    connection: &Connection,
) -> Result<Transaction, Error> {
    connection
        .prepare(&format!(
            "SELECT {TRANSACTION_COLUMNS} FROM \"transaction\" WHERE id = ?1 AND household_id = ?2"
        ))?
        .query_row((transaction_id, household_id), map_transaction_row)
        .map_err(Error::from)
}

/// Replace the editable fields of a transaction.
///
/// The import ID, creator and creation time are kept.
///
/// # Errors
///
/// Returns the errors of [validate_transaction_form], [Error::NotFound] if the
/// transaction does not exist in the household, or an SQL error.
pub fn update_transaction(
    household_id: HouseholdId,
    transaction_id: TransactionId,
    form: &TransactionForm,
    today: Date,
    connection: &Connection,
) -> Result<Transaction, Error> {
    validate_transaction_form(household_id, form, today, connection)?;

    connection
        .prepare(&format!(
            "UPDATE \"transaction\"
             SET account_id = ?1, category_id = ?2, transaction_type_id = ?3,
                 amount = ?4, date = ?5, description = ?6
             WHERE id = ?7 AND household_id = ?8
             RETURNING {TRANSACTION_COLUMNS}"
        ))?
        .query_row(
            (
                form.account_id,
                form.category_id,
                form.transaction_type_id,
                form.amount,
                form.date,
                form.description.trim(),
                transaction_id,
                household_id,
            ),
            map_transaction_row,
        )
        .map_err(Error::from)
}

/// Delete a transaction.
///
/// # Errors
///
/// Returns [Error::NotFound] if the transaction does not exist in the household.
pub fn delete_transaction(
    household_id: HouseholdId,
    transaction_id: TransactionId,
    connection: &Connection,
) -> Result<(), Error> {
    let rows_affected = connection.execute(
        "DELETE FROM \"transaction\" WHERE id = ?1 AND household_id = ?2",
        (transaction_id, household_id),
    )?;

    if rows_affected == 0 {
        return Err(Error::NotFound);
    }

    Ok(())
}

#[cfg(test)]
mod transaction_tests {
    use time::macros::date;

    use crate::{
        Error,
        auth::UserID,
        category::{CategoryForm, create_category},
        household::create_household,
        test_utils::{get_test_connection, insert_test_user},
        transaction::{
            TransactionForm, create_transaction, delete_transaction, get_transaction,
            insert_transaction, update_transaction,
        },
    };

    use crate::transaction::test_utils::{TransactionFixture, transaction_fixture};

    #[test]
    fn create_transaction_records_creator() {
        let TransactionFixture {
            connection,
            household_id,
            owner,
            account_id,
        } = transaction_fixture();
        let form = TransactionForm::new(account_id, -12.3, date!(2025 - 03 - 04), " Coffee ");

        let transaction =
            create_transaction(household_id, owner, &form, date!(2025 - 03 - 04), &connection)
                .unwrap();

        assert_eq!(transaction.description, "Coffee");
        assert_eq!(transaction.amount, -12.3);
        assert_eq!(transaction.created_by, Some(owner));
        assert_eq!(transaction.import_id, None);
        assert_eq!(
            get_transaction(household_id, transaction.id, &connection),
            Ok(transaction)
        );
    }

    #[test]
    fn create_transaction_rejects_future_date() {
        let TransactionFixture {
            connection,
            household_id,
            owner,
            account_id,
        } = transaction_fixture();
        let form = TransactionForm::new(account_id, -1.0, date!(2025 - 03 - 05), "Tomorrow");

        assert_eq!(
            create_transaction(household_id, owner, &form, date!(2025 - 03 - 04), &connection),
            Err(Error::FutureDate(date!(2025 - 03 - 05)))
        );
    }

    #[test]
    fn create_transaction_rejects_non_finite_amount() {
        let TransactionFixture {
            connection,
            household_id,
            owner,
            account_id,
        } = transaction_fixture();
        let form = TransactionForm::new(account_id, f64::INFINITY, date!(2025 - 03 - 01), "");

        assert!(matches!(
            create_transaction(household_id, owner, &form, date!(2025 - 03 - 04), &connection),
            Err(Error::InvalidAmount(_))
        ));
    }

    #[test]
    fn create_transaction_rejects_account_from_other_household() {
        let TransactionFixture {
            connection,
            household_id,
            owner,
            account_id,
        } = transaction_fixture();
        let other = create_household("Shell Cottage", owner, &connection).unwrap();
        let form = TransactionForm::new(account_id, -1.0, date!(2025 - 03 - 01), "");

        assert_eq!(
            create_transaction(other.id, owner, &form, date!(2025 - 03 - 04), &connection),
            Err(Error::InvalidAccount(account_id))
        );
        // The original household still accepts it.
        assert!(
            create_transaction(household_id, owner, &form, date!(2025 - 03 - 04), &connection)
                .is_ok()
        );
    }

    #[test]
    fn create_transaction_rejects_unknown_category_and_type() {
        let TransactionFixture {
            connection,
            household_id,
            owner,
            account_id,
        } = transaction_fixture();
        let mut form = TransactionForm::new(account_id, -1.0, date!(2025 - 03 - 01), "");
        form.category_id = Some(404);

        assert_eq!(
            create_transaction(household_id, owner, &form, date!(2025 - 03 - 04), &connection),
            Err(Error::InvalidCategory(404))
        );

        form.category_id = None;
        form.transaction_type_id = Some(405);

        assert_eq!(
            create_transaction(household_id, owner, &form, date!(2025 - 03 - 04), &connection),
            Err(Error::InvalidTransactionType(405))
        );
    }

    #[test]
    fn update_transaction_changes_fields() {
        let TransactionFixture {
            connection,
            household_id,
            owner,
            account_id,
        } = transaction_fixture();
        let category = create_category(
            household_id,
            &CategoryForm {
                name: "Groceries".to_owned(),
                budget: None,
            },
            &connection,
        )
        .unwrap();
        let created = create_transaction(
            household_id,
            owner,
            &TransactionForm::new(account_id, -1.0, date!(2025 - 03 - 01), "Milk"),
            date!(2025 - 03 - 04),
            &connection,
        )
        .unwrap();
        let mut form = TransactionForm::new(account_id, -2.5, date!(2025 - 03 - 02), "Bread");
        form.category_id = Some(category.id);

        let updated =
            update_transaction(household_id, created.id, &form, date!(2025 - 03 - 04), &connection)
                .unwrap();

        assert_eq!(updated.amount, -2.5);
        assert_eq!(updated.description, "Bread");
        assert_eq!(updated.category_id, Some(category.id));
        assert_eq!(updated.created_at, created.created_at);
    }

    #[test]
    fn duplicate_import_id_is_rejected() {
        let TransactionFixture {
            connection,
            household_id,
            account_id,
            ..
        } = transaction_fixture();
        let form = TransactionForm::new(account_id, -1.0, date!(2025 - 03 - 01), "Milk");
        insert_transaction(household_id, None, &form, Some(42), &connection).unwrap();

        assert_eq!(
            insert_transaction(household_id, None, &form, Some(42), &connection),
            Err(Error::DuplicateImportId)
        );
    }

    #[test]
    fn deleting_creator_keeps_transaction() {
        let TransactionFixture {
            connection,
            household_id,
            account_id,
            ..
        } = transaction_fixture();
        let bookkeeper = insert_test_user("percy@ministry.com", &connection);
        let transaction = create_transaction(
            household_id,
            bookkeeper,
            &TransactionForm::new(account_id, -1.0, date!(2025 - 03 - 01), "Quills"),
            date!(2025 - 03 - 04),
            &connection,
        )
        .unwrap();

        crate::auth::delete_user(bookkeeper, &connection).unwrap();

        let transaction = get_transaction(household_id, transaction.id, &connection).unwrap();
        assert_eq!(transaction.created_by, None::<UserID>);
    }

    #[test]
    fn delete_transaction_removes_it() {
        let TransactionFixture {
            connection,
            household_id,
            owner,
            account_id,
        } = transaction_fixture();
        let transaction = create_transaction(
            household_id,
            owner,
            &TransactionForm::new(account_id, -1.0, date!(2025 - 03 - 01), "Milk"),
            date!(2025 - 03 - 04),
            &connection,
        )
        .unwrap();

        delete_transaction(household_id, transaction.id, &connection).unwrap();

        assert_eq!(
            get_transaction(household_id, transaction.id, &connection),
            Err(Error::NotFound)
        );
        assert_eq!(
            delete_transaction(household_id, transaction.id, &connection),
            Err(Error::NotFound)
        );
    }
}
