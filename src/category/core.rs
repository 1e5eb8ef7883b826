//! Defines the category model and its database queries.
//!
//! A category groups transactions for budgeting and analytics, e.g.
//! "Groceries" or "Rent". A transaction has at most one category.

use std::fmt::Display;

use rusqlite::{Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

use crate::{Error, database_id::DatabaseId, db::map_duplicate_name, household::HouseholdId};

/// Alias for the integer type used for category IDs.
pub type CategoryId = DatabaseId;

/// The name of a category.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, Hash)]
#[serde(transparent)]
pub struct CategoryName(String);

impl CategoryName {
    /// Create a category name with surrounding whitespace removed.
    ///
    /// # Errors
    ///
    /// This function will return [Error::EmptyName] if `name` is blank.
    pub fn new(name: &str) -> Result<Self, Error> {
        let name = name.trim();

        if name.is_empty() {
            Err(Error::EmptyName)
        } else {
            Ok(Self(name.to_owned()))
        }
    }
}

impl AsRef<str> for CategoryName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Display for CategoryName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A category for expenses and income with an optional monthly budget.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Category {
    /// The id of the category.
    pub id: CategoryId,
    /// The household that owns the category.
    pub household_id: HouseholdId,
    /// The name of the category.
    pub name: CategoryName,
    /// The amount the household plans to spend per month, if any.
    pub budget: Option<f64>,
}

/// The request body for creating or updating a category.
#[derive(Debug, Clone, Deserialize)]
pub struct CategoryForm {
    /// The category name.
    pub name: String,
    /// The monthly budget in dollars.
    #[serde(default)]
    pub budget: Option<f64>,
}

fn validate_budget(budget: Option<f64>) -> Result<Option<f64>, Error> {
    match budget {
        Some(amount) if !amount.is_finite() || amount < 0.0 => Err(Error::InvalidAmount(
            format!("a budget must be zero or more, got {amount}"),
        )),
        budget => Ok(budget),
    }
}

/// Create the category table.
///
/// Names are compared without case, so "groceries" and "Groceries" cannot
/// both exist in one household.
///
/// # Errors
///
/// This function will return an error if the SQL query failed.
pub fn create_category_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS category (
            id INTEGER PRIMARY KEY,
            household_id INTEGER NOT NULL REFERENCES household(id) ON DELETE CASCADE,
            name TEXT NOT NULL COLLATE NOCASE,
            budget REAL CHECK (budget IS NULL OR budget >= 0),
            UNIQUE (household_id, name)
        )",
        (),
    )?;

    Ok(())
}

fn map_category_row(row: &Row) -> Result<Category, rusqlite::Error> {
    Ok(Category {
        id: row.get(0)?,
        household_id: row.get(1)?,
        name: CategoryName(row.get(2)?),
        budget: row.get(3)?,
    })
}

/// Create a category in `household_id`.
///
/// # Errors
///
/// Returns [Error::EmptyName] for a blank name, [Error::InvalidAmount] for a
/// negative or non-finite budget, [Error::DuplicateName] if the name is taken,
/// or an SQL error.
pub fn create_category(
    household_id: HouseholdId,
    form: &CategoryForm,
    connection: &Connection,
) -> Result<Category, Error> {
    let name = CategoryName::new(&form.name)?;
    let budget = validate_budget(form.budget)?;

    connection
        .prepare(
            "INSERT INTO category (household_id, name, budget) VALUES (?1, ?2, ?3)
             RETURNING id, household_id, name, budget",
        )?
        .query_row((household_id, name.as_ref(), budget), map_category_row)
        .map_err(|error| map_duplicate_name(error, name.as_ref()))
}

/// Get a category that belongs to `household_id`.
///
/// # Errors
///
/// Returns [Error::NotFound] if the category does not exist in the household.
pub fn get_category(
    household_id: HouseholdId,
    category_id: CategoryId,
    connection: &Connection,
) -> Result<Category, Error> {
    connection
        .prepare(
            "SELECT id, household_id, name, budget FROM category
             WHERE id = ?1 AND household_id = ?2",
        )?
        .query_row((category_id, household_id), map_category_row)
        .map_err(Error::from)
}

/// Find a category by name, ignoring case.
///
/// # Errors
///
/// Returns an [Error::SqlError] if an SQL related error occurred.
pub fn find_category_by_name(
    household_id: HouseholdId,
    name: &str,
    connection: &Connection,
) -> Result<Option<Category>, Error> {
    connection
        .prepare(
            "SELECT id, household_id, name, budget FROM category
             WHERE household_id = ?1 AND name = ?2",
        )?
        .query_row((household_id, name.trim()), map_category_row)
        .optional()
        .map_err(Error::from)
}

/// Get all categories of a household ordered by name.
///
/// # Errors
///
/// Returns an [Error::SqlError] if an SQL related error occurred.
pub fn get_categories(
    household_id: HouseholdId,
    connection: &Connection,
) -> Result<Vec<Category>, Error> {
    connection
        .prepare(
            "SELECT id, household_id, name, budget FROM category
             WHERE household_id = ?1 ORDER BY name, id",
        )?
        .query_map([household_id], map_category_row)?
        .map(|maybe_category| maybe_category.map_err(Error::from))
        .collect()
}

/// Replace the name and budget of a category.
///
/// # Errors
///
/// Returns the same validation errors as [create_category], or
/// [Error::NotFound] if the category does not exist in the household.
pub fn update_category(
    household_id: HouseholdId,
    category_id: CategoryId,
    form: &CategoryForm,
    connection: &Connection,
) -> Result<Category, Error> {
    let name = CategoryName::new(&form.name)?;
    let budget = validate_budget(form.budget)?;

    connection
        .prepare(
            "UPDATE category SET name = ?1, budget = ?2
             WHERE id = ?3 AND household_id = ?4
             RETURNING id, household_id, name, budget",
        )?
        .query_row(
            (name.as_ref(), budget, category_id, household_id),
            map_category_row,
        )
        .map_err(|error| map_duplicate_name(error, name.as_ref()))
}

/// Delete a category.
///
/// # Errors
///
/// Returns [Error::NotFound] if the category does not exist in the household,
/// or [Error::ForeignKeyConstraint] if transactions still refer to it.
pub fn delete_category(
    household_id: HouseholdId,
    category_id: CategoryId,
    connection: &Connection,
) -> Result<(), Error> {
    let rows_affected = connection.execute(
        "DELETE FROM category WHERE id = ?1 AND household_id = ?2",
        (category_id, household_id),
    )?;

    if rows_affected == 0 {
        return Err(Error::NotFound);
    }

    Ok(())
}
