//! Code for creating the user table and fetching users from the database.

use std::fmt::Display;

use rusqlite::{Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::{Error, auth::PasswordHash};

/// A newtype wrapper for integer user IDs.
///
/// This helps disambiguate user IDs from other types of IDs, leading to better compile time
/// errors, and more flexible generics that can have distinct implementations for multiple ID types.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Hash, PartialOrd, Ord)]
pub struct UserID(i64);

impl UserID {
    /// Create a new user ID.
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    /// Cast the user ID to a 64 bit integer.
    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl Display for UserID {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// A user of the application.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct User {
    /// The user's ID in the application database.
    pub id: UserID,
    /// The user's email address, always lowercase.
    pub email: String,
    /// The user's display name.
    pub name: String,
    /// The user's password hash.
    ///
    /// Users synced from the auth provider do not have a password until they register.
    #[serde(skip)]
    pub password_hash: Option<PasswordHash>,
    /// The user's ID at the external auth provider, if the user was synced from there.
    pub external_id: Option<String>,
    /// Whether the user wants to receive the weekly summary email.
    pub weekly_summary: bool,
    /// When the user was created.
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// The data needed to create a user.
#[derive(Debug, Clone)]
pub struct NewUser {
    /// A valid email address, see [normalize_email].
    pub email: String,
    /// The user's display name.
    pub name: String,
    /// The user's password hash, if they have set a password.
    pub password_hash: Option<PasswordHash>,
    /// The user's ID at the external auth provider.
    pub external_id: Option<String>,
}

/// Trim and lowercase `raw_email` and check that it looks like an email address.
///
/// # Errors
///
/// Returns [Error::InvalidEmail] if the address does not have a non-empty local
/// part, an `@` and a domain with a dot in it.
pub fn normalize_email(raw_email: &str) -> Result<String, Error> {
    let email = raw_email.trim().to_lowercase();
    let invalid = || Error::InvalidEmail(raw_email.trim().to_owned());

    let (local, domain) = email.split_once('@').ok_or_else(invalid)?;

    let domain_is_valid = domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && !domain.contains('@');

    if local.is_empty() || !domain_is_valid || email.chars().any(char::is_whitespace) {
        return Err(invalid());
    }

    Ok(email)
}

/// Create the user table.
///
/// # Errors
///
/// This function will return an error if the SQL query failed.
pub fn create_user_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS user (
                id INTEGER PRIMARY KEY,
                email TEXT NOT NULL UNIQUE,
                name TEXT NOT NULL,
                password TEXT,
                external_id TEXT UNIQUE,
                weekly_summary INTEGER NOT NULL DEFAULT 1,
                created_at TEXT NOT NULL
                )",
        (),
    )?;

    Ok(())
}

const USER_COLUMNS: &str = "id, email, name, password, external_id, weekly_summary, created_at";

fn map_user_row(row: &Row) -> Result<User, rusqlite::Error> {
    let raw_password_hash: Option<String> = row.get(3)?;

    Ok(User {
        id: UserID::new(row.get(0)?),
        email: row.get(1)?,
        name: row.get(2)?,
        password_hash: raw_password_hash.map(|hash| PasswordHash::new_unchecked(&hash)),
        external_id: row.get(4)?,
        weekly_summary: row.get(5)?,
        created_at: row.get(6)?,
    })
}

/// Create and insert a new user into the database.
///
/// # Errors
///
/// Returns a:
/// - [Error::DuplicateEmail] if a user with the email already exists,
/// - [Error::SqlError] if an SQL related error occurred.
pub fn create_user(new_user: NewUser, connection: &Connection) -> Result<User, Error> {
    let user = connection
        .prepare(&format!(
            "INSERT INTO user (email, name, password, external_id, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)
             RETURNING {USER_COLUMNS}"
        ))?
        .query_row(
            (
                &new_user.email,
                new_user.name.trim(),
                new_user.password_hash.as_ref().map(|hash| hash.as_ref()),
                &new_user.external_id,
                OffsetDateTime::now_utc(),
            ),
            map_user_row,
        )?;

    Ok(user)
}

/// Get the user from the database with an ID equal to `user_id`.
///
/// # Errors
///
/// This function will return an error if:
/// - `user_id` does not belong to a registered user.
/// - there was an error trying to access the store.
pub fn get_user_by_id(user_id: UserID, connection: &Connection) -> Result<User, Error> {
    connection
        .prepare(&format!("SELECT {USER_COLUMNS} FROM user WHERE id = :id"))?
        .query_row(&[(":id", &user_id.as_i64())], map_user_row)
        .map_err(|error| error.into())
}

/// Get the user with the email address `email`.
///
/// The email is normalized before searching, so the lookup is case-insensitive.
///
/// # Errors
///
/// Returns [Error::NotFound] if no user has the email, or an SQL error.
pub fn get_user_by_email(email: &str, connection: &Connection) -> Result<User, Error> {
    connection
        .prepare(&format!("SELECT {USER_COLUMNS} FROM user WHERE email = :email"))?
        .query_row(&[(":email", &email.trim().to_lowercase())], map_user_row)
        .map_err(|error| error.into())
}

/// Get the user linked to the auth provider ID `external_id`, if any.
///
/// # Errors
///
/// Returns an [Error::SqlError] if an SQL related error occurred.
pub fn find_user_by_external_id(
    external_id: &str,
    connection: &Connection,
) -> Result<Option<User>, Error> {
    connection
        .prepare(&format!(
            "SELECT {USER_COLUMNS} FROM user WHERE external_id = :external_id"
        ))?
        .query_row(&[(":external_id", &external_id)], map_user_row)
        .optional()
        .map_err(|error| error.into())
}

/// Set the name and/or the weekly summary preference of a user.
///
/// Fields that are `None` are left unchanged.
///
/// # Errors
///
/// Returns [Error::EmptyName] if `name` is blank, [Error::NotFound] if the
/// user does not exist, or an SQL error.
pub fn update_user_profile(
    user_id: UserID,
    name: Option<&str>,
    weekly_summary: Option<bool>,
    connection: &Connection,
) -> Result<User, Error> {
    let name = name.map(str::trim);

    if name.is_some_and(str::is_empty) {
        return Err(Error::EmptyName);
    }

    connection
        .prepare(&format!(
            "UPDATE user SET name = COALESCE(?1, name), weekly_summary = COALESCE(?2, weekly_summary)
             WHERE id = ?3
             RETURNING {USER_COLUMNS}"
        ))?
        .query_row((name, weekly_summary, user_id.as_i64()), map_user_row)
        .map_err(|error| error.into())
}

/// Replace the password hash of a user.
///
/// # Errors
///
/// Returns [Error::NotFound] if the user does not exist, or an SQL error.
pub fn update_password(
    user_id: UserID,
    password_hash: &PasswordHash,
    connection: &Connection,
) -> Result<(), Error> {
    let rows_affected = connection.execute(
        "UPDATE user SET password = ?1 WHERE id = ?2",
        (password_hash.as_ref(), user_id.as_i64()),
    )?;

    if rows_affected == 0 {
        return Err(Error::NotFound);
    }

    Ok(())
}

/// Set the email, name and auth provider ID of an existing user.
///
/// # Errors
///
/// Returns [Error::DuplicateEmail] if another user already has the email,
/// [Error::NotFound] if the user does not exist, or an SQL error.
pub fn update_external_user(
    user_id: UserID,
    external_id: &str,
    email: &str,
    name: &str,
    connection: &Connection,
) -> Result<User, Error> {
    connection
        .prepare(&format!(
            "UPDATE user SET external_id = ?1, email = ?2, name = ?3
             WHERE id = ?4
             RETURNING {USER_COLUMNS}"
        ))?
        .query_row(
            (external_id, email, name.trim(), user_id.as_i64()),
            map_user_row,
        )
        .map_err(|error| error.into())
}

/// Delete a user and, through cascades, their household memberships.
///
/// # Errors
///
/// Returns [Error::NotFound] if the user does not exist, or an SQL error.
pub fn delete_user(user_id: UserID, connection: &Connection) -> Result<(), Error> {
    let rows_affected = connection.execute("DELETE FROM user WHERE id = ?1", [user_id.as_i64()])?;

    if rows_affected == 0 {
        return Err(Error::NotFound);
    }

    Ok(())
}

/// Get the number of users in the database.
///
/// # Errors
///
/// Returns a [Error::SqlError] if an SQL related error occurred.
#[cfg(test)]
pub fn count_users(connection: &Connection) -> Result<u32, Error> {
    connection
        .query_row("SELECT COUNT(id) FROM user;", [], |row| row.get(0))
        .map_err(|error| error.into())
}


#[cfg(test)]
mod user_tests {
    use rusqlite::Connection;

    use crate::{
        Error,
        auth::{PasswordHash, UserID},
        db::initialize,
    };

    use super::{
        NewUser, count_users, create_user, delete_user, find_user_by_external_id,
        get_user_by_email, get_user_by_id, update_password, update_user_profile,
    };

    fn get_db_connection() -> Connection {
        let conn =
            Connection::open_in_memory().expect("Could not create in-memory SQLite database");
        initialize(&conn).expect("Could not initialize database");

        conn
    }

    fn new_user(email: &str) -> NewUser {
        NewUser {
            email: email.to_owned(),
            name: "Molly".to_owned(),
            password_hash: Some(PasswordHash::new_unchecked("hunter2")),
            external_id: None,
        }
    }

    #[test]
    fn insert_user_succeeds() {
        let db_connection = get_db_connection();

        let inserted_user = create_user(new_user("molly@burrow.com"), &db_connection).unwrap();

        assert!(inserted_user.id.as_i64() > 0);
        assert_eq!(inserted_user.email, "molly@burrow.com");
        assert_eq!(
            inserted_user.password_hash,
            Some(PasswordHash::new_unchecked("hunter2"))
        );
        assert!(inserted_user.weekly_summary);
    }

    #[test]
    fn insert_user_fails_on_duplicate_email() {
        let db_connection = get_db_connection();
        create_user(new_user("molly@burrow.com"), &db_connection).unwrap();

        let result = create_user(new_user("molly@burrow.com"), &db_connection);

        assert_eq!(result, Err(Error::DuplicateEmail));
    }

    #[test]
    fn get_user_fails_with_non_existent_id() {
        let db_connection = get_db_connection();

        let id = UserID::new(42);

        assert_eq!(get_user_by_id(id, &db_connection), Err(Error::NotFound));
    }

    #[test]
    fn get_user_succeeds_with_existing_id() {
        let db_connection = get_db_connection();
        let test_user = create_user(new_user("molly@burrow.com"), &db_connection).unwrap();

        let retrieved_user = get_user_by_id(test_user.id, &db_connection).unwrap();

        assert_eq!(retrieved_user, test_user);
    }

    #[test]
    fn get_user_by_email_ignores_case() {
        let db_connection = get_db_connection();
        let test_user = create_user(new_user("molly@burrow.com"), &db_connection).unwrap();

        let retrieved_user = get_user_by_email("Molly@Burrow.com", &db_connection).unwrap();

        assert_eq!(retrieved_user, test_user);
    }

    #[test]
    fn find_by_external_id_returns_none_when_missing() {
        let db_connection = get_db_connection();

        assert_eq!(find_user_by_external_id("ext_1", &db_connection), Ok(None));
    }

    #[test]
    fn update_profile_changes_only_given_fields() {
        let db_connection = get_db_connection();
        let test_user = create_user(new_user("molly@burrow.com"), &db_connection).unwrap();

        let updated = update_user_profile(test_user.id, None, Some(false), &db_connection).unwrap();

        assert_eq!(updated.name, "Molly");
        assert!(!updated.weekly_summary);
    }

    #[test]
    fn update_profile_rejects_blank_name() {
        let db_connection = get_db_connection();
        let test_user = create_user(new_user("molly@burrow.com"), &db_connection).unwrap();

        let result = update_user_profile(test_user.id, Some("  "), None, &db_connection);

        assert_eq!(result, Err(Error::EmptyName));
    }

    #[test]
    fn update_password_replaces_hash() {
        let db_connection = get_db_connection();
        let test_user = create_user(new_user("molly@burrow.com"), &db_connection).unwrap();
        let new_hash = PasswordHash::new_unchecked("hunter3");

        update_password(test_user.id, &new_hash, &db_connection).unwrap();

        let retrieved_user = get_user_by_id(test_user.id, &db_connection).unwrap();
        assert_eq!(retrieved_user.password_hash, Some(new_hash));
    }

    #[test]
    fn delete_user_removes_user() {
        let db_connection = get_db_connection();
        let test_user = create_user(new_user("molly@burrow.com"), &db_connection).unwrap();

        delete_user(test_user.id, &db_connection).unwrap();

        assert_eq!(count_users(&db_connection), Ok(0));
        assert_eq!(
            delete_user(test_user.id, &db_connection),
            Err(Error::NotFound)
        );
    }
}
