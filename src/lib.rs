//! Household Ledger is a web service for tracking a household's finances.
//!
//! Members of a household record transactions against shared accounts,
//! categorize spending, track monthly budgets and invite each other to
//! collaborate. This library provides the JSON API served by the `server`
//! binary.

#![warn(missing_docs)]

use std::{net::SocketAddr, time::Duration};

use axum::{
    Json,
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use axum_server::Handle;
use serde_json::json;
use time::Date;
use tokio::signal;

mod account;
mod analytics;
mod app_state;
mod auth;
mod budget;
mod category;
mod config;
mod csv_import;
mod dashboard;
mod database_id;
mod db;
mod duplicates;
mod email;
mod endpoints;
mod extract;
mod household;
mod invitation;
mod logging;
mod not_found;
mod pagination;
mod routing;
mod timezone;
mod transaction;
mod transaction_type;
mod weekly_summary;

#[cfg(test)]
mod test_utils;

pub use account::{AccountForm, create_account};
pub use app_state::AppState;
pub use auth::{
    NewUser, PasswordHash, User, UserID, ValidatedPassword, create_user, get_user_by_email,
    update_password,
};
pub use category::{CategoryForm, create_category};
pub use config::{ConfigError, ServiceConfig};
pub use db::initialize as initialize_db;
pub use email::{EmailMessage, HttpMailer, LogMailer, Mailer};
pub use household::{MemberRole, add_member, create_household};
pub use logging::{LOG_BODY_LENGTH_LIMIT, logging_middleware};
pub use pagination::PaginationConfig;
pub use routing::build_router;
pub use transaction::{TransactionForm, create_transaction};

use crate::{
    account::AccountId, category::CategoryId, invitation::InvitationStatus,
    transaction_type::TransactionTypeId,
};

/// An async task that waits for either the ctrl+c or terminate signal, whichever comes first, and
/// then signals the server to shut down gracefully.
///
/// `handle` is a handle to an Axum `Server`.
pub async fn graceful_shutdown(handle: Handle<SocketAddr>) {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::debug!("Received ctrl+c signal.");
            handle.graceful_shutdown(Some(Duration::from_secs(1)));
        },
        _ = terminate => {
            tracing::debug!("Received terminate signal.");
            handle.graceful_shutdown(Some(Duration::from_secs(1)));
        },
    }
}

/// The errors that may occur in the application.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum Error {
    /// The email and password combination did not match a registered user.
    #[error("incorrect email or password")]
    InvalidCredentials,

    /// The request did not carry a valid session cookie.
    #[error("you must be logged in to do that")]
    Unauthenticated,

    /// A shared secret (cron or webhook) was missing or did not match.
    #[error("invalid or missing secret")]
    InvalidSecret,

    /// The user is a member of the household but their role does not allow
    /// the operation.
    ///
    /// The role is the minimum role needed for the operation.
    #[error("this action requires the {0} role")]
    Forbidden(household::MemberRole),

    /// The requested resource was not found.
    ///
    /// For HTTP request handlers, the client should check that the parameters
    /// (e.g., ID) are correct and that the resource has been created.
    ///
    /// Internally, this error may occur when a query returns no rows.
    #[error("the requested resource could not be found")]
    NotFound,

    /// The user provided a string that does not look like an email address.
    #[error("\"{0}\" is not a valid email address")]
    InvalidEmail(String),

    /// The user provided a password that is too easy to guess.
    #[error("password is too weak: {0}")]
    TooWeak(String),

    /// An unexpected error occurred with the underlying hashing library.
    ///
    /// The error string should only be logged for debugging on the server.
    /// When communicating with the application client this error should be
    /// replaced with a general error type indicating an internal server error.
    #[error("hashing failed: {0}")]
    HashingError(String),

    /// An empty string was used for a name.
    #[error("name cannot be empty")]
    EmptyName,

    /// An amount was not a finite number or was out of the allowed range.
    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    /// A date in the future was used to create a transaction.
    ///
    /// Transactions record events that have already happened, therefore future
    /// dates are not allowed.
    #[error("{0} is a date in the future, which is not allowed")]
    FutureDate(Date),

    /// The account ID does not refer to an account in the household.
    #[error("account {0} does not exist in this household")]
    InvalidAccount(AccountId),

    /// The category ID does not refer to a category in the household.
    #[error("category {0} does not exist in this household")]
    InvalidCategory(CategoryId),

    /// The transaction type ID does not refer to a type in the household.
    #[error("transaction type {0} does not exist in this household")]
    InvalidTransactionType(TransactionTypeId),

    /// A month string was not in the format `YYYY-MM`.
    #[error("\"{0}\" is not a valid month, expected the format YYYY-MM")]
    InvalidMonth(String),

    /// The start of a date range is after its end.
    #[error("the start date {0} is after the end date {1}")]
    InvalidDateRange(Date, Date),

    /// A role string was not one of OWNER, MEMBER or VIEWER.
    #[error("\"{0}\" is not a valid role")]
    InvalidRole(String),

    /// A query parameter was outside of its allowed range.
    #[error("invalid query parameter: {0}")]
    InvalidQuery(String),

    /// The request body was not JSON of the expected shape.
    #[error("invalid request body: {0}")]
    InvalidBody(String),

    /// The user's email already exists in the database.
    #[error("a user with that email address already exists")]
    DuplicateEmail,

    /// A name that must be unique within a household is already taken.
    #[error("\"{0}\" already exists in this household")]
    DuplicateName(String),

    /// The specified import ID already exists in the database.
    ///
    /// When importing transactions from a CSV file, an import ID is used to
    /// uniquely identify each transaction. Rejecting duplicate import IDs
    /// avoids importing the same transaction multiple times, which is likely
    /// to happen if the user tries to import CSV files that overlap in time.
    #[error("the import ID already exists in the database")]
    DuplicateImportId,

    /// A row could not be deleted or changed because other rows still refer
    /// to it, e.g. deleting an account that has transactions.
    #[error("the resource is still in use and cannot be deleted")]
    ForeignKeyConstraint,

    /// The user is already a member of the household.
    #[error("the user is already a member of this household")]
    AlreadyMember,

    /// A pending invitation for the email address already exists.
    #[error("a pending invitation for {0} already exists")]
    DuplicateInvitation(String),

    /// The operation would leave the household without an owner.
    #[error("a household must have at least one owner")]
    LastOwner,

    /// The invitation has already been accepted or revoked.
    #[error("the invitation is {0} and can no longer be used")]
    InvitationNotPending(InvitationStatus),

    /// The invitation expired before it was accepted.
    #[error("the invitation has expired")]
    InvitationExpired,

    /// The invitation was sent to a different email address than the user's.
    #[error("the invitation was sent to a different email address")]
    InvitationEmailMismatch,

    /// The multipart form could not be parsed as a list of CSV files.
    #[error("could not parse multipart form: {0}")]
    MultipartError(String),

    /// The multipart form did not contain a CSV file.
    #[error("file is not a CSV")]
    NotCSV,

    /// The CSV had issues that prevented it from being parsed.
    #[error("could not parse the CSV file: {0}")]
    InvalidCSV(String),

    /// The webhook body could not be understood.
    #[error("invalid webhook payload: {0}")]
    InvalidWebhookPayload(String),

    /// The email provider rejected the message or could not be reached.
    #[error("could not send email: {0}")]
    EmailError(String),

    /// An unhandled/unexpected SQL error.
    #[error("an unexpected SQL error occurred: {0}")]
    SqlError(rusqlite::Error),

    /// An error occurred while getting the local timezone from a canonical timezone string.
    #[error("invalid timezone {0}")]
    InvalidTimezoneError(String),

    /// An error occurred while serializing a struct as JSON
    #[error("could not serialize as JSON: {0}")]
    JSONSerializationError(String),

    /// Could not acquire the database lock
    #[error("could not acquire the database lock")]
    DatabaseLockError,
}

impl From<rusqlite::Error> for Error {
    fn from(value: rusqlite::Error) -> Self {
        match value {
            rusqlite::Error::SqliteFailure(sql_error, _)
                if sql_error.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_FOREIGNKEY =>
            {
                Error::ForeignKeyConstraint
            }
            rusqlite::Error::SqliteFailure(sql_error, Some(ref desc))
                if sql_error.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                    && desc.ends_with("user.email") =>
            {
                Error::DuplicateEmail
            }
            rusqlite::Error::SqliteFailure(sql_error, Some(ref desc))
                if sql_error.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                    && desc.ends_with("transaction.import_id") =>
            {
                Error::DuplicateImportId
            }
            rusqlite::Error::QueryReturnedNoRows => Error::NotFound,
            error => {
                tracing::error!("an unhandled SQL error occurred: {}", error);
                Error::SqlError(error)
            }
        }
    }
}

impl From<JsonRejection> for Error {
    fn from(rejection: JsonRejection) -> Self {
        Error::InvalidBody(rejection.body_text())
    }
}

impl From<QueryRejection> for Error {
    fn from(rejection: QueryRejection) -> Self {
        Error::InvalidQuery(rejection.body_text())
    }
}

impl From<PathRejection> for Error {
    fn from(rejection: PathRejection) -> Self {
        tracing::debug!("rejected path parameters: {}", rejection.body_text());
        Error::NotFound
    }
}

impl Error {
    /// The HTTP status code the error is reported with.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::EmptyName
            | Error::InvalidEmail(_)
            | Error::TooWeak(_)
            | Error::InvalidAmount(_)
            | Error::FutureDate(_)
            | Error::InvalidAccount(_)
            | Error::InvalidCategory(_)
            | Error::InvalidTransactionType(_)
            | Error::InvalidMonth(_)
            | Error::InvalidDateRange(_, _)
            | Error::InvalidRole(_)
            | Error::InvalidQuery(_)
            | Error::InvalidBody(_)
            | Error::MultipartError(_)
            | Error::NotCSV
            | Error::InvalidCSV(_)
            | Error::InvalidWebhookPayload(_) => StatusCode::BAD_REQUEST,
            Error::InvalidCredentials | Error::Unauthenticated | Error::InvalidSecret => {
                StatusCode::UNAUTHORIZED
            }
            Error::Forbidden(_) | Error::InvitationEmailMismatch => StatusCode::FORBIDDEN,
            Error::NotFound => StatusCode::NOT_FOUND,
            Error::DuplicateEmail
            | Error::DuplicateName(_)
            | Error::DuplicateImportId
            | Error::ForeignKeyConstraint
            | Error::AlreadyMember
            | Error::DuplicateInvitation(_)
            | Error::LastOwner
            | Error::InvitationNotPending(_) => StatusCode::CONFLICT,
            Error::InvitationExpired => StatusCode::GONE,
            Error::EmailError(_) => StatusCode::BAD_GATEWAY,
            Error::HashingError(_)
            | Error::SqlError(_)
            | Error::InvalidTimezoneError(_)
            | Error::JSONSerializationError(_)
            | Error::DatabaseLockError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status_code();

        let message = if status.is_server_error() {
            // Internal details are not intended to be shown to the client.
            tracing::error!("An unexpected error occurred: {}", self);

            match self {
                Error::EmailError(_) => "The email provider could not be reached, try again later.",
                _ => "An unexpected error occurred, check the server logs for more details.",
            }
            .to_owned()
        } else {
            self.to_string()
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}
