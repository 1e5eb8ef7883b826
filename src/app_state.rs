//! Implements a struct that holds the state of the REST server.

use std::sync::{Arc, Mutex};

use axum::extract::FromRef;
use axum_extra::extract::cookie::Key;
use rusqlite::Connection;
use sha2::{Digest, Sha512};
use time::Duration;

use crate::{
    Error, auth::DEFAULT_COOKIE_DURATION, config::ServiceConfig, db::initialize, email::Mailer,
    pagination::PaginationConfig,
};

/// The state of the REST server.
#[derive(Debug, Clone)]
pub struct AppState {
    /// The key to be used for signing and encrypting private cookies.
    pub cookie_key: Key,

    /// The duration for which cookies used for authentication are valid.
    pub cookie_duration: Duration,

    /// The local timezone as a canonical timezone name, e.g. "Pacific/Auckland".
    pub local_timezone: String,

    /// The base URL of the web app, used for links in emails.
    pub app_url: String,

    /// The bearer token that authorizes cron requests.
    pub cron_secret: String,

    /// The shared secret that authorizes user-sync webhook requests.
    pub webhook_secret: String,

    /// The config that controls how to display pages of data.
    pub pagination_config: PaginationConfig,

    /// Delivers invitation and summary emails.
    pub mailer: Arc<dyn Mailer>,

    /// The database connection
    pub db_connection: Arc<Mutex<Connection>>,
}

impl AppState {
    /// Create a new [AppState] with a SQLite database connection.
    ///
    /// This function will initialize the database by adding the tables for the domain models.
    /// `local_timezone` should be a valid, canonical timezone name, e.g. "Pacific/Auckland".
    ///
    /// # Errors
    /// Returns an error if the database cannot be initialized.
    pub fn new(
        db_connection: Connection,
        config: &ServiceConfig,
        mailer: Arc<dyn Mailer>,
        local_timezone: &str,
        app_url: &str,
        pagination_config: PaginationConfig,
    ) -> Result<Self, Error> {
        initialize(&db_connection)?;

        Ok(Self {
            cookie_key: create_cookie_key(&config.cookie_secret),
            cookie_duration: DEFAULT_COOKIE_DURATION,
            local_timezone: local_timezone.to_owned(),
            app_url: app_url.trim_end_matches('/').to_owned(),
            cron_secret: config.cron_secret.clone(),
            webhook_secret: config.webhook_secret.clone(),
            pagination_config,
            mailer,
            db_connection: Arc::new(Mutex::new(db_connection)),
        })
    }
}

// this impl tells `PrivateCookieJar` how to access the key from our state
impl FromRef<AppState> for Key {
    fn from_ref(state: &AppState) -> Self {
        state.cookie_key.clone()
    }
}

/// Create a signing key for cookies from a `secret`s string.
pub fn create_cookie_key(secret: &str) -> Key {
    let hash = Sha512::digest(secret);

    Key::from(&hash)
}
