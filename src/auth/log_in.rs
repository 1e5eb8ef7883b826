//! This file defines the route for handling log-in requests.
//! The cookie and token modules handle the lower level session logic.

use std::sync::{Arc, Mutex};

use axum::{
    extract::{FromRef, State},
    response::{IntoResponse, Response},
};
use axum_extra::extract::{PrivateCookieJar, cookie::Key};
use rusqlite::Connection;
use serde::Deserialize;
use time::Duration;

use crate::{
    AppState, Error,
    auth::{REMEMBER_ME_COOKIE_DURATION, User, get_user_by_email, set_auth_cookie},
    db::lock_connection,
    extract::Json,
};

/// The state needed to log in or register a user.
#[derive(Debug, Clone)]
pub struct LoginState {
    /// The key to be used for signing and encrypting private cookies.
    pub cookie_key: Key,
    /// The duration for which cookies used for authentication are valid.
    pub cookie_duration: Duration,
    /// The database connection for looking up users.
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for LoginState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            cookie_key: state.cookie_key.clone(),
            cookie_duration: state.cookie_duration,
            db_connection: state.db_connection.clone(),
        }
    }
}

// this impl tells `PrivateCookieJar` how to access the key from our state
impl FromRef<LoginState> for Key {
    fn from_ref(state: &LoginState) -> Self {
        state.cookie_key.clone()
    }
}

/// The credentials sent by the client to log in.
///
/// The password is a plain string. There is no need for validation here since
/// it will be compared against the password hash in the database.
#[derive(Clone, Deserialize)]
pub struct LogInData {
    /// The email address the user registered with.
    pub email: String,
    /// Password entered during log-in.
    pub password: String,
    /// Whether to extend the initial auth cookie duration to one week.
    #[serde(default)]
    pub remember_me: bool,
}

/// Handler for log-in requests via the POST method.
///
/// On success the auth cookie is set and the user is returned as JSON.
///
/// # Errors
///
/// Returns [Error::InvalidCredentials] if the email is unknown, the user has
/// not set a password, or the password does not match.
pub async fn log_in(
    State(state): State<LoginState>,
    jar: PrivateCookieJar,
    Json(log_in_data): Json<LogInData>,
) -> Result<Response, Error> {
    let user = {
        let connection = lock_connection(&state.db_connection)?;

        match get_user_by_email(&log_in_data.email, &connection) {
            Ok(user) => user,
            Err(Error::NotFound) => return Err(Error::InvalidCredentials),
            Err(error) => return Err(error),
        }
    };

    verify_password(&user, &log_in_data.password)?;

    let cookie_duration = if log_in_data.remember_me {
        REMEMBER_ME_COOKIE_DURATION
    } else {
        state.cookie_duration
    };

    let jar = set_auth_cookie(jar, user.id, cookie_duration)?;

    tracing::info!("User {} logged in", user.id);

    Ok((jar, Json(user)).into_response())
}

fn verify_password(user: &User, raw_password: &str) -> Result<(), Error> {
    let Some(password_hash) = &user.password_hash else {
        return Err(Error::InvalidCredentials);
    };

    match password_hash.verify(raw_password) {
        Ok(true) => Ok(()),
        Ok(false) => Err(Error::InvalidCredentials),
        Err(error) => Err(Error::HashingError(error.to_string())),
    }
}

#[cfg(test)]
mod log_in_tests {
    use axum::http::StatusCode;
    use serde_json::{Value, json};
    use time::{Duration, OffsetDateTime};

    use crate::{
        auth::{COOKIE_TOKEN, REMEMBER_ME_COOKIE_DURATION},
        endpoints,
        test_utils::{TEST_PASSWORD, TestApp},
    };

    #[tokio::test]
    async fn log_in_succeeds_with_valid_credentials() {
        let app = TestApp::new();
        app.insert_user("molly@burrow.com", "Molly");

        let response = app
            .server
            .post(endpoints::LOG_IN)
            .json(&json!({ "email": "Molly@Burrow.com", "password": TEST_PASSWORD }))
            .await;

        response.assert_status_ok();
        let body: Value = response.json();
        assert_eq!(body["email"], "molly@burrow.com");
        assert!(body.get("password_hash").is_none());

        let token_cookie = response.cookie(COOKIE_TOKEN);
        let expires_at = token_cookie.expires_datetime().unwrap();
        assert!(expires_at < OffsetDateTime::now_utc() + Duration::minutes(6));
    }

    #[tokio::test]
    async fn remember_me_extends_cookie() {
        let app = TestApp::new();
        app.insert_user("molly@burrow.com", "Molly");

        let response = app
            .server
            .post(endpoints::LOG_IN)
            .json(&json!({
                "email": "molly@burrow.com",
                "password": TEST_PASSWORD,
                "remember_me": true,
            }))
            .await;

        response.assert_status_ok();
        let expires_at = response.cookie(COOKIE_TOKEN).expires_datetime().unwrap();
        let want = OffsetDateTime::now_utc() + REMEMBER_ME_COOKIE_DURATION;
        assert!((expires_at - want).abs() < Duration::seconds(5));
    }

    #[tokio::test]
    async fn log_in_fails_with_wrong_password() {
        let app = TestApp::new();
        app.insert_user("molly@burrow.com", "Molly");

        let response = app
            .server
            .post(endpoints::LOG_IN)
            .json(&json!({ "email": "molly@burrow.com", "password": "wrong password" }))
            .await;

        response.assert_status(StatusCode::UNAUTHORIZED);
        assert_eq!(response.json::<Value>()["error"], "incorrect email or password");
    }

    #[tokio::test]
    async fn log_in_fails_with_unknown_email() {
        let app = TestApp::new();

        let response = app
            .server
            .post(endpoints::LOG_IN)
            .json(&json!({ "email": "nobody@burrow.com", "password": TEST_PASSWORD }))
            .await;

        response.assert_status(StatusCode::UNAUTHORIZED);
    }
}
