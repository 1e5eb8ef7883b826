//! The endpoint for registering a new user.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use axum_extra::extract::PrivateCookieJar;
use serde::Deserialize;

use crate::{
    Error, PasswordHash,
    auth::{
        log_in::LoginState,
        set_auth_cookie,
        user::{NewUser, create_user, get_user_by_email, normalize_email, update_password},
    },
    db::lock_connection,
    extract::Json,
};

/// The data sent by the client to register.
#[derive(Deserialize)]
pub struct RegisterForm {
    /// The email address to log in with.
    pub email: String,
    /// The user's display name.
    pub name: String,
    /// The password to log in with.
    pub password: String,
}

/// A route handler for registering a new user.
///
/// A user synced from the auth provider that has no password yet claims the
/// account by registering with the same email address.
///
/// On success the auth cookie is set and the user is returned with status 201.
///
/// # Errors
///
/// Returns an [Error::InvalidEmail], [Error::EmptyName] or [Error::TooWeak]
/// for invalid input, and [Error::DuplicateEmail] if the email is already
/// registered.
pub async fn register_user(
    State(state): State<LoginState>,
    jar: PrivateCookieJar,
    Json(form): Json<RegisterForm>,
) -> Result<Response, Error> {
    let email = normalize_email(&form.email)?;
    let name = form.name.trim();

    if name.is_empty() {
        return Err(Error::EmptyName);
    }

    let password_hash = PasswordHash::from_raw_password(
        &form.password,
        &[email.as_str(), name],
        PasswordHash::DEFAULT_COST,
    )?;

    let user = {
        let connection = lock_connection(&state.db_connection)?;

        match get_user_by_email(&email, &connection) {
            Ok(existing) if existing.password_hash.is_none() => {
                update_password(existing.id, &password_hash, &connection)?;
                tracing::info!("Synced user {} set their password", existing.id);

                get_user_by_email(&email, &connection)?
            }
            Ok(_) => return Err(Error::DuplicateEmail),
            Err(Error::NotFound) => create_user(
                NewUser {
                    email,
                    name: name.to_owned(),
                    password_hash: Some(password_hash),
                    external_id: None,
                },
                &connection,
            )?,
            Err(error) => return Err(error),
        }
    };

    let jar = set_auth_cookie(jar, user.id, state.cookie_duration)?;

    Ok((StatusCode::CREATED, jar, Json(user)).into_response())
}
