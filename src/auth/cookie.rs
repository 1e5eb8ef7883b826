//! Defines functions for handling user authentication with cookies.

use std::cmp::max;

use axum_extra::extract::{
    PrivateCookieJar,
    cookie::{Cookie, SameSite},
};
use time::{Duration, OffsetDateTime};

use crate::{Error, auth::UserID, auth::token::Token};

/// The name of the cookie holding the session token.
pub const COOKIE_TOKEN: &str = "token";
/// The default duration for which auth cookies are valid.
pub const DEFAULT_COOKIE_DURATION: Duration = Duration::minutes(5);
/// How long the auth cookie lasts if the user asks to be remembered at log-in.
pub const REMEMBER_ME_COOKIE_DURATION: Duration = Duration::days(7);

fn build_token_cookie(token: &Token) -> Result<Cookie<'static>, Error> {
    let token_string = serde_json::to_string(token)
        .map_err(|error| Error::JSONSerializationError(error.to_string()))?;

    Ok(Cookie::build((COOKIE_TOKEN, token_string))
        .expires(token.expires_at)
        .path("/")
        .http_only(true)
        .same_site(SameSite::Strict)
        .secure(true)
        .build())
}

/// Add an auth cookie to the cookie jar, indicating that a user is logged in and authenticated.
///
/// Sets the initial expiry of the cookie to `duration` from the current time.
///
/// # Errors
///
/// Returns [Error::JSONSerializationError] if the token cannot be serialized.
pub fn set_auth_cookie(
    jar: PrivateCookieJar,
    user_id: UserID,
    duration: Duration,
) -> Result<PrivateCookieJar, Error> {
    let cookie = build_token_cookie(&Token::new(user_id, duration))?;

    Ok(jar.add(cookie))
}

/// Set the auth cookie to an invalid value and set its max age to zero, which should delete the cookie on the client side.
pub fn invalidate_auth_cookie(jar: PrivateCookieJar) -> PrivateCookieJar {
    jar.add(
        Cookie::build((COOKIE_TOKEN, "deleted"))
            .expires(OffsetDateTime::UNIX_EPOCH)
            .max_age(Duration::ZERO)
            .path("/")
            .http_only(true)
            .same_site(SameSite::Strict)
            .secure(true),
    )
}

/// Get the session token from the auth cookie.
///
/// # Errors
///
/// Returns [Error::Unauthenticated] if the cookie is missing, cannot be
/// parsed or has expired.
pub(crate) fn get_token_from_cookies(jar: &PrivateCookieJar) -> Result<Token, Error> {
    let cookie = jar.get(COOKIE_TOKEN).ok_or(Error::Unauthenticated)?;
    let token: Token =
        serde_json::from_str(cookie.value_trimmed()).map_err(|_| Error::Unauthenticated)?;

    if token.is_expired_at(OffsetDateTime::now_utc()) {
        return Err(Error::Unauthenticated);
    }

    Ok(token)
}

/// Set the expiry of the auth cookie in `jar` to the latest of UTC now
/// plus `duration` and the token's current expiry.
///
/// # Errors
///
/// The cookie jar is not modified if an error is returned.
///
/// Returns [Error::Unauthenticated] if there is no valid token in the jar,
/// or [Error::JSONSerializationError] if the new token cannot be serialized.
pub(crate) fn extend_auth_cookie_duration_if_needed(
    jar: PrivateCookieJar,
    duration: Duration,
) -> Result<PrivateCookieJar, Error> {
    let token = get_token_from_cookies(&jar)?;

    let new_expiry = OffsetDateTime::now_utc()
        .checked_add(duration)
        .unwrap_or(token.expires_at);

    let cookie = build_token_cookie(&Token {
        user_id: token.user_id,
        expires_at: max(token.expires_at, new_expiry),
    })?;

    Ok(jar.add(cookie))
}
