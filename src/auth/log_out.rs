//! Log-out route handler that invalidates the authentication cookie.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use axum_extra::extract::PrivateCookieJar;

use crate::auth::invalidate_auth_cookie;

/// Invalidate the auth cookie and respond with 204 No Content.
pub async fn log_out(jar: PrivateCookieJar) -> Response {
    let jar = invalidate_auth_cookie(jar);

    (StatusCode::NO_CONTENT, jar).into_response()
}
