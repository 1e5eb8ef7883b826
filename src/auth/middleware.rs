//! Authentication middleware that validates the session cookie and extends sessions.

use axum::{
    extract::{FromRef, FromRequestParts, Request, State},
    http::header::SET_COOKIE,
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum_extra::extract::{PrivateCookieJar, cookie::Key};
use time::Duration;

use crate::{
    AppState, Error,
    auth::cookie::{extend_auth_cookie_duration_if_needed, get_token_from_cookies},
};

/// The state needed for the auth middleware
#[derive(Clone)]
pub struct AuthState {
    /// The key to be used for signing and encrypting private cookies.
    pub cookie_key: Key,
    /// The duration for which cookies used for authentication are valid.
    pub cookie_duration: Duration,
}

impl FromRef<AppState> for AuthState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            cookie_key: state.cookie_key.clone(),
            cookie_duration: state.cookie_duration,
        }
    }
}

// this impl tells `PrivateCookieJar` how to access the key from our state
impl FromRef<AuthState> for Key {
    fn from_ref(state: &AuthState) -> Self {
        state.cookie_key.clone()
    }
}

/// Middleware function that checks for a valid authorization cookie.
///
/// The user ID is placed into the request and the request is executed
/// normally if the cookie is valid, otherwise a 401 JSON error is returned.
/// The session is extended by the configured cookie duration on every
/// authenticated request.
///
/// **Note**: Route handlers can use the function argument `Extension(user_id): Extension<UserID>` to receive the user ID.
pub async fn auth_guard(State(state): State<AuthState>, request: Request, next: Next) -> Response {
    let (mut parts, body) = request.into_parts();
    let jar = match PrivateCookieJar::from_request_parts(&mut parts, &state).await {
        Ok(jar) => jar,
        Err(err) => {
            tracing::error!("Error getting cookie jar: {err:?}");
            return Error::Unauthenticated.into_response();
        }
    };
    let user_id = match get_token_from_cookies(&jar) {
        Ok(token) => token.user_id,
        Err(error) => return error.into_response(),
    };

    parts.extensions.insert(user_id);
    let request = Request::from_parts(parts, body);
    let response = next.run(request).await;

    let (mut parts, body) = response.into_parts();

    // Handlers such as log out replace the cookie themselves.
    if parts.headers.contains_key(SET_COOKIE) {
        return Response::from_parts(parts, body);
    }

    let jar = match extend_auth_cookie_duration_if_needed(jar.clone(), state.cookie_duration) {
        Ok(updated_jar) => updated_jar,
        Err(err) => {
            tracing::error!("Error extending cookie duration: {err:?}. Rolling back cookie jar.");
            jar
        }
    };
    for (key, val) in jar.into_response().headers().iter() {
        if key != SET_COOKIE {
            continue;
        }

        parts.headers.append(key, val.to_owned());
    }

    Response::from_parts(parts, body)
}

#[cfg(test)]
mod auth_guard_tests {
    use axum::{
        Extension, Json, Router,
        extract::State,
        http::StatusCode,
        middleware,
        routing::{get, post},
    };
    use axum_extra::extract::{
        PrivateCookieJar,
        cookie::{Cookie, Key, SameSite},
    };
    use axum_test::TestServer;
    use serde_json::{Value, json};
    use sha2::Digest;
    use time::{Duration, OffsetDateTime};

    use crate::{
        Error,
        auth::{
            COOKIE_TOKEN, DEFAULT_COOKIE_DURATION, UserID, auth_guard, middleware::AuthState,
            set_auth_cookie,
        },
    };

    async fn test_handler(Extension(user_id): Extension<UserID>) -> Json<Value> {
        Json(json!({ "user_id": user_id }))
    }

    async fn stub_log_in_route(
        State(state): State<AuthState>,
        jar: PrivateCookieJar,
    ) -> Result<PrivateCookieJar, Error> {
        set_auth_cookie(jar, UserID::new(1), state.cookie_duration)
    }

    const TEST_LOG_IN_ROUTE: &str = "/log_in";
    const TEST_PROTECTED_ROUTE: &str = "/protected";

    fn get_test_server(cookie_duration: Duration) -> TestServer {
        let hash = sha2::Sha512::digest("nafstenoas");
        let state = AuthState {
            cookie_key: Key::from(&hash),
            cookie_duration,
        };

        let app = Router::new()
            .route(TEST_PROTECTED_ROUTE, get(test_handler))
            .route_layer(middleware::from_fn_with_state(state.clone(), auth_guard))
            .route(TEST_LOG_IN_ROUTE, post(stub_log_in_route))
            .with_state(state);

        TestServer::new(app)
    }

    #[track_caller]
    fn assert_date_time_close(left: OffsetDateTime, right: OffsetDateTime) {
        assert!(
            (left - right).abs() < Duration::seconds(1),
            "got date time {:?}, want {:?}",
            left,
            right
        );
    }

    #[tokio::test]
    async fn protected_route_receives_user_id() {
        let server = get_test_server(DEFAULT_COOKIE_DURATION);
        let token_cookie = server.post(TEST_LOG_IN_ROUTE).await.cookie(COOKIE_TOKEN);

        let response = server
            .get(TEST_PROTECTED_ROUTE)
            .add_cookie(token_cookie)
            .await;

        response.assert_status_ok();
        assert_eq!(response.json::<Value>()["user_id"], 1);
    }

    #[tokio::test]
    async fn auth_guard_extends_valid_cookie_duration() {
        let server = get_test_server(Duration::minutes(5));
        let response = server.post(TEST_LOG_IN_ROUTE).await;
        let jar = response.cookies();

        let response = server.get(TEST_PROTECTED_ROUTE).add_cookies(jar).await;

        let auth_cookie = response.cookie(COOKIE_TOKEN);
        assert_date_time_close(
            auth_cookie.expires_datetime().unwrap(),
            OffsetDateTime::now_utc() + Duration::minutes(5),
        );
        assert_eq!(auth_cookie.secure(), Some(true));
        assert_eq!(auth_cookie.http_only(), Some(true));
        assert_eq!(auth_cookie.same_site(), Some(SameSite::Strict));
    }

    #[tokio::test]
    async fn missing_cookie_returns_unauthorized_json() {
        let server = get_test_server(DEFAULT_COOKIE_DURATION);

        let response = server.get(TEST_PROTECTED_ROUTE).await;

        response.assert_status(StatusCode::UNAUTHORIZED);
        assert_eq!(
            response.json::<Value>()["error"],
            Error::Unauthenticated.to_string()
        );
    }

    #[tokio::test]
    async fn invalid_cookie_returns_unauthorized() {
        let server = get_test_server(DEFAULT_COOKIE_DURATION);

        let response = server
            .get(TEST_PROTECTED_ROUTE)
            .add_cookie(Cookie::build((COOKIE_TOKEN, "FOOBAR")).build())
            .await;

        response.assert_status(StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn expired_token_returns_unauthorized() {
        let server = get_test_server(Duration::seconds(-10));
        let token_cookie = server.post(TEST_LOG_IN_ROUTE).await.cookie(COOKIE_TOKEN);

        let response = server
            .get(TEST_PROTECTED_ROUTE)
            .add_cookie(token_cookie)
            .await;

        response.assert_status(StatusCode::UNAUTHORIZED);
    }
}
