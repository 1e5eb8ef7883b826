//! Extractors that reject malformed requests with the crate's JSON [Error].

use axum::{
    extract::{FromRequest, FromRequestParts},
    response::{IntoResponse, Response},
};
use serde::Serialize;

use crate::Error;

/// A JSON request body or response.
///
/// Rejected bodies become [Error::InvalidBody].
#[derive(Debug, Clone, Copy, Default, FromRequest)]
#[from_request(via(axum::Json), rejection(Error))]
pub struct Json<T>(pub T);

impl<T: Serialize> IntoResponse for Json<T> {
    fn into_response(self) -> Response {
        axum::Json(self.0).into_response()
    }
}

/// Query parameters. Rejected query strings become [Error::InvalidQuery].
#[derive(Debug, Clone, Copy, Default, FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(Error))]
pub struct Query<T>(pub T);

/// Path parameters. IDs that do not parse become [Error::NotFound].
#[derive(Debug, Clone, Copy, FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(Error))]
pub struct Path<T>(pub T);

#[cfg(test)]
mod tests {
    use axum::{Router, routing::get, routing::post};
    use axum_test::TestServer;
    use serde::Deserialize;
    use serde_json::json;

    use super::{Json, Path, Query};

    #[derive(Debug, Deserialize, serde::Serialize)]
    struct Body {
        amount: f64,
    }

    #[derive(Debug, Deserialize)]
    struct Params {
        page: u64,
    }

    fn server() -> TestServer {
        let app = Router::new()
            .route("/body", post(|Json(body): Json<Body>| async move { Json(body) }))
            .route(
                "/query",
                get(|Query(params): Query<Params>| async move { params.page.to_string() }),
            )
            .route(
                "/items/{id}",
                get(|Path(id): Path<i64>| async move { id.to_string() }),
            );

        TestServer::new(app)
    }

    #[tokio::test]
    async fn valid_body_round_trips() {
        let response = server().post("/body").json(&json!({ "amount": 1.5 })).await;

        response.assert_status_ok();
        response.assert_json(&json!({ "amount": 1.5 }));
    }

    #[tokio::test]
    async fn malformed_body_is_json_error() {
        let response = server()
            .post("/body")
            .json(&json!({ "amount": "lots" }))
            .await;

        response.assert_status_bad_request();
        let body = response.json::<serde_json::Value>();
        let message = body["error"].as_str().unwrap();
        assert!(
            message.starts_with("invalid request body"),
            "got {message}"
        );
    }

    #[tokio::test]
    async fn missing_content_type_is_json_error() {
        let response = server().post("/body").text("amount=1").await;

        response.assert_status_bad_request();
        assert!(response.json::<serde_json::Value>()["error"].is_string());
    }

    #[tokio::test]
    async fn bad_query_is_invalid_query() {
        let response = server().get("/query?page=first").await;

        response.assert_status_bad_request();
        let body = response.json::<serde_json::Value>();
        let message = body["error"].as_str().unwrap();
        assert!(
            message.starts_with("invalid query parameter"),
            "got {message}"
        );
    }

    #[tokio::test]
    async fn unparseable_id_is_not_found() {
        let response = server().get("/items/abc").await;

        response.assert_status_not_found();
        response.assert_json(&json!({ "error": "the requested resource could not be found" }));
    }
}
