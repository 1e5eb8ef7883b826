//! Middleware for logging requests and responses.

use axum::{
    body::{Body, Bytes},
    extract::Request,
    http::{Method, StatusCode, header::CONTENT_TYPE},
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde_json::Value;

/// The number of bytes of a body logged at the `info` level.
pub const LOG_BODY_LENGTH_LIMIT: usize = 64;

/// The fields whose values are never logged.
const REDACTED_FIELDS: [&str; 2] = ["password", "confirm_password"];

const REDACTED: &str = "********";

/// Log the request and response for each request.
///
/// Both the request and response are logged at the `info` level.
/// If a body is longer than [LOG_BODY_LENGTH_LIMIT] bytes, it is
/// truncated and the full body is logged at the `debug` level.
/// Password fields in JSON and form bodies are redacted. Multipart bodies
/// are not logged.
pub async fn logging_middleware(request: Request, next: Next) -> Response {
    let (parts, body) = request.into_parts();
    let Some(body_bytes) = read_body(body).await else {
        return StatusCode::BAD_REQUEST.into_response();
    };

    let content_type = parts
        .headers
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();

    let display_text = if content_type.starts_with("multipart/form-data") {
        format!("<{} bytes of multipart data>", body_bytes.len())
    } else {
        let body_text = String::from_utf8_lossy(&body_bytes);
        if parts.method == Method::GET {
            body_text.into_owned()
        } else {
            redact_body(&body_text, content_type)
        }
    };

    log_request(&parts, &display_text);

    let request = Request::from_parts(parts, Body::from(body_bytes));
    let response = next.run(request).await;

    let (parts, body) = response.into_parts();
    let Some(body_bytes) = read_body(body).await else {
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    };
    log_response(&parts, &String::from_utf8_lossy(&body_bytes));

    Response::from_parts(parts, Body::from(body_bytes))
}

async fn read_body(body: Body) -> Option<Bytes> {
    axum::body::to_bytes(body, usize::MAX)
        .await
        .inspect_err(|error| tracing::error!("could not read body: {error}"))
        .ok()
}

fn redact_body(body_text: &str, content_type: &str) -> String {
    if content_type.starts_with("application/json") {
        redact_json(body_text)
    } else if content_type.starts_with("application/x-www-form-urlencoded") {
        REDACTED_FIELDS
            .iter()
            .fold(body_text.to_owned(), |text, field| redact_form_field(&text, field))
    } else {
        body_text.to_owned()
    }
}

fn redact_json(body_text: &str) -> String {
    let Ok(mut value) = serde_json::from_str::<Value>(body_text) else {
        return body_text.to_owned();
    };

    if let Value::Object(fields) = &mut value {
        for field in REDACTED_FIELDS {
            if let Some(field_value) = fields.get_mut(field) {
                *field_value = Value::String(REDACTED.to_owned());
            }
        }
    }

    value.to_string()
}

fn redact_form_field(form_text: &str, field_name: &str) -> String {
    form_text
        .split('&')
        .map(|pair| match pair.split_once('=') {
            Some((name, _)) if name == field_name => format!("{name}={REDACTED}"),
            _ => pair.to_owned(),
        })
        .collect::<Vec<_>>()
        .join("&")
}

/// Get at most [LOG_BODY_LENGTH_LIMIT] bytes of `body` without splitting a character.
fn truncate(body: &str) -> &str {
    if body.len() <= LOG_BODY_LENGTH_LIMIT {
        return body;
    }

    let mut end = LOG_BODY_LENGTH_LIMIT;
    while !body.is_char_boundary(end) {
        end -= 1;
    }

    &body[..end]
}

fn log_request(parts: &axum::http::request::Parts, body: &str) {
    if body.len() > LOG_BODY_LENGTH_LIMIT {
        tracing::info!(
            "Received request: {} {}\nbody: {}...",
            parts.method,
            parts.uri,
            truncate(body)
        );
        tracing::debug!("Full request body: {body:?}");
    } else {
        tracing::info!(
            "Received request: {} {}\nbody: {body:?}",
            parts.method,
            parts.uri
        );
    }
}

fn log_response(parts: &axum::http::response::Parts, body: &str) {
    if body.len() > LOG_BODY_LENGTH_LIMIT {
        tracing::info!(
            "Sending response: {}\nbody: {}...",
            parts.status,
            truncate(body)
        );
        tracing::debug!("Full response body: {body:?}");
    } else {
        tracing::info!("Sending response: {}\nbody: {body:?}", parts.status);
    }
}
