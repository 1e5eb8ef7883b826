//! The webhook the auth provider calls to keep users in sync.

use std::sync::{Arc, Mutex};

use axum::{
    body::Bytes,
    extract::{FromRef, State},
    http::HeaderMap,
};
use rusqlite::Connection;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::Value;

use crate::{
    AppState, Error,
    auth::{
        User,
        secret::{WEBHOOK_SECRET_HEADER, verify_secret},
        user::{
            NewUser, create_user, delete_user, find_user_by_external_id, get_user_by_email,
            normalize_email, update_external_user,
        },
    },
    db::lock_connection,
    extract::Json,
};

/// The state needed to handle user webhooks.
#[derive(Debug, Clone)]
pub struct WebhookState {
    /// The shared secret the auth provider sends with every request.
    pub webhook_secret: String,
    /// The database connection for managing users.
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for WebhookState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            webhook_secret: state.webhook_secret.clone(),
            db_connection: state.db_connection.clone(),
        }
    }
}

/// An event sent by the auth provider.
#[derive(Debug, Deserialize)]
pub struct WebhookEvent {
    /// The event name, e.g. "user.created".
    #[serde(rename = "type")]
    pub event_type: String,
    /// The event payload, its shape depends on `event_type`.
    #[serde(default)]
    pub data: Value,
}

#[derive(Debug, Deserialize)]
struct ExternalUser {
    id: String,
    email: String,
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DeletedUser {
    id: String,
}

/// What the webhook did with an event.
#[derive(Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum WebhookOutcome {
    /// A user was created, updated or deleted.
    Processed,
    /// The event type is not handled.
    Ignored,
}

/// The webhook response body.
#[derive(Debug, Serialize)]
pub struct WebhookResponse {
    /// What happened to the event.
    pub status: WebhookOutcome,
}

/// Handle a user event from the auth provider.
///
/// `user.created` and `user.updated` upsert the user by their external ID,
/// linking an existing user with the same email. `user.deleted` deletes the
/// user. Other event types are acknowledged and ignored.
///
/// # Errors
///
/// Returns [Error::InvalidSecret] if the secret header is missing or wrong,
/// and [Error::InvalidWebhookPayload] if the body is malformed. The secret is
/// checked before the body is parsed.
pub async fn sync_user_webhook(
    State(state): State<WebhookState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WebhookResponse>, Error> {
    let provided_secret = headers
        .get(WEBHOOK_SECRET_HEADER)
        .and_then(|value| value.to_str().ok());
    verify_secret(provided_secret, &state.webhook_secret)?;

    let event: WebhookEvent = serde_json::from_slice(&body)
        .map_err(|error| Error::InvalidWebhookPayload(error.to_string()))?;

    let status = match event.event_type.as_str() {
        "user.created" | "user.updated" => {
            let external_user: ExternalUser = parse_payload(event.data)?;
            let connection = lock_connection(&state.db_connection)?;
            let user = upsert_external_user(&external_user, &connection)?;
            tracing::info!("Synced user {} from {}", user.id, event.event_type);

            WebhookOutcome::Processed
        }
        "user.deleted" => {
            let deleted_user: DeletedUser = parse_payload(event.data)?;
            let connection = lock_connection(&state.db_connection)?;

            match find_user_by_external_id(&deleted_user.id, &connection)? {
                Some(user) => {
                    delete_user(user.id, &connection)?;
                    tracing::info!("Deleted user {}", user.id);
                }
                None => tracing::debug!("Ignoring deletion of unknown user"),
            }

            WebhookOutcome::Processed
        }
        other => {
            tracing::debug!("Ignoring webhook event type {other}");
            WebhookOutcome::Ignored
        }
    };

    Ok(Json(WebhookResponse { status }))
}

fn parse_payload<T: DeserializeOwned>(data: Value) -> Result<T, Error> {
    serde_json::from_value(data).map_err(|error| Error::InvalidWebhookPayload(error.to_string()))
}

fn upsert_external_user(
    external_user: &ExternalUser,
    connection: &Connection,
) -> Result<User, Error> {
    let email = normalize_email(&external_user.email)
        .map_err(|error| Error::InvalidWebhookPayload(error.to_string()))?;

    let existing = match find_user_by_external_id(&external_user.id, connection)? {
        Some(user) => Some(user),
        None => match get_user_by_email(&email, connection) {
            Ok(user) => Some(user),
            Err(Error::NotFound) => None,
            Err(error) => return Err(error),
        },
    };

    match existing {
        Some(user) => {
            let name = external_user.name.as_deref().unwrap_or(&user.name);
            update_external_user(user.id, &external_user.id, &email, name, connection)
        }
        None => {
            let name = external_user
                .name
                .clone()
                .filter(|name| !name.trim().is_empty())
                .unwrap_or_else(|| email.split('@').next().unwrap_or_default().to_owned());

            create_user(
                NewUser {
                    email,
                    name,
                    password_hash: None,
                    external_id: Some(external_user.id.clone()),
                },
                connection,
            )
        }
    }
}
