#![allow(missing_docs)]

use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use axum_test::TestServer;
use cookie::CookieJar;
use rusqlite::Connection;
use serde_json::json;

use crate::{
    AppState, Error, PaginationConfig, build_router,
    auth::{NewUser, PasswordHash, UserID, ValidatedPassword, create_user},
    config::ServiceConfig,
    db::initialize,
    email::{EmailMessage, Mailer},
    endpoints,
    household::{HouseholdId, create_household},
};

pub const TEST_PASSWORD: &str = "averysafeandsecurepassword";
pub const TEST_COOKIE_SECRET: &str = "foobar";
pub const TEST_CRON_SECRET: &str = "cron-secret";
pub const TEST_WEBHOOK_SECRET: &str = "webhook-secret";
pub const TEST_APP_URL: &str = "https://ledger.test";
pub const TEST_TIMEZONE: &str = "Etc/UTC";

/// The lowest cost bcrypt accepts, to keep the tests fast.
const TEST_HASH_COST: u32 = 4;

pub fn get_test_connection() -> Connection {
    let connection = Connection::open_in_memory().unwrap();
    initialize(&connection).unwrap();
    connection
}

#[track_caller]
pub fn insert_test_user(email: &str, connection: &Connection) -> UserID {
    let name = email.split('@').next().unwrap_or(email);
    insert_named_test_user(email, name, connection)
}

#[track_caller]
fn insert_named_test_user(email: &str, name: &str, connection: &Connection) -> UserID {
    let password_hash = PasswordHash::new(
        ValidatedPassword::new_unchecked(TEST_PASSWORD),
        TEST_HASH_COST,
    )
    .expect("could not hash test password");

    create_user(
        NewUser {
            email: email.to_owned(),
            name: name.to_owned(),
            password_hash: Some(password_hash),
            external_id: None,
        },
        connection,
    )
    .expect("could not create test user")
    .id
}

/// A mailer that keeps every message instead of sending it.
#[derive(Debug, Default)]
pub struct RecordingMailer {
    messages: Mutex<Vec<EmailMessage>>,
}

impl RecordingMailer {
    pub fn messages(&self) -> Vec<EmailMessage> {
        self.messages.lock().unwrap().clone()
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, message: &EmailMessage) -> Result<(), Error> {
        self.messages.lock().unwrap().push(message.clone());
        Ok(())
    }
}

/// A mailer whose provider is always down.
#[derive(Debug)]
pub struct FailingMailer;

#[async_trait]
impl Mailer for FailingMailer {
    async fn send(&self, _message: &EmailMessage) -> Result<(), Error> {
        Err(Error::EmailError("the provider is down".to_owned()))
    }
}

/// The full router over an in-memory database.
pub struct TestApp {
    pub server: TestServer,
    pub state: AppState,
    /// Records the emails sent, unless the app was built [TestApp::with_mailer].
    pub mailer: Arc<RecordingMailer>,
}

impl TestApp {
    pub fn new() -> Self {
        let mailer = Arc::new(RecordingMailer::default());
        Self::build(mailer.clone(), mailer)
    }

    pub fn with_mailer(mailer: Arc<dyn Mailer>) -> Self {
        Self::build(mailer, Arc::new(RecordingMailer::default()))
    }

    fn build(mailer: Arc<dyn Mailer>, recording_mailer: Arc<RecordingMailer>) -> Self {
        let config = ServiceConfig {
            cookie_secret: TEST_COOKIE_SECRET.to_owned(),
            cron_secret: TEST_CRON_SECRET.to_owned(),
            webhook_secret: TEST_WEBHOOK_SECRET.to_owned(),
            email: None,
        };
        let state = AppState::new(
            Connection::open_in_memory().unwrap(),
            &config,
            mailer,
            TEST_TIMEZONE,
            TEST_APP_URL,
            PaginationConfig::default(),
        )
        .expect("could not create app state");
        let server = TestServer::new(build_router(state.clone()));

        Self {
            server,
            state,
            mailer: recording_mailer,
        }
    }

    pub fn connection(&self) -> MutexGuard<'_, Connection> {
        self.state.db_connection.lock().unwrap()
    }

    #[track_caller]
    pub fn insert_user(&self, email: &str, name: &str) -> UserID {
        insert_named_test_user(email, name, &self.connection())
    }

    /// Insert a user and log them in, returning the session cookies.
    pub async fn log_in_new_user(&self, email: &str, name: &str) -> (UserID, CookieJar) {
        let user_id = self.insert_user(email, name);

        let response = self
            .server
            .post(endpoints::LOG_IN)
            .json(&json!({ "email": email, "password": TEST_PASSWORD }))
            .await;
        response.assert_status_ok();

        (user_id, response.cookies())
    }

    #[track_caller]
    pub fn insert_household(&self, name: &str, owner: UserID) -> HouseholdId {
        create_household(name, owner, &self.connection())
            .expect("could not create test household")
            .id
    }
}
