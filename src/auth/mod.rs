//! User accounts, passwords, sessions and the auth-provider webhook.

mod cookie;
mod log_in;
mod log_out;
mod me;
mod middleware;
mod password;
mod register;
mod secret;
mod token;
mod user;
mod webhook;

pub use cookie::{
    DEFAULT_COOKIE_DURATION, REMEMBER_ME_COOKIE_DURATION, invalidate_auth_cookie,
    set_auth_cookie,
};
pub use log_in::log_in;
pub use log_out::log_out;
pub use me::{get_current_user, update_current_user};
pub use middleware::auth_guard;
pub use password::{PasswordHash, ValidatedPassword};
pub use register::register_user;
pub use secret::{bearer_token, verify_secret};
pub use user::{
    NewUser, User, UserID, create_user, create_user_table, delete_user, get_user_by_email,
    get_user_by_id, normalize_email, update_password,
};
pub use webhook::sync_user_webhook;

#[cfg(test)]
pub use cookie::COOKIE_TOKEN;
