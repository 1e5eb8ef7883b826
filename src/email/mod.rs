//! Outbound email: the mailer abstraction, its implementations and the
//! email templates.

mod format;
mod mailer;
mod templates;

pub use mailer::{EmailMessage, HttpMailer, LogMailer, Mailer};
pub use templates::{InvitationEmail, WeeklySummaryEmail};
