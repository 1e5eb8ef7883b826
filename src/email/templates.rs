//! HTML and plain text bodies for the emails the service sends.

use maud::{DOCTYPE, Markup, html};
use time::Date;

use crate::{
    email::{EmailMessage, format::format_currency},
    household::MemberRole,
    weekly_summary::HouseholdSummary,
};

const BODY_STYLE: &str = "font-family: sans-serif; color: #111827; max-width: 560px; margin: 0 auto;";
const BUTTON_STYLE: &str = "display: inline-block; padding: 10px 16px; background: #2563eb; \
    color: #ffffff; text-decoration: none; border-radius: 4px;";
const CELL_STYLE: &str = "padding: 4px 8px; border-bottom: 1px solid #e5e7eb;";

fn layout(title: &str, content: Markup) -> Markup {
    html! {
        (DOCTYPE)
        html lang="en" {
            head {
                meta charset="utf-8";
                title { (title) }
            }
            body style=(BODY_STYLE) {
                h1 style="font-size: 20px;" { (title) }
                (content)
                p style="font-size: 12px; color: #6b7280;" {
                    "You are receiving this email because you use Household Ledger."
                }
            }
        }
    }
}

/// An invitation to join a household.
pub struct InvitationEmail<'a> {
    /// The name of the household the recipient is invited to.
    pub household_name: &'a str,
    /// The name of the member who sent the invitation.
    pub inviter_name: &'a str,
    /// The role the recipient will have after accepting.
    pub role: MemberRole,
    /// The link the recipient follows to accept.
    pub accept_url: &'a str,
    /// The last day the invitation can be accepted.
    pub expires_on: Date,
}

impl InvitationEmail<'_> {
    /// Render the email for the recipient `to`.
    pub fn to_message(&self, to: &str) -> EmailMessage {
        let subject = format!("{} invited you to {}", self.inviter_name, self.household_name);

        let content = html! {
            p {
                (self.inviter_name) " invited you to join the household "
                strong { (self.household_name) }
                " as a " (self.role.label()) "."
            }
            p {
                a id="accept-link" href=(self.accept_url) style=(BUTTON_STYLE) { "Accept invitation" }
            }
            p { "This invitation expires on " (self.expires_on) "." }
        };

        let text = format!(
            "{} invited you to join the household {} as a {}.\n\n\
            Accept the invitation: {}\n\n\
            This invitation expires on {}.",
            self.inviter_name,
            self.household_name,
            self.role.label(),
            self.accept_url,
            self.expires_on
        );

        EmailMessage {
            to: to.to_owned(),
            html: layout(&subject, content).into_string(),
            subject,
            text,
        }
    }
}

/// The weekly summary of a household's spending for one member.
pub struct WeeklySummaryEmail<'a> {
    /// The member's display name.
    pub recipient_name: &'a str,
    /// The figures for the household.
    pub summary: &'a HouseholdSummary,
    /// The base URL of the web app.
    pub app_url: &'a str,
}

impl WeeklySummaryEmail<'_> {
    /// Render the email for the recipient `to`.
    pub fn to_message(&self, to: &str) -> EmailMessage {
        let summary = self.summary;
        let subject = format!("Your weekly summary for {}", summary.household_name);

        let content = html! {
            p { "Hi " (self.recipient_name) ", here is how " (summary.household_name)
                " did from " (summary.start) " to " (summary.end) "." }

            table id="totals" style="border-collapse: collapse;" {
                tr { td style=(CELL_STYLE) { "Income" } td style=(CELL_STYLE) { (format_currency(summary.income)) } }
                tr { td style=(CELL_STYLE) { "Expenses" } td style=(CELL_STYLE) { (format_currency(summary.expenses)) } }
                tr { td style=(CELL_STYLE) { "Net" } td style=(CELL_STYLE) { (format_currency(summary.net)) } }
                tr { td style=(CELL_STYLE) { "Transactions" } td style=(CELL_STYLE) { (summary.transaction_count) } }
            }

            @if !summary.top_categories.is_empty() {
                h2 style="font-size: 16px;" { "Top spending" }
                ol id="top-categories" {
                    @for category in &summary.top_categories {
                        li { (category.name) ": " (format_currency(category.total)) }
                    }
                }
            }

            @if !summary.over_budget.is_empty() {
                h2 style="font-size: 16px;" { "Over budget this month" }
                ul id="over-budget" {
                    @for category in &summary.over_budget {
                        li {
                            (category.name) ": " (format_currency(category.spent))
                            " of " (format_currency(category.budget))
                        }
                    }
                }
            }

            p { a href=(self.app_url) style=(BUTTON_STYLE) { "Open Household Ledger" } }
        };

        let mut text = format!(
            "Hi {}, here is how {} did from {} to {}.\n\n\
            Income: {}\nExpenses: {}\nNet: {}\nTransactions: {}\n",
            self.recipient_name,
            summary.household_name,
            summary.start,
            summary.end,
            format_currency(summary.income),
            format_currency(summary.expenses),
            format_currency(summary.net),
            summary.transaction_count
        );

        if !summary.top_categories.is_empty() {
            text.push_str("\nTop spending:\n");
            for category in &summary.top_categories {
                text.push_str(&format!(
                    "- {}: {}\n",
                    category.name,
                    format_currency(category.total)
                ));
            }
        }

        if !summary.over_budget.is_empty() {
            text.push_str("\nOver budget this month:\n");
            for category in &summary.over_budget {
                text.push_str(&format!(
                    "- {}: {} of {}\n",
                    category.name,
                    format_currency(category.spent),
                    format_currency(category.budget)
                ));
            }
        }

        EmailMessage {
            to: to.to_owned(),
            html: layout(&subject, content).into_string(),
            subject,
            text,
        }
    }
}
