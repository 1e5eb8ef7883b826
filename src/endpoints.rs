//! The API endpoints URIs.
//!
//! For endpoints that take parameters, e.g., '/api/households/{household_id}', use [format_endpoint].

use std::fmt::Display;

/// The route for checking that the server is up.
pub const HEALTH: &str = "/api/health";
/// The route for logging in a user.
pub const LOG_IN: &str = "/api/log_in";
/// The route for the client to log out the current user.
pub const LOG_OUT: &str = "/api/log_out";
/// The route to register users.
pub const USERS: &str = "/api/users";
/// The route to view and update the logged in user.
pub const CURRENT_USER: &str = "/api/users/me";
/// The route the auth provider calls when a user changes.
pub const USER_WEBHOOK: &str = "/api/webhooks/users";
/// The route the scheduler calls to send the weekly summary emails.
pub const WEEKLY_SUMMARY_CRON: &str = "/api/cron/weekly_summary";

/// The route to list and create households.
pub const HOUSEHOLDS: &str = "/api/households";
/// The route to access a single household.
pub const HOUSEHOLD: &str = "/api/households/{household_id}";
/// The route to list the members of a household.
pub const MEMBERS: &str = "/api/households/{household_id}/members";
/// The route to change or remove a member of a household.
pub const MEMBER: &str = "/api/households/{household_id}/members/{user_id}";
/// The route to list and create invitations to a household.
pub const INVITATIONS: &str = "/api/households/{household_id}/invitations";
/// The route to revoke an invitation.
pub const INVITATION: &str = "/api/households/{household_id}/invitations/{invitation_id}";
/// The route to preview an invitation from the link in the email.
pub const INVITATION_BY_TOKEN: &str = "/api/invitations/{token}";
/// The route to accept an invitation.
pub const ACCEPT_INVITATION: &str = "/api/invitations/{token}/accept";

/// The route to list and create accounts.
pub const ACCOUNTS: &str = "/api/households/{household_id}/accounts";
/// The route to access a single account.
pub const ACCOUNT: &str = "/api/households/{household_id}/accounts/{account_id}";
/// The route to list and create categories.
pub const CATEGORIES: &str = "/api/households/{household_id}/categories";
/// The route to access a single category.
pub const CATEGORY: &str = "/api/households/{household_id}/categories/{category_id}";
/// The route to list and create transaction types.
pub const TRANSACTION_TYPES: &str = "/api/households/{household_id}/transaction_types";
/// The route to delete a transaction type.
pub const TRANSACTION_TYPE: &str =
    "/api/households/{household_id}/transaction_types/{transaction_type_id}";
/// The route to list and create transactions.
pub const TRANSACTIONS: &str = "/api/households/{household_id}/transactions";
/// The route to access a single transaction.
pub const TRANSACTION: &str = "/api/households/{household_id}/transactions/{transaction_id}";
/// The route to find likely duplicate transactions.
pub const DUPLICATES: &str = "/api/households/{household_id}/transactions/duplicates";
/// The route to upload CSV files for importing transactions.
pub const IMPORT: &str = "/api/households/{household_id}/transactions/import";
/// The route for the monthly budget report.
pub const BUDGET: &str = "/api/households/{household_id}/budget";
/// The route for spending grouped by category.
pub const ANALYTICS_CATEGORIES: &str = "/api/households/{household_id}/analytics/categories";
/// The route for income and expenses per month.
pub const ANALYTICS_MONTHLY: &str = "/api/households/{household_id}/analytics/monthly";
/// The route for the months that have transactions.
pub const ACTIVE_MONTHS: &str = "/api/households/{household_id}/analytics/active_months";
/// The route for the household dashboard.
pub const DASHBOARD: &str = "/api/households/{household_id}/dashboard";

/// Replace the parameters in `endpoint_path` with `params`, in order.
///
/// A parameter is a string that starts with a left brace, followed by
/// lowercase letters or underscores, and ends with a right brace.
/// For example, in the endpoint path '/users/{user_id}', '{user_id}' is the parameter.
///
/// Parameters without a matching value are left as they are, extra values are ignored.
pub fn format_endpoint(endpoint_path: &str, params: &[&dyn Display]) -> String {
    let mut formatted = String::with_capacity(endpoint_path.len());
    let mut params = params.iter();
    let mut rest = endpoint_path;

    while let Some(param_start) = rest.find('{') {
        let Some(param_len) = rest[param_start..].find('}') else {
            break;
        };
        let param_end = param_start + param_len + 1;

        formatted.push_str(&rest[..param_start]);

        match params.next() {
            Some(param) => formatted.push_str(&param.to_string()),
            None => formatted.push_str(&rest[param_start..param_end]),
        }

        rest = &rest[param_end..];
    }

    formatted.push_str(rest);
    formatted
}
