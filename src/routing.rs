//! Application router configuration with protected and unprotected route definitions.

use axum::{
    Json, Router, middleware,
    routing::{delete, get, post, put},
};
use serde_json::{Value, json};

use crate::{
    AppState,
    account::{
        create_account_endpoint, delete_account_endpoint, get_account_endpoint,
        list_accounts_endpoint, update_account_endpoint,
    },
    analytics::{active_months_endpoint, monthly_totals_endpoint, spending_by_category_endpoint},
    auth::{
        auth_guard, get_current_user, log_in, log_out, register_user, sync_user_webhook,
        update_current_user,
    },
    budget::get_budget_endpoint,
    category::{
        create_category_endpoint, delete_category_endpoint, get_category_endpoint,
        list_categories_endpoint, update_category_endpoint,
    },
    csv_import::import_transactions_endpoint,
    dashboard::get_dashboard_endpoint,
    duplicates::find_duplicates_endpoint,
    endpoints,
    household::{
        create_household_endpoint, delete_household_endpoint, get_household_endpoint,
        list_households_endpoint, list_members_endpoint, remove_member_endpoint,
        rename_household_endpoint, update_member_role_endpoint,
    },
    invitation::{
        accept_invitation_endpoint, create_invitation_endpoint, list_invitations_endpoint,
        preview_invitation_endpoint, revoke_invitation_endpoint,
    },
    not_found::get_404_not_found,
    transaction::{
        create_transaction_endpoint, delete_transaction_endpoint, get_transaction_endpoint,
        list_transactions_endpoint, update_transaction_endpoint,
    },
    transaction_type::{
        create_transaction_type_endpoint, delete_transaction_type_endpoint,
        list_transaction_types_endpoint,
    },
    weekly_summary::weekly_summary_cron_endpoint,
};

/// Return a router with all the app's routes.
pub fn build_router(state: AppState) -> Router {
    let unprotected_routes = Router::new()
        .route(endpoints::HEALTH, get(get_health))
        .route(endpoints::LOG_IN, post(log_in))
        .route(endpoints::USERS, post(register_user))
        .route(endpoints::USER_WEBHOOK, post(sync_user_webhook))
        .route(
            endpoints::WEEKLY_SUMMARY_CRON,
            post(weekly_summary_cron_endpoint),
        )
        .route(
            endpoints::INVITATION_BY_TOKEN,
            get(preview_invitation_endpoint),
        );

    let protected_routes = Router::new()
        .route(endpoints::LOG_OUT, post(log_out))
        .route(
            endpoints::CURRENT_USER,
            get(get_current_user).put(update_current_user),
        )
        .route(
            endpoints::ACCEPT_INVITATION,
            post(accept_invitation_endpoint),
        )
        .route(
            endpoints::HOUSEHOLDS,
            get(list_households_endpoint).post(create_household_endpoint),
        )
        .route(
            endpoints::HOUSEHOLD,
            get(get_household_endpoint)
                .put(rename_household_endpoint)
                .delete(delete_household_endpoint),
        )
        .route(endpoints::MEMBERS, get(list_members_endpoint))
        .route(
            endpoints::MEMBER,
            put(update_member_role_endpoint).delete(remove_member_endpoint),
        )
        .route(
            endpoints::INVITATIONS,
            get(list_invitations_endpoint).post(create_invitation_endpoint),
        )
        .route(
            endpoints::INVITATION,
            delete(revoke_invitation_endpoint),
        )
        .route(
            endpoints::ACCOUNTS,
            get(list_accounts_endpoint).post(create_account_endpoint),
        )
        .route(
            endpoints::ACCOUNT,
            get(get_account_endpoint)
                .put(update_account_endpoint)
                .delete(delete_account_endpoint),
        )
        .route(
            endpoints::CATEGORIES,
            get(list_categories_endpoint).post(create_category_endpoint),
        )
        .route(
            endpoints::CATEGORY,
            get(get_category_endpoint)
                .put(update_category_endpoint)
                .delete(delete_category_endpoint),
        )
        .route(
            endpoints::TRANSACTION_TYPES,
            get(list_transaction_types_endpoint).post(create_transaction_type_endpoint),
        )
        .route(
            endpoints::TRANSACTION_TYPE,
            delete(delete_transaction_type_endpoint),
        )
        .route(
            endpoints::TRANSACTIONS,
            get(list_transactions_endpoint).post(create_transaction_endpoint),
        )
        .route(endpoints::DUPLICATES, get(find_duplicates_endpoint))
        .route(endpoints::IMPORT, post(import_transactions_endpoint))
        .route(
            endpoints::TRANSACTION,
            get(get_transaction_endpoint)
                .put(update_transaction_endpoint)
                .delete(delete_transaction_endpoint),
        )
        .route(endpoints::BUDGET, get(get_budget_endpoint))
        .route(
            endpoints::ANALYTICS_CATEGORIES,
            get(spending_by_category_endpoint),
        )
        .route(endpoints::ANALYTICS_MONTHLY, get(monthly_totals_endpoint))
        .route(endpoints::ACTIVE_MONTHS, get(active_months_endpoint))
        .route(endpoints::DASHBOARD, get(get_dashboard_endpoint))
        .layer(middleware::from_fn_with_state(state.clone(), auth_guard));

    protected_routes
        .merge(unprotected_routes)
        .fallback(get_404_not_found)
        .with_state(state)
}

/// A route handler for checking that the server is up.
async fn get_health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

#[cfg(test)]
mod routing_tests {
    use axum::http::StatusCode;
    use serde_json::json;

    use crate::{
        endpoints::{self, format_endpoint},
        test_utils::TestApp,
    };

    #[tokio::test]
    async fn health_check_is_public() {
        let app = TestApp::new();

        let response = app.server.get(endpoints::HEALTH).await;

        response.assert_status_ok();
        response.assert_json(&json!({ "status": "ok" }));
    }

    #[tokio::test]
    async fn household_routes_require_a_session() {
        let app = TestApp::new();

        for path in [
            endpoints::HOUSEHOLDS.to_owned(),
            format_endpoint(endpoints::DASHBOARD, &[&1]),
            format_endpoint(endpoints::TRANSACTIONS, &[&1]),
            format_endpoint(endpoints::BUDGET, &[&1]),
        ] {
            app.server
                .get(&path)
                .await
                .assert_status(StatusCode::UNAUTHORIZED);
        }
    }

    #[tokio::test]
    async fn duplicates_route_is_not_a_transaction_id() {
        let app = TestApp::new();
        let (owner, cookies) = app.log_in_new_user("molly@burrow.com", "Molly").await;
        let household_id = app.insert_household("The Burrow", owner);

        app.server
            .get(&format_endpoint(endpoints::DUPLICATES, &[&household_id]))
            .add_cookies(cookies)
            .await
            .assert_status_ok();
    }
}
