//! The weekly summary email job, triggered by an external scheduler.

use std::sync::{Arc, Mutex};

use axum::{
    extract::{FromRef, State},
    http::HeaderMap,
};
use rusqlite::Connection;
use serde::Serialize;
use time::{Date, Duration};

use crate::{
    AppState, Error,
    analytics::{first_day_of_month, period_totals, spending_by_category},
    auth::{UserID, bearer_token, verify_secret},
    budget::{BudgetStatus, get_budget_report},
    db::lock_connection,
    email::{Mailer, WeeklySummaryEmail},
    extract::Json,
    household::{Household, HouseholdId, Member, get_all_households, get_members},
    timezone::local_today,
};

/// The number of days covered by a summary, ending today.
const SUMMARY_DAYS: i64 = 7;

/// The number of expense categories listed in a summary.
const TOP_CATEGORY_COUNT: usize = 3;

/// The amount spent in one category.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryTotal {
    /// The category name.
    pub name: String,
    /// The amount spent as a positive number.
    pub total: f64,
}

/// A category whose spending this month exceeds its budget.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OverBudgetCategory {
    /// The category name.
    pub name: String,
    /// The amount spent this month.
    pub spent: f64,
    /// The monthly budget.
    pub budget: f64,
}

/// A household's figures for the last week.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HouseholdSummary {
    /// The household the summary is for.
    pub household_id: HouseholdId,
    /// The household's name.
    pub household_name: String,
    /// The first day of the summary, inclusive.
    pub start: Date,
    /// The last day of the summary, inclusive.
    pub end: Date,
    /// Income over the week.
    pub income: f64,
    /// Expenses over the week as a positive number.
    pub expenses: f64,
    /// Income minus expenses.
    pub net: f64,
    /// The number of transactions in the week.
    pub transaction_count: u32,
    /// The largest expense categories of the week.
    pub top_categories: Vec<CategoryTotal>,
    /// Categories over budget for the month containing the last day.
    pub over_budget: Vec<OverBudgetCategory>,
}

/// Compute the summary for `household` over the seven days ending `today`.
///
/// # Errors
///
/// Returns an [Error::SqlError] if an SQL related error occurred.
pub fn compute_household_summary(
    household: &Household,
    today: Date,
    connection: &Connection,
) -> Result<HouseholdSummary, Error> {
    let start = today - Duration::days(SUMMARY_DAYS - 1);
    let totals = period_totals(household.id, start, today, connection)?;

    let top_categories = spending_by_category(household.id, start, today, connection)?
        .into_iter()
        .take(TOP_CATEGORY_COUNT)
        .map(|category| CategoryTotal {
            name: category.name,
            total: category.total,
        })
        .collect();

    let over_budget = get_budget_report(household.id, first_day_of_month(today), connection)?
        .categories
        .into_iter()
        .filter(|category| category.status == BudgetStatus::Over)
        .filter_map(|category| {
            category.budget.map(|budget| OverBudgetCategory {
                name: category.name,
                spent: category.spent,
                budget,
            })
        })
        .collect();

    Ok(HouseholdSummary {
        household_id: household.id,
        household_name: household.name.clone(),
        start,
        end: today,
        income: totals.income,
        expenses: totals.expenses,
        net: totals.net,
        transaction_count: totals.transaction_count,
        top_categories,
        over_budget,
    })
}

/// A household or recipient the job could not finish.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryFailure {
    /// The household being processed.
    pub household_id: HouseholdId,
    /// The recipient, if the failure was sending to one member.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<UserID>,
    /// What went wrong.
    pub error: String,
}

/// The outcome of a weekly summary run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct WeeklySummaryReport {
    /// Households with transactions in the week.
    pub households_processed: u32,
    /// Households without transactions in the week.
    pub households_skipped: u32,
    /// Emails delivered.
    pub emails_sent: u32,
    /// Households and recipients that failed.
    pub failures: Vec<SummaryFailure>,
}

struct PendingSummary {
    summary: HouseholdSummary,
    recipients: Vec<Member>,
}

/// Collect the summaries to send, recording skipped and failed households in `report`.
fn collect_summaries(
    today: Date,
    connection: &Connection,
    report: &mut WeeklySummaryReport,
) -> Result<Vec<PendingSummary>, Error> {
    let mut pending = Vec::new();

    for household in get_all_households(connection)? {
        let summary = match compute_household_summary(&household, today, connection) {
            Ok(summary) => summary,
            Err(error) => {
                tracing::error!("could not summarise household {}: {error}", household.id);
                report.failures.push(SummaryFailure {
                    household_id: household.id,
                    user_id: None,
                    error: error.to_string(),
                });
                continue;
            }
        };

        if summary.transaction_count == 0 {
            report.households_skipped += 1;
            continue;
        }

        let recipients = match get_members(household.id, connection) {
            Ok(members) => members
                .into_iter()
                .filter(|member| member.weekly_summary)
                .collect(),
            Err(error) => {
                tracing::error!("could not get members of household {}: {error}", household.id);
                report.failures.push(SummaryFailure {
                    household_id: household.id,
                    user_id: None,
                    error: error.to_string(),
                });
                continue;
            }
        };

        report.households_processed += 1;
        pending.push(PendingSummary {
            summary,
            recipients,
        });
    }

    Ok(pending)
}

/// Email every opted-in member of every household with transactions in the
/// seven days ending `today`.
///
/// Failures for one household or recipient are logged and reported, and the
/// remaining households are still processed.
///
/// # Errors
///
/// Returns an error if the database lock could not be acquired or the
/// households could not be listed.
pub async fn send_weekly_summaries(
    db_connection: &Mutex<Connection>,
    mailer: &dyn Mailer,
    app_url: &str,
    today: Date,
) -> Result<WeeklySummaryReport, Error> {
    let mut report = WeeklySummaryReport::default();

    let pending = {
        let connection = lock_connection(db_connection)?;
        collect_summaries(today, &connection, &mut report)?
    };

    for PendingSummary {
        summary,
        recipients,
    } in pending
    {
        for recipient in recipients {
            let message = WeeklySummaryEmail {
                recipient_name: &recipient.name,
                summary: &summary,
                app_url,
            }
            .to_message(&recipient.email);

            match mailer.send(&message).await {
                Ok(()) => report.emails_sent += 1,
                Err(error) => {
                    tracing::error!(
                        "could not send the weekly summary for household {} to user {}: {error}",
                        summary.household_id,
                        recipient.user_id
                    );
                    report.failures.push(SummaryFailure {
                        household_id: summary.household_id,
                        user_id: Some(recipient.user_id),
                        error: error.to_string(),
                    });
                }
            }
        }
    }

    tracing::info!(
        "Weekly summary: {} households processed, {} skipped, {} emails sent, {} failures",
        report.households_processed,
        report.households_skipped,
        report.emails_sent,
        report.failures.len()
    );

    Ok(report)
}

/// The state needed to run the weekly summary job.
#[derive(Debug, Clone)]
pub struct WeeklySummaryState {
    /// The database connection for reading households and transactions.
    pub db_connection: Arc<Mutex<Connection>>,
    /// Delivers the summary emails.
    pub mailer: Arc<dyn Mailer>,
    /// The base URL of the web app, linked from the emails.
    pub app_url: String,
    /// The bearer token that authorizes the request.
    pub cron_secret: String,
    /// The local timezone as a canonical timezone name, e.g. "Pacific/Auckland".
    pub local_timezone: String,
}

impl FromRef<AppState> for WeeklySummaryState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
            mailer: state.mailer.clone(),
            app_url: state.app_url.clone(),
            cron_secret: state.cron_secret.clone(),
            local_timezone: state.local_timezone.clone(),
        }
    }
}

/// A route handler for the scheduler to trigger the weekly summary emails.
///
/// Requires `Authorization: Bearer <cron secret>`.
pub async fn weekly_summary_cron_endpoint(
    State(state): State<WeeklySummaryState>,
    headers: HeaderMap,
) -> Result<Json<WeeklySummaryReport>, Error> {
    verify_secret(bearer_token(&headers), &state.cron_secret)?;

    let today = local_today(&state.local_timezone)?;
    let report = send_weekly_summaries(
        &state.db_connection,
        state.mailer.as_ref(),
        &state.app_url,
        today,
    )
    .await?;

    Ok(Json(report))
}
