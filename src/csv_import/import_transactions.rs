use std::{
    collections::HashSet,
    sync::{Arc, Mutex},
};

use axum::{
    Extension,
    extract::{FromRef, Multipart, State, multipart::Field},
    http::StatusCode,
};
use rusqlite::Connection;
use serde::Serialize;
use time::{Date, Duration};

use crate::{
    AppState, Error,
    account::{AccountId, get_account},
    auth::UserID,
    category::{CategoryForm, CategoryId, create_category, find_category_by_name},
    csv_import::csv::{CsvRow, create_import_id, parse_csv},
    db::lock_connection,
    duplicates::{DetectorOptions, DuplicatePair, find_duplicates},
    extract::{Json, Path},
    household::{HouseholdId, MemberRole, require_role},
    timezone::local_today,
    transaction::{Transaction, TransactionForm, get_transactions_in_range, insert_transaction},
    transaction_type::find_transaction_type_by_name,
};

/// The state needed for importing transactions.
#[derive(Debug, Clone)]
pub struct ImportState {
    /// The database connection for managing transactions.
    pub db_connection: Arc<Mutex<Connection>>,
    /// The local timezone as a canonical timezone name, e.g. "Pacific/Auckland".
    pub local_timezone: String,
}

impl FromRef<AppState> for ImportState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
            local_timezone: state.local_timezone.clone(),
        }
    }
}

/// The outcome of an import.
#[derive(Debug, Default, Serialize)]
pub struct ImportSummary {
    /// The number of rows stored as new transactions.
    pub imported: usize,
    /// The number of rows that had already been imported.
    pub skipped: usize,
    /// The names of the categories created for the import.
    pub created_categories: Vec<String>,
    /// Likely duplicates that involve a newly imported transaction.
    pub possible_duplicates: Vec<DuplicatePair>,
}

/// The parsed contents of the multipart form.
struct ImportForm {
    account_id: AccountId,
    files: Vec<Vec<CsvRow>>,
}

/// Route handler for importing transactions from CSV files into an account.
///
/// All files are parsed before anything is written, so a malformed row
/// rejects the whole import.
pub async fn import_transactions_endpoint(
    State(state): State<ImportState>,
    Extension(user_id): Extension<UserID>,
    Path(household_id): Path<HouseholdId>,
    multipart: Multipart,
) -> Result<(StatusCode, Json<ImportSummary>), Error> {
    let start_time = std::time::Instant::now();
    let today = local_today(&state.local_timezone)?;
    let form = read_import_form(multipart, today).await?;

    let connection = lock_connection(&state.db_connection)?;
    require_role(household_id, user_id, MemberRole::Member, &connection)?;

    let summary = import_rows(household_id, user_id, &form, &connection).inspect_err(|error| {
        tracing::error!(
            "Failed to import transactions into household {household_id} after {:.1}ms: {error}",
            start_time.elapsed().as_millis()
        )
    })?;

    tracing::info!(
        "Imported {} and skipped {} transactions into household {household_id} in {:.1}ms",
        summary.imported,
        summary.skipped,
        start_time.elapsed().as_millis()
    );

    Ok((StatusCode::CREATED, Json(summary)))
}

async fn read_import_form(mut multipart: Multipart, today: Date) -> Result<ImportForm, Error> {
    let mut account_id = None;
    let mut files = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|error| Error::MultipartError(error.to_string()))?
    {
        if field.name() == Some("account_id") {
            let text = field
                .text()
                .await
                .map_err(|error| Error::MultipartError(error.to_string()))?;
            let id = text.trim().parse::<AccountId>().map_err(|_| {
                Error::MultipartError(format!("\"{text}\" is not a valid account_id"))
            })?;
            account_id = Some(id);
            continue;
        }

        let (file_name, text) = parse_multipart_field(field).await?;
        files.push(parse_csv(&file_name, &text, today)?);
    }

    let account_id =
        account_id.ok_or_else(|| Error::MultipartError("missing account_id field".to_owned()))?;

    if files.is_empty() {
        return Err(Error::NotCSV);
    }

    Ok(ImportForm { account_id, files })
}

async fn parse_multipart_field(field: Field<'_>) -> Result<(String, String), Error> {
    if field.content_type() != Some("text/csv") {
        return Err(Error::NotCSV);
    }

    let file_name = field.file_name().unwrap_or("upload.csv").to_owned();

    let text = field
        .text()
        .await
        .map_err(|error| Error::MultipartError(error.to_string()))?;

    Ok((file_name, text))
}

fn import_rows(
    household_id: HouseholdId,
    user_id: UserID,
    form: &ImportForm,
    connection: &Connection,
) -> Result<ImportSummary, Error> {
    let tx = connection.unchecked_transaction()?;

    get_account(household_id, form.account_id, &tx).map_err(|error| match error {
        Error::NotFound => Error::InvalidAccount(form.account_id),
        error => error,
    })?;

    let mut summary = ImportSummary::default();
    let mut imported = Vec::new();

    for row in form.files.iter().flatten() {
        let category_id = match &row.category {
            Some(name) => Some(find_or_create_category(household_id, name, &mut summary, &tx)?),
            None => None,
        };
        let transaction_type_id = match &row.transaction_type {
            Some(name) => find_transaction_type_by_name(household_id, name, &tx)?
                .map(|transaction_type| transaction_type.id),
            None => None,
        };

        let transaction_form = TransactionForm {
            category_id,
            transaction_type_id,
            ..TransactionForm::new(form.account_id, row.amount, row.date, &row.description)
        };
        let import_id = create_import_id(form.account_id, row);

        match insert_transaction(
            household_id,
            Some(user_id),
            &transaction_form,
            Some(import_id),
            &tx,
        ) {
            Ok(transaction) => imported.push(transaction),
            Err(Error::DuplicateImportId) => summary.skipped += 1,
            Err(error) => return Err(error),
        }
    }

    summary.imported = imported.len();
    summary.possible_duplicates = duplicates_of_imported(household_id, &imported, &tx)?;

    tx.commit()?;

    Ok(summary)
}

fn find_or_create_category(
    household_id: HouseholdId,
    name: &str,
    summary: &mut ImportSummary,
    connection: &Connection,
) -> Result<CategoryId, Error> {
    if let Some(category) = find_category_by_name(household_id, name, connection)? {
        return Ok(category.id);
    }

    let category = create_category(
        household_id,
        &CategoryForm {
            name: name.to_owned(),
            budget: None,
        },
        connection,
    )?;
    summary.created_categories.push(category.name.to_string());

    Ok(category.id)
}

fn duplicates_of_imported(
    household_id: HouseholdId,
    imported: &[Transaction],
    connection: &Connection,
) -> Result<Vec<DuplicatePair>, Error> {
    let options = DetectorOptions::default();
    let (Some(earliest), Some(latest)) = (
        imported.iter().map(|transaction| transaction.date).min(),
        imported.iter().map(|transaction| transaction.date).max(),
    ) else {
        return Ok(Vec::new());
    };

    let window = Duration::days(options.window_days);
    let candidates = get_transactions_in_range(
        household_id,
        earliest.checked_sub(window),
        latest.checked_add(window),
        connection,
    )?;
    let imported_ids: HashSet<i64> = imported.iter().map(|transaction| transaction.id).collect();

    Ok(find_duplicates(&candidates, options)
        .into_iter()
        .filter(|pair| {
            imported_ids.contains(&pair.first.id) || imported_ids.contains(&pair.second.id)
        })
        .collect())
}

#[cfg(test)]
mod import_transactions_tests {
    use axum::{body::Bytes, http::StatusCode};
    use cookie::CookieJar;
    use serde_json::Value;
    use time::macros::date;

    use crate::{
        account::{AccountForm, AccountId, create_account},
        category::get_categories,
        endpoints::{self, format_endpoint},
        household::{HouseholdId, MemberRole, add_member},
        test_utils::TestApp,
        transaction::{TransactionQuery, query_transactions},
    };

    const BOUNDARY: &str = "MY_BOUNDARY123456789";

    const APRIL_CSV: &str = "Date,Description,Amount,Category,Type\n\
        2025-04-01,Leaky Cauldron,-12.50,Dining,Expense\n\
        2025-04-02,Leaky Cauldron,-12.50,Dining,expense\n\
        2025-04-03,Ministry salary,\"$2,500.00\",,Income\n";

    /// A multipart body with `account_id` (when given) followed by one part per
    /// `(content type, contents)` file.
    fn make_multipart_body(account_id: Option<&str>, files: &[(&str, &str)]) -> Bytes {
        let boundary_start = format!("--{BOUNDARY}");
        let mut lines: Vec<String> = Vec::new();

        if let Some(account_id) = account_id {
            lines.push(boundary_start.clone());
            lines.push("Content-Disposition: form-data; name=\"account_id\"".to_owned());
            lines.push("".to_owned());
            lines.push(account_id.to_owned());
        }

        for (index, (content_type, contents)) in files.iter().enumerate() {
            lines.push(boundary_start.clone());
            lines.push(format!(
                "Content-Disposition: form-data; name=\"files\"; filename=\"statement{index}.csv\""
            ));
            lines.push(format!("Content-Type: {content_type}"));
            lines.push("".to_owned());
            lines.push(contents.to_string());
        }

        lines.push(format!("--{BOUNDARY}--"));
        lines.push("".to_owned());

        Bytes::from(lines.join("\r\n"))
    }

    fn insert_account(app: &TestApp, household_id: HouseholdId) -> AccountId {
        create_account(
            household_id,
            &AccountForm {
                name: "Gringotts".to_owned(),
                balance: 0.0,
                date: date!(2025 - 01 - 01),
            },
            &app.connection(),
        )
        .unwrap()
        .id
    }

    async fn post_import(
        app: &TestApp,
        household_id: HouseholdId,
        cookies: CookieJar,
        body: Bytes,
    ) -> axum_test::TestResponse {
        app.server
            .post(&format_endpoint(endpoints::IMPORT, &[&household_id]))
            .add_cookies(cookies)
            .bytes(body)
            .content_type(&format!("multipart/form-data; boundary={BOUNDARY}"))
            .await
    }

    #[tokio::test]
    async fn imports_rows_and_creates_categories() {
        let app = TestApp::new();
        let (owner, cookies) = app.log_in_new_user("molly@burrow.com", "Molly").await;
        let household_id = app.insert_household("The Burrow", owner);
        let account_id = insert_account(&app, household_id);

        let response = post_import(
            &app,
            household_id,
            cookies,
            make_multipart_body(Some(&account_id.to_string()), &[("text/csv", APRIL_CSV)]),
        )
        .await;

        response.assert_status(StatusCode::CREATED);
        let summary: Value = response.json();
        assert_eq!(summary["imported"], 3);
        assert_eq!(summary["skipped"], 0);
        assert_eq!(summary["created_categories"], serde_json::json!(["Dining"]));
        assert_eq!(
            summary["possible_duplicates"].as_array().unwrap().len(),
            1,
            "the two identical Leaky Cauldron rows one day apart should be flagged"
        );

        let connection = app.connection();
        let categories = get_categories(household_id, &connection).unwrap();
        assert_eq!(categories.len(), 1);

        let page = query_transactions(
            household_id,
            &TransactionQuery::default(),
            &Default::default(),
            &connection,
        )
        .unwrap();
        assert_eq!(page.total_items, 3);
        let salary = page
            .items
            .iter()
            .find(|transaction| transaction.description == "Ministry salary")
            .unwrap();
        assert_eq!(salary.amount, 2500.0);
        assert_eq!(salary.category_id, None);
        assert!(salary.transaction_type_id.is_some());
        assert_eq!(salary.created_by, Some(owner));
    }

    #[tokio::test]
    async fn reimport_skips_existing_rows() {
        let app = TestApp::new();
        let (owner, cookies) = app.log_in_new_user("molly@burrow.com", "Molly").await;
        let household_id = app.insert_household("The Burrow", owner);
        let account_id = insert_account(&app, household_id);
        let body = make_multipart_body(Some(&account_id.to_string()), &[("text/csv", APRIL_CSV)]);

        post_import(&app, household_id, cookies.clone(), body.clone())
            .await
            .assert_status(StatusCode::CREATED);
        let summary: Value = post_import(&app, household_id, cookies, body).await.json();

        assert_eq!(summary["imported"], 0);
        assert_eq!(summary["skipped"], 3);
        assert_eq!(summary["created_categories"], serde_json::json!([]));
    }

    #[tokio::test]
    async fn identical_rows_in_one_file_are_both_imported() {
        let app = TestApp::new();
        let (owner, cookies) = app.log_in_new_user("molly@burrow.com", "Molly").await;
        let household_id = app.insert_household("The Burrow", owner);
        let account_id = insert_account(&app, household_id);
        let csv = "date,description,amount\n2025-04-01,Owl treats,-3\n2025-04-01,Owl treats,-3\n";

        let summary: Value = post_import(
            &app,
            household_id,
            cookies,
            make_multipart_body(Some(&account_id.to_string()), &[("text/csv", csv)]),
        )
        .await
        .json();

        assert_eq!(summary["imported"], 2);
        assert_eq!(summary["skipped"], 0);
    }

    #[tokio::test]
    async fn invalid_row_rejects_whole_import() {
        let app = TestApp::new();
        let (owner, cookies) = app.log_in_new_user("molly@burrow.com", "Molly").await;
        let household_id = app.insert_household("The Burrow", owner);
        let account_id = insert_account(&app, household_id);
        let bad_csv = "date,description,amount\n2025-04-01,Owl treats,-3\n2025-04-02,Quills,lots\n";

        let response = post_import(
            &app,
            household_id,
            cookies,
            make_multipart_body(
                Some(&account_id.to_string()),
                &[("text/csv", APRIL_CSV), ("text/csv", bad_csv)],
            ),
        )
        .await;

        response.assert_status(StatusCode::BAD_REQUEST);
        let body: Value = response.json();
        assert!(
            body["error"].as_str().unwrap().contains("statement1.csv line 3"),
            "got {body}"
        );
        let page = query_transactions(
            household_id,
            &TransactionQuery::default(),
            &Default::default(),
            &app.connection(),
        )
        .unwrap();
        assert_eq!(page.total_items, 0);
    }

    #[tokio::test]
    async fn non_csv_file_is_bad_request() {
        let app = TestApp::new();
        let (owner, cookies) = app.log_in_new_user("molly@burrow.com", "Molly").await;
        let household_id = app.insert_household("The Burrow", owner);
        let account_id = insert_account(&app, household_id);

        let response = post_import(
            &app,
            household_id,
            cookies,
            make_multipart_body(Some(&account_id.to_string()), &[("image/png", "foo")]),
        )
        .await;

        response.assert_status(StatusCode::BAD_REQUEST);
        assert_eq!(response.json::<Value>()["error"], "file is not a CSV");
    }

    #[tokio::test]
    async fn missing_account_id_is_bad_request() {
        let app = TestApp::new();
        let (owner, cookies) = app.log_in_new_user("molly@burrow.com", "Molly").await;
        let household_id = app.insert_household("The Burrow", owner);

        post_import(
            &app,
            household_id,
            cookies,
            make_multipart_body(None, &[("text/csv", APRIL_CSV)]),
        )
        .await
        .assert_status(StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn account_from_other_household_is_bad_request() {
        let app = TestApp::new();
        let (owner, cookies) = app.log_in_new_user("molly@burrow.com", "Molly").await;
        let household_id = app.insert_household("The Burrow", owner);
        let other_household_id = app.insert_household("Shell Cottage", owner);
        let other_account_id = insert_account(&app, other_household_id);

        post_import(
            &app,
            household_id,
            cookies,
            make_multipart_body(
                Some(&other_account_id.to_string()),
                &[("text/csv", APRIL_CSV)],
            ),
        )
        .await
        .assert_status(StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn viewer_cannot_import() {
        let app = TestApp::new();
        let (owner, _) = app.log_in_new_user("molly@burrow.com", "Molly").await;
        let (viewer, viewer_cookies) = app.log_in_new_user("ron@burrow.com", "Ron").await;
        let household_id = app.insert_household("The Burrow", owner);
        add_member(household_id, viewer, MemberRole::Viewer, &app.connection()).unwrap();
        let account_id = insert_account(&app, household_id);

        post_import(
            &app,
            household_id,
            viewer_cookies,
            make_multipart_body(Some(&account_id.to_string()), &[("text/csv", APRIL_CSV)]),
        )
        .await
        .assert_status(StatusCode::FORBIDDEN);
    }
}
