//! Filtered, paginated queries over a household's transactions.

use rusqlite::{Connection, params_from_iter, types::Value};
use serde::Deserialize;
use time::Date;

use crate::{
    Error,
    account::AccountId,
    category::CategoryId,
    household::HouseholdId,
    pagination::{Page, PaginationConfig},
    transaction::{
        Transaction,
        core::{TRANSACTION_COLUMNS, map_transaction_row},
    },
    transaction_type::TransactionTypeId,
};

/// The query string accepted by the transaction list.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct TransactionQuery {
    /// The earliest date to include.
    pub from: Option<Date>,
    /// The latest date to include.
    pub to: Option<Date>,
    /// Only include transactions in this account.
    pub account_id: Option<AccountId>,
    /// Only include transactions in this category.
    pub category_id: Option<CategoryId>,
    /// Only include transactions without a category.
    pub uncategorized: Option<bool>,
    /// Only include transactions of this type.
    pub transaction_type_id: Option<TransactionTypeId>,
    /// Only include transactions whose description contains this text, ignoring case.
    pub search: Option<String>,
    /// The 1-based page number.
    pub page: Option<u64>,
    /// The number of transactions per page.
    pub per_page: Option<u64>,
}

/// Reject a date range whose start is after its end.
///
/// # Errors
///
/// Returns [Error::InvalidDateRange] if `from` is after `to`.
pub(crate) fn check_date_range(from: Option<Date>, to: Option<Date>) -> Result<(), Error> {
    match (from, to) {
        (Some(from), Some(to)) if from > to => Err(Error::InvalidDateRange(from, to)),
        _ => Ok(()),
    }
}

/// Escape the LIKE wildcards in `text` so it only matches literally.
fn escape_like(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());

    for character in text.chars() {
        if matches!(character, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(character);
    }

    escaped
}

/// Builds the WHERE clause and its parameters for a [TransactionQuery].
struct Filter {
    conditions: Vec<String>,
    params: Vec<Value>,
}

impl Filter {
    fn new(household_id: HouseholdId) -> Self {
        Self {
            conditions: vec!["\"transaction\".household_id = ?1".to_owned()],
            params: vec![Value::Integer(household_id)],
        }
    }

    /// Add `condition` where `{}` is replaced by the parameter placeholder.
    fn push(&mut self, condition: &str, param: Value) {
        self.params.push(param);
        let placeholder = format!("?{}", self.params.len());
        self.conditions.push(condition.replace("{}", &placeholder));
    }

    fn where_clause(&self) -> String {
        self.conditions.join(" AND ")
    }
}

fn build_filter(household_id: HouseholdId, query: &TransactionQuery) -> Result<Filter, Error> {
    check_date_range(query.from, query.to)?;

    let uncategorized = query.uncategorized.unwrap_or(false);

    if uncategorized && query.category_id.is_some() {
        return Err(Error::InvalidQuery(
            "category_id cannot be combined with uncategorized=true".to_owned(),
        ));
    }

    let mut filter = Filter::new(household_id);

    if let Some(from) = query.from {
        filter.push("\"transaction\".date >= {}", Value::Text(from.to_string()));
    }

    if let Some(to) = query.to {
        filter.push("\"transaction\".date <= {}", Value::Text(to.to_string()));
    }

    if let Some(account_id) = query.account_id {
        filter.push("\"transaction\".account_id = {}", Value::Integer(account_id));
    }

    if uncategorized {
        filter.conditions.push("\"transaction\".category_id IS NULL".to_owned());
    } else if let Some(category_id) = query.category_id {
        filter.push("\"transaction\".category_id = {}", Value::Integer(category_id));
    }

    if let Some(transaction_type_id) = query.transaction_type_id {
        filter.push(
            "\"transaction\".transaction_type_id = {}",
            Value::Integer(transaction_type_id),
        );
    }

    if let Some(search) = query
        .search
        .as_deref()
        .map(str::trim)
        .filter(|search| !search.is_empty())
    {
        filter.push(
            "unicode_lower(\"transaction\".description) LIKE '%' || {} || '%' ESCAPE '\\'",
            Value::Text(escape_like(&search.to_lowercase())),
        );
    }

    Ok(filter)
}

/// Get one page of a household's transactions matching `query`, newest first.
///
/// Transactions are sorted by date, then ID, both descending.
///
/// # Errors
///
/// Returns [Error::InvalidDateRange] or [Error::InvalidQuery] for bad query
/// parameters, or an SQL error.
pub fn query_transactions(
    household_id: HouseholdId,
    query: &TransactionQuery,
    pagination_config: &PaginationConfig,
    connection: &Connection,
) -> Result<Page<Transaction>, Error> {
    let (page, per_page) = pagination_config.resolve(query.page, query.per_page)?;
    let filter = build_filter(household_id, query)?;
    let where_clause = filter.where_clause();

    let total_items: i64 = connection
        .prepare(&format!(
            "SELECT COUNT(*) FROM \"transaction\" WHERE {where_clause}"
        ))?
        .query_row(params_from_iter(filter.params.iter()), |row| row.get(0))?;

    let limit_placeholder = filter.params.len() + 1;
    let offset_placeholder = filter.params.len() + 2;
    let mut params = filter.params;
    params.push(Value::Integer(per_page as i64));
    params.push(Value::Integer(((page - 1) * per_page) as i64));

    let items = connection
        .prepare(&format!(
            "SELECT {TRANSACTION_COLUMNS} FROM \"transaction\"
             WHERE {where_clause}
             ORDER BY \"transaction\".date DESC, \"transaction\".id DESC
             LIMIT ?{limit_placeholder} OFFSET ?{offset_placeholder}"
        ))?
        .query_map(params_from_iter(params.iter()), map_transaction_row)?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Page::new(items, page, per_page, total_items as u64))
}

/// Get every transaction of a household in an optional inclusive date range,
/// oldest first.
///
/// # Errors
///
/// Returns [Error::InvalidDateRange] if `from` is after `to`, or an SQL error.
pub fn get_transactions_in_range(
    household_id: HouseholdId,
    from: Option<Date>,
    to: Option<Date>,
    connection: &Connection,
) -> Result<Vec<Transaction>, Error> {
    let query = TransactionQuery {
        from,
        to,
        ..Default::default()
    };
    let filter = build_filter(household_id, &query)?;

    connection
        .prepare(&format!(
            "SELECT {TRANSACTION_COLUMNS} FROM \"transaction\"
             WHERE {}
             ORDER BY \"transaction\".date ASC, \"transaction\".id ASC",
            filter.where_clause()
        ))?
        .query_map(params_from_iter(filter.params.iter()), map_transaction_row)?
        .map(|transaction_result| transaction_result.map_err(Error::from))
        .collect()
}
