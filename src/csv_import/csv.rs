//! Parsing of CSV bank statements into rows ready for import.

use std::collections::HashMap;

use csv::{ReaderBuilder, StringRecord, Trim};
use time::{Date, format_description::BorrowedFormatItem, macros::format_description};

use crate::{Error, account::AccountId};

const ISO_DATE_FORMAT: &[BorrowedFormatItem] = format_description!("[year]-[month]-[day]");
const DAY_FIRST_DATE_FORMAT: &[BorrowedFormatItem] = format_description!("[day]/[month]/[year]");

/// A transaction read from one line of a CSV file.
#[derive(Debug, Clone, PartialEq)]
pub struct CsvRow {
    /// The line of the file the row was read from, starting at one for the header.
    pub line: u64,
    /// When the transaction happened.
    pub date: Date,
    /// What the transaction was for.
    pub description: String,
    /// The signed amount.
    pub amount: f64,
    /// The category name, if the file has one for the row.
    pub category: Option<String>,
    /// The transaction type name, if the file has one for the row.
    pub transaction_type: Option<String>,
    /// How many identical rows came before this one in the same file.
    pub occurrence: usize,
}

/// The positions of the known columns in the header row.
struct Columns {
    date: usize,
    description: usize,
    amount: usize,
    category: Option<usize>,
    transaction_type: Option<usize>,
}

impl Columns {
    fn from_header(file_name: &str, header: &StringRecord) -> Result<Self, Error> {
        let find = |name: &str| {
            header
                .iter()
                .position(|column| column.trim().eq_ignore_ascii_case(name))
        };
        let require = |name: &str| {
            find(name).ok_or_else(|| {
                Error::InvalidCSV(format!("{file_name}: missing required column \"{name}\""))
            })
        };

        Ok(Self {
            date: require("date")?,
            description: require("description")?,
            amount: require("amount")?,
            category: find("category"),
            transaction_type: find("type"),
        })
    }
}

/// Parse a date written as `YYYY-MM-DD` or `DD/MM/YYYY`.
pub fn parse_date(text: &str) -> Option<Date> {
    Date::parse(text, ISO_DATE_FORMAT)
        .or_else(|_| Date::parse(text, DAY_FIRST_DATE_FORMAT))
        .ok()
}

/// Parse an amount that may contain a dollar sign and thousands separators,
/// e.g. "-$1,234.50".
pub fn parse_amount(text: &str) -> Option<f64> {
    let cleaned: String = text
        .chars()
        .filter(|character| !matches!(character, '$' | ',') && !character.is_whitespace())
        .collect();

    cleaned
        .parse::<f64>()
        .ok()
        .filter(|amount| amount.is_finite())
}

fn optional_field(record: &StringRecord, column: Option<usize>) -> Option<String> {
    column
        .and_then(|column| record.get(column))
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_owned)
}

/// Parse the rows of a CSV file with a header row.
///
/// The columns `date`, `description` and `amount` are required, `category`
/// and `type` are optional. Column names are matched without case.
///
/// # Errors
///
/// Returns [Error::InvalidCSV] naming the file and line of the first row that
/// is malformed, has an empty required field or is dated after `today`.
pub fn parse_csv(file_name: &str, text: &str, today: Date) -> Result<Vec<CsvRow>, Error> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(Trim::All)
        .from_reader(text.as_bytes());

    let header = reader
        .headers()
        .map_err(|error| Error::InvalidCSV(format!("{file_name}: {error}")))?
        .clone();
    let columns = Columns::from_header(file_name, &header)?;

    let mut rows = Vec::new();
    let mut seen: HashMap<(Date, String, i64), usize> = HashMap::new();

    for result in reader.records() {
        let record = result.map_err(|error| Error::InvalidCSV(format!("{file_name}: {error}")))?;
        let line = record.position().map(|position| position.line()).unwrap_or(0);
        let invalid = |message: String| Error::InvalidCSV(format!("{file_name} line {line}: {message}"));

        let raw_date = record.get(columns.date).unwrap_or_default();
        let description = record.get(columns.description).unwrap_or_default();
        let raw_amount = record.get(columns.amount).unwrap_or_default();

        if raw_date.is_empty() || description.is_empty() || raw_amount.is_empty() {
            return Err(invalid(
                "date, description and amount must not be empty".to_owned(),
            ));
        }

        let date = parse_date(raw_date).ok_or_else(|| {
            invalid(format!(
                "\"{raw_date}\" is not a date in the format YYYY-MM-DD or DD/MM/YYYY"
            ))
        })?;

        if date > today {
            return Err(invalid(format!("{date} is a date in the future")));
        }

        let amount = parse_amount(raw_amount)
            .ok_or_else(|| invalid(format!("\"{raw_amount}\" is not an amount")))?;

        let occurrence = seen
            .entry((date, description.to_owned(), (amount * 100.0).round() as i64))
            .or_default();

        rows.push(CsvRow {
            line,
            date,
            description: description.to_owned(),
            amount,
            category: optional_field(&record, columns.category),
            transaction_type: optional_field(&record, columns.transaction_type),
            occurrence: *occurrence,
        });

        *occurrence += 1;
    }

    Ok(rows)
}

/// Creates a hash for an imported row from the account, date, description,
/// amount and the row's occurrence among identical rows of its file.
pub fn create_import_id(account_id: AccountId, row: &CsvRow) -> i64 {
    let key = format!(
        "{account_id}|{}|{}|{:.2}|{}",
        row.date, row.description, row.amount, row.occurrence
    );
    let hash_128 = md5::compute(key);
    let mut hash_64 = [0; 8];
    hash_64.copy_from_slice(&hash_128[0..8]);
    i64::from_le_bytes(hash_64)
}
