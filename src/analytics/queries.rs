//! Aggregate queries over a household's transactions.
//!
//! Income is the sum of positive amounts and expenses the negated sum of
//! negative amounts. Transactions whose type is a TRANSFER move money between
//! accounts and are left out of income and expenses.

use std::collections::HashMap;

use rusqlite::Connection;
use serde::Serialize;
use time::Date;

use crate::{
    Error,
    analytics::month::{first_day_of_month, format_month, months_before, next_month},
    category::CategoryId,
    household::HouseholdId,
};

/// The label used for spending without a category.
pub const UNCATEGORIZED_LABEL: &str = "Uncategorized";

/// Excludes transfers, assuming the transaction type is joined as `tt`.
const NOT_TRANSFER: &str = "(tt.kind IS NULL OR tt.kind <> 'TRANSFER')";

/// The spending in one category over a period.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategorySpending {
    /// The category, or `None` for uncategorized spending.
    pub category_id: Option<CategoryId>,
    /// The category name, or [UNCATEGORIZED_LABEL].
    pub name: String,
    /// The total spent as a positive number.
    pub total: f64,
    /// The share of all spending in the period, in percent.
    pub percent: f64,
}

/// Income and expenses for one calendar month.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthlyTotal {
    /// The month as `YYYY-MM`.
    pub month: String,
    /// The sum of money in.
    pub income: f64,
    /// The sum of money out as a positive number.
    pub expenses: f64,
    /// Income minus expenses.
    pub net: f64,
}

/// Income, expenses and the number of transactions over a period.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct PeriodTotals {
    /// The sum of money in.
    pub income: f64,
    /// The sum of money out as a positive number.
    pub expenses: f64,
    /// Income minus expenses.
    pub net: f64,
    /// The number of transactions in the period, transfers included.
    pub transaction_count: u32,
}

/// Get the spending per category between `from` and `to` inclusive, largest first.
///
/// # Errors
///
/// Returns an [Error::SqlError] if an SQL related error occurred.
pub fn spending_by_category(
    household_id: HouseholdId,
    from: Date,
    to: Date,
    connection: &Connection,
) -> Result<Vec<CategorySpending>, Error> {
    let mut spending = connection
        .prepare(&format!(
            "SELECT t.category_id, COALESCE(c.name, '{UNCATEGORIZED_LABEL}'), SUM(-t.amount)
             FROM \"transaction\" t
             LEFT JOIN category c ON c.id = t.category_id
             LEFT JOIN transaction_type tt ON tt.id = t.transaction_type_id
             WHERE t.household_id = ?1 AND t.date BETWEEN ?2 AND ?3 AND t.amount < 0
                AND {NOT_TRANSFER}
             GROUP BY t.category_id"
        ))?
        .query_map((household_id, from, to), |row| {
            Ok(CategorySpending {
                category_id: row.get(0)?,
                name: row.get(1)?,
                total: row.get(2)?,
                percent: 0.0,
            })
        })?
        .collect::<Result<Vec<_>, rusqlite::Error>>()?;

    let grand_total: f64 = spending.iter().map(|category| category.total).sum();

    for category in &mut spending {
        if grand_total > 0.0 {
            category.percent = category.total * 100.0 / grand_total;
        }
    }

    spending.sort_by(|a, b| {
        b.total
            .total_cmp(&a.total)
            .then_with(|| a.name.cmp(&b.name))
    });

    Ok(spending)
}

/// Get the totals for each of the `months` calendar months ending with the
/// month containing `today`, oldest first.
///
/// Months without transactions are included with zero totals.
///
/// # Errors
///
/// Returns [Error::InvalidQuery] if `months` is not between 1 and 36, or an
/// SQL error.
pub fn monthly_totals(
    household_id: HouseholdId,
    months: u32,
    today: Date,
    connection: &Connection,
) -> Result<Vec<MonthlyTotal>, Error> {
    if !(1..=36).contains(&months) {
        return Err(Error::InvalidQuery(format!(
            "months must be between 1 and 36, got {months}"
        )));
    }

    let start = months_before(today, months - 1);
    let end = next_month(today).previous_day().unwrap_or(today);

    let totals: HashMap<String, (f64, f64)> = connection
        .prepare(&format!(
            "SELECT substr(t.date, 1, 7) AS month,
                COALESCE(SUM(CASE WHEN t.amount > 0 THEN t.amount END), 0),
                COALESCE(SUM(CASE WHEN t.amount < 0 THEN -t.amount END), 0)
             FROM \"transaction\" t
             LEFT JOIN transaction_type tt ON tt.id = t.transaction_type_id
             WHERE t.household_id = ?1 AND t.date BETWEEN ?2 AND ?3 AND {NOT_TRANSFER}
             GROUP BY month"
        ))?
        .query_map((household_id, start, end), |row| {
            Ok((row.get(0)?, (row.get(1)?, row.get(2)?)))
        })?
        .collect::<Result<_, rusqlite::Error>>()?;

    let mut month = first_day_of_month(start);
    let mut monthly_totals = Vec::with_capacity(months as usize);

    for _ in 0..months {
        let label = format_month(month);
        let (income, expenses) = totals.get(&label).copied().unwrap_or((0.0, 0.0));

        monthly_totals.push(MonthlyTotal {
            month: label,
            income,
            expenses,
            net: income - expenses,
        });

        month = next_month(month);
    }

    Ok(monthly_totals)
}

/// Get the totals between `from` and `to` inclusive.
///
/// # Errors
///
/// Returns an [Error::SqlError] if an SQL related error occurred.
pub fn period_totals(
    household_id: HouseholdId,
    from: Date,
    to: Date,
    connection: &Connection,
) -> Result<PeriodTotals, Error> {
    let (income, expenses, count): (f64, f64, i64) = connection.query_row(
        &format!(
            "SELECT
                COALESCE(SUM(CASE WHEN t.amount > 0 AND {NOT_TRANSFER} THEN t.amount END), 0),
                COALESCE(SUM(CASE WHEN t.amount < 0 AND {NOT_TRANSFER} THEN -t.amount END), 0),
                COUNT(*)
             FROM \"transaction\" t
             LEFT JOIN transaction_type tt ON tt.id = t.transaction_type_id
             WHERE t.household_id = ?1 AND t.date BETWEEN ?2 AND ?3"
        ),
        (household_id, from, to),
        |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
    )?;

    Ok(PeriodTotals {
        income,
        expenses,
        net: income - expenses,
        transaction_count: count as u32,
    })
}

/// Get the months that have at least one transaction as `YYYY-MM`, most recent first.
///
/// # Errors
///
/// Returns an [Error::SqlError] if an SQL related error occurred.
pub fn active_months(
    household_id: HouseholdId,
    connection: &Connection,
) -> Result<Vec<String>, Error> {
    connection
        .prepare(
            "SELECT DISTINCT substr(date, 1, 7) AS month FROM \"transaction\"
             WHERE household_id = ?1 ORDER BY month DESC",
        )?
        .query_map([household_id], |row| row.get(0))?
        .collect::<Result<Vec<String>, rusqlite::Error>>()
        .map_err(Error::from)
}

#[cfg(test)]
mod analytics_query_tests {
    use time::macros::date;

    use crate::{
        Error,
        category::{CategoryForm, create_category},
        transaction::{
            TransactionForm,
            test_utils::{TransactionFixture, insert_test_transaction, transaction_fixture},
        },
        transaction_type::{TransactionKind, create_transaction_type},
    };

    use super::{
        UNCATEGORIZED_LABEL, active_months, monthly_totals, period_totals, spending_by_category,
    };

    fn insert_categorized(
        fixture: &TransactionFixture,
        amount: f64,
        date: time::Date,
        category_id: i64,
    ) {
        crate::transaction::insert_transaction(
            fixture.household_id,
            Some(fixture.owner),
            &TransactionForm {
                category_id: Some(category_id),
                ..TransactionForm::new(fixture.account_id, amount, date, "Categorized")
            },
            None,
            &fixture.connection,
        )
        .unwrap();
    }

    #[test]
    fn spending_groups_by_category_and_skips_income() {
        let fixture = transaction_fixture();
        let groceries = create_category(
            fixture.household_id,
            &CategoryForm {
                name: "Groceries".to_owned(),
                budget: None,
            },
            &fixture.connection,
        )
        .unwrap();
        insert_categorized(&fixture, -30.0, date!(2025 - 03 - 02), groceries.id);
        insert_categorized(&fixture, -45.0, date!(2025 - 03 - 09), groceries.id);
        insert_test_transaction(&fixture, -25.0, date!(2025 - 03 - 10), "Owl post");
        insert_test_transaction(&fixture, 1000.0, date!(2025 - 03 - 15), "Salary");
        insert_test_transaction(&fixture, -99.0, date!(2025 - 04 - 01), "Next month");

        let spending = spending_by_category(
            fixture.household_id,
            date!(2025 - 03 - 01),
            date!(2025 - 03 - 31),
            &fixture.connection,
        )
        .unwrap();

        assert_eq!(spending.len(), 2);
        assert_eq!(spending[0].name, "Groceries");
        assert_eq!(spending[0].category_id, Some(groceries.id));
        assert_eq!(spending[0].total, 75.0);
        assert_eq!(spending[0].percent, 75.0);
        assert_eq!(spending[1].name, UNCATEGORIZED_LABEL);
        assert_eq!(spending[1].category_id, None);
        assert_eq!(spending[1].percent, 25.0);
    }

    #[test]
    fn transfers_are_not_income_or_expenses() {
        let fixture = transaction_fixture();
        let transfer = create_transaction_type(
            fixture.household_id,
            "Savings sweep",
            TransactionKind::Transfer,
            &fixture.connection,
        )
        .unwrap();
        crate::transaction::insert_transaction(
            fixture.household_id,
            Some(fixture.owner),
            &TransactionForm {
                transaction_type_id: Some(transfer.id),
                ..TransactionForm::new(fixture.account_id, -500.0, date!(2025 - 03 - 03), "Sweep")
            },
            None,
            &fixture.connection,
        )
        .unwrap();
        insert_test_transaction(&fixture, -20.0, date!(2025 - 03 - 04), "Quills");

        let totals = period_totals(
            fixture.household_id,
            date!(2025 - 03 - 01),
            date!(2025 - 03 - 31),
            &fixture.connection,
        )
        .unwrap();

        assert_eq!(totals.expenses, 20.0);
        assert_eq!(totals.income, 0.0);
        assert_eq!(totals.net, -20.0);
        assert_eq!(totals.transaction_count, 2);
    }

    #[test]
    fn monthly_totals_include_empty_months() {
        let fixture = transaction_fixture();
        insert_test_transaction(&fixture, 100.0, date!(2025 - 01 - 05), "Gift");
        insert_test_transaction(&fixture, -40.0, date!(2025 - 01 - 20), "Robes");
        insert_test_transaction(&fixture, -10.0, date!(2025 - 03 - 02), "Ink");
        insert_test_transaction(&fixture, -999.0, date!(2024 - 10 - 31), "Too old");

        let totals = monthly_totals(
            fixture.household_id,
            4,
            date!(2025 - 03 - 15),
            &fixture.connection,
        )
        .unwrap();

        let months: Vec<&str> = totals.iter().map(|total| total.month.as_str()).collect();
        assert_eq!(months, vec!["2024-12", "2025-01", "2025-02", "2025-03"]);
        assert_eq!(totals[0].expenses, 0.0);
        assert_eq!(totals[1].income, 100.0);
        assert_eq!(totals[1].expenses, 40.0);
        assert_eq!(totals[1].net, 60.0);
        assert_eq!(totals[2].net, 0.0);
        assert_eq!(totals[3].net, -10.0);
    }

    #[test]
    fn monthly_totals_rejects_out_of_range_months() {
        let fixture = transaction_fixture();

        for months in [0, 37] {
            let result = monthly_totals(
                fixture.household_id,
                months,
                date!(2025 - 03 - 15),
                &fixture.connection,
            );

            assert!(matches!(result, Err(Error::InvalidQuery(_))), "got {result:?}");
        }
    }

    #[test]
    fn active_months_most_recent_first() {
        let fixture = transaction_fixture();
        insert_test_transaction(&fixture, -1.0, date!(2024 - 11 - 05), "A");
        insert_test_transaction(&fixture, -1.0, date!(2025 - 02 - 05), "B");
        insert_test_transaction(&fixture, -1.0, date!(2025 - 02 - 06), "C");
        insert_test_transaction(&fixture, -1.0, date!(2024 - 12 - 25), "D");

        let months = active_months(fixture.household_id, &fixture.connection).unwrap();

        assert_eq!(months, vec!["2025-02", "2024-12", "2024-11"]);
    }
}
