use rusqlite::Connection;
use time::{Date, macros::date};

use crate::{
    account::{AccountForm, AccountId, create_account},
    auth::UserID,
    household::{HouseholdId, create_household},
    test_utils::{get_test_connection, insert_test_user},
    transaction::{Transaction, TransactionForm, insert_transaction},
};

/// A household with an owner and one account, ready for transactions.
pub struct TransactionFixture {
    pub connection: Connection,
    pub household_id: HouseholdId,
    pub owner: UserID,
    pub account_id: AccountId,
}

pub fn transaction_fixture() -> TransactionFixture {
    let connection = get_test_connection();
    let owner = insert_test_user("arthur@burrow.com", &connection);
    let household = create_household("The Burrow", owner, &connection).unwrap();
    let account = create_account(
        household.id,
        &AccountForm {
            name: "Everyday".to_owned(),
            balance: 0.0,
            date: date!(2025 - 01 - 01),
        },
        &connection,
    )
    .unwrap();

    TransactionFixture {
        connection,
        household_id: household.id,
        owner,
        account_id: account.id,
    }
}

#[track_caller]
pub fn insert_test_transaction(
    fixture: &TransactionFixture,
    amount: f64,
    date: Date,
    description: &str,
) -> Transaction {
    insert_transaction(
        fixture.household_id,
        Some(fixture.owner),
        &TransactionForm::new(fixture.account_id, amount, date, description),
        None,
        &fixture.connection,
    )
    .expect("could not insert test transaction")
}
