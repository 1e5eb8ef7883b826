//! Transaction management for a household.
//!
//! This module contains everything related to transactions:
//! - The `Transaction` model and the form used to create and update one
//! - Database functions for storing, querying, and managing transactions
//! - Route handlers for the transaction endpoints

mod core;
mod endpoints;
mod query;

#[cfg(test)]
pub(crate) mod test_utils;

pub use core::{
    Transaction, TransactionForm, TransactionId, create_transaction, create_transaction_table,
    delete_transaction, get_transaction, update_transaction,
};
pub(crate) use core::insert_transaction;
pub use endpoints::{
    create_transaction_endpoint, delete_transaction_endpoint, get_transaction_endpoint,
    list_transactions_endpoint, update_transaction_endpoint,
};
pub(crate) use query::check_date_range;
pub use query::{TransactionQuery, get_transactions_in_range, query_transactions};
