//! Importing transactions from CSV bank statements.

mod csv;
mod import_transactions;

pub use import_transactions::import_transactions_endpoint;
