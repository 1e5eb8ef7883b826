//! Bank accounts and credit cards whose balances a household tracks.

mod core;
mod endpoints;

pub use core::{
    Account, AccountForm, AccountId, create_account, create_account_table, delete_account,
    get_account, get_accounts, get_total_account_balance, update_account,
};
pub use endpoints::{
    create_account_endpoint, delete_account_endpoint, get_account_endpoint,
    list_accounts_endpoint, update_account_endpoint,
};
