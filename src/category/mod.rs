//! Spending categories and their monthly budgets.

mod core;
mod endpoints;

pub use core::{
    Category, CategoryForm, CategoryId, CategoryName, create_category, create_category_table,
    delete_category, find_category_by_name, get_categories, get_category, update_category,
};
pub use endpoints::{
    create_category_endpoint, delete_category_endpoint, get_category_endpoint,
    list_categories_endpoint, update_category_endpoint,
};
