//! This modules defines the common functionality for paging data.

use serde::Serialize;

use crate::Error;

/// The config for pagination
#[derive(Debug, Clone)]
pub struct PaginationConfig {
    /// The page number to default to when not specified in a request.
    pub default_page: u64,
    /// The number of items per page when not specified in a request.
    pub default_page_size: u64,
    /// The largest page size a client may request.
    pub max_page_size: u64,
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            default_page: 1,
            default_page_size: 20,
            max_page_size: 100,
        }
    }
}

impl PaginationConfig {
    /// Resolve the requested page and page size, filling in defaults.
    ///
    /// # Errors
    ///
    /// Returns [Error::InvalidQuery] if `page` is zero or `per_page` is not
    /// between one and [PaginationConfig::max_page_size].
    pub fn resolve(&self, page: Option<u64>, per_page: Option<u64>) -> Result<(u64, u64), Error> {
        let page = page.unwrap_or(self.default_page);
        let per_page = per_page.unwrap_or(self.default_page_size);

        if page == 0 {
            return Err(Error::InvalidQuery("page must be at least 1".to_owned()));
        }

        if per_page == 0 || per_page > self.max_page_size {
            return Err(Error::InvalidQuery(format!(
                "per_page must be between 1 and {}",
                self.max_page_size
            )));
        }

        Ok((page, per_page))
    }
}

/// One page of a longer list of items.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page<T> {
    /// The items on this page.
    pub items: Vec<T>,
    /// The 1-based page number.
    pub page: u64,
    /// The maximum number of items per page.
    pub per_page: u64,
    /// The number of items across all pages.
    pub total_items: u64,
    /// The number of pages, zero when there are no items.
    pub total_pages: u64,
}

impl<T> Page<T> {
    /// Wrap `items` with the paging metadata.
    pub fn new(items: Vec<T>, page: u64, per_page: u64, total_items: u64) -> Self {
        Self {
            items,
            page,
            per_page,
            total_items,
            total_pages: total_items.div_ceil(per_page),
        }
    }
}
