//! This module defines the common functionality for paging data.

use serde::{Deserialize, Serialize};

/// The page number to use when a request does not specify one.
pub const DEFAULT_PAGE: u64 = 0;
/// The page size to use when a request does not specify one.
pub const DEFAULT_PAGE_SIZE: u64 = 10;
/// The sort field to use when a request does not specify one.
pub const DEFAULT_SORT_BY: &str = "id";

/// The paging and sorting query parameters shared by the list endpoints.
#[derive(Debug, Clone, Deserialize)]
pub struct PageParams {
    /// The zero-based page number to fetch.
    #[serde(default)]
    pub page: u64,
    /// The number of items per page.
    #[serde(default = "default_page_size")]
    pub size: u64,
    /// The field to sort by. Unknown fields fall back to sorting by id.
    #[serde(default = "default_sort_by", rename = "sortBy")]
    pub sort_by: String,
}

impl Default for PageParams {
    fn default() -> Self {
        Self {
            page: DEFAULT_PAGE,
            size: DEFAULT_PAGE_SIZE,
            sort_by: DEFAULT_SORT_BY.to_owned(),
        }
    }
}

pub(crate) fn default_page_size() -> u64 {
    DEFAULT_PAGE_SIZE
}

pub(crate) fn default_sort_by() -> String {
    DEFAULT_SORT_BY.to_owned()
}

/// A bounded, sorted slice of a larger result set plus total-count metadata.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    /// The items on this page.
    pub items: Vec<T>,
    /// The zero-based number of this page.
    pub page_number: u64,
    /// The requested page size (not the number of items actually returned).
    pub page_size: u64,
    /// The total number of items across all pages.
    pub total_elements: u64,
    /// The field the results are sorted by.
    pub sort_field: String,
}

impl<T> Page<T> {
    /// Create a page from the items of one page plus the query metadata.
    pub fn new(
        items: Vec<T>,
        page_number: u64,
        page_size: u64,
        total_elements: u64,
        sort_field: String,
    ) -> Self {
        Self {
            items,
            page_number,
            page_size,
            total_elements,
            sort_field,
        }
    }
}

#[cfg(test)]
mod page_params_tests {
    use serde_json::json;

    use super::{DEFAULT_PAGE, DEFAULT_PAGE_SIZE, DEFAULT_SORT_BY, PageParams};

    #[test]
    fn missing_parameters_use_defaults() {
        let params: PageParams = serde_json::from_value(json!({})).unwrap();

        assert_eq!(params.page, DEFAULT_PAGE);
        assert_eq!(params.size, DEFAULT_PAGE_SIZE);
        assert_eq!(params.sort_by, DEFAULT_SORT_BY);
    }

    #[test]
    fn explicit_parameters_are_kept() {
        let params: PageParams =
            serde_json::from_value(json!({"page": 2, "size": 5, "sortBy": "category"})).unwrap();

        assert_eq!(params.page, 2);
        assert_eq!(params.size, 5);
        assert_eq!(params.sort_by, "category");
    }
}

#[cfg(test)]
mod page_tests {
    use super::Page;

    #[test]
    fn serializes_with_camel_case_metadata() {
        let page = Page::new(vec![1, 2, 3], 0, 10, 3, "id".to_owned());

        let json = serde_json::to_value(&page).unwrap();

        assert_eq!(json["items"], serde_json::json!([1, 2, 3]));
        assert_eq!(json["pageNumber"], 0);
        assert_eq!(json["pageSize"], 10);
        assert_eq!(json["totalElements"], 3);
        assert_eq!(json["sortField"], "id");
    }
}
