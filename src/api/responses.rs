//! Shared API response types

use serde::Serialize;

use crate::models::PagedResult;

/// Paginated list response
#[derive(Debug, Serialize)]
pub struct PageResponse<T> {
    pub items: Vec<T>,
    pub total: i64,
    pub page: u32,
    pub page_size: u32,
    pub total_pages: u32,
    pub has_next: bool,
}

impl<T> From<PagedResult<T>> for PageResponse<T> {
    fn from(result: PagedResult<T>) -> Self {
        let total_pages = result.total_pages();
        let has_next = result.has_next();
        Self {
            items: result.items,
            total: result.total,
            page: result.page,
            page_size: result.per_page,
            total_pages,
            has_next,
        }
    }
}

/// `{ "items": [...] }` wrapper for unpaginated lists
#[derive(Debug, Serialize)]
pub struct ListResponse<T> {
    pub items: Vec<T>,
}

impl<T> From<Vec<T>> for ListResponse<T> {
    fn from(items: Vec<T>) -> Self {
        Self { items }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ListParams;

    #[test]
    fn test_page_response_metadata() {
        let params = ListParams::new(2, 10);
        let response: PageResponse<i32> = PagedResult::new(vec![1, 2, 3], 23, &params).into();
        assert_eq!(response.total_pages, 3);
        assert!(response.has_next);
        assert_eq!(response.page_size, 10);
    }
}
