use serde::{Deserialize, Serialize};

use crate::utils::constants::{DEFAULT_LIMIT, DEFAULT_PAGE, MAX_LIMIT};

#[derive(Debug, Deserialize)]
pub struct PaginationQuery {
    pub page: Option<usize>,
    pub limit: Option<usize>,
}

impl PaginationQuery {
    pub fn page(&self) -> usize {
        self.page.unwrap_or(DEFAULT_PAGE).max(1)
    }

    pub fn limit(&self) -> usize {
        self.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT)
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub page: usize,
    pub limit: usize,
    pub total: usize,
    pub total_pages: usize,
    pub has_prev: bool,
    pub has_next: bool,
}

impl Pagination {
    pub fn new(page: usize, limit: usize, total: usize) -> Self {
        let limit = limit.max(1);
        let total_pages = total.div_ceil(limit).max(1);
        let page = page.clamp(1, total_pages);
        Self {
            page,
            limit,
            total,
            total_pages,
            has_prev: page > 1,
            has_next: page < total_pages,
        }
    }

    pub fn offset(&self) -> usize {
        (self.page - 1) * self.limit
    }

    /// Inclusive end index, as sorted-set range commands expect.
    pub fn last_index(&self) -> usize {
        self.offset() + self.limit - 1
    }
}
