//! # Pagination
//!
//! Window calculation shared by every list endpoint. Inputs are sanitized,
//! never rejected: a bad page or size is clamped into range.

use serde::{Deserialize, Serialize};

/// Upper bound on the number of items a single page may carry.
pub const MAX_PAGE_SIZE: i64 = 100;

/// Number of page links shown in one navigation block.
pub const PAGE_BLOCK: i64 = 10;

/// Highest page number honoured. Keeps `offset()` within `i64` for every size.
pub const MAX_PAGE: i64 = i64::MAX / MAX_PAGE_SIZE;

/// Page selection as supplied by a caller (e.g., `?page=2&size=20`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PageRequest {
    pub page: i64,
    pub size: i64,
}

impl Default for PageRequest {
    fn default() -> Self {
        Self { page: 1, size: 10 }
    }
}

impl PageRequest {
    pub fn new(page: i64, size: i64) -> Self {
        Self { page, size }
    }

    pub fn clamped_page(&self) -> i64 {
        self.page.clamp(1, MAX_PAGE)
    }

    pub fn clamped_size(&self) -> i64 {
        self.size.clamp(1, MAX_PAGE_SIZE)
    }

    /// Rows to skip in the store query.
    pub fn offset(&self) -> i64 {
        (self.clamped_page() - 1) * self.clamped_size()
    }

    /// Rows to fetch in the store query.
    pub fn limit(&self) -> i64 {
        self.clamped_size()
    }
}

/// The navigation window around the current page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageWindow {
    pub page: i64,
    pub size: i64,
    pub start: i64,
    pub end: i64,
    pub has_prev: bool,
    pub has_next: bool,
}

impl PageWindow {
    pub fn compute(page: i64, size: i64, total: i64) -> Self {
        let request = PageRequest::new(page, size);
        let page = request.clamped_page();
        let size = request.clamped_size();

        if total <= 0 {
            return Self {
                page,
                size,
                start: 1,
                end: 1,
                has_prev: false,
                has_next: false,
            };
        }

        let block_end = div_ceil(page, PAGE_BLOCK) * PAGE_BLOCK;
        let start = block_end - (PAGE_BLOCK - 1);
        let last = div_ceil(total, size);
        let end = block_end.min(last);

        Self {
            page,
            size,
            start,
            end,
            has_prev: start > 1,
            has_next: total > end.saturating_mul(size),
        }
    }
}

// Both operands are positive at every call site.
fn div_ceil(n: i64, d: i64) -> i64 {
    n / d + i64::from(n % d != 0)
}

/// One page of results together with its navigation window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page<T> {
    #[serde(flatten)]
    pub window: PageWindow,
    pub total: i64,
    pub items: Vec<T>,
}

impl<T> Page<T> {
    pub fn new(request: PageRequest, items: Vec<T>, total: i64) -> Self {
        Self {
            window: PageWindow::compute(request.page, request.size, total),
            total,
            items,
        }
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            window: self.window,
            total: self.total,
            items: self.items.into_iter().map(f).collect(),
        }
    }
}
