//! Pagination utilities for the source listing

use serde::Deserialize;

/// Requested page from `?page=&per_page=` query parameters
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

/// Upper bound on `per_page` accepted from the query string
pub const MAX_PER_PAGE: i64 = 500;

/// Pagination metadata calculated from total results
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    /// Current page number (1-indexed)
    pub page: i64,
    /// Rows per page
    pub per_page: i64,
    /// Total number of pages
    pub total_pages: i64,
    /// Offset for SQL LIMIT/OFFSET query
    pub offset: i64,
}

impl Pagination {
    pub fn has_previous(&self) -> bool {
        self.page > 1
    }

    pub fn has_next(&self) -> bool {
        self.page < self.total_pages
    }
}

/// Calculate pagination metadata from total results and requested page
///
/// Ensures page is within valid bounds [1, total_pages] and per-page within
/// [1, MAX_PER_PAGE]; a missing or non-positive per-page uses `default_per_page`.
///
/// # Examples
/// ```
/// use evcal_sources::pagination::calculate_pagination;
///
/// // 70 total results at 30 per page = 3 pages (30 + 30 + 10)
/// let p = calculate_pagination(70, Some(2), Some(30), 30);
/// assert_eq!(p.page, 2);
/// assert_eq!(p.total_pages, 3);
/// assert_eq!(p.offset, 30);
///
/// // Requesting out-of-bounds page gets clamped
/// let p = calculate_pagination(70, Some(99), None, 30);
/// assert_eq!(p.page, 3);
/// assert_eq!(p.offset, 60);
/// ```
pub fn calculate_pagination(
    total_results: i64,
    requested_page: Option<i64>,
    requested_per_page: Option<i64>,
    default_per_page: i64,
) -> Pagination {
    let per_page = requested_per_page
        .filter(|n| *n > 0)
        .unwrap_or(default_per_page)
        .clamp(1, MAX_PER_PAGE);
    let total_pages = (total_results + per_page - 1) / per_page;
    let page = requested_page.unwrap_or(1).max(1).min(total_pages.max(1));
    let offset = (page - 1) * per_page;

    Pagination {
        page,
        per_page,
        total_pages,
        offset,
    }
}
