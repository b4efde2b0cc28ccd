//! Page slicing over already-fetched results

use serde::Serialize;

/// Paging metadata
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Pagination {
    pub page: usize,
    pub per_page: usize,
    pub total: usize,
    pub pages: usize,
    pub has_prev: bool,
    pub has_next: bool,
}

/// One page of items
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page<T> {
    pub data: Vec<T>,
    pub pagination: Pagination,
}

/// Slice `items` into page `page` (1-based) of `per_page` items.
///
/// `page` below 1 is treated as 1 and `per_page` below 1 as 1. A page past
/// the end is empty but still reports the totals.
pub fn paginate<T: Clone>(items: &[T], page: usize, per_page: usize) -> Page<T> {
    let page = page.max(1);
    let per_page = per_page.max(1);
    let total = items.len();
    let pages = total.div_ceil(per_page);

    let start = (page - 1).saturating_mul(per_page).min(total);
    let end = start.saturating_add(per_page).min(total);

    Page {
        data: items[start..end].to_vec(),
        pagination: Pagination {
            page,
            per_page,
            total,
            pages,
            has_prev: page > 1,
            has_next: end < total,
        },
    }
}
