//! Pagination and sort-direction types shared by the cache and drivers.

use serde::{Deserialize, Serialize};

/// A page request. `page` is 1-indexed; a page of `0` is read as page `1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    pub page: u32,
    pub page_size: u32,
}

impl Pagination {
    pub fn new(page: u32, page_size: u32) -> Self {
        Self { page, page_size }
    }

    /// Index of the first item on this page.
    pub fn offset(&self) -> usize {
        self.page.saturating_sub(1) as usize * self.page_size as usize
    }

    /// Maximum number of items on this page.
    pub fn limit(&self) -> usize {
        self.page_size as usize
    }

    /// Slice `items` down to this page.
    pub fn slice<'a, T>(&self, items: &'a [T]) -> &'a [T] {
        let start = self.offset().min(items.len());
        let end = start.saturating_add(self.limit()).min(items.len());
        &items[start..end]
    }
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            page: 1,
            page_size: 20,
        }
    }
}

/// Sort direction for resident session and message views.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Ascend,
    Descend,
}
