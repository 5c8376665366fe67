//! Small shared primitives used across crate boundaries.

use serde::{Deserialize, Serialize};

/// Page request, already clamped to the bounds `page >= 1`,
/// `1 <= page_size <= 200`. Construct via [`Pagination::clamp`] rather than
/// the struct literal so the invariant can't be bypassed.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Pagination {
    pub page: u32,
    pub page_size: u32,
}

impl Pagination {
    pub const MAX_PAGE_SIZE: u32 = 200;

    /// Validate raw query parameters. `page_size = 0` is rejected outright
    /// (boundary behavior); values above the max are clamped.
    pub fn clamp(page: u32, page_size: u32) -> Result<Self, String> {
        if page < 1 {
            return Err("page must be >= 1".to_string());
        }
        if page_size == 0 {
            return Err("page_size must be >= 1".to_string());
        }
        let page_size = page_size.min(Self::MAX_PAGE_SIZE);
        Ok(Self { page, page_size })
    }

    pub fn offset(&self) -> i64 {
        ((self.page - 1) * self.page_size) as i64
    }

    pub fn limit(&self) -> i64 {
        self.page_size as i64
    }
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            page: 1,
            page_size: 50,
        }
    }
}
