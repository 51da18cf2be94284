use serde::{Deserialize, Serialize};

const fn default_page() -> u64 {
    1
}

/// Pages are 1 based. Page 0 is treated the same as page 1.
/// A missing `page_size` means "everything on one page".
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Hash, Copy, Clone)]
pub struct Pagination {
    #[serde(default = "default_page")]
    pub page: u64,
    pub page_size: Option<u64>,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            page: default_page(),
            page_size: None,
        }
    }
}

impl Pagination {
    pub fn unpaged() -> Self {
        Self::default()
    }

    pub fn with_page_size(page: u64, page_size: u64) -> Self {
        Self {
            page,
            page_size: Some(page_size),
        }
    }

    pub fn first_page(&self) -> Self {
        Self {
            page: default_page(),
            page_size: self.page_size,
        }
    }

    /// The `[start, end)` slice of `len` items this page covers.
    pub fn bounds(&self, len: usize) -> (usize, usize) {
        match self.page_size {
            None => (0, len),
            Some(page_size) => {
                let page_size = usize::try_from(page_size).unwrap_or(usize::MAX);
                let page_index = usize::try_from(self.page.max(1) - 1).unwrap_or(usize::MAX);
                let start = page_index.saturating_mul(page_size).min(len);
                let end = start.saturating_add(page_size).min(len);
                (start, end)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::first(Pagination::with_page_size(1, 10), 25, (0, 10))]
    #[case::zero_is_first(Pagination::with_page_size(0, 10), 25, (0, 10))]
    #[case::last_partial(Pagination::with_page_size(3, 10), 25, (20, 25))]
    #[case::past_the_end(Pagination::with_page_size(9, 10), 25, (25, 25))]
    #[case::unpaged(Pagination::unpaged(), 25, (0, 25))]
    #[case::huge_page(Pagination::with_page_size(u64::MAX, u64::MAX), 3, (3, 3))]
    fn bounds(#[case] pagination: Pagination, #[case] len: usize, #[case] expected: (usize, usize)) {
        assert_eq!(expected, pagination.bounds(len));
    }
}
