//! Page-number pagination with clamping.
//!
//! Requests never fail on a bad page: non-numeric input becomes page 1, values
//! below 1 clamp to the first page and values past the end clamp to the last.

use serde::Serialize;

/// Page number as supplied by the caller, before clamping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PageNumber(i64);

impl PageNumber {
    pub const FIRST: PageNumber = PageNumber(1);

    /// Parse a raw `page` parameter; anything non-numeric is page 1.
    pub fn parse(raw: Option<&str>) -> Self {
        raw.and_then(|value| value.trim().parse::<i64>().ok())
            .map(PageNumber)
            .unwrap_or(Self::FIRST)
    }

    pub fn new(value: i64) -> Self {
        Self(value)
    }

    pub fn get(self) -> i64 {
        self.0
    }
}

impl Default for PageNumber {
    fn default() -> Self {
        Self::FIRST
    }
}

/// The resolved position of one page inside a result set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PageWindow {
    pub number: u64,
    pub page_size: u64,
    pub total_count: u64,
    pub total_pages: u64,
}

impl PageWindow {
    /// Resolve `requested` against `total_count` items. An empty result set
    /// still has one (empty) page.
    pub fn resolve(requested: PageNumber, page_size: u32, total_count: u64) -> Self {
        let page_size = u64::from(page_size.max(1));
        let total_pages = total_count.div_ceil(page_size).max(1);
        let number = match u64::try_from(requested.get()) {
            Ok(0) | Err(_) => 1,
            Ok(number) => number.min(total_pages),
        };

        Self {
            number,
            page_size,
            total_count,
            total_pages,
        }
    }

    pub fn offset(&self) -> u64 {
        (self.number - 1) * self.page_size
    }

    pub fn limit(&self) -> u64 {
        self.page_size
    }

    pub fn has_next(&self) -> bool {
        self.number < self.total_pages
    }

    pub fn has_previous(&self) -> bool {
        self.number > 1
    }

    pub fn next_number(&self) -> Option<u64> {
        self.has_next().then(|| self.number + 1)
    }

    pub fn previous_number(&self) -> Option<u64> {
        self.has_previous().then(|| self.number - 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_numeric_page_defaults_to_first() {
        assert_eq!(PageNumber::parse(Some("abc")), PageNumber::FIRST);
        assert_eq!(PageNumber::parse(Some("")), PageNumber::FIRST);
        assert_eq!(PageNumber::parse(None), PageNumber::FIRST);
        assert_eq!(PageNumber::parse(Some(" 3 ")).get(), 3);
    }

    #[test]
    fn zero_and_negative_pages_clamp_to_first() {
        for requested in [0, -1, i64::MIN] {
            let window = PageWindow::resolve(PageNumber::new(requested), 24, 100);
            assert_eq!(window.number, 1);
            assert_eq!(window.offset(), 0);
        }
    }

    #[test]
    fn pages_past_the_end_clamp_to_last() {
        let window = PageWindow::resolve(PageNumber::new(99), 24, 50);
        assert_eq!(window.total_pages, 3);
        assert_eq!(window.number, 3);
        assert_eq!(window.offset(), 48);
        assert!(!window.has_next());
        assert!(window.has_previous());
    }

    #[test]
    fn empty_result_set_has_one_page() {
        let window = PageWindow::resolve(PageNumber::new(5), 32, 0);
        assert_eq!(window.total_pages, 1);
        assert_eq!(window.number, 1);
        assert!(!window.has_next());
        assert!(!window.has_previous());
    }
}
