//! Pagination and date filtering for visit listings.

use chrono::{DateTime, Utc};

/// Optional inclusive bounds on a visit's date.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DateRange {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

impl DateRange {
    /// A range without bounds.
    pub fn all() -> Self {
        Self::default()
    }

    pub fn between(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self {
            start: Some(start),
            end: Some(end),
        }
    }

    pub fn since(start: DateTime<Utc>) -> Self {
        Self {
            start: Some(start),
            end: None,
        }
    }

    pub fn until(end: DateTime<Utc>) -> Self {
        Self {
            start: None,
            end: Some(end),
        }
    }

    pub fn contains(&self, date: DateTime<Utc>) -> bool {
        self.start.is_none_or(|start| date >= start) && self.end.is_none_or(|end| date <= end)
    }
}

/// Caller-supplied listing parameters.
///
/// `page` is 1-based. `items_per_page: None` returns every matching visit on
/// a single page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VisitsParams {
    pub date_range: DateRange,
    pub page: u32,
    pub items_per_page: Option<u32>,
}

impl Default for VisitsParams {
    fn default() -> Self {
        Self {
            date_range: DateRange::all(),
            page: 1,
            items_per_page: None,
        }
    }
}

impl VisitsParams {
    pub fn new(date_range: DateRange, page: u32, items_per_page: Option<u32>) -> Self {
        Self {
            date_range,
            page,
            items_per_page,
        }
    }

    /// Effective page number; page `0` is treated as the first page.
    pub fn current_page(&self) -> u32 {
        self.page.max(1)
    }

    /// Converts the page parameters to a storage `(offset, limit)` pair.
    ///
    /// `limit` is `None` when every item is requested.
    pub fn offset_limit(&self) -> (i64, Option<i64>) {
        match self.items_per_page {
            Some(per_page) => {
                let per_page = i64::from(per_page);
                ((i64::from(self.current_page()) - 1) * per_page, Some(per_page))
            }
            None => (0, None),
        }
    }
}

/// One page of results plus the totals needed to navigate the rest.
#[derive(Debug, Clone, PartialEq)]
pub struct Paginator<T> {
    pub items: Vec<T>,
    pub current_page: u32,
    pub items_per_page: Option<u32>,
    pub total_items: i64,
}

impl<T> Paginator<T> {
    pub fn new(items: Vec<T>, params: &VisitsParams, total_items: i64) -> Self {
        Self {
            items,
            current_page: params.current_page(),
            items_per_page: params.items_per_page,
            total_items,
        }
    }

    pub fn pages_count(&self) -> u32 {
        match self.items_per_page {
            Some(0) => 0,
            Some(per_page) => ((self.total_items as f64) / f64::from(per_page)).ceil() as u32,
            None if self.total_items > 0 => 1,
            None => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
