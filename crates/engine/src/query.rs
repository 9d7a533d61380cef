//! Filters and pagination for transaction listings.

use chrono::{DateTime, Months, NaiveDate, Utc};
use serde::Serialize;

use crate::{EngineError, ResultEngine};

/// A 1-based page request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PageRequest {
    page: u64,
    limit: u64,
}

impl PageRequest {
    pub fn new(page: u64, limit: u64) -> ResultEngine<Self> {
        if page == 0 {
            return Err(EngineError::InvalidArgument(
                "page must be >= 1".to_string(),
            ));
        }
        if limit == 0 {
            return Err(EngineError::InvalidArgument(
                "limit must be >= 1".to_string(),
            ));
        }
        Ok(Self { page, limit })
    }

    pub fn page(self) -> u64 {
        self.page
    }

    pub fn limit(self) -> u64 {
        self.limit
    }

    /// Number of matching rows to skip before this page.
    pub fn skip(self) -> u64 {
        (self.page - 1).saturating_mul(self.limit)
    }

    /// Number of pages needed for `total_documents` rows (`0` when empty).
    pub fn total_pages(self, total_documents: u64) -> u64 {
        total_documents.div_ceil(self.limit)
    }
}

/// Half-open `[from, to)` interval on `created_at`, in UTC.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DateRange {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
}

impl DateRange {
    /// The whole calendar year when `month` is `None` or `0`, else that month.
    pub fn calendar(year: i32, month: Option<u32>) -> ResultEngine<Self> {
        let out_of_range = || EngineError::InvalidArgument(format!("invalid year: {year}"));
        let (start, span) = match month.unwrap_or(0) {
            0 => (NaiveDate::from_ymd_opt(year, 1, 1), Months::new(12)),
            month @ 1..=12 => (NaiveDate::from_ymd_opt(year, month, 1), Months::new(1)),
            other => {
                return Err(EngineError::InvalidArgument(format!(
                    "invalid month: {other}"
                )));
            }
        };
        let start = start.ok_or_else(out_of_range)?;
        let end = start.checked_add_months(span).ok_or_else(out_of_range)?;
        Ok(Self {
            from: start.and_time(chrono::NaiveTime::MIN).and_utc(),
            to: end.and_time(chrono::NaiveTime::MIN).and_utc(),
        })
    }

    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.from <= at && at < self.to
    }
}

/// Predicate shared by the page query and its count query.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TransactionFilter {
    pub user_id: String,
    pub created: Option<DateRange>,
    /// Exact match.
    pub subject: Option<String>,
    /// Exact match; `None` does not filter.
    pub counterparty: Option<String>,
}

impl TransactionFilter {
    pub fn user(user_id: &str) -> Self {
        Self {
            user_id: user_id.to_string(),
            ..Default::default()
        }
    }

    pub fn created_in(mut self, range: DateRange) -> Self {
        self.created = Some(range);
        self
    }

    pub fn subject(mut self, subject: &str, counterparty: Option<&str>) -> Self {
        self.subject = Some(subject.to_string());
        self.counterparty = counterparty
            .filter(|c| !c.is_empty())
            .map(ToString::to_string);
        self
    }

    /// In-process evaluation of the predicate, used by the memory gateway.
    pub fn matches(&self, tx: &crate::Transaction) -> bool {
        tx.user_id == self.user_id
            && self.created.is_none_or(|range| range.contains(tx.created_at))
            && self.subject.as_ref().is_none_or(|s| *s == tx.subject)
            && self
                .counterparty
                .as_ref()
                .is_none_or(|c| *c == tx.counterparty)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Sort {
    #[default]
    CreatedAtDesc,
    CreatedAtAsc,
}

/// One page of results plus the metadata needed to walk the rest.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: u64,
    pub limit: u64,
    pub total_documents: u64,
    pub total_pages: u64,
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn rejects_non_positive_page_and_limit() {
        assert!(PageRequest::new(0, 20).is_err());
        assert!(PageRequest::new(1, 0).is_err());
        assert_eq!(PageRequest::new(3, 20).unwrap().skip(), 40);
    }

    #[test]
    fn total_pages_rounds_up() {
        let request = PageRequest::new(1, 20).unwrap();
        assert_eq!(request.total_pages(45), 3);
        assert_eq!(request.total_pages(40), 2);
        assert_eq!(request.total_pages(0), 0);
    }

    #[test]
    fn month_range_is_half_open() {
        let march = DateRange::calendar(2024, Some(3)).unwrap();
        let first_instant = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        assert!(march.contains(first_instant));
        assert!(!DateRange::calendar(2024, Some(2)).unwrap().contains(first_instant));
        assert_eq!(march.to, Utc.with_ymd_and_hms(2024, 4, 1, 0, 0, 0).unwrap());
    }

    #[test]
    fn december_rolls_into_next_year() {
        let december = DateRange::calendar(2023, Some(12)).unwrap();
        assert_eq!(
            december.to,
            Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
        );
    }

    #[test]
    fn missing_month_means_whole_year() {
        let year = DateRange::calendar(2024, None).unwrap();
        assert_eq!(year, DateRange::calendar(2024, Some(0)).unwrap());
        assert_eq!(year.from, Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
        assert_eq!(year.to, Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap());
        assert!(DateRange::calendar(2024, Some(13)).is_err());
    }
}
