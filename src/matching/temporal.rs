//! Calendar-date matching.
//!
//! Every input is treated as a calendar date with no time-of-day. Anything that
//! fails to parse simply does not match.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Parses the leading `YYYY-MM-DD` of a date or timestamp string.
///
/// Catalogs hand out full RFC 3339 timestamps as often as plain dates, so only
/// the first ten characters are considered.
#[must_use]
pub fn parse_date(value: &str) -> Option<NaiveDate> {
    let head = value.trim().get(..10)?;
    NaiveDate::parse_from_str(head, "%Y-%m-%d").ok()
}

/// Whether two date strings fall within `tolerance_days` of each other.
///
/// ```rust
/// use franchise_sync::matching::temporal::dates_match;
///
/// assert!(dates_match(Some("2020-01-15"), Some("2020-02-10"), 30));
/// assert!(!dates_match(Some("2020-01-15"), None, 30));
/// ```
#[must_use]
pub fn dates_match(a: Option<&str>, b: Option<&str>, tolerance_days: i64) -> bool {
    match (a.and_then(parse_date), b.and_then(parse_date)) {
        (Some(a), Some(b)) => days_between(a, b) <= tolerance_days,
        _ => false,
    }
}

fn days_between(a: NaiveDate, b: NaiveDate) -> i64 {
    (a - b).num_days().abs()
}

/// Closed date interval. A range whose end equals its start is a point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    /// Builds a range, swapping the bounds if they arrive reversed.
    #[must_use]
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        if end < start {
            Self { start: end, end: start }
        } else {
            Self { start, end }
        }
    }

    /// A range for a release that only has a start date.
    #[must_use]
    pub const fn point(date: NaiveDate) -> Self {
        Self {
            start: date,
            end: date,
        }
    }

    /// Range from optional bounds. A missing end collapses to the start.
    #[must_use]
    pub fn from_bounds(start: Option<NaiveDate>, end: Option<NaiveDate>) -> Option<Self> {
        let start = start?;
        Some(end.map_or_else(|| Self::point(start), |end| Self::new(start, end)))
    }

    /// Smallest range covering every date in `dates`.
    pub fn spanning<I>(dates: I) -> Option<Self>
    where
        I: IntoIterator<Item = NaiveDate>,
    {
        dates.into_iter().fold(None, |acc: Option<Self>, date| {
            Some(acc.map_or_else(
                || Self::point(date),
                |range| Self {
                    start: range.start.min(date),
                    end: range.end.max(date),
                },
            ))
        })
    }

    #[must_use]
    pub fn is_point(&self) -> bool {
        self.start == self.end
    }

    /// Strict containment of a single day, no tolerance.
    #[must_use]
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }

    /// Days shared by both ranges. Negative when they are disjoint.
    #[must_use]
    pub fn overlap_days(&self, other: &Self) -> i64 {
        let start = self.start.max(other.start);
        let end = self.end.min(other.end);
        (end - start).num_days()
    }
}

/// Range overlap with a tolerance window on both ends.
///
/// Two ranges overlap when `start1 <= end2 + tolerance` and
/// `end1 >= start2 - tolerance`. A point is matched by containment in the other
/// range widened by the tolerance. A tolerance that pushes a bound past the
/// calendar limits never matches.
#[must_use]
pub fn overlaps(a: &DateRange, b: &DateRange, tolerance_days: i64) -> bool {
    let Some(tolerance) = chrono::Duration::try_days(tolerance_days) else {
        return false;
    };

    if a.is_point() {
        return widened(b, tolerance).is_some_and(|w| w.contains(a.start));
    }
    if b.is_point() {
        return widened(a, tolerance).is_some_and(|w| w.contains(b.start));
    }

    widened(b, tolerance).is_some_and(|w| a.start <= w.end && a.end >= w.start)
}

fn widened(range: &DateRange, tolerance: chrono::Duration) -> Option<DateRange> {
    Some(DateRange {
        start: range.start.checked_sub_signed(tolerance)?,
        end: range.end.checked_add_signed(tolerance)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        parse_date(s).unwrap()
    }

    #[test]
    fn test_dates_match_identical() {
        assert!(dates_match(Some("2020-01-15"), Some("2020-01-15"), 30));
    }

    #[test]
    fn test_dates_match_within_tolerance() {
        assert!(dates_match(Some("2020-01-15"), Some("2020-02-10"), 30));
    }

    #[test]
    fn test_dates_match_outside_tolerance() {
        assert!(!dates_match(Some("2020-01-15"), Some("2020-03-15"), 30));
    }

    #[test]
    fn test_dates_match_missing_or_garbage() {
        assert!(!dates_match(None, Some("2020-01-15"), 30));
        assert!(!dates_match(Some("soon"), Some("2020-01-15"), 30));
        assert!(!dates_match(Some(""), Some(""), 30));
    }

    #[test]
    fn test_parse_date_accepts_timestamps() {
        assert_eq!(
            parse_date("2019-04-06T00:00:00+00:00"),
            Some(NaiveDate::from_ymd_opt(2019, 4, 6).unwrap())
        );
        assert_eq!(parse_date("2019-4-6"), None);
    }

    #[test]
    fn test_overlap_with_tolerance() {
        let a = DateRange::new(date("2020-01-01"), date("2020-03-31"));
        let b = DateRange::new(date("2020-04-20"), date("2020-06-30"));
        assert!(overlaps(&a, &b, 30));
        assert!(!overlaps(&a, &b, 10));
    }

    #[test]
    fn test_point_uses_containment() {
        let season = DateRange::new(date("2021-01-10"), date("2021-03-28"));
        let movie = DateRange::point(date("2021-02-14"));
        let late = DateRange::point(date("2021-06-01"));
        assert!(overlaps(&movie, &season, 0));
        assert!(overlaps(&season, &movie, 0));
        assert!(!overlaps(&late, &season, 30));
    }

    #[test]
    fn test_huge_tolerance_does_not_match() {
        let a = DateRange::new(date("2020-01-01"), date("2020-03-31"));
        let point = DateRange::point(date("2020-02-01"));
        assert!(!overlaps(&a, &a, 1_000_000_000));
        assert!(!overlaps(&point, &a, i64::MAX));
        assert!(!overlaps(&a, &point, i64::MIN));
        assert!(overlaps(&a, &a, 3650));
    }

    #[test]
    fn test_range_from_bounds() {
        let r = DateRange::from_bounds(Some(date("2020-01-01")), None).unwrap();
        assert!(r.is_point());
        assert!(DateRange::from_bounds(None, Some(date("2020-01-01"))).is_none());
        let swapped = DateRange::new(date("2020-02-01"), date("2020-01-01"));
        assert_eq!(swapped.start, date("2020-01-01"));
    }

    #[test]
    fn test_spanning_and_overlap_days() {
        let span = DateRange::spanning([date("2020-03-01"), date("2020-01-01"), date("2020-02-01")])
            .unwrap();
        assert_eq!(span.start, date("2020-01-01"));
        assert_eq!(span.end, date("2020-03-01"));

        let other = DateRange::new(date("2020-02-01"), date("2020-05-01"));
        assert_eq!(span.overlap_days(&other), 29);
        assert!(DateRange::spanning(Vec::new()).is_none());
    }
}
