//! Continuation points and the shared scan/paginate logic of history reads.

use std::collections::VecDeque;
use std::fmt;

use chrono::{DateTime, Utc};

use crate::time::{HistoryBounds, ScanDirection};

/// Opaque resume token for a paginated history read.
///
/// It encodes how many matching candidates of the scan were already returned.
/// Only reads produce them; pass one back unchanged with otherwise identical
/// request parameters to fetch the next page. Tokens are not serializable,
/// so callers cannot forge one from a raw offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContinuationPoint {
    offset: usize,
}

impl ContinuationPoint {
    pub(crate) const fn new(offset: usize) -> Self {
        Self { offset }
    }

    pub(crate) const fn offset(self) -> usize {
        self.offset
    }
}

impl fmt::Display for ContinuationPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cp:{}", self.offset)
    }
}

/// One page of a history read.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryPage<T> {
    /// Entries of this page, in scan order.
    pub items: Vec<T>,
    /// Present when more matching entries follow.
    pub continuation: Option<ContinuationPoint>,
}

impl<T> HistoryPage<T> {
    /// A last page with no entries.
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            items: Vec::new(),
            continuation: None,
        }
    }

    /// Returns true if no further page follows.
    #[must_use]
    pub fn is_last(&self) -> bool {
        self.continuation.is_none()
    }

    /// Splits into entries and continuation.
    #[must_use]
    pub fn into_parts(self) -> (Vec<T>, Option<ContinuationPoint>) {
        (self.items, self.continuation)
    }
}

/// Iterates the entries matching `bounds`, in the direction the bounds select.
///
/// Forward scans stop at the first entry past the end bound. Backward scans
/// skip such entries and continue toward the head.
pub(crate) fn scan<'a, E>(
    entries: &'a VecDeque<E>,
    bounds: HistoryBounds,
    time_of: fn(&E) -> DateTime<Utc>,
) -> Box<dyn Iterator<Item = &'a E> + 'a> {
    match bounds.direction() {
        ScanDirection::Forward => Box::new(
            entries
                .iter()
                .take_while(move |e| !bounds.is_past_end(time_of(e)))
                .filter(move |e| bounds.is_after_start(time_of(e))),
        ),
        ScanDirection::Backward => Box::new(
            entries
                .iter()
                .rev()
                .filter(move |e| !bounds.is_past_end(time_of(e)) && bounds.is_after_start(time_of(e))),
        ),
    }
}

/// Skips `continuation` candidates, then collects up to `max_values`
/// (0 = unlimited). A continuation point is returned only if another candidate
/// follows a full page.
pub(crate) fn paginate<'a, E: 'a, T>(
    candidates: impl Iterator<Item = &'a E>,
    max_values: usize,
    continuation: Option<ContinuationPoint>,
    mut convert: impl FnMut(&E) -> T,
) -> HistoryPage<T> {
    let offset = continuation.map_or(0, ContinuationPoint::offset);
    let mut items = Vec::new();

    for candidate in candidates.skip(offset) {
        if max_values > 0 && items.len() == max_values {
            return HistoryPage {
                continuation: Some(ContinuationPoint::new(offset + items.len())),
                items,
            };
        }
        items.push(convert(candidate));
    }

    HistoryPage {
        items,
        continuation: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(secs: i64) -> DateTime<Utc> {
        DateTime::<Utc>::UNIX_EPOCH + chrono::Duration::seconds(secs)
    }

    fn entries(secs: &[i64]) -> VecDeque<DateTime<Utc>> {
        secs.iter().copied().map(t).collect()
    }

    fn id(e: &DateTime<Utc>) -> DateTime<Utc> {
        *e
    }

    fn secs(page: &HistoryPage<DateTime<Utc>>) -> Vec<i64> {
        page.items.iter().map(DateTime::timestamp).collect()
    }

    #[test]
    fn test_forward_scan_stops_at_end() {
        let data = entries(&[1, 2, 3, 9, 4]);
        let bounds = HistoryBounds::new(Some(t(2)), Some(t(5)), true);
        let got: Vec<i64> = scan(&data, bounds, id).map(DateTime::timestamp).collect();
        // Stops at 9 even though 4 would match.
        assert_eq!(got, vec![2, 3]);
    }

    #[test]
    fn test_backward_scan_skips_past_end() {
        let data = entries(&[1, 2, 9, 3]);
        let bounds = HistoryBounds::new(None, Some(t(3)), false);
        let got: Vec<i64> = scan(&data, bounds, id).map(DateTime::timestamp).collect();
        assert_eq!(got, vec![2, 1]);
    }

    #[test]
    fn test_paginate_exact_fit_has_no_continuation() {
        let data = entries(&[1, 2, 3, 4]);
        let page = paginate(scan(&data, HistoryBounds::all(), id), 4, None, id);
        assert_eq!(secs(&page), vec![1, 2, 3, 4]);
        assert!(page.is_last());
    }

    #[test]
    fn test_paginate_resumes_from_offset() {
        let data = entries(&[1, 2, 3, 4, 5]);
        let first = paginate(scan(&data, HistoryBounds::all(), id), 2, None, id);
        assert_eq!(secs(&first), vec![1, 2]);
        let cp = first.continuation.unwrap();
        assert_eq!(cp.offset(), 2);

        let second = paginate(scan(&data, HistoryBounds::all(), id), 2, Some(cp), id);
        assert_eq!(secs(&second), vec![3, 4]);
        let third = paginate(scan(&data, HistoryBounds::all(), id), 2, second.continuation, id);
        assert_eq!(secs(&third), vec![5]);
        assert!(third.is_last());
    }

    #[test]
    fn test_paginate_zero_is_unlimited() {
        let data = entries(&[1, 2, 3]);
        let page = paginate(scan(&data, HistoryBounds::all(), id), 0, None, id);
        assert_eq!(page.items.len(), 3);
        assert!(page.is_last());
    }

    #[test]
    fn test_continuation_only_comes_from_a_read() {
        let data = entries(&[1, 2, 3]);
        let first = paginate(scan(&data, HistoryBounds::all(), id), 1, None, id);
        let cp = first.continuation.unwrap();
        assert_eq!(cp.to_string(), "cp:1");
        assert_eq!(cp, ContinuationPoint::new(1));

        let (items, continuation) = first.into_parts();
        assert_eq!(items, vec![t(1)]);
        assert_eq!(continuation, Some(cp));
        assert!(HistoryPage::<DateTime<Utc>>::empty().is_last());
    }
}
