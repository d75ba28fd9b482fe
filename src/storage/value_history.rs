//! In-memory bounded value history.

use std::collections::VecDeque;
use std::sync::RwLock;

use chrono::{DateTime, Utc};

use crate::entity::EntityKey;
use crate::error::{HistorianResult, HistoryError, ValidationError};
use crate::sample::TimestampedValue;
use crate::time::DeleteRange;

use super::continuation::{paginate, scan, HistoryPage};
use super::traits::{ReadRawRequest, ValueStore};
use super::lock_err;

/// Default number of samples retained per entity.
pub const DEFAULT_VALUE_CAPACITY: usize = 10_000;

#[derive(Debug)]
struct State {
    entries: VecDeque<TimestampedValue>,
    capacity: usize,
}

impl State {
    fn evict(&mut self) {
        while self.entries.len() > self.capacity {
            self.entries.pop_front();
        }
    }
}

const fn source_time(v: &TimestampedValue) -> DateTime<Utc> {
    v.source_time
}

/// Bounded FIFO of samples, oldest at the head.
///
/// # Examples
///
/// ```
/// use historian::storage::{ReadRawRequest, ValueHistory, ValueStore};
/// use historian::TimestampedValue;
/// use chrono::Utc;
///
/// let history = ValueHistory::new("MyLevel", 2).unwrap();
/// for v in [1.0, 2.0, 3.0] {
///     history.append(TimestampedValue::good(v, Utc::now())).unwrap();
/// }
/// let page = history.read_raw(&ReadRawRequest::all()).unwrap();
/// assert_eq!(page.items.len(), 2);
/// ```
#[derive(Debug)]
pub struct ValueHistory {
    key: EntityKey,
    state: RwLock<State>,
}

impl ValueHistory {
    /// Creates an empty history.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::ZeroCapacity` if `capacity` is 0.
    pub fn new(key: impl Into<EntityKey>, capacity: usize) -> Result<Self, ValidationError> {
        let key = key.into();
        if capacity == 0 {
            return Err(ValidationError::ZeroCapacity {
                field: format!("value history '{key}'"),
            });
        }
        Ok(Self {
            key,
            state: RwLock::new(State {
                entries: VecDeque::new(),
                capacity,
            }),
        })
    }

    /// Creates an empty history with [`DEFAULT_VALUE_CAPACITY`].
    #[must_use]
    pub fn with_default_capacity(key: impl Into<EntityKey>) -> Self {
        Self {
            key: key.into(),
            state: RwLock::new(State {
                entries: VecDeque::new(),
                capacity: DEFAULT_VALUE_CAPACITY,
            }),
        }
    }
}

impl ValueStore for ValueHistory {
    fn key(&self) -> &EntityKey {
        &self.key
    }

    fn capacity(&self) -> Result<usize, HistoryError> {
        let state = self.state.read().map_err(|_| lock_err("value history"))?;
        Ok(state.capacity)
    }

    fn set_capacity(&self, capacity: usize) -> HistorianResult<()> {
        if capacity == 0 {
            return Err(ValidationError::ZeroCapacity {
                field: format!("value history '{}'", self.key),
            }
            .into());
        }
        let mut state = self.state.write().map_err(|_| lock_err("value history"))?;
        state.capacity = capacity;
        state.evict();
        Ok(())
    }

    fn len(&self) -> Result<usize, HistoryError> {
        let state = self.state.read().map_err(|_| lock_err("value history"))?;
        Ok(state.entries.len())
    }

    fn append(&self, value: TimestampedValue) -> Result<(), HistoryError> {
        let mut state = self.state.write().map_err(|_| lock_err("value history"))?;
        state.entries.push_back(value);
        state.evict();
        Ok(())
    }

    fn read_raw(&self, request: &ReadRawRequest) -> Result<HistoryPage<TimestampedValue>, HistoryError> {
        let state = self.state.read().map_err(|_| lock_err("value history"))?;
        let candidates = scan(&state.entries, request.bounds(), source_time);
        Ok(paginate(candidates, request.max_values, request.continuation, TimestampedValue::clone))
    }

    fn read_at_times(&self, times: &[DateTime<Utc>]) -> Result<Vec<TimestampedValue>, HistoryError> {
        let state = self.state.read().map_err(|_| lock_err("value history"))?;
        Ok(times
            .iter()
            .map(|&requested| {
                state
                    .entries
                    .iter()
                    .rev()
                    .find(|v| v.source_time <= requested)
                    .map_or_else(|| TimestampedValue::no_data(requested), |v| v.at(requested))
            })
            .collect())
    }

    fn delete_raw(&self, range: &DeleteRange) -> Result<usize, HistoryError> {
        let mut state = self.state.write().map_err(|_| lock_err("value history"))?;
        let before = state.entries.len();
        state.entries.retain(|v| !range.contains(v.source_time));
        Ok(before - state.entries.len())
    }

    fn delete_at_times(&self, times: &[DateTime<Utc>]) -> Result<Vec<Result<(), HistoryError>>, HistoryError> {
        let mut state = self.state.write().map_err(|_| lock_err("value history"))?;
        Ok(times
            .iter()
            .map(|&t| {
                let before = state.entries.len();
                state.entries.retain(|v| v.source_time != t);
                if state.entries.len() < before {
                    Ok(())
                } else {
                    Err(HistoryError::no_data(self.key.as_str(), format!("no value at {t}")))
                }
            })
            .collect())
    }

    fn latest(&self) -> Result<Option<TimestampedValue>, HistoryError> {
        let state = self.state.read().map_err(|_| lock_err("value history"))?;
        Ok(state.entries.back().cloned())
    }

    fn snapshot(&self) -> Result<Vec<TimestampedValue>, HistoryError> {
        let state = self.state.read().map_err(|_| lock_err("value history"))?;
        Ok(state.entries.iter().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quality::StatusCode;
    use crate::value::Variant;
    use chrono::Duration;

    fn t(secs: i64) -> DateTime<Utc> {
        DateTime::<Utc>::UNIX_EPOCH + Duration::seconds(secs)
    }

    fn sample(secs: i64) -> TimestampedValue {
        TimestampedValue::new(Variant::Int(secs), StatusCode::Good, t(secs), t(secs))
    }

    fn history(secs: &[i64]) -> ValueHistory {
        let h = ValueHistory::new("test", 100).unwrap();
        for &s in secs {
            h.append(sample(s)).unwrap();
        }
        h
    }

    fn ints(values: &[TimestampedValue]) -> Vec<i64> {
        values.iter().filter_map(|v| v.value.as_int()).collect()
    }

    #[test]
    fn test_zero_capacity_rejected() {
        assert!(ValueHistory::new("x", 0).is_err());
        let h = history(&[1]);
        assert!(h.set_capacity(0).unwrap_err().is_validation());
    }

    #[test]
    fn test_capacity_evicts_oldest() {
        let h = ValueHistory::new("x", 3).unwrap();
        for s in 1..=5 {
            h.append(sample(s)).unwrap();
        }
        assert_eq!(h.len().unwrap(), 3);
        assert_eq!(ints(&h.snapshot().unwrap()), vec![3, 4, 5]);
        assert_eq!(h.latest().unwrap().unwrap().value.as_int(), Some(5));
    }

    #[test]
    fn test_set_capacity_shrinks() {
        let h = history(&[1, 2, 3, 4]);
        h.set_capacity(2).unwrap();
        assert_eq!(h.capacity().unwrap(), 2);
        assert_eq!(ints(&h.snapshot().unwrap()), vec![3, 4]);
    }

    #[test]
    fn test_read_raw_forward_with_and_without_bounds() {
        let h = history(&[10, 20, 30, 40]);
        let inclusive = ReadRawRequest::new(Some(t(20)), Some(t(30))).with_bounds(true);
        assert_eq!(ints(&h.read_raw(&inclusive).unwrap().items), vec![20, 30]);

        let exclusive = ReadRawRequest::new(Some(t(10)), Some(t(40)));
        assert_eq!(ints(&h.read_raw(&exclusive).unwrap().items), vec![20, 30]);

        let open_end = ReadRawRequest::new(Some(t(25)), None);
        assert_eq!(ints(&h.read_raw(&open_end).unwrap().items), vec![30, 40]);
    }

    #[test]
    fn test_read_raw_backward_when_only_end_defined() {
        let h = history(&[10, 20, 30, 40]);
        let request = ReadRawRequest::new(None, Some(t(30))).with_bounds(true);
        assert_eq!(ints(&h.read_raw(&request).unwrap().items), vec![30, 20, 10]);
    }

    #[test]
    fn test_read_raw_both_undefined_returns_everything() {
        let h = history(&[10, 20, 30]);
        let page = h.read_raw(&ReadRawRequest::all()).unwrap();
        assert_eq!(ints(&page.items), vec![10, 20, 30]);
        assert!(page.is_last());
    }

    #[test]
    fn test_read_raw_pagination() {
        let h = history(&[1, 2, 3, 4, 5]);
        let request = ReadRawRequest::all().with_max_values(2);

        let mut all = Vec::new();
        let mut cp = None;
        let mut pages = 0;
        loop {
            let page = h.read_raw(&request.resume(cp)).unwrap();
            all.extend(ints(&page.items));
            pages += 1;
            cp = page.continuation;
            if cp.is_none() {
                break;
            }
        }
        assert_eq!(all, vec![1, 2, 3, 4, 5]);
        assert_eq!(pages, 3);
    }

    #[test]
    fn test_read_at_times_stepped() {
        let h = history(&[10, 20]);
        let got = h.read_at_times(&[t(15), t(5), t(20)]).unwrap();

        assert_eq!(got[0].value.as_int(), Some(10));
        assert_eq!(got[0].source_time, t(15));
        assert_eq!(got[0].server_time, t(15));
        assert!(got[0].status.is_good());

        assert!(got[1].value.is_null());
        assert_eq!(got[1].status, StatusCode::BadNoData);
        assert_eq!(got[1].source_time, t(5));

        assert_eq!(got[2].value.as_int(), Some(20));
    }

    #[test]
    fn test_delete_raw_half_open() {
        let h = history(&[10, 20, 30, 40]);
        let range = DeleteRange::new("test", Some(t(20)), Some(t(40))).unwrap();
        assert_eq!(h.delete_raw(&range).unwrap(), 2);
        assert_eq!(ints(&h.snapshot().unwrap()), vec![10, 40]);

        let from_head = DeleteRange::new("test", None, Some(t(40))).unwrap();
        assert_eq!(h.delete_raw(&from_head).unwrap(), 1);
        assert_eq!(ints(&h.snapshot().unwrap()), vec![40]);
    }

    #[test]
    fn test_delete_at_times_partial_failure() {
        let h = history(&[10, 20, 20, 30]);
        let results = h.delete_at_times(&[t(20), t(25), t(30)]).unwrap();
        assert!(results[0].is_ok());
        assert!(matches!(results[1], Err(HistoryError::NoData { .. })));
        assert!(results[2].is_ok());
        assert_eq!(ints(&h.snapshot().unwrap()), vec![10]);
    }
}
