//! Analytics queries: a date range plus optional allow-lists.

use chrono::{DateTime, Days, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{InsightsError, Result};
use crate::model::{EventType, NormalizedEvent};

/// Inclusive UTC time range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DateRange {
    /// First instant included.
    pub start: DateTime<Utc>,
    /// Last instant included.
    pub end: DateTime<Utc>,
}

impl DateRange {
    /// Create a range, rejecting `start > end`.
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self> {
        if start > end {
            return Err(InsightsError::InvalidArgument {
                name: "range".to_string(),
                reason: format!("start {start} is after end {end}"),
            });
        }
        Ok(Self { start, end })
    }

    /// The `days` calendar days ending at `now`, starting at midnight UTC.
    ///
    /// Fails when the first day would fall before the earliest
    /// representable date.
    pub fn last_days(days: u32, now: DateTime<Utc>) -> Result<Self> {
        let first_day = now
            .date_naive()
            .checked_sub_days(Days::new(u64::from(days.max(1) - 1)))
            .ok_or_else(|| InsightsError::AnalyticsError {
                message: format!("a range of {days} days ending {} is out of bounds", now.date_naive()),
            })?;
        let start = first_day.and_hms_opt(0, 0, 0).map_or(now, |dt| dt.and_utc());
        Ok(Self { start, end: now })
    }

    /// Whether `ts` falls inside the range.
    #[must_use]
    pub fn contains(&self, ts: DateTime<Utc>) -> bool {
        self.start <= ts && ts <= self.end
    }

    /// Calendar days touched by the range, in order.
    pub fn days(&self) -> impl Iterator<Item = NaiveDate> {
        let first = self.start.date_naive();
        let last = self.end.date_naive();
        first.iter_days().take_while(move |day| *day <= last)
    }

    /// Number of calendar days touched by the range.
    #[must_use]
    pub fn day_count(&self) -> i64 {
        (self.end.date_naive() - self.start.date_naive()).num_days() + 1
    }
}

/// What to aggregate.
///
/// Allow-lists that are `None` or empty do not filter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsQuery {
    /// Time range, inclusive on both ends.
    pub range: DateRange,
    /// Allowed event types.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_types: Option<Vec<EventType>>,
    /// Allowed languages.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub languages: Option<Vec<String>>,
    /// Allowed models.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub models: Option<Vec<String>>,
    /// Allowed sessions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_ids: Option<Vec<String>>,
}

impl AnalyticsQuery {
    /// Query over a range with no other filters.
    #[must_use]
    pub fn new(range: DateRange) -> Self {
        Self {
            range,
            event_types: None,
            languages: None,
            models: None,
            session_ids: None,
        }
    }

    /// Restrict to event types.
    #[must_use]
    pub fn with_event_types(mut self, types: impl IntoIterator<Item = EventType>) -> Self {
        self.event_types = Some(types.into_iter().collect());
        self
    }

    /// Restrict to languages.
    #[must_use]
    pub fn with_languages<S: Into<String>>(mut self, languages: impl IntoIterator<Item = S>) -> Self {
        self.languages = Some(languages.into_iter().map(Into::into).collect());
        self
    }

    /// Restrict to models.
    #[must_use]
    pub fn with_models<S: Into<String>>(mut self, models: impl IntoIterator<Item = S>) -> Self {
        self.models = Some(models.into_iter().map(Into::into).collect());
        self
    }

    /// Restrict to sessions.
    #[must_use]
    pub fn with_session_ids<S: Into<String>>(mut self, ids: impl IntoIterator<Item = S>) -> Self {
        self.session_ids = Some(ids.into_iter().map(Into::into).collect());
        self
    }

    /// Whether an event passes every filter.
    #[must_use]
    pub fn matches(&self, event: &NormalizedEvent) -> bool {
        self.range.contains(event.timestamp)
            && allowed(self.event_types.as_deref(), Some(&event.event_type))
            && allowed(self.languages.as_deref(), event.language.as_ref())
            && allowed(self.models.as_deref(), event.model_id.as_ref())
            && allowed(self.session_ids.as_deref(), Some(&event.session_id))
    }

    /// Canonical JSON form used in cache keys.
    pub fn canonical_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| InsightsError::SerializationError {
            context: "Failed to serialize analytics query".to_string(),
            source: e,
        })
    }
}

fn allowed<T: PartialEq>(list: Option<&[T]>, value: Option<&T>) -> bool {
    match list {
        None | Some([]) => true,
        Some(list) => value.is_some_and(|v| list.contains(v)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
    }

    #[test]
    fn test_range_rejects_inverted() {
        assert!(DateRange::new(at(2024, 1, 2, 0), at(2024, 1, 1, 0)).is_err());
        assert!(DateRange::new(at(2024, 1, 1, 0), at(2024, 1, 1, 0)).is_ok());
    }

    #[test]
    fn test_range_days_are_inclusive() {
        let range = DateRange::new(at(2024, 2, 27, 23), at(2024, 3, 1, 1)).unwrap();
        let days: Vec<_> = range.days().map(|d| d.to_string()).collect();
        assert_eq!(days, ["2024-02-27", "2024-02-28", "2024-02-29", "2024-03-01"]);
        assert_eq!(range.day_count(), 4);
    }

    #[test]
    fn test_last_days() {
        let now = at(2024, 5, 10, 15);
        let range = DateRange::last_days(7, now).unwrap();
        assert_eq!(range.start, at(2024, 5, 4, 0));
        assert_eq!(range.end, now);
        assert_eq!(range.day_count(), 7);
        assert_eq!(DateRange::last_days(0, now).unwrap().day_count(), 1);
    }

    #[test]
    fn test_last_days_out_of_bounds_is_an_error() {
        let now = at(2024, 5, 10, 15);
        for days in [200_000_000, u32::MAX] {
            let err = DateRange::last_days(days, now).unwrap_err();
            assert!(matches!(err, InsightsError::AnalyticsError { .. }));
        }
    }

    #[test]
    fn test_empty_allow_list_does_not_filter() {
        assert!(allowed::<String>(Some(&[]), None));
        assert!(allowed::<String>(None, None));
        assert!(!allowed(Some(&["rust".to_string()]), None));
        assert!(allowed(Some(&["rust".to_string()]), Some(&"rust".to_string())));
    }
}
