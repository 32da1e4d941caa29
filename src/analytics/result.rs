//! Aggregate views produced by the analytics engine.
//!
//! All of these are derived, read-only snapshots. They are cached but never
//! treated as a source of truth.

use std::collections::BTreeSet;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::query::AnalyticsQuery;
use crate::model::EventType;

/// Weekday names indexed from Sunday.
pub const WEEKDAY_NAMES: [&str; 7] = [
    "Sunday",
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
    "Saturday",
];

/// Headline numbers over the filtered events.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregatedMetrics {
    /// Events that passed the filters.
    pub total_events: usize,
    /// Distinct sessions.
    pub unique_sessions: usize,
    /// Distinct workspaces.
    pub unique_workspaces: usize,
    /// Distinct inferred languages.
    pub unique_languages: usize,
    /// Distinct models.
    pub unique_models: usize,
    /// Sum of token estimates.
    pub total_tokens: u64,
    /// Mean token estimate per event.
    pub average_tokens_per_event: f64,
    /// Mean duration over events that recorded one.
    pub average_duration_ms: Option<f64>,
    /// Events that recorded a duration.
    pub events_with_duration: usize,
    /// Events the user cancelled.
    pub cancelled_events: usize,
    /// Days with at least one event.
    pub active_days: usize,
    /// Earliest event.
    pub first_event: Option<DateTime<Utc>>,
    /// Latest event.
    pub last_event: Option<DateTime<Utc>>,
}

/// One day of the time series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeSeriesPoint {
    /// Calendar day (UTC), serialized as `YYYY-MM-DD`.
    pub date: NaiveDate,
    /// Events on this day.
    pub events: usize,
    /// Distinct sessions active on this day.
    pub sessions: usize,
    /// Sum of token estimates.
    pub tokens: u64,
    /// Mean duration over events that recorded one.
    pub average_duration_ms: Option<f64>,
}

/// Metrics for one value of a dimension (a language, a model).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DimensionMetrics {
    /// Dimension value.
    pub name: String,
    /// Events with this value.
    pub count: usize,
    /// Share of the events that carry this dimension, 0-100.
    ///
    /// Events without a language (or model) are left out of the
    /// denominator, so the rows of one table sum to 100.
    pub percentage: f64,
    /// Mean duration over events that recorded one.
    pub average_duration_ms: Option<f64>,
    /// Sum of token estimates.
    pub total_tokens: u64,
}

/// Share of one event type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventTypeShare {
    /// Event type.
    #[serde(rename = "type")]
    pub event_type: EventType,
    /// Events of this type.
    pub count: usize,
    /// Share of all events, 0-100.
    pub percentage: f64,
}

/// Events in one hour of the day (UTC).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HourBucket {
    /// Hour, 0-23.
    pub hour: u32,
    /// Events in this hour.
    pub count: usize,
    /// Share of all events, 0-100.
    pub percentage: f64,
}

/// Events on one day of the week (UTC).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeekdayBucket {
    /// Day index, 0 = Sunday.
    pub day: u32,
    /// Day name.
    pub name: String,
    /// Events on this day.
    pub count: usize,
    /// Share of all events, 0-100.
    pub percentage: f64,
}

/// Events of one chat session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionGroup {
    /// Session id.
    pub session_id: String,
    /// Workspace id.
    pub workspace_id: String,
    /// Events in the session.
    pub event_count: usize,
    /// First event.
    pub start_time: DateTime<Utc>,
    /// Last event, absent for single-event sessions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
    /// Span between first and last event.
    pub duration_ms: i64,
    /// Sum of token estimates.
    pub total_tokens: u64,
    /// Languages seen.
    pub languages: BTreeSet<String>,
    /// Models seen.
    pub models: BTreeSet<String>,
}

/// Events of one (approximate) editor instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstanceGroup {
    /// Instance id.
    pub instance_id: String,
    /// Events in the instance.
    pub event_count: usize,
    /// Distinct sessions.
    pub session_count: usize,
    /// Distinct windows.
    pub window_count: usize,
    /// First event.
    pub start_time: DateTime<Utc>,
    /// Last event, absent for single-event instances.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
    /// Span between first and last event.
    pub duration_ms: i64,
    /// Distinct extension hosts minus one.
    pub extension_host_restarts: usize,
    /// Languages seen.
    pub languages: BTreeSet<String>,
    /// Models seen.
    pub models: BTreeSet<String>,
}

/// Events of one window within an instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WindowGroup {
    /// Owning instance.
    pub instance_id: String,
    /// Window id.
    pub window_id: String,
    /// Events in the window.
    pub event_count: usize,
    /// Distinct sessions.
    pub session_count: usize,
    /// First event.
    pub start_time: DateTime<Utc>,
    /// Last event, absent for single-event windows.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
    /// Span between first and last event.
    pub duration_ms: i64,
    /// Languages seen.
    pub languages: BTreeSet<String>,
    /// Models seen.
    pub models: BTreeSet<String>,
}

/// Everything computed for one query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsResult {
    /// The query this answers.
    pub query: AnalyticsQuery,
    /// Headline numbers.
    pub metrics: AggregatedMetrics,
    /// One point per calendar day of the range, zero-filled.
    pub time_series: Vec<TimeSeriesPoint>,
    /// Per-language metrics, most used first.
    pub languages: Vec<DimensionMetrics>,
    /// Per-model metrics, most used first.
    pub models: Vec<DimensionMetrics>,
    /// Every event type with its share.
    pub event_types: Vec<EventTypeShare>,
    /// 24 hourly buckets.
    pub hourly: Vec<HourBucket>,
    /// 7 weekday buckets starting on Sunday.
    pub weekdays: Vec<WeekdayBucket>,
    /// Per-session groups, oldest first.
    pub sessions: Vec<SessionGroup>,
    /// Per-instance groups, oldest first.
    pub instances: Vec<InstanceGroup>,
    /// Per-(instance, window) groups, oldest first.
    pub windows: Vec<WindowGroup>,
    /// When the result was computed.
    pub computed_at: DateTime<Utc>,
}

impl AnalyticsResult {
    /// The busiest hour, if any events matched.
    #[must_use]
    pub fn peak_hour(&self) -> Option<u32> {
        self.hourly
            .iter()
            .filter(|b| b.count > 0)
            .max_by_key(|b| b.count)
            .map(|b| b.hour)
    }

    /// The busiest weekday name, if any events matched.
    #[must_use]
    pub fn peak_weekday(&self) -> Option<&str> {
        self.weekdays
            .iter()
            .filter(|b| b.count > 0)
            .max_by_key(|b| b.count)
            .map(|b| b.name.as_str())
    }
}
