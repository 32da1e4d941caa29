//! Quick dashboard statistics.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::model::NormalizedEvent;

/// Headline numbers for a status line or dashboard header.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuickStats {
    /// All known events.
    pub total_events: usize,
    /// Events since midnight UTC.
    pub today: usize,
    /// Events in the last 7 days.
    pub this_week: usize,
    /// Events in the last 30 days.
    pub this_month: usize,
    /// Distinct sessions.
    pub total_sessions: usize,
    /// Mean session span, e.g. `12m 30s`.
    pub average_session_duration: Option<String>,
    /// Most used language.
    pub top_language: Option<String>,
    /// Most used model.
    pub top_model: Option<String>,
    /// Age of the newest event, e.g. `5m ago`.
    pub last_event: Option<String>,
}

/// Compute quick stats relative to `now`.
#[must_use]
pub fn quick_stats(events: &[NormalizedEvent], now: DateTime<Utc>) -> QuickStats {
    let today = now.date_naive();
    let week_start = now - Duration::days(7);
    let month_start = now - Duration::days(30);

    let mut stats = QuickStats {
        total_events: events.len(),
        ..QuickStats::default()
    };
    let mut sessions: HashMap<&str, (DateTime<Utc>, DateTime<Utc>)> = HashMap::new();
    let mut languages: HashMap<&str, usize> = HashMap::new();
    let mut models: HashMap<&str, usize> = HashMap::new();
    let mut newest: Option<DateTime<Utc>> = None;

    for event in events {
        let ts = event.timestamp;
        stats.today += usize::from(ts.date_naive() == today && ts <= now);
        stats.this_week += usize::from(ts >= week_start && ts <= now);
        stats.this_month += usize::from(ts >= month_start && ts <= now);

        let span = sessions.entry(event.session_id.as_str()).or_insert((ts, ts));
        span.0 = span.0.min(ts);
        span.1 = span.1.max(ts);

        if let Some(language) = &event.language {
            *languages.entry(language.as_str()).or_insert(0) += 1;
        }
        if let Some(model) = &event.model_id {
            *models.entry(model.as_str()).or_insert(0) += 1;
        }
        newest = Some(newest.map_or(ts, |n| n.max(ts)));
    }

    stats.total_sessions = sessions.len();
    if !sessions.is_empty() {
        let total_ms: i64 = sessions
            .values()
            .map(|(start, end)| (*end - *start).num_milliseconds())
            .sum();
        let mean_ms = total_ms / sessions.len() as i64;
        stats.average_session_duration = Some(duration_string(Duration::milliseconds(mean_ms)));
    }
    stats.top_language = most_common(&languages);
    stats.top_model = most_common(&models);
    stats.last_event = newest.map(|ts| relative_time(ts, now));
    stats
}

/// Most frequent key; ties go to the alphabetically first.
fn most_common(counts: &HashMap<&str, usize>) -> Option<String> {
    counts
        .iter()
        .max_by(|a, b| a.1.cmp(b.1).then_with(|| b.0.cmp(a.0)))
        .map(|(name, _)| (*name).to_string())
}

/// Human-readable duration, rounded to whole seconds (`1h 2m 3s`, `0s`).
#[must_use]
pub fn duration_string(duration: Duration) -> String {
    let secs = duration.num_seconds().max(0).unsigned_abs();
    humantime::format_duration(std::time::Duration::from_secs(secs)).to_string()
}

/// `just now`, `5m ago`, `3h 12m ago`, or `in the future` for clock skew.
#[must_use]
pub fn relative_time(ts: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let age = now - ts;
    if age < Duration::zero() {
        return "in the future".to_string();
    }
    if age < Duration::minutes(1) {
        return "just now".to_string();
    }
    // Minute precision is enough for a status line
    let minutes = age.num_minutes().unsigned_abs();
    let rounded = if minutes >= 60 * 24 {
        std::time::Duration::from_secs(minutes / 60 * 3600)
    } else {
        std::time::Duration::from_secs(minutes * 60)
    };
    format!("{} ago", humantime::format_duration(rounded))
}
