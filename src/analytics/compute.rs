//! Aggregate computation over a snapshot of events.
//!
//! Everything here is synchronous and side-effect free. Hour-of-day and
//! day-of-week buckets use UTC.

use std::collections::{BTreeSet, HashMap, HashSet};

use chrono::{DateTime, Datelike, NaiveDate, Timelike, Utc};
use indexmap::IndexMap;
use tracing::debug;

use super::query::AnalyticsQuery;
use super::result::{
    AggregatedMetrics, AnalyticsResult, DimensionMetrics, EventTypeShare, HourBucket, InstanceGroup,
    SessionGroup, TimeSeriesPoint, WeekdayBucket, WindowGroup, WEEKDAY_NAMES,
};
use crate::error::{InsightsError, Result};
use crate::model::{EventType, NormalizedEvent};

/// Longest range a single query may span, in days.
pub const MAX_RANGE_DAYS: i64 = 3_660;

/// Share of `part` in `total` as a percentage, 0 for an empty total.
#[must_use]
pub fn percentage(part: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        part as f64 / total as f64 * 100.0
    }
}

/// Running mean over optional durations.
#[derive(Debug, Default, Clone, Copy)]
struct DurationMean {
    sum: u64,
    count: usize,
}

impl DurationMean {
    fn add(&mut self, duration: Option<u64>) {
        if let Some(ms) = duration {
            self.sum += ms;
            self.count += 1;
        }
    }

    fn mean(self) -> Option<f64> {
        (self.count > 0).then(|| self.sum as f64 / self.count as f64)
    }
}

/// Shared bookkeeping for session, instance and window groups.
#[derive(Debug, Default)]
struct GroupAccumulator<'a> {
    count: usize,
    start: Option<DateTime<Utc>>,
    end: Option<DateTime<Utc>>,
    tokens: u64,
    languages: BTreeSet<String>,
    models: BTreeSet<String>,
    sessions: HashSet<&'a str>,
    windows: HashSet<&'a str>,
    hosts: HashSet<&'a str>,
    workspace: Option<&'a str>,
}

impl<'a> GroupAccumulator<'a> {
    fn add(&mut self, event: &'a NormalizedEvent) {
        self.count += 1;
        self.start = Some(self.start.map_or(event.timestamp, |s| s.min(event.timestamp)));
        self.end = Some(self.end.map_or(event.timestamp, |e| e.max(event.timestamp)));
        self.tokens += event.token_estimate;
        if let Some(language) = &event.language {
            self.languages.insert(language.clone());
        }
        if let Some(model) = &event.model_id {
            self.models.insert(model.clone());
        }
        self.sessions.insert(event.session_id.as_str());
        if let Some(window) = &event.hierarchy.window_id {
            self.windows.insert(window.as_str());
        }
        self.hosts.insert(event.hierarchy.host_process_id.as_str());
        self.workspace.get_or_insert(event.workspace_id.as_str());
    }

    /// Start, end (omitted when a single event) and span in milliseconds.
    fn span(&self) -> Option<(DateTime<Utc>, Option<DateTime<Utc>>, i64)> {
        let start = self.start?;
        let end = self.end.unwrap_or(start);
        let end_time = (self.count > 1).then_some(end);
        Some((start, end_time, (end - start).num_milliseconds()))
    }
}

/// Compute every aggregate view for `query` over `events`.
///
/// `events` need not be sorted or pre-filtered.
pub fn compute_analytics(events: &[NormalizedEvent], query: &AnalyticsQuery) -> Result<AnalyticsResult> {
    let days = query.range.day_count();
    if days > MAX_RANGE_DAYS {
        return Err(InsightsError::AnalyticsError {
            message: format!("range spans {days} days, limit is {MAX_RANGE_DAYS}"),
        });
    }

    let mut filtered: Vec<&NormalizedEvent> = events.iter().filter(|e| query.matches(e)).collect();
    filtered.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then_with(|| a.id.cmp(&b.id)));

    debug!(
        total = events.len(),
        matched = filtered.len(),
        days,
        "Computing analytics"
    );

    let (sessions, instances, windows) = group_hierarchy(&filtered);

    Ok(AnalyticsResult {
        query: query.clone(),
        metrics: aggregate_metrics(&filtered),
        time_series: time_series(&filtered, query),
        languages: dimension_metrics(&filtered, |e| e.language.as_deref()),
        models: dimension_metrics(&filtered, |e| e.model_id.as_deref()),
        event_types: event_type_distribution(&filtered),
        hourly: hourly_distribution(&filtered),
        weekdays: weekday_distribution(&filtered),
        sessions,
        instances,
        windows,
        computed_at: Utc::now(),
    })
}

fn aggregate_metrics(events: &[&NormalizedEvent]) -> AggregatedMetrics {
    let mut durations = DurationMean::default();
    let mut sessions = HashSet::new();
    let mut workspaces = HashSet::new();
    let mut languages = HashSet::new();
    let mut models = HashSet::new();
    let mut days = HashSet::new();
    let mut metrics = AggregatedMetrics {
        total_events: events.len(),
        ..AggregatedMetrics::default()
    };

    for event in events {
        durations.add(event.duration_ms);
        metrics.total_tokens += event.token_estimate;
        metrics.cancelled_events += usize::from(event.cancelled);
        sessions.insert(event.session_id.as_str());
        workspaces.insert(event.workspace_id.as_str());
        days.insert(event.timestamp.date_naive());
        if let Some(language) = &event.language {
            languages.insert(language.as_str());
        }
        if let Some(model) = &event.model_id {
            models.insert(model.as_str());
        }
    }

    metrics.unique_sessions = sessions.len();
    metrics.unique_workspaces = workspaces.len();
    metrics.unique_languages = languages.len();
    metrics.unique_models = models.len();
    metrics.active_days = days.len();
    metrics.events_with_duration = durations.count;
    metrics.average_duration_ms = durations.mean();
    if !events.is_empty() {
        metrics.average_tokens_per_event = metrics.total_tokens as f64 / events.len() as f64;
    }
    metrics.first_event = events.first().map(|e| e.timestamp);
    metrics.last_event = events.last().map(|e| e.timestamp);
    metrics
}

fn time_series(events: &[&NormalizedEvent], query: &AnalyticsQuery) -> Vec<TimeSeriesPoint> {
    #[derive(Default)]
    struct Day<'a> {
        events: usize,
        tokens: u64,
        sessions: HashSet<&'a str>,
        durations: DurationMean,
    }

    let mut by_day: HashMap<NaiveDate, Day<'_>> = HashMap::new();
    for event in events {
        let day = by_day.entry(event.timestamp.date_naive()).or_default();
        day.events += 1;
        day.tokens += event.token_estimate;
        day.sessions.insert(event.session_id.as_str());
        day.durations.add(event.duration_ms);
    }

    query
        .range
        .days()
        .map(|date| match by_day.get(&date) {
            Some(day) => TimeSeriesPoint {
                date,
                events: day.events,
                sessions: day.sessions.len(),
                tokens: day.tokens,
                average_duration_ms: day.durations.mean(),
            },
            None => TimeSeriesPoint {
                date,
                events: 0,
                sessions: 0,
                tokens: 0,
                average_duration_ms: None,
            },
        })
        .collect()
}

fn dimension_metrics<F>(events: &[&NormalizedEvent], key: F) -> Vec<DimensionMetrics>
where
    F: Fn(&NormalizedEvent) -> Option<&str>,
{
    let mut groups: IndexMap<&str, (usize, u64, DurationMean)> = IndexMap::new();
    for event in events {
        if let Some(name) = key(event) {
            let entry = groups.entry(name).or_default();
            entry.0 += 1;
            entry.1 += event.token_estimate;
            entry.2.add(event.duration_ms);
        }
    }

    // Percentages are relative to events that carry the dimension
    let total: usize = groups.values().map(|(count, _, _)| count).sum();
    let mut metrics: Vec<_> = groups
        .into_iter()
        .map(|(name, (count, tokens, durations))| DimensionMetrics {
            name: name.to_string(),
            count,
            percentage: percentage(count, total),
            average_duration_ms: durations.mean(),
            total_tokens: tokens,
        })
        .collect();
    metrics.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.name.cmp(&b.name)));
    metrics
}

fn event_type_distribution(events: &[&NormalizedEvent]) -> Vec<EventTypeShare> {
    EventType::ALL
        .iter()
        .map(|&event_type| {
            let count = events.iter().filter(|e| e.event_type == event_type).count();
            EventTypeShare {
                event_type,
                count,
                percentage: percentage(count, events.len()),
            }
        })
        .collect()
}

fn hourly_distribution(events: &[&NormalizedEvent]) -> Vec<HourBucket> {
    let mut counts = [0usize; 24];
    for event in events {
        counts[event.timestamp.hour() as usize] += 1;
    }
    (0u32..)
        .zip(counts)
        .map(|(hour, count)| HourBucket {
            hour,
            count,
            percentage: percentage(count, events.len()),
        })
        .collect()
}

fn weekday_distribution(events: &[&NormalizedEvent]) -> Vec<WeekdayBucket> {
    let mut counts = [0usize; 7];
    for event in events {
        counts[event.timestamp.weekday().num_days_from_sunday() as usize] += 1;
    }
    (0u32..)
        .zip(counts)
        .map(|(day, count)| WeekdayBucket {
            day,
            name: WEEKDAY_NAMES[day as usize].to_string(),
            count,
            percentage: percentage(count, events.len()),
        })
        .collect()
}

fn group_hierarchy(events: &[&NormalizedEvent]) -> (Vec<SessionGroup>, Vec<InstanceGroup>, Vec<WindowGroup>) {
    let mut sessions: IndexMap<&str, GroupAccumulator<'_>> = IndexMap::new();
    let mut instances: IndexMap<&str, GroupAccumulator<'_>> = IndexMap::new();
    let mut windows: IndexMap<(&str, &str), GroupAccumulator<'_>> = IndexMap::new();

    for &event in events {
        sessions.entry(event.session_id.as_str()).or_default().add(event);
        instances
            .entry(event.hierarchy.instance_id.as_str())
            .or_default()
            .add(event);
        // Events without a known workspace belong to no window
        if let Some(window) = &event.hierarchy.window_id {
            windows
                .entry((event.hierarchy.instance_id.as_str(), window.as_str()))
                .or_default()
                .add(event);
        }
    }

    let session_groups = sessions
        .into_iter()
        .filter_map(|(session_id, acc)| {
            let (start_time, end_time, duration_ms) = acc.span()?;
            Some(SessionGroup {
                session_id: session_id.to_string(),
                workspace_id: acc.workspace.unwrap_or_default().to_string(),
                event_count: acc.count,
                start_time,
                end_time,
                duration_ms,
                total_tokens: acc.tokens,
                languages: acc.languages,
                models: acc.models,
            })
        })
        .collect();

    let instance_groups = instances
        .into_iter()
        .filter_map(|(instance_id, acc)| {
            let (start_time, end_time, duration_ms) = acc.span()?;
            Some(InstanceGroup {
                instance_id: instance_id.to_string(),
                event_count: acc.count,
                session_count: acc.sessions.len(),
                window_count: acc.windows.len(),
                start_time,
                end_time,
                duration_ms,
                extension_host_restarts: acc.hosts.len().saturating_sub(1),
                languages: acc.languages,
                models: acc.models,
            })
        })
        .collect();

    let window_groups = windows
        .into_iter()
        .filter_map(|((instance_id, window_id), acc)| {
            let (start_time, end_time, duration_ms) = acc.span()?;
            Some(WindowGroup {
                instance_id: instance_id.to_string(),
                window_id: window_id.to_string(),
                event_count: acc.count,
                session_count: acc.sessions.len(),
                start_time,
                end_time,
                duration_ms,
                languages: acc.languages,
                models: acc.models,
            })
        })
        .collect();

    // Input is sorted by time, so first-seen order is oldest-first
    (session_groups, instance_groups, window_groups)
}
