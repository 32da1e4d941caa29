//! Analytics over normalized events.
//!
//! This module provides:
//! - Query filters and date ranges
//! - Aggregated metrics, daily time series and distributions
//! - Session, instance and window groupings
//! - Quick dashboard statistics
//! - [`AnalyticsEngine`], which pulls events from a [`SessionEventSource`]
//!   and caches both the events and the computed results

mod compute;
mod dashboard;
mod query;
mod result;

pub use compute::{compute_analytics, percentage, MAX_RANGE_DAYS};
pub use dashboard::{duration_string, quick_stats, relative_time, QuickStats};
pub use query::{AnalyticsQuery, DateRange};
pub use result::{
    AggregatedMetrics, AnalyticsResult, DimensionMetrics, EventTypeShare, HourBucket, InstanceGroup,
    SessionGroup, TimeSeriesPoint, WeekdayBucket, WindowGroup, WEEKDAY_NAMES,
};

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use tracing::{debug, instrument};

use crate::cache::{AnalyticsCache, AnalyticsCacheStats};
use crate::config::CacheConfig;
use crate::error::Result;
use crate::model::NormalizedEvent;
use crate::scanner::ScanStatistics;
use crate::service::{EventsCallback, SessionEventSource};
use crate::util::sha256_hex;
use crate::watch::SubscriptionId;

/// Cache key of the unfiltered event list.
const ALL_EVENTS_KEY: &str = "events:all";

/// Query-driven analytics with a two-tier cache.
pub struct AnalyticsEngine {
    source: Arc<dyn SessionEventSource>,
    cache: AnalyticsCache<Vec<NormalizedEvent>, AnalyticsResult>,
    subscribers: RwLock<Vec<(SubscriptionId, EventsCallback)>>,
    next_id: AtomicU64,
    seen_scans: AtomicU64,
    source_subscription: Mutex<Option<SubscriptionId>>,
}

impl AnalyticsEngine {
    /// Create an engine over an event source.
    pub fn new(source: Arc<dyn SessionEventSource>, config: &CacheConfig) -> Self {
        let seen_scans = AtomicU64::new(source.scan_count());
        Self {
            source,
            cache: AnalyticsCache::new(config),
            subscribers: RwLock::new(Vec::new()),
            next_id: AtomicU64::new(1),
            seen_scans,
            source_subscription: Mutex::new(None),
        }
    }

    /// Events in `range` (all events for `None`), sorted by time then id.
    pub fn get_events(&self, range: Option<&DateRange>) -> Arc<Vec<NormalizedEvent>> {
        self.sync_with_source();
        let key = range.map_or_else(
            || ALL_EVENTS_KEY.to_string(),
            |r| format!("events:{}:{}", r.start.timestamp_millis(), r.end.timestamp_millis()),
        );
        if let Some(events) = self.cache.get_events(&key) {
            return events;
        }

        let source = self.source.get_session_events();
        let mut events: Vec<NormalizedEvent> = source
            .iter()
            .filter(|e| range.map_or(true, |r| r.contains(e.timestamp)))
            .cloned()
            .collect();
        events.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then_with(|| a.id.cmp(&b.id)));
        debug!(key = %key, events = events.len(), "Loaded events");
        self.cache.cache_events(key, events)
    }

    /// Compute analytics for a query, from cache when possible.
    ///
    /// The result key combines the query with a coarse fingerprint of the
    /// events in range: count plus first and last timestamp.
    #[instrument(skip(self, query), fields(start = %query.range.start, end = %query.range.end))]
    pub fn compute_analytics(&self, query: &AnalyticsQuery) -> Result<Arc<AnalyticsResult>> {
        let events = self.get_events(Some(&query.range));
        let key = result_key(query, &events)?;
        self.cache
            .get_or_compute(&key, || compute_analytics(&events, query))
    }

    /// Rescan the source and drop everything cached.
    pub async fn refresh(&self) -> Result<ScanStatistics> {
        let (_, stats) = self.source.scan_all_data().await?;
        self.seen_scans.store(self.source.scan_count(), Ordering::SeqCst);
        self.cache.invalidate_all();
        Ok(stats)
    }

    /// Drop both cache tiers if the source ran a full scan since we last looked.
    fn sync_with_source(&self) {
        let scans = self.source.scan_count();
        let seen = self.seen_scans.swap(scans, Ordering::SeqCst);
        if seen != scans {
            debug!(seen, scans, "Source rescanned, invalidating cache");
            self.cache.invalidate_all();
        }
    }

    /// Accept new events: clear both cache tiers and notify subscribers.
    pub fn ingest(&self, events: &[NormalizedEvent]) {
        self.cache.invalidate_all();
        let subscribers: Vec<EventsCallback> = self
            .subscribers
            .read()
            .iter()
            .map(|(_, callback)| Arc::clone(callback))
            .collect();
        debug!(events = events.len(), subscribers = subscribers.len(), "Ingested events");
        for callback in subscribers {
            callback(events);
        }
    }

    /// Subscribe to ingested events.
    pub fn on_update(&self, callback: EventsCallback) -> SubscriptionId {
        let id = SubscriptionId::next(&self.next_id);
        self.subscribers.write().push((id, callback));
        id
    }

    /// Remove an engine subscriber.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subscribers = self.subscribers.write();
        let before = subscribers.len();
        subscribers.retain(|(sub, _)| *sub != id);
        subscribers.len() != before
    }

    /// Route the source's incremental updates into [`Self::ingest`].
    ///
    /// Attaching twice keeps the first subscription.
    pub fn attach_real_time_updates(self: &Arc<Self>) -> Result<SubscriptionId> {
        let mut current = self.source_subscription.lock();
        if let Some(id) = *current {
            return Ok(id);
        }
        let weak = Arc::downgrade(self);
        let id = self
            .source
            .on_session_events_updated(Arc::new(move |events: &[NormalizedEvent]| {
                if let Some(engine) = weak.upgrade() {
                    engine.ingest(events);
                }
            }))?;
        *current = Some(id);
        Ok(id)
    }

    /// Stop the source's real-time updates.
    pub fn detach_real_time_updates(&self) {
        if self.source_subscription.lock().take().is_some() {
            self.source.stop_real_time_updates();
        }
    }

    /// Dashboard headline numbers.
    pub fn quick_stats(&self, now: DateTime<Utc>) -> QuickStats {
        quick_stats(&self.get_events(None), now)
    }

    /// Cache hit/miss counters and sizes.
    pub fn cache_stats(&self) -> AnalyticsCacheStats {
        self.cache.stats()
    }

    /// The underlying cache.
    pub fn cache(&self) -> &AnalyticsCache<Vec<NormalizedEvent>, AnalyticsResult> {
        &self.cache
    }
}

impl std::fmt::Debug for AnalyticsEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnalyticsEngine")
            .field("cache", &self.cache)
            .field("subscribers", &self.subscribers.read().len())
            .field("attached", &self.source_subscription.lock().is_some())
            .finish()
    }
}

/// SHA-256 of the query JSON and the `count:first:last` fingerprint.
fn result_key(query: &AnalyticsQuery, events: &[NormalizedEvent]) -> Result<String> {
    let fingerprint = match (events.first(), events.last()) {
        (Some(first), Some(last)) => format!(
            "{}:{}:{}",
            events.len(),
            first.timestamp.timestamp_millis(),
            last.timestamp.timestamp_millis()
        ),
        _ => "0".to_string(),
    };
    let material = format!("{}|{fingerprint}", query.canonical_json()?);
    Ok(sha256_hex(material.as_bytes()))
}
