//! In-memory event source for tests and embedding.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use futures::future::BoxFuture;
use parking_lot::RwLock;

use super::{merge_events, EventsCallback, ScanOutcome, SessionEventSource};
use crate::error::Result;
use crate::model::NormalizedEvent;
use crate::scanner::ScanStatistics;
use crate::watch::SubscriptionId;

/// Event source holding a fixed set of events that can be extended with
/// [`MemoryEventSource::push`].
#[derive(Default)]
pub struct MemoryEventSource {
    events: RwLock<Arc<Vec<NormalizedEvent>>>,
    subscribers: RwLock<Vec<(SubscriptionId, EventsCallback)>>,
    next_id: AtomicU64,
    scans: AtomicU64,
}

impl MemoryEventSource {
    /// Create a source with initial events.
    #[must_use]
    pub fn new(events: Vec<NormalizedEvent>) -> Self {
        let source = Self::default();
        *source.events.write() = Arc::new(merge_events(&[], events));
        source
    }

    /// Add events and notify subscribers, as a watcher update would.
    pub fn push(&self, events: Vec<NormalizedEvent>) {
        {
            let mut current = self.events.write();
            *current = Arc::new(merge_events(&current, events.clone()));
        }
        let subscribers: Vec<EventsCallback> = self
            .subscribers
            .read()
            .iter()
            .map(|(_, callback)| Arc::clone(callback))
            .collect();
        for callback in subscribers {
            callback(&events);
        }
    }

    /// Number of subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.read().len()
    }
}

impl SessionEventSource for MemoryEventSource {
    fn scan_all_data(&self) -> BoxFuture<'_, Result<ScanOutcome>> {
        let events = self.get_session_events();
        self.scans.fetch_add(1, Ordering::SeqCst);
        Box::pin(async move {
            let stats = ScanStatistics {
                total_requests: events.len(),
                ..ScanStatistics::default()
            };
            Ok((events, stats))
        })
    }

    fn get_session_events(&self) -> Arc<Vec<NormalizedEvent>> {
        Arc::clone(&self.events.read())
    }

    fn on_session_events_updated(&self, callback: EventsCallback) -> Result<SubscriptionId> {
        let id = SubscriptionId::next(&self.next_id);
        self.subscribers.write().push((id, callback));
        Ok(id)
    }

    fn stop_real_time_updates(&self) {
        self.subscribers.write().clear();
    }

    fn scan_count(&self) -> u64 {
        self.scans.load(Ordering::SeqCst)
    }
}

impl std::fmt::Debug for MemoryEventSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryEventSource")
            .field("events", &self.events.read().len())
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}
