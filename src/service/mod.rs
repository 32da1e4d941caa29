//! Unified session service: scanner, transformer and watcher composed.
//!
//! [`UnifiedSessionService`] is the default [`SessionEventSource`]. It only
//! exists after [`UnifiedSessionService::initialize`] succeeded, so nothing
//! can use a half-built service.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use vscode_chat_insights::config::Config;
//! use vscode_chat_insights::service::UnifiedSessionService;
//! use vscode_chat_insights::store::MemoryStore;
//!
//! # async fn demo() -> vscode_chat_insights::Result<()> {
//! let service = UnifiedSessionService::initialize(&Config::default(), Arc::new(MemoryStore::new()))?;
//! let (events, stats) = service.scan_all_data().await?;
//! println!("{} events from {} sessions", events.len(), stats.parsed_sessions);
//! # Ok(())
//! # }
//! ```

mod memory;

pub use memory::MemoryEventSource;

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use chrono::{Duration, Utc};
use futures::future::BoxFuture;
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use crate::config::Config;
use crate::error::{InsightsError, Result};
use crate::model::NormalizedEvent;
use crate::scanner::{ScanStatistics, SessionScanResult, SessionScanner};
use crate::store::{load_scan_statistics, save_scan_statistics, KeyValueStore, Settings};
use crate::transform::Transformer;
use crate::watch::{SessionWatcher, SubscriptionId, WatcherStatus};

/// Callback invoked with newly observed events.
pub type EventsCallback = Arc<dyn Fn(&[NormalizedEvent]) + Send + Sync>;

/// Events plus the statistics of the scan that produced them.
pub type ScanOutcome = (Arc<Vec<NormalizedEvent>>, ScanStatistics);

/// What the analytics engine needs from an orchestration layer.
pub trait SessionEventSource: Send + Sync {
    /// Run a full scan and replace the current events.
    fn scan_all_data(&self) -> BoxFuture<'_, Result<ScanOutcome>>;

    /// Current events, sorted by time.
    fn get_session_events(&self) -> Arc<Vec<NormalizedEvent>>;

    /// Subscribe to events produced by incremental updates.
    fn on_session_events_updated(&self, callback: EventsCallback) -> Result<SubscriptionId>;

    /// Stop incremental updates and drop all subscribers.
    fn stop_real_time_updates(&self);

    /// Number of completed full scans. Consumers caching events compare it
    /// to notice rescans they did not trigger.
    fn scan_count(&self) -> u64 {
        0
    }
}

/// Subscriber counts and watcher state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceWatcherStatus {
    /// Whether transcripts are being watched.
    pub is_watching: bool,
    /// Subscribers to event updates.
    pub event_callbacks: usize,
    /// Subscribers registered with the watcher.
    pub watcher_callbacks: usize,
    /// Underlying watcher status.
    pub watcher: WatcherStatus,
}

struct ServiceInner {
    scanner: SessionScanner,
    transformer: RwLock<Transformer>,
    watcher: SessionWatcher,
    store: Arc<dyn KeyValueStore>,
    settings: RwLock<Settings>,
    events: RwLock<Arc<Vec<NormalizedEvent>>>,
    scan_results: RwLock<Arc<Vec<SessionScanResult>>>,
    last_stats: RwLock<Option<ScanStatistics>>,
    subscribers: RwLock<Vec<(SubscriptionId, EventsCallback)>>,
    watch_subscription: Mutex<Option<SubscriptionId>>,
    next_id: AtomicU64,
    scans: AtomicU64,
    disposed: AtomicBool,
}

/// Orchestrates scanning, transformation and watching.
#[derive(Clone)]
pub struct UnifiedSessionService {
    inner: Arc<ServiceInner>,
}

impl UnifiedSessionService {
    /// Build the service from configuration and a persistence backend.
    ///
    /// Fails on invalid configuration.
    pub fn initialize(config: &Config, store: Arc<dyn KeyValueStore>) -> Result<Self> {
        config.validate()?;
        let scanner = SessionScanner::from_config(&config.scanner);
        Self::with_scanner(scanner, store)
    }

    /// Build the service around an existing scanner.
    pub fn with_scanner(scanner: SessionScanner, store: Arc<dyn KeyValueStore>) -> Result<Self> {
        let settings = Settings::load(store.as_ref());
        let last_stats = load_scan_statistics(store.as_ref()).unwrap_or_else(|e| {
            warn!(error = %e, "Ignoring unreadable scan statistics");
            None
        });
        let watcher = SessionWatcher::from_scanner(scanner.clone())?;
        let transformer = Transformer::default().with_prompt_text(settings.include_prompt_text);

        info!(
            roots = scanner.roots().len(),
            retention_days = settings.retention_days,
            include_prompt_text = settings.include_prompt_text,
            "Session service initialized"
        );

        Ok(Self {
            inner: Arc::new(ServiceInner {
                scanner,
                transformer: RwLock::new(transformer),
                watcher,
                store,
                settings: RwLock::new(settings),
                events: RwLock::new(Arc::new(Vec::new())),
                scan_results: RwLock::new(Arc::new(Vec::new())),
                last_stats: RwLock::new(last_stats),
                subscribers: RwLock::new(Vec::new()),
                watch_subscription: Mutex::new(None),
                next_id: AtomicU64::new(1),
                scans: AtomicU64::new(0),
                disposed: AtomicBool::new(false),
            }),
        })
    }

    fn ensure_live(&self) -> Result<()> {
        if self.inner.disposed.load(Ordering::SeqCst) {
            Err(InsightsError::not_initialized("UnifiedSessionService (disposed)"))
        } else {
            Ok(())
        }
    }

    /// Scan every transcript and replace the current events.
    ///
    /// Applies retention when enabled and drops duplicate event ids.
    #[instrument(skip(self))]
    pub async fn scan_all_data(&self) -> Result<ScanOutcome> {
        self.ensure_live()?;

        let (results, stats) = self.inner.scanner.scan_all().await;
        let transformed = self.inner.transformer.read().transform_all(&results);
        let events = Arc::new(self.inner.finalize(transformed));

        *self.inner.events.write() = Arc::clone(&events);
        *self.inner.scan_results.write() = Arc::new(results);
        *self.inner.last_stats.write() = Some(stats.clone());
        self.inner.scans.fetch_add(1, Ordering::SeqCst);

        if let Err(e) = save_scan_statistics(self.inner.store.as_ref(), &stats) {
            warn!(error = %e, "Failed to persist scan statistics");
        }

        info!(events = events.len(), sessions = stats.parsed_sessions, "Full scan finished");
        Ok((events, stats))
    }

    /// Current events, sorted by time.
    pub fn get_session_events(&self) -> Arc<Vec<NormalizedEvent>> {
        Arc::clone(&self.inner.events.read())
    }

    /// Parsed transcripts from the last scan, updated by the watcher.
    pub fn get_session_scan_results(&self) -> Arc<Vec<SessionScanResult>> {
        Arc::clone(&self.inner.scan_results.read())
    }

    /// Statistics of the last scan, including one persisted by an earlier run.
    pub fn last_scan_statistics(&self) -> Option<ScanStatistics> {
        self.inner.last_stats.read().clone()
    }

    /// Subscribe to events from changed transcripts, starting the watcher
    /// on the first subscription.
    pub fn on_session_events_updated(&self, callback: EventsCallback) -> Result<SubscriptionId> {
        self.ensure_live()?;

        let id = SubscriptionId::next(&self.inner.next_id);
        self.inner.subscribers.write().push((id, callback));

        let mut watch_subscription = self.inner.watch_subscription.lock();
        if watch_subscription.is_none() {
            let weak: Weak<ServiceInner> = Arc::downgrade(&self.inner);
            let started = self.inner.watcher.watch(Arc::new(move |result: &SessionScanResult| {
                if let Some(inner) = weak.upgrade() {
                    inner.apply_scan_result(result);
                }
            }));
            match started {
                Ok(watch_id) => *watch_subscription = Some(watch_id),
                Err(e) => {
                    self.inner.subscribers.write().retain(|(sub, _)| *sub != id);
                    return Err(e);
                }
            }
        }
        Ok(id)
    }

    /// Remove one event subscriber.
    pub fn remove_subscriber(&self, id: SubscriptionId) -> bool {
        let mut subscribers = self.inner.subscribers.write();
        let before = subscribers.len();
        subscribers.retain(|(sub, _)| *sub != id);
        subscribers.len() != before
    }

    /// Stop watching and drop every subscriber.
    pub fn stop_real_time_updates(&self) {
        self.inner.watcher.stop();
        self.inner.watch_subscription.lock().take();
        self.inner.subscribers.write().clear();
        debug!("Real-time updates stopped");
    }

    /// Watcher state and callback counts.
    pub fn get_watcher_status(&self) -> ServiceWatcherStatus {
        ServiceWatcherStatus {
            is_watching: self.inner.watcher.is_watching(),
            event_callbacks: self.inner.subscribers.read().len(),
            watcher_callbacks: self.inner.watcher.subscriber_count(),
            watcher: self.inner.watcher.status(),
        }
    }

    /// Current settings.
    pub fn settings(&self) -> Settings {
        self.inner.settings.read().clone()
    }

    /// Persist new settings. They apply from the next scan.
    pub fn update_settings(&self, settings: Settings) -> Result<()> {
        settings.save(self.inner.store.as_ref())?;
        *self.inner.transformer.write() =
            Transformer::default().with_prompt_text(settings.include_prompt_text);
        *self.inner.settings.write() = settings;
        Ok(())
    }

    /// The scanner in use.
    pub fn scanner(&self) -> &SessionScanner {
        &self.inner.scanner
    }

    /// Feed a path notification to the watcher (see
    /// [`SessionWatcher::handle_path_event`]).
    pub fn notify_path_changed(&self, path: impl Into<std::path::PathBuf>) -> bool {
        self.inner.watcher.handle_path_event(path)
    }

    /// Stop everything and release cached data. Later calls fail.
    pub fn dispose(&self) {
        if self.inner.disposed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.stop_real_time_updates();
        *self.inner.events.write() = Arc::new(Vec::new());
        *self.inner.scan_results.write() = Arc::new(Vec::new());
        info!("Session service disposed");
    }

    /// Whether [`Self::dispose`] was called.
    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.load(Ordering::SeqCst)
    }
}

impl std::fmt::Debug for UnifiedSessionService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UnifiedSessionService")
            .field("roots", &self.inner.scanner.roots())
            .field("events", &self.inner.events.read().len())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

impl ServiceInner {
    /// Apply retention, then sort and deduplicate.
    fn finalize(&self, mut events: Vec<NormalizedEvent>) -> Vec<NormalizedEvent> {
        let settings = self.settings.read().clone();
        if settings.auto_cleanup && settings.retention_days > 0 {
            let cutoff = Utc::now() - Duration::days(i64::from(settings.retention_days));
            let before = events.len();
            events.retain(|e| e.timestamp >= cutoff);
            if events.len() != before {
                debug!(dropped = before - events.len(), "Applied retention");
            }
        }
        merge_events(&[], events)
    }

    /// Fold a re-parsed transcript into the current state and notify.
    fn apply_scan_result(&self, result: &SessionScanResult) {
        if self.disposed.load(Ordering::SeqCst) {
            return;
        }

        let fresh = self.transformer.read().transform_session(result);
        let fresh = self.finalize(fresh);

        {
            let mut events = self.events.write();
            *events = Arc::new(merge_events(&events, fresh.clone()));
        }
        {
            let mut results = self.scan_results.write();
            let mut updated: Vec<SessionScanResult> =
                results.iter().filter(|r| r.path != result.path).cloned().collect();
            updated.push(result.clone());
            updated.sort_by(|a, b| {
                a.session
                    .creation_date
                    .cmp(&b.session.creation_date)
                    .then_with(|| a.path.cmp(&b.path))
            });
            *results = Arc::new(updated);
        }

        if fresh.is_empty() {
            return;
        }
        let subscribers: Vec<EventsCallback> = self
            .subscribers
            .read()
            .iter()
            .map(|(_, callback)| Arc::clone(callback))
            .collect();
        debug!(
            session = %result.session.session_id,
            events = fresh.len(),
            subscribers = subscribers.len(),
            "Publishing updated events"
        );
        for callback in subscribers {
            callback(&fresh);
        }
    }
}

impl SessionEventSource for UnifiedSessionService {
    fn scan_all_data(&self) -> BoxFuture<'_, Result<ScanOutcome>> {
        Box::pin(UnifiedSessionService::scan_all_data(self))
    }

    fn get_session_events(&self) -> Arc<Vec<NormalizedEvent>> {
        UnifiedSessionService::get_session_events(self)
    }

    fn on_session_events_updated(&self, callback: EventsCallback) -> Result<SubscriptionId> {
        UnifiedSessionService::on_session_events_updated(self, callback)
    }

    fn stop_real_time_updates(&self) {
        UnifiedSessionService::stop_real_time_updates(self);
    }

    fn scan_count(&self) -> u64 {
        self.inner.scans.load(Ordering::SeqCst)
    }
}

/// Merge `incoming` into `existing`: incoming events replace existing ones
/// with the same id, the result is sorted by time then id and has unique ids.
#[must_use]
pub fn merge_events(existing: &[NormalizedEvent], incoming: Vec<NormalizedEvent>) -> Vec<NormalizedEvent> {
    let mut seen: HashSet<String> = HashSet::with_capacity(incoming.len());
    let mut fresh: Vec<NormalizedEvent> = Vec::with_capacity(incoming.len());
    // Last occurrence wins within the incoming batch
    for event in incoming.into_iter().rev() {
        if seen.insert(event.id.clone()) {
            fresh.push(event);
        }
    }

    let mut merged: Vec<NormalizedEvent> = existing
        .iter()
        .filter(|e| !seen.contains(&e.id))
        .cloned()
        .collect();
    merged.extend(fresh);
    merged.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then_with(|| a.id.cmp(&b.id)));
    merged
}
