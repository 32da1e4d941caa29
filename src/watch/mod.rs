//! Debounced file watching for chat transcripts.
//!
//! A [`SessionWatcher`] owns at most one underlying `notify` watcher over the
//! scanner's storage roots. It starts on the first subscription and tears
//! down on [`SessionWatcher::stop`] or when the last subscriber leaves.
//!
//! Notifications are filtered to `**/chatSessions/*.json` creates and
//! modifications. Each path gets its own debounce timer: a new notification
//! for the same path cancels the pending timer and starts a fresh one. When a
//! timer fires the file is re-parsed and every subscriber receives the same
//! result.
//!
//! Requires a tokio runtime (the debounce timers are tokio tasks).

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use globset::{GlobBuilder, GlobMatcher};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

use crate::discovery::is_session_file;
use crate::error::{InsightsError, Result};
use crate::scanner::{SessionScanResult, SessionScanner};

/// Glob a path must match to be considered.
pub const SESSION_GLOB: &str = "**/chatSessions/*.json";

/// Callback invoked with each re-parsed transcript.
pub type ScanCallback = Arc<dyn Fn(&SessionScanResult) + Send + Sync>;

/// Handle returned by a subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct SubscriptionId(u64);

impl SubscriptionId {
    /// Allocate the next id from a counter.
    pub(crate) fn next(counter: &AtomicU64) -> Self {
        Self(counter.fetch_add(1, Ordering::Relaxed))
    }
}

/// Whether the watcher is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WatcherState {
    /// No underlying watcher.
    Idle,
    /// Watching the storage roots.
    Watching,
}

/// Point-in-time watcher status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WatcherStatus {
    /// Current state.
    pub state: WatcherState,
    /// Registered subscribers.
    pub subscriber_count: usize,
    /// Paths with a pending debounce timer.
    pub pending_paths: usize,
    /// Roots actually being watched.
    pub watched_roots: Vec<PathBuf>,
}

/// Live resources of the `Watching` state.
struct ActiveWatch {
    runtime: Handle,
    /// `None` when started without filesystem notifications.
    watcher: Option<RecommendedWatcher>,
    pump: Option<JoinHandle<()>>,
    roots: Vec<PathBuf>,
}

struct WatcherInner {
    scanner: SessionScanner,
    debounce: Duration,
    glob: GlobMatcher,
    active: Mutex<Option<ActiveWatch>>,
    subscribers: RwLock<Vec<(SubscriptionId, ScanCallback)>>,
    pending: Mutex<HashMap<PathBuf, JoinHandle<()>>>,
    /// Bumped on every stop; timers from an older generation deliver nothing.
    generation: AtomicU64,
    next_id: AtomicU64,
}

/// Debounced transcript watcher with subscriber fan-out.
#[derive(Clone)]
pub struct SessionWatcher {
    inner: Arc<WatcherInner>,
}

impl SessionWatcher {
    /// Create an idle watcher over the scanner's roots.
    pub fn new(scanner: SessionScanner, debounce: Duration) -> Result<Self> {
        let glob = GlobBuilder::new(SESSION_GLOB)
            .literal_separator(true)
            .build()
            .map_err(|e| InsightsError::watch(format!("Invalid watch glob: {e}")))?
            .compile_matcher();

        Ok(Self {
            inner: Arc::new(WatcherInner {
                scanner,
                debounce,
                glob,
                active: Mutex::new(None),
                subscribers: RwLock::new(Vec::new()),
                pending: Mutex::new(HashMap::new()),
                generation: AtomicU64::new(0),
                next_id: AtomicU64::new(1),
            }),
        })
    }

    /// Create a watcher using the scanner's configured debounce interval.
    pub fn from_scanner(scanner: SessionScanner) -> Result<Self> {
        let debounce = scanner.config().debounce();
        Self::new(scanner, debounce)
    }

    /// Subscribe to re-parsed transcripts, starting the watcher if idle.
    ///
    /// Fails outside a tokio runtime or when the platform watcher cannot be
    /// created; the subscription is not kept in that case.
    pub fn watch(&self, callback: ScanCallback) -> Result<SubscriptionId> {
        self.subscribe(callback, true)
    }

    /// Subscribe without filesystem notifications.
    ///
    /// Paths only arrive through [`Self::handle_path_event`]; useful when the
    /// caller already has a notification source.
    pub fn watch_manual(&self, callback: ScanCallback) -> Result<SubscriptionId> {
        self.subscribe(callback, false)
    }

    fn subscribe(&self, callback: ScanCallback, with_notify: bool) -> Result<SubscriptionId> {
        let id = SubscriptionId::next(&self.inner.next_id);
        self.inner.subscribers.write().push((id, callback));

        if let Err(e) = self.ensure_started(with_notify) {
            self.inner.subscribers.write().retain(|(sub, _)| *sub != id);
            return Err(e);
        }
        debug!(subscription = ?id, "Watcher subscriber added");
        Ok(id)
    }

    /// Remove a subscriber. The watcher stops when none remain.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let (removed, empty) = {
            let mut subscribers = self.inner.subscribers.write();
            let before = subscribers.len();
            subscribers.retain(|(sub, _)| *sub != id);
            (subscribers.len() != before, subscribers.is_empty())
        };
        if removed && empty {
            self.stop();
        }
        removed
    }

    fn ensure_started(&self, with_notify: bool) -> Result<()> {
        let mut active = self.inner.active.lock();
        if active.is_some() {
            return Ok(());
        }

        let runtime = Handle::try_current()
            .map_err(|_| InsightsError::watch("Watching requires a running tokio runtime"))?;

        let mut watch = ActiveWatch {
            runtime: runtime.clone(),
            watcher: None,
            pump: None,
            roots: Vec::new(),
        };

        if with_notify {
            let (tx, mut rx) = mpsc::unbounded_channel::<notify::Result<Event>>();
            let mut watcher = notify::recommended_watcher(move |event: notify::Result<Event>| {
                // Receiver gone means we are shutting down
                let _ = tx.send(event);
            })?;

            for root in self.inner.scanner.roots() {
                if !root.is_dir() {
                    debug!(root = %root.display(), "Not watching missing root");
                    continue;
                }
                match watcher.watch(root, RecursiveMode::Recursive) {
                    Ok(()) => watch.roots.push(root.clone()),
                    Err(e) => warn!(root = %root.display(), error = %e, "Failed to watch root"),
                }
            }

            let weak = Arc::downgrade(&self.inner);
            watch.pump = Some(runtime.spawn(async move {
                while let Some(event) = rx.recv().await {
                    let Some(inner) = weak.upgrade() else { break };
                    match event {
                        Ok(event) if is_relevant(&event.kind) => {
                            for path in event.paths {
                                WatcherInner::schedule(&inner, path);
                            }
                        }
                        Ok(_) => {}
                        Err(e) => warn!(error = %e, "File watch error"),
                    }
                }
                trace!("Watch event pump finished");
            }));
            watch.watcher = Some(watcher);
        }

        info!(roots = watch.roots.len(), debounce_ms = self.inner.debounce.as_millis() as u64, "Watching transcripts");
        *active = Some(watch);
        Ok(())
    }

    /// Feed a path notification into the debouncer.
    ///
    /// Returns whether a re-parse was scheduled: the watcher must be running
    /// and the path must look like a transcript.
    pub fn handle_path_event(&self, path: impl Into<PathBuf>) -> bool {
        WatcherInner::schedule(&self.inner, path.into())
    }

    /// Stop watching: cancel pending timers, drop the platform watcher and
    /// all subscribers. Nothing is delivered after this returns.
    pub fn stop(&self) {
        self.inner.generation.fetch_add(1, Ordering::SeqCst);

        let pending: Vec<_> = self.inner.pending.lock().drain().collect();
        for (_, handle) in &pending {
            handle.abort();
        }

        if let Some(watch) = self.inner.active.lock().take() {
            if let Some(pump) = watch.pump {
                pump.abort();
            }
            drop(watch.watcher);
            info!(cancelled = pending.len(), "Stopped watching transcripts");
        }

        self.inner.subscribers.write().clear();
    }

    /// Current state.
    pub fn state(&self) -> WatcherState {
        if self.inner.active.lock().is_some() {
            WatcherState::Watching
        } else {
            WatcherState::Idle
        }
    }

    /// Whether the watcher is running.
    pub fn is_watching(&self) -> bool {
        self.state() == WatcherState::Watching
    }

    /// Number of subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.inner.subscribers.read().len()
    }

    /// Snapshot of the watcher's status.
    pub fn status(&self) -> WatcherStatus {
        let (state, watched_roots) = match self.inner.active.lock().as_ref() {
            Some(watch) => (WatcherState::Watching, watch.roots.clone()),
            None => (WatcherState::Idle, Vec::new()),
        };
        WatcherStatus {
            state,
            subscriber_count: self.subscriber_count(),
            pending_paths: self.inner.pending.lock().len(),
            watched_roots,
        }
    }
}

impl std::fmt::Debug for SessionWatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionWatcher")
            .field("debounce", &self.inner.debounce)
            .field("status", &self.status())
            .finish()
    }
}

impl WatcherInner {
    fn matches(&self, path: &Path) -> bool {
        self.glob.is_match(path) && is_session_file(path)
    }

    /// (Re)start the debounce timer for `path`.
    fn schedule(inner: &Arc<Self>, path: PathBuf) -> bool {
        if !inner.matches(&path) {
            trace!(path = %path.display(), "Ignoring non-transcript path");
            return false;
        }

        let runtime = match inner.active.lock().as_ref() {
            Some(watch) => watch.runtime.clone(),
            None => return false,
        };

        let generation = inner.generation.load(Ordering::SeqCst);
        let weak = Arc::downgrade(inner);
        let task_path = path.clone();
        let debounce = inner.debounce;

        let mut pending = inner.pending.lock();
        let handle = runtime.spawn(async move {
            tokio::time::sleep(debounce).await;
            Self::fire(weak, task_path, generation).await;
        });
        if let Some(previous) = pending.insert(path, handle) {
            previous.abort();
        }
        true
    }

    async fn fire(weak: Weak<Self>, path: PathBuf, generation: u64) {
        let Some(inner) = weak.upgrade() else { return };
        inner.pending.lock().remove(&path);

        let Some(result) = inner.scanner.scan_file(&path).await else {
            return;
        };

        // Stopped while the file was being parsed
        if inner.generation.load(Ordering::SeqCst) != generation {
            debug!(path = %path.display(), "Discarding result after stop");
            return;
        }

        let subscribers: Vec<ScanCallback> = inner
            .subscribers
            .read()
            .iter()
            .map(|(_, callback)| Arc::clone(callback))
            .collect();

        debug!(
            path = %path.display(),
            requests = result.session.requests.len(),
            subscribers = subscribers.len(),
            "Transcript changed"
        );
        for callback in subscribers {
            callback(&result);
        }
    }
}

fn is_relevant(kind: &EventKind) -> bool {
    matches!(kind, EventKind::Create(_) | EventKind::Modify(_))
}
