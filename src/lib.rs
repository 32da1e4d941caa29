//! vscode-chat-insights: scanner, normalizer and analytics engine for VS Code
//! chat session transcripts.
//!
//! VS Code keeps every chat session as one JSON document under
//! `workspaceStorage/<workspace-hash>/chatSessions/`. This crate finds those
//! transcripts, turns each request into a privacy-preserving
//! [`NormalizedEvent`](model::NormalizedEvent), and answers analytics queries
//! over the events with a two-tier time-bounded cache.
//!
//! # Features
//!
//! - **Discovery**: platform storage roots for VS Code, Insiders, VSCodium and Cursor
//! - **Tolerant scanning**: bad transcripts are counted and skipped, never fatal
//! - **Normalization**: deterministic event ids, event-type classification,
//!   language inference, anonymized file names
//! - **Analytics**: metrics, daily time series, distributions and
//!   session/instance/window groupings
//! - **Live updates**: debounced file watching with subscriber fan-out
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use chrono::Utc;
//! use vscode_chat_insights::prelude::*;
//!
//! # async fn demo() -> vscode_chat_insights::Result<()> {
//! let config = Config::load()?;
//! let service = Arc::new(UnifiedSessionService::initialize(&config, Arc::new(MemoryStore::new()))?);
//! service.scan_all_data().await?;
//!
//! let engine = AnalyticsEngine::new(service, &config.cache);
//! let result = engine.compute_analytics(&AnalyticsQuery::new(DateRange::last_days(30, Utc::now())?))?;
//! println!("{} events in the last 30 days", result.metrics.total_events);
//! # Ok(())
//! # }
//! ```
//!
//! # Architecture
//!
//! - [`discovery`]: storage roots and transcript discovery
//! - [`scanner`]: concurrent, tolerant transcript parsing
//! - [`transform`]: raw requests to normalized events
//! - [`analytics`]: queries, aggregation and the caching engine
//! - [`cache`]: TTL caches
//! - [`watch`]: debounced transcript watcher
//! - [`service`]: orchestration of scanner, transformer and watcher
//! - [`store`]: key/value persistence for settings and scan statistics
//! - [`cli`]: command-line interface
//! - [`config`]: configuration management
//! - [`error`]: error types and handling

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod analytics;
pub mod cache;
pub mod cli;
pub mod config;
pub mod discovery;
pub mod error;
pub mod model;
pub mod scanner;
pub mod service;
pub mod store;
pub mod transform;
pub mod util;
pub mod watch;

// Re-export commonly used types at the crate root
pub use error::{InsightsError, Result};
pub use model::{EventType, NormalizedEvent};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name.
pub const NAME: &str = env!("CARGO_PKG_NAME");

/// VS Code's per-workspace storage directory name.
pub const WORKSPACE_STORAGE_DIR_NAME: &str = "workspaceStorage";

/// Chat session subdirectory of a workspace storage directory.
pub const CHAT_SESSIONS_DIR_NAME: &str = "chatSessions";

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::analytics::{AnalyticsEngine, AnalyticsQuery, AnalyticsResult, DateRange, QuickStats};
    pub use crate::config::Config;
    pub use crate::error::{InsightsError, Result};
    pub use crate::model::{EventType, NormalizedEvent, RawSession};
    pub use crate::scanner::{ScanStatistics, SessionScanResult, SessionScanner};
    pub use crate::service::{SessionEventSource, UnifiedSessionService};
    pub use crate::store::{JsonFileStore, KeyValueStore, MemoryStore, Settings};
    pub use crate::transform::Transformer;
    pub use crate::watch::SessionWatcher;
}
