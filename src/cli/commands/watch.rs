//! Watch command implementation.
//!
//! Scans once, then prints events from changed transcripts until Ctrl+C
//! or the timeout.

use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use crate::analytics::AnalyticsEngine;
use crate::cli::{build_service, Cli, OutputFormat, WatchArgs};
use crate::config::Config;
use crate::error::{InsightsError, Result};
use crate::model::NormalizedEvent;
use crate::service::SessionEventSource;

use super::events::format_event;

/// Run the watch command.
pub async fn run(cli: &Cli, config: &Config, args: &WatchArgs) -> Result<()> {
    let service = Arc::new(build_service(config)?);
    let (events, _) = service.scan_all_data().await?;

    let source: Arc<dyn SessionEventSource> = service.clone();
    let engine = Arc::new(AnalyticsEngine::new(source, &config.cache));
    let json = cli.effective_output() == OutputFormat::Json;
    engine.on_update(Arc::new(move |events: &[NormalizedEvent]| {
        for event in events {
            if json {
                match serde_json::to_string(event) {
                    Ok(line) => println!("{line}"),
                    Err(e) => eprintln!("Warning: Failed to serialize event: {e}"),
                }
            } else {
                println!("{}", format_event(event));
            }
        }
    }));
    engine.attach_real_time_updates()?;

    let status = service.get_watcher_status();
    if !cli.quiet && !json {
        println!(
            "Watching {} root(s), {} known events... (Ctrl+C to stop)",
            status.watcher.watched_roots.len(),
            events.len()
        );
    }
    info!(roots = status.watcher.watched_roots.len(), "Watch started");

    let outcome = match args.timeout {
        Some(secs) => {
            tokio::select! {
                signal = tokio::signal::ctrl_c() => signal.map_err(|e| InsightsError::io("Failed to listen for Ctrl+C", e)),
                () = tokio::time::sleep(Duration::from_secs(secs)) => Ok(()),
            }
        }
        None => tokio::signal::ctrl_c()
            .await
            .map_err(|e| InsightsError::io("Failed to listen for Ctrl+C", e)),
    };

    engine.detach_real_time_updates();
    if !cli.quiet && !json {
        let stats = engine.quick_stats(chrono::Utc::now());
        println!();
        println!("Stopped. {} events known.", stats.total_events);
    }
    service.dispose();
    outcome
}
