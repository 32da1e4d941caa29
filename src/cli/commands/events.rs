//! Events command implementation.
//!
//! Lists normalized events, newest first.

use chrono::Utc;

use crate::analytics::DateRange;
use crate::cli::{build_service, Cli, EventsArgs, OutputFormat};
use crate::config::Config;
use crate::error::Result;
use crate::model::NormalizedEvent;
use crate::util::{short_id, truncate};

use super::print_json;

/// Run the events command.
pub async fn run(cli: &Cli, config: &Config, args: &EventsArgs) -> Result<()> {
    let service = build_service(config)?;
    let (events, _) = service.scan_all_data().await?;

    let range = args
        .days
        .map(|days| DateRange::last_days(days, Utc::now()))
        .transpose()?;
    let mut selected: Vec<&NormalizedEvent> = events
        .iter()
        .filter(|e| range.as_ref().map_or(true, |r| r.contains(e.timestamp)))
        .collect();
    selected.reverse();
    if let Some(limit) = args.limit {
        selected.truncate(limit);
    }

    if cli.effective_output() == OutputFormat::Json {
        return print_json(&selected);
    }

    if selected.is_empty() {
        println!("No events found.");
        return Ok(());
    }

    for event in selected {
        println!("{}", format_event(event));
    }
    Ok(())
}

/// One-line rendering used by `events` and `watch`.
pub fn format_event(event: &NormalizedEvent) -> String {
    let mut line = format!(
        "{}  {:<10} {}  {}",
        event.timestamp.format("%Y-%m-%d %H:%M:%S"),
        event.event_type.as_str(),
        short_id(&event.session_id, 8),
        event.id,
    );
    if let Some(language) = &event.language {
        line.push_str(&format!("  lang={language}"));
    }
    if let Some(model) = &event.model_id {
        line.push_str(&format!("  model={model}"));
    }
    if let Some(duration) = event.duration_ms {
        line.push_str(&format!("  {duration}ms"));
    }
    line.push_str(&format!("  ~{} tokens", event.token_estimate));
    if event.cancelled {
        line.push_str("  (cancelled)");
    }
    if let Some(prompt) = &event.prompt_text {
        line.push_str(&format!("  \"{}\"", truncate(prompt, 60)));
    }
    line
}
