//! Dashboard command implementation.

use std::sync::Arc;

use chrono::Utc;

use crate::analytics::AnalyticsEngine;
use crate::cli::{build_service, Cli, OutputFormat};
use crate::config::Config;
use crate::error::Result;
use crate::util::format_count;

use super::print_json;

/// Run the dashboard command.
pub async fn run(cli: &Cli, config: &Config) -> Result<()> {
    let service = Arc::new(build_service(config)?);
    service.scan_all_data().await?;

    let engine = AnalyticsEngine::new(service, &config.cache);
    let stats = engine.quick_stats(Utc::now());

    if cli.effective_output() == OutputFormat::Json {
        return print_json(&stats);
    }

    let or_dash = |value: Option<&str>| value.unwrap_or("-").to_string();

    println!("Chat Activity");
    println!("=============");
    println!();
    println!("Today:          {}", format_count(stats.today as u64));
    println!("Last 7 days:    {}", format_count(stats.this_week as u64));
    println!("Last 30 days:   {}", format_count(stats.this_month as u64));
    println!("All time:       {}", format_count(stats.total_events as u64));
    println!("Sessions:       {}", format_count(stats.total_sessions as u64));
    println!("Avg session:    {}", or_dash(stats.average_session_duration.as_deref()));
    println!("Top language:   {}", or_dash(stats.top_language.as_deref()));
    println!("Top model:      {}", or_dash(stats.top_model.as_deref()));
    println!("Last event:     {}", or_dash(stats.last_event.as_deref()));
    Ok(())
}
