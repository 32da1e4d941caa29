//! Analyze command implementation.
//!
//! Runs one analytics query and renders the result.

use std::sync::Arc;

use chrono::Utc;

use crate::analytics::{duration_string, AnalyticsEngine, AnalyticsQuery, AnalyticsResult, DateRange, DimensionMetrics};
use crate::cli::{build_service, AnalyzeArgs, Cli, OutputFormat};
use crate::config::Config;
use crate::error::Result;
use crate::util::{format_count, short_id};

use super::print_json;

/// Rows shown per dimension table.
const TOP_N: usize = 10;

/// Run the analyze command.
pub async fn run(cli: &Cli, config: &Config, args: &AnalyzeArgs) -> Result<()> {
    let service = Arc::new(build_service(config)?);
    service.scan_all_data().await?;

    let engine = AnalyticsEngine::new(service, &config.cache);
    let query = build_query(args)?;
    let result = engine.compute_analytics(&query)?;

    if cli.effective_output() == OutputFormat::Json {
        return print_json(result.as_ref());
    }

    print_summary(&result);
    print_dimension("Languages", &result.languages);
    print_dimension("Models", &result.models);

    if !result.event_types.is_empty() {
        println!();
        println!("Event types:");
        for share in &result.event_types {
            println!("  {:<12} {:>8}  {:>5.1}%", share.event_type.as_str(), share.count, share.percentage);
        }
    }

    if let Some(hour) = result.peak_hour() {
        println!();
        println!("Peak hour:      {hour:02}:00 UTC");
    }
    if let Some(day) = result.peak_weekday() {
        println!("Peak weekday:   {day}");
    }

    if args.timeline {
        print_timeline(&result);
    }
    if args.groups {
        print_groups(&result);
    }
    Ok(())
}

/// Translate CLI filters into a query.
pub fn build_query(args: &AnalyzeArgs) -> Result<AnalyticsQuery> {
    let mut query = AnalyticsQuery::new(DateRange::last_days(args.days, Utc::now())?);
    if !args.event_types.is_empty() {
        query = query.with_event_types(args.event_types.iter().copied());
    }
    if !args.languages.is_empty() {
        query = query.with_languages(args.languages.iter().cloned());
    }
    if !args.models.is_empty() {
        query = query.with_models(args.models.iter().cloned());
    }
    if !args.sessions.is_empty() {
        query = query.with_session_ids(args.sessions.iter().cloned());
    }
    Ok(query)
}

fn print_summary(result: &AnalyticsResult) {
    let m = &result.metrics;
    println!(
        "Analytics {} to {}",
        result.query.range.start.format("%Y-%m-%d"),
        result.query.range.end.format("%Y-%m-%d")
    );
    println!("==============================");
    println!();
    println!("Events:         {}", format_count(m.total_events as u64));
    println!("Sessions:       {}", format_count(m.unique_sessions as u64));
    println!("Workspaces:     {}", m.unique_workspaces);
    println!("Active days:    {}", m.active_days);
    println!(
        "Tokens (est.):  {} (avg {:.1}/event)",
        format_count(m.total_tokens),
        m.average_tokens_per_event
    );
    if let Some(avg) = m.average_duration_ms {
        println!("Avg response:   {avg:.0}ms ({} timed)", m.events_with_duration);
    }
    if m.cancelled_events > 0 {
        println!("Cancelled:      {}", m.cancelled_events);
    }
}

fn print_dimension(title: &str, rows: &[DimensionMetrics]) {
    if rows.is_empty() {
        return;
    }
    println!();
    println!("{title}:");
    for row in rows.iter().take(TOP_N) {
        let duration = row
            .average_duration_ms
            .map(|d| format!("{d:.0}ms"))
            .unwrap_or_else(|| "-".to_string());
        println!(
            "  {:<20} {:>8}  {:>5.1}%  {:>8}  {:>10} tok",
            row.name,
            row.count,
            row.percentage,
            duration,
            format_count(row.total_tokens)
        );
    }
    if rows.len() > TOP_N {
        println!("  ... {} more", rows.len() - TOP_N);
    }
}

fn print_timeline(result: &AnalyticsResult) {
    let peak = result.time_series.iter().map(|p| p.events).max().unwrap_or(0);
    println!();
    println!("Timeline:");
    for point in &result.time_series {
        let width = if peak == 0 { 0 } else { point.events * 40 / peak };
        println!("  {}  {:>6}  {}", point.date, point.events, "#".repeat(width));
    }
}

fn print_groups(result: &AnalyticsResult) {
    println!();
    println!("Instances:");
    for instance in &result.instances {
        println!(
            "  {}  {} events, {} sessions, {} windows, {} restarts, {}",
            instance.instance_id,
            instance.event_count,
            instance.session_count,
            instance.window_count,
            instance.extension_host_restarts,
            duration_string(chrono::Duration::milliseconds(instance.duration_ms))
        );
    }

    println!();
    println!("Sessions:");
    for session in &result.sessions {
        println!(
            "  {}  {} events, {} tok, {}",
            short_id(&session.session_id, 8),
            session.event_count,
            format_count(session.total_tokens),
            duration_string(chrono::Duration::milliseconds(session.duration_ms))
        );
    }
}
