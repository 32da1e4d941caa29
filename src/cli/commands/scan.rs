//! Scan command implementation.
//!
//! Runs a full scan and prints the statistics.

use crate::cli::{build_service, Cli, OutputFormat, ScanArgs};
use crate::config::Config;
use crate::discovery::{format_size, DiagnosticKind};
use crate::error::Result;
use crate::transform::count_by_type;
use crate::util::format_count;

use super::print_json;

/// Run the scan command.
pub async fn run(cli: &Cli, config: &Config, args: &ScanArgs) -> Result<()> {
    let service = build_service(config)?;
    let (events, stats) = service.scan_all_data().await?;

    if cli.effective_output() == OutputFormat::Json {
        return print_json(&serde_json::json!({
            "statistics": stats,
            "events": events.len(),
            "roots": service.scanner().roots(),
        }));
    }

    println!("Scan Results");
    println!("============");
    println!();
    println!("Roots:          {} of {} readable", stats.roots_scanned, service.scanner().roots().len());
    println!("Files:          {}", format_count(stats.scanned_files as u64));
    println!("Sessions:       {}", format_count(stats.parsed_sessions as u64));
    println!("Requests:       {}", format_count(stats.total_requests as u64));
    println!("Events:         {}", format_count(events.len() as u64));
    if stats.error_files > 0 {
        println!("Errors:         {}", stats.error_files);
    }
    if stats.skipped_files > 0 {
        println!("Skipped:        {} (too large)", stats.skipped_files);
    }
    if let (Some(oldest), Some(newest)) = (stats.oldest_session, stats.newest_session) {
        println!(
            "Sessions span:  {} to {}",
            oldest.format("%Y-%m-%d"),
            newest.format("%Y-%m-%d")
        );
    }
    println!("Duration:       {}ms", stats.scan_duration_ms);

    if !events.is_empty() && !cli.quiet {
        println!();
        println!("Event types:");
        for (event_type, count) in count_by_type(&events) {
            if count > 0 {
                println!("  {:<12} {}", event_type.to_string(), format_count(count as u64));
            }
        }
    }

    if args.diagnostics && !stats.diagnostics.is_empty() {
        println!();
        println!("Skipped paths:");
        for diagnostic in &stats.diagnostics {
            let reason = match &diagnostic.kind {
                DiagnosticKind::RootUnavailable { reason } => format!("root unavailable: {reason}"),
                DiagnosticKind::Unreadable { reason } => format!("unreadable: {reason}"),
                DiagnosticKind::Oversized { size, max_size } => {
                    format!("{} exceeds {}", format_size(*size), format_size(*max_size))
                }
            };
            println!("  {}  {reason}", diagnostic.path.display());
        }
    }

    Ok(())
}
