//! Command-line interface for vscode-chat-insights.
//!
//! Commands:
//! - `scan`: Scan transcripts and report statistics
//! - `events`: List normalized events
//! - `analyze`: Run an analytics query
//! - `dashboard`: Show quick statistics
//! - `watch`: Stream new events as transcripts change
//! - `config`: View and modify configuration
//! - `settings`: View and modify persisted user settings

mod commands;

pub use commands::*;

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand, ValueEnum};
use tracing::warn;

use crate::config::Config;
use crate::error::{InsightsError, Result};
use crate::model::EventType;
use crate::service::UnifiedSessionService;
use crate::store::{JsonFileStore, KeyValueStore, MemoryStore};

/// Usage analytics for VS Code chat sessions.
#[derive(Debug, Parser)]
#[command(name = "chat-insights")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to run.
    #[command(subcommand)]
    pub command: Commands,

    /// Extra `workspaceStorage` directory to scan (repeatable).
    #[arg(short = 'd', long = "storage-dir", global = true)]
    pub storage_dirs: Vec<PathBuf>,

    /// Only scan explicitly given storage directories.
    #[arg(long, global = true)]
    pub no_default_roots: bool,

    /// State file for settings and scan statistics.
    #[arg(long, global = true, env = "CHAT_INSIGHTS_STATE_FILE")]
    pub state_file: Option<PathBuf>,

    /// Output format for structured data.
    #[arg(short = 'o', long, global = true, default_value = "text", env = "CHAT_INSIGHTS_OUTPUT")]
    pub output: OutputFormat,

    /// Output as JSON (shorthand for -o json).
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress non-essential output.
    #[arg(short = 'q', long, global = true)]
    pub quiet: bool,

    /// Log level (error, warn, info, debug, trace).
    #[arg(long, global = true, default_value = "warn", env = "CHAT_INSIGHTS_LOG_LEVEL")]
    pub log_level: LogLevel,

    /// Log format (text, json, compact, pretty).
    #[arg(long, global = true, default_value = "text", env = "CHAT_INSIGHTS_LOG_FORMAT")]
    pub log_format: LogFormat,

    /// Path to custom configuration file.
    #[arg(long, global = true, env = "CHAT_INSIGHTS_CONFIG")]
    pub config: Option<PathBuf>,
}

/// Log level options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum LogLevel {
    /// Only errors.
    Error,
    /// Errors and warnings.
    #[default]
    Warn,
    /// Errors, warnings, and informational messages.
    Info,
    /// All of the above plus debug messages.
    Debug,
    /// All messages including trace-level details.
    Trace,
}

/// Log format options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum LogFormat {
    /// Human-readable text format.
    #[default]
    Text,
    /// Structured JSON format for machine consumption.
    Json,
    /// Compact single-line format.
    Compact,
    /// Pretty format with full details.
    Pretty,
}

impl LogLevel {
    /// Convert to tracing filter level.
    #[must_use]
    pub fn to_filter_string(self) -> &'static str {
        match self {
            Self::Error => "error",
            Self::Warn => "warn",
            Self::Info => "info",
            Self::Debug => "debug",
            Self::Trace => "trace",
        }
    }
}

/// Output format for CLI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text.
    #[default]
    Text,
    /// JSON output.
    Json,
}

impl Cli {
    /// Get effective output format.
    #[must_use]
    pub fn effective_output(&self) -> OutputFormat {
        if self.json {
            OutputFormat::Json
        } else {
            self.output
        }
    }
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Scan transcripts and report statistics.
    Scan(ScanArgs),

    /// List normalized events.
    #[command(alias = "ls")]
    Events(EventsArgs),

    /// Run an analytics query.
    #[command(alias = "stats")]
    Analyze(AnalyzeArgs),

    /// Show quick statistics.
    #[command(alias = "dash")]
    Dashboard,

    /// Stream new events as transcripts change.
    Watch(WatchArgs),

    /// View and modify configuration.
    #[command(alias = "cfg")]
    Config(ConfigArgs),

    /// View and modify persisted settings.
    Settings(SettingsArgs),
}

/// Arguments for the scan command.
#[derive(Debug, Parser)]
pub struct ScanArgs {
    /// List skipped paths.
    #[arg(long)]
    pub diagnostics: bool,
}

/// Arguments for the events command.
#[derive(Debug, Parser)]
pub struct EventsArgs {
    /// Only events from the last N days.
    #[arg(long)]
    pub days: Option<u32>,

    /// Maximum number of events (newest first).
    #[arg(short = 'n', long)]
    pub limit: Option<usize>,
}

/// Arguments for the analyze command.
#[derive(Debug, Parser)]
pub struct AnalyzeArgs {
    /// Number of days ending today.
    #[arg(long, default_value = "30")]
    pub days: u32,

    /// Restrict to event types (repeatable).
    #[arg(short = 't', long = "type")]
    pub event_types: Vec<EventType>,

    /// Restrict to languages (repeatable).
    #[arg(short = 'l', long = "language")]
    pub languages: Vec<String>,

    /// Restrict to models (repeatable).
    #[arg(short = 'm', long = "model")]
    pub models: Vec<String>,

    /// Restrict to session ids (repeatable).
    #[arg(short = 's', long = "session")]
    pub sessions: Vec<String>,

    /// Include the daily timeline.
    #[arg(long)]
    pub timeline: bool,

    /// Include session, instance and window groupings.
    #[arg(long)]
    pub groups: bool,
}

/// Arguments for the watch command.
#[derive(Debug, Parser)]
pub struct WatchArgs {
    /// Stop after this many seconds.
    #[arg(long)]
    pub timeout: Option<u64>,
}

/// Arguments for the config command.
#[derive(Debug, Parser)]
pub struct ConfigArgs {
    /// Config action.
    #[command(subcommand)]
    pub action: ConfigAction,
}

/// Config actions.
#[derive(Debug, Clone, Subcommand)]
pub enum ConfigAction {
    /// Show the effective configuration.
    Show,
    /// Get one value (`scanner.batch_size`).
    Get {
        /// Dotted key.
        key: String,
    },
    /// Set one value and save.
    Set {
        /// Dotted key.
        key: String,
        /// New value.
        value: String,
    },
    /// Print the configuration file path.
    Path,
    /// Write a default configuration file.
    Init,
    /// Reset the configuration file to defaults.
    Reset,
}

/// Arguments for the settings command.
#[derive(Debug, Parser)]
pub struct SettingsArgs {
    /// Settings action.
    #[command(subcommand)]
    pub action: SettingsAction,
}

/// Settings actions.
#[derive(Debug, Clone, Subcommand)]
pub enum SettingsAction {
    /// Show current settings.
    Show,
    /// Apply `key=value` assignments (`retentionDays=30`).
    Set {
        /// Assignments.
        #[arg(required = true)]
        assignments: Vec<String>,
    },
    /// Restore defaults.
    Reset,
}

/// Initialize tracing/logging based on CLI options.
fn init_logging(cli: &Cli) {
    use tracing_subscriber::{
        fmt::{self, format::FmtSpan},
        layer::SubscriberExt,
        util::SubscriberInitExt,
        EnvFilter,
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(cli.log_level.to_filter_string()));

    let result = match cli.log_format {
        LogFormat::Json => {
            let layer = fmt::layer()
                .json()
                .with_span_events(FmtSpan::CLOSE)
                .with_file(true)
                .with_line_number(true)
                .with_writer(std::io::stderr);
            tracing_subscriber::registry()
                .with(filter)
                .with(layer)
                .try_init()
        }
        LogFormat::Compact => {
            let layer = fmt::layer()
                .compact()
                .with_target(false)
                .with_writer(std::io::stderr);
            tracing_subscriber::registry()
                .with(filter)
                .with(layer)
                .try_init()
        }
        LogFormat::Pretty => {
            let layer = fmt::layer()
                .pretty()
                .with_file(true)
                .with_line_number(true)
                .with_writer(std::io::stderr);
            tracing_subscriber::registry()
                .with(filter)
                .with(layer)
                .try_init()
        }
        LogFormat::Text => {
            let layer = fmt::layer().with_writer(std::io::stderr);
            tracing_subscriber::registry()
                .with(filter)
                .with(layer)
                .try_init()
        }
    };

    if let Err(e) = result {
        eprintln!("Warning: Could not initialize logging: {e}");
    }
}

/// Load configuration and fold in the storage flags.
pub fn load_config(cli: &Cli) -> Config {
    let mut config = match &cli.config {
        Some(path) => Config::load_from(path).unwrap_or_else(|e| {
            eprintln!("Warning: Failed to load config from {}: {}", path.display(), e);
            Config::default()
        }),
        None => Config::load().unwrap_or_else(|e| {
            warn!(error = %e, "Falling back to default configuration");
            Config::default()
        }),
    };

    config.scanner.storage_roots.extend(cli.storage_dirs.iter().cloned());
    if cli.no_default_roots {
        config.scanner.include_default_roots = false;
    }
    if let Some(state_file) = &cli.state_file {
        config.store.path = Some(state_file.clone());
    }
    config
}

/// Open the state file, or an in-memory store if no location is known.
pub fn open_store(config: &Config) -> Result<Arc<dyn KeyValueStore>> {
    match config.state_path() {
        Ok(path) => Ok(Arc::new(JsonFileStore::open(path)?)),
        Err(e) => {
            warn!(error = %e, "No state file location, settings will not persist");
            Ok(Arc::new(MemoryStore::new()))
        }
    }
}

/// Build the session service for a command.
pub fn build_service(config: &Config) -> Result<UnifiedSessionService> {
    UnifiedSessionService::initialize(config, open_store(config)?)
}

async fn dispatch(cli: &Cli) -> Result<()> {
    let config = load_config(cli);

    match &cli.command {
        Commands::Scan(args) => commands::scan::run(cli, &config, args).await,
        Commands::Events(args) => commands::events::run(cli, &config, args).await,
        Commands::Analyze(args) => commands::analyze::run(cli, &config, args).await,
        Commands::Dashboard => commands::dashboard::run(cli, &config).await,
        Commands::Watch(args) => commands::watch::run(cli, &config, args).await,
        Commands::Config(args) => commands::config::run(cli, &config, args),
        Commands::Settings(args) => commands::settings::run(cli, &config, args),
    }
}

/// Run the CLI application.
pub fn run() -> Result<()> {
    let cli = Cli::parse();

    init_logging(&cli);

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| InsightsError::io("Failed to start async runtime", e))?;

    runtime.block_on(dispatch(&cli))
}
