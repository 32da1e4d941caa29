//! Error types for vscode-chat-insights.
//!
//! Most failures in this crate are recovered locally: a broken transcript
//! becomes a skipped file, an unreachable storage root becomes a diagnostic.
//! The variants below are what crosses a component boundary when a failure
//! is not recoverable, or what gets recorded as a diagnostic when it is.

use std::path::PathBuf;

use thiserror::Error;

/// Primary error type for vscode-chat-insights operations.
#[derive(Error, Debug)]
pub enum InsightsError {
    /// Transcript content is not valid JSON.
    #[error("Failed to parse transcript {path}: {message}")]
    ParseError {
        /// Path of the transcript.
        path: PathBuf,
        /// Human-readable error message.
        message: String,
        /// Underlying serde_json error, if available.
        #[source]
        source: Option<serde_json::Error>,
    },

    /// Transcript parsed but failed structural validation.
    #[error("Invalid transcript {path}: {reason}")]
    InvalidSession {
        /// Path of the transcript.
        path: PathBuf,
        /// Which check failed.
        reason: String,
    },

    /// Transcript exceeds the configured size limit.
    #[error("Transcript {path} is {size} bytes (limit {max_size})")]
    FileTooLarge {
        /// Path of the transcript.
        path: PathBuf,
        /// Actual file size.
        size: u64,
        /// Configured limit.
        max_size: u64,
    },

    /// File not found.
    #[error("File not found: {path}")]
    FileNotFound {
        /// Path to the missing file.
        path: PathBuf,
    },

    /// A storage root could not be listed.
    #[error("Storage root unavailable: {path}")]
    StorageRootUnavailable {
        /// Root that could not be read.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// A single request could not be turned into an event.
    #[error("Cannot transform request {request_id} of session {session_id}: {reason}")]
    TransformError {
        /// Session the request belongs to.
        session_id: String,
        /// Offending request.
        request_id: String,
        /// Why the request was rejected.
        reason: String,
    },

    /// File watching failed.
    #[error("Watch error: {message}")]
    WatchError {
        /// Human-readable error message.
        message: String,
        /// Underlying notify error, if any.
        #[source]
        source: Option<notify::Error>,
    },

    /// A required collaborator was used before it was ready.
    #[error("{component} is not initialized")]
    NotInitialized {
        /// Name of the collaborator.
        component: String,
    },

    /// Configuration error.
    #[error("Configuration error: {message}")]
    ConfigError {
        /// Human-readable error message.
        message: String,
    },

    /// Invalid configuration file contents.
    #[error("Invalid configuration: {message}")]
    InvalidConfig {
        /// Human-readable error message.
        message: String,
    },

    /// I/O error.
    #[error("I/O error: {context}")]
    IoError {
        /// Context describing the operation that failed.
        context: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Serialization error.
    #[error("Serialization error: {context}")]
    SerializationError {
        /// Context describing the operation that failed.
        context: String,
        /// Underlying serde_json error.
        #[source]
        source: serde_json::Error,
    },

    /// Analytics calculation error.
    #[error("Analytics calculation failed: {message}")]
    AnalyticsError {
        /// Human-readable error message.
        message: String,
    },

    /// Unsupported operation or platform feature.
    #[error("Unsupported: {feature}")]
    Unsupported {
        /// Name of the unsupported feature.
        feature: String,
    },

    /// Invalid argument.
    #[error("Invalid argument '{name}': {reason}")]
    InvalidArgument {
        /// Name of the invalid argument.
        name: String,
        /// Reason why the argument is invalid.
        reason: String,
    },

    /// Interrupted operation.
    #[error("Operation interrupted")]
    Interrupted,
}

impl InsightsError {
    /// Create a new parse error.
    #[must_use]
    pub fn parse(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::ParseError {
            path: path.into(),
            message: message.into(),
            source: None,
        }
    }

    /// Create a new parse error with source.
    #[must_use]
    pub fn parse_with_source(path: impl Into<PathBuf>, source: serde_json::Error) -> Self {
        Self::ParseError {
            path: path.into(),
            message: source.to_string(),
            source: Some(source),
        }
    }

    /// Create a new validation error.
    #[must_use]
    pub fn invalid(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::InvalidSession {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create a new I/O error with context.
    #[must_use]
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::IoError {
            context: context.into(),
            source,
        }
    }

    /// Create a new transform error.
    #[must_use]
    pub fn transform(
        session_id: impl Into<String>,
        request_id: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::TransformError {
            session_id: session_id.into(),
            request_id: request_id.into(),
            reason: reason.into(),
        }
    }

    /// Create a new watch error.
    #[must_use]
    pub fn watch(message: impl Into<String>) -> Self {
        Self::WatchError {
            message: message.into(),
            source: None,
        }
    }

    /// Create a new not-initialized error.
    #[must_use]
    pub fn not_initialized(component: impl Into<String>) -> Self {
        Self::NotInitialized {
            component: component.into(),
        }
    }

    /// Get the exit code for this error.
    #[must_use]
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::ParseError { .. } | Self::InvalidSession { .. } => 2,
            Self::FileNotFound { .. } => 3,
            Self::StorageRootUnavailable { .. } => 4,
            Self::ConfigError { .. } | Self::InvalidConfig { .. } | Self::NotInitialized { .. } => 5,
            Self::AnalyticsError { .. } => 6,
            Self::WatchError { .. } => 7,
            Self::InvalidArgument { .. } => 64,
            Self::Interrupted => 130,
            Self::IoError { .. } => 74,
            _ => 1,
        }
    }

    /// Check if this error is recoverable (skip the item, keep going).
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::ParseError { .. }
                | Self::InvalidSession { .. }
                | Self::FileTooLarge { .. }
                | Self::StorageRootUnavailable { .. }
                | Self::TransformError { .. }
        )
    }
}

/// Result type alias for vscode-chat-insights operations.
pub type Result<T> = std::result::Result<T, InsightsError>;

impl From<std::io::Error> for InsightsError {
    fn from(err: std::io::Error) -> Self {
        Self::IoError {
            context: "I/O operation failed".to_string(),
            source: err,
        }
    }
}

impl From<serde_json::Error> for InsightsError {
    fn from(err: serde_json::Error) -> Self {
        Self::SerializationError {
            context: "JSON operation failed".to_string(),
            source: err,
        }
    }
}

impl From<notify::Error> for InsightsError {
    fn from(err: notify::Error) -> Self {
        Self::WatchError {
            message: err.to_string(),
            source: Some(err),
        }
    }
}

/// Exit codes for CLI operations.
pub mod exit_codes {
    /// Operation completed successfully.
    pub const EXIT_SUCCESS: i32 = 0;
    /// General/unspecified error.
    pub const EXIT_GENERAL_ERROR: i32 = 1;
    /// Transcript parsing failed.
    pub const EXIT_PARSE_ERROR: i32 = 2;
    /// Specified file not found.
    pub const EXIT_FILE_NOT_FOUND: i32 = 3;
    /// Storage root could not be read.
    pub const EXIT_STORAGE_ERROR: i32 = 4;
    /// Invalid configuration.
    pub const EXIT_CONFIG_ERROR: i32 = 5;
    /// Analytics computation failed.
    pub const EXIT_ANALYTICS_ERROR: i32 = 6;
    /// File watching failed.
    pub const EXIT_WATCH_ERROR: i32 = 7;
    /// Invalid command-line usage (BSD standard).
    pub const EXIT_USAGE_ERROR: i32 = 64;
    /// I/O error (BSD standard).
    pub const EXIT_IO_ERROR: i32 = 74;
    /// Terminated by Ctrl+C (128 + SIGINT).
    pub const EXIT_INTERRUPTED: i32 = 130;
}
