//! CLI command implementations.
//!
//! Each command is implemented in its own module with a `run` function
//! that handles the command logic.

pub mod analyze;
pub mod config;
pub mod dashboard;
pub mod events;
pub mod scan;
pub mod settings;
pub mod watch;

use serde::Serialize;

use crate::error::{InsightsError, Result};

/// Print a value as pretty JSON on stdout.
pub fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).map_err(|e| InsightsError::SerializationError {
        context: "Failed to serialize output".to_string(),
        source: e,
    })?;
    println!("{json}");
    Ok(())
}
