//! Settings command implementation.
//!
//! Reads and writes the user settings kept in the state file.

use crate::cli::{open_store, Cli, OutputFormat, SettingsAction, SettingsArgs};
use crate::config::Config;
use crate::error::Result;
use crate::store::Settings;

use super::print_json;

/// Run the settings command.
pub fn run(cli: &Cli, config: &Config, args: &SettingsArgs) -> Result<()> {
    let store = open_store(config)?;
    let mut settings = Settings::load(store.as_ref());

    match &args.action {
        SettingsAction::Show => {}
        SettingsAction::Set { assignments } => {
            for assignment in assignments {
                settings.apply(assignment)?;
            }
            settings.save(store.as_ref())?;
        }
        SettingsAction::Reset => {
            settings = Settings::default();
            settings.save(store.as_ref())?;
        }
    }

    if cli.effective_output() == OutputFormat::Json {
        return print_json(&settings);
    }

    println!("retentionDays     = {}", settings.retention_days);
    println!("autoCleanup       = {}", settings.auto_cleanup);
    println!("includePromptText = {}", settings.include_prompt_text);
    Ok(())
}
