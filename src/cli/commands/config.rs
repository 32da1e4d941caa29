//! Config command implementation.
//!
//! View and modify the configuration file.

use std::path::PathBuf;

use crate::cli::{Cli, ConfigAction, ConfigArgs, OutputFormat};
use crate::config::{default_config_path, Config};
use crate::error::{InsightsError, Result};

use super::print_json;

/// Run the config command.
///
/// `effective` is the configuration after command-line flags were applied;
/// `show` and `get` report it, the mutating actions work on the file.
pub fn run(cli: &Cli, effective: &Config, args: &ConfigArgs) -> Result<()> {
    match &args.action {
        ConfigAction::Show => show_config(cli, effective),
        ConfigAction::Get { key } => {
            let value = get_value(effective, key)?;
            match cli.effective_output() {
                OutputFormat::Json => print_json(&serde_json::json!({ key: value })),
                OutputFormat::Text => {
                    println!("{value}");
                    Ok(())
                }
            }
        }
        ConfigAction::Set { key, value } => {
            let path = config_path(cli)?;
            let mut config = if path.exists() {
                Config::load_from(&path)?
            } else {
                Config::default()
            };
            set_value(&mut config, key, value)?;
            config.validate()?;
            config.save_to(&path)?;
            println!("Set {key} = {value}");
            Ok(())
        }
        ConfigAction::Path => {
            println!("{}", config_path(cli)?.display());
            Ok(())
        }
        ConfigAction::Init => {
            let path = config_path(cli)?;
            if path.exists() {
                println!("Configuration file already exists at: {}", path.display());
                println!("Use 'chat-insights config reset' to reset to defaults.");
                return Ok(());
            }
            Config::default().save_to(&path)?;
            println!("Created configuration file at: {}", path.display());
            Ok(())
        }
        ConfigAction::Reset => {
            let path = config_path(cli)?;
            if !path.exists() {
                println!("No configuration file exists. Use 'chat-insights config init' to create one.");
                return Ok(());
            }
            Config::default().save_to(&path)?;
            println!("Reset configuration to defaults at: {}", path.display());
            Ok(())
        }
    }
}

fn config_path(cli: &Cli) -> Result<PathBuf> {
    match &cli.config {
        Some(path) => Ok(path.clone()),
        None => default_config_path(),
    }
}

/// Show full configuration.
fn show_config(cli: &Cli, config: &Config) -> Result<()> {
    if cli.effective_output() == OutputFormat::Json {
        return print_json(config);
    }

    let content = toml::to_string_pretty(config).map_err(|e| InsightsError::InvalidConfig {
        message: format!("Failed to serialize config: {e}"),
    })?;
    print!("{content}");
    Ok(())
}

/// Read one dotted key.
pub fn get_value(config: &Config, key: &str) -> Result<String> {
    let value = match key {
        "scanner.max_file_size" => config.scanner.max_file_size.to_string(),
        "scanner.batch_size" => config.scanner.batch_size.to_string(),
        "scanner.debounce_ms" => config.scanner.debounce_ms.to_string(),
        "scanner.include_default_roots" => config.scanner.include_default_roots.to_string(),
        "scanner.storage_roots" => config
            .scanner
            .storage_roots
            .iter()
            .map(|p| p.display().to_string())
            .collect::<Vec<_>>()
            .join(","),

        "cache.enabled" => config.cache.enabled.to_string(),
        "cache.ttl_seconds" => config.cache.ttl_seconds.to_string(),
        "cache.max_entries" => config.cache.max_entries.to_string(),

        "store.path" => config
            .store
            .path
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "(default)".to_string()),

        _ => {
            return Err(InsightsError::ConfigError {
                message: format!("Unknown configuration key: {key}"),
            })
        }
    };
    Ok(value)
}

/// Write one dotted key.
pub fn set_value(config: &mut Config, key: &str, value: &str) -> Result<()> {
    match key {
        "scanner.max_file_size" => config.scanner.max_file_size = parse_number(value)?,
        "scanner.batch_size" => config.scanner.batch_size = parse_number(value)?,
        "scanner.debounce_ms" => config.scanner.debounce_ms = parse_number(value)?,
        "scanner.include_default_roots" => config.scanner.include_default_roots = parse_bool(value)?,
        "scanner.storage_roots" => {
            config.scanner.storage_roots = value
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(PathBuf::from)
                .collect();
        }

        "cache.enabled" => config.cache.enabled = parse_bool(value)?,
        "cache.ttl_seconds" => config.cache.ttl_seconds = parse_number(value)?,
        "cache.max_entries" => config.cache.max_entries = parse_number(value)?,

        "store.path" => {
            config.store.path = if value.is_empty() {
                None
            } else {
                Some(PathBuf::from(value))
            };
        }

        _ => {
            return Err(InsightsError::ConfigError {
                message: format!("Unknown configuration key: {key}"),
            })
        }
    }
    Ok(())
}

/// Parse boolean value.
fn parse_bool(s: &str) -> Result<bool> {
    match s.to_lowercase().as_str() {
        "true" | "yes" | "1" | "on" => Ok(true),
        "false" | "no" | "0" | "off" => Ok(false),
        _ => Err(InsightsError::ConfigError {
            message: format!("Invalid boolean value: {s}. Use true/false."),
        }),
    }
}

/// Parse a number.
fn parse_number<T: std::str::FromStr>(s: &str) -> Result<T> {
    s.parse().map_err(|_| InsightsError::ConfigError {
        message: format!("Invalid number: {s}"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_then_get() {
        let mut config = Config::default();
        set_value(&mut config, "scanner.batch_size", "4").unwrap();
        set_value(&mut config, "cache.enabled", "off").unwrap();
        set_value(&mut config, "scanner.storage_roots", "/a, /b").unwrap();

        assert_eq!(get_value(&config, "scanner.batch_size").unwrap(), "4");
        assert_eq!(get_value(&config, "cache.enabled").unwrap(), "false");
        assert_eq!(get_value(&config, "scanner.storage_roots").unwrap(), "/a,/b");
        assert_eq!(get_value(&config, "store.path").unwrap(), "(default)");
    }

    #[test]
    fn test_invalid_keys_and_values() {
        let mut config = Config::default();
        assert!(set_value(&mut config, "theme.name", "dark").is_err());
        assert!(set_value(&mut config, "cache.ttl_seconds", "soon").is_err());
        assert!(set_value(&mut config, "cache.enabled", "maybe").is_err());
        assert!(get_value(&config, "nope").is_err());
    }
}
