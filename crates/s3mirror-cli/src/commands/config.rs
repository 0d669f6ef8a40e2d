//! Config command - View and manage s3mirror configuration
//!
//! Provides the `s3mirror config` CLI command which:
//! 1. Shows the current configuration with credentials masked
//! 2. Sets individual configuration values via dot-notation keys
//! 3. Validates the configuration file and reports errors
//! 4. Prints the configuration file path

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::Subcommand;
use s3mirror_core::config::Config;
use tracing::info;

use crate::output::{get_formatter, OutputFormat};

/// Keys accepted by `config set`, with a short description
const SUPPORTED_KEYS: &[(&str, &str)] = &[
    ("target.local_folder", "Local directory to mirror"),
    ("target.bucket", "Destination bucket"),
    ("target.s3_path", "Key prefix inside the bucket"),
    ("credentials.access_key", "Access key id (empty for ambient credentials)"),
    ("credentials.secret_key", "Secret access key"),
    ("store.region", "Region override (empty or 'none' to unset)"),
    ("store.endpoint_url", "Custom endpoint (empty or 'none' to unset)"),
    ("store.force_path_style", "true|false"),
    ("store.verify_bucket", "true|false"),
    ("logging.level", "trace|debug|info|warn|error"),
    ("logging.json", "true|false"),
];

/// Config subcommands
#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Display current configuration
    Show,
    /// Set a configuration value
    Set {
        /// Configuration key (e.g., "target.bucket")
        key: String,
        /// New value
        value: String,
    },
    /// Validate configuration file
    Validate,
    /// Print the configuration file path
    Path,
}

impl ConfigCommand {
    /// Execute the config command
    pub async fn execute(&self, format: OutputFormat, config_path: &Path) -> Result<()> {
        match self {
            ConfigCommand::Show => execute_show(format, config_path),
            ConfigCommand::Set { key, value } => execute_set(key, value, format, config_path),
            ConfigCommand::Validate => execute_validate(format, config_path),
            ConfigCommand::Path => {
                if format.is_json() {
                    get_formatter(format).print_json(&serde_json::json!({
                        "config_path": config_path.display().to_string(),
                        "exists": config_path.exists(),
                    }));
                } else {
                    println!("{}", config_path.display());
                }
                Ok(())
            }
        }
    }
}

fn execute_show(format: OutputFormat, config_path: &Path) -> Result<()> {
    let formatter = get_formatter(format);
    let config = Config::load_or_default(config_path).redacted();

    info!(config_path = %config_path.display(), "Showing configuration");

    if format.is_json() {
        let json =
            serde_json::to_value(&config).context("Failed to serialize configuration to JSON")?;
        formatter.print_json(&json);
    } else {
        formatter.success(&format!("Configuration ({})", config_path.display()));
        formatter.info("");

        let yaml =
            serde_yaml::to_string(&config).context("Failed to serialize configuration to YAML")?;
        for line in yaml.lines() {
            formatter.info(line);
        }
    }

    Ok(())
}

fn execute_set(key: &str, value: &str, format: OutputFormat, config_path: &Path) -> Result<()> {
    let formatter = get_formatter(format);
    let mut config = Config::load_or_default(config_path);
    let shown_value = if key.starts_with("credentials.") && !value.is_empty() {
        "********"
    } else {
        value
    };

    info!(key = %key, value = %shown_value, "Setting configuration value");

    if let Err(e) = apply_config_value(&mut config, key, value) {
        if !format.is_json() {
            formatter.info("Supported keys:");
            for (name, help) in SUPPORTED_KEYS {
                formatter.info(&format!("  {name:<26} - {help}"));
            }
        }
        return Err(e);
    }

    // Only errors on the key being set block the save, so a config can be
    // filled in one key at a time.
    let errors: Vec<String> = config
        .validate()
        .into_iter()
        .filter(|e| e.field == key)
        .map(|e| e.message)
        .collect();
    if !errors.is_empty() {
        bail!("Invalid value for '{}': {}", key, errors.join("; "));
    }

    config.save(config_path)?;

    if format.is_json() {
        formatter.print_json(&serde_json::json!({
            "success": true,
            "key": key,
            "value": shown_value,
            "config_path": config_path.display().to_string(),
        }));
    } else {
        formatter.success(&format!("Set {key} = {shown_value}"));
        formatter.info(&format!("Saved to {}", config_path.display()));
    }
    Ok(())
}

fn execute_validate(format: OutputFormat, config_path: &Path) -> Result<()> {
    let formatter = get_formatter(format);

    if !config_path.exists() {
        bail!(
            "Configuration file not found at {}. Run 's3mirror config set <key> <value>' to create one.",
            config_path.display()
        );
    }
    let config = Config::load(config_path)?;

    info!(config_path = %config_path.display(), "Validating configuration");

    let errors = config.validate();

    if format.is_json() {
        let error_strings: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
        formatter.print_json(&serde_json::json!({
            "valid": errors.is_empty(),
            "config_path": config_path.display().to_string(),
            "errors": error_strings,
        }));
    } else if errors.is_empty() {
        formatter.success("Configuration is valid");
        formatter.info(&format!("File: {}", config_path.display()));
    } else {
        formatter.info(&format!("File: {}", config_path.display()));
        for error in &errors {
            formatter.info(&format!("  {} - {}", error.field, error.message));
        }
    }

    if !errors.is_empty() {
        bail!(
            "Configuration has {} error{}",
            errors.len(),
            if errors.len() == 1 { "" } else { "s" }
        );
    }
    Ok(())
}

/// Apply a dot-notation key/value pair to a Config struct
fn apply_config_value(config: &mut Config, key: &str, value: &str) -> Result<()> {
    match key {
        // --- target ---
        "target.local_folder" => config.target.local_folder = PathBuf::from(value),
        "target.bucket" => config.target.bucket = value.trim().to_string(),
        "target.s3_path" => config.target.s3_path = value.to_string(),

        // --- credentials ---
        "credentials.access_key" => config.credentials.access_key = value.trim().to_string(),
        "credentials.secret_key" => config.credentials.secret_key = value.trim().to_string(),

        // --- store ---
        "store.region" => config.store.region = optional(value),
        "store.endpoint_url" => config.store.endpoint_url = optional(value),
        "store.force_path_style" => {
            config.store.force_path_style = value
                .parse::<bool>()
                .context("Expected true or false for store.force_path_style")?;
        }
        "store.verify_bucket" => {
            config.store.verify_bucket = value
                .parse::<bool>()
                .context("Expected true or false for store.verify_bucket")?;
        }

        // --- logging ---
        "logging.level" => config.logging.level = value.to_string(),
        "logging.json" => {
            config.logging.json = value
                .parse::<bool>()
                .context("Expected true or false for logging.json")?;
        }

        _ => bail!("Unknown configuration key: '{}'", key),
    }

    Ok(())
}

fn optional(value: &str) -> Option<String> {
    let value = value.trim();
    if value.is_empty() || value == "none" {
        None
    } else {
        Some(value.to_string())
    }
}
