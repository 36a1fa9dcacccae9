//! Config command - View and manage meddir configuration
//!
//! Provides the `meddir config` CLI command which:
//! 1. Shows the effective configuration (YAML or JSON)
//! 2. Prints the configuration file path
//! 3. Sets individual values via dot-notation keys
//! 4. Validates the configuration file and reports errors

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Subcommand;
use meddir_core::config::Config;
use tracing::info;

use super::CommandContext;
use crate::output::plural;

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Display current configuration
    Show,
    /// Print the configuration file path
    Path,
    /// Set a configuration value
    Set {
        /// Configuration key (e.g., "sync.poll_interval_secs")
        key: String,
        /// New value
        value: String,
    },
    /// Validate configuration file
    Validate,
}

impl ConfigCommand {
    pub async fn execute(&self, ctx: &CommandContext) -> Result<()> {
        match self {
            ConfigCommand::Show => execute_show(ctx),
            ConfigCommand::Path => execute_path(ctx),
            ConfigCommand::Set { key, value } => execute_set(ctx, key, value),
            ConfigCommand::Validate => execute_validate(ctx),
        }
    }
}

fn execute_show(ctx: &CommandContext) -> Result<()> {
    let formatter = ctx.formatter();
    info!(config_path = %ctx.config_path.display(), "Showing configuration");

    if ctx.format.is_json() {
        let json = serde_json::to_value(&ctx.config)
            .context("Failed to serialize configuration to JSON")?;
        formatter.print_json(&json);
        return Ok(());
    }

    formatter.success(&format!("Configuration ({})", ctx.config_path.display()));
    formatter.info("");
    let yaml =
        serde_yaml::to_string(&ctx.config).context("Failed to serialize configuration to YAML")?;
    for line in yaml.lines() {
        formatter.info(line);
    }
    Ok(())
}

fn execute_path(ctx: &CommandContext) -> Result<()> {
    if ctx.format.is_json() {
        ctx.formatter().print_json(&serde_json::json!({
            "config_path": ctx.config_path.display().to_string(),
            "exists": ctx.config_path.exists(),
        }));
    } else {
        println!("{}", ctx.config_path.display());
    }
    Ok(())
}

fn execute_set(ctx: &CommandContext, key: &str, value: &str) -> Result<()> {
    let formatter = ctx.formatter();
    let mut config = Config::load_or_default(&ctx.config_path);

    info!(key = %key, value = %value, "Setting configuration value");

    if let Err(e) = apply_config_value(&mut config, key, value) {
        if ctx.format.is_json() {
            formatter.print_json(&serde_json::json!({
                "success": false,
                "key": key,
                "error": e.to_string(),
            }));
        } else {
            formatter.error(&format!("Failed to set '{}': {}", key, e));
            formatter.info("");
            formatter.info("Supported keys:");
            for (name, help) in SUPPORTED_KEYS {
                formatter.info(&format!("  {:<36} - {}", name, help));
            }
        }
        return Ok(());
    }

    let errors = config.validate();
    if !errors.is_empty() {
        let messages: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
        if ctx.format.is_json() {
            formatter.print_json(&serde_json::json!({
                "success": false,
                "key": key,
                "errors": messages,
            }));
        } else {
            formatter.error(&format!("Invalid value for '{}': {}", key, messages.join("; ")));
        }
        return Ok(());
    }

    save_config(&config, &ctx.config_path)?;

    if ctx.format.is_json() {
        formatter.print_json(&serde_json::json!({
            "success": true,
            "key": key,
            "value": value,
            "config_path": ctx.config_path.display().to_string(),
        }));
    } else {
        formatter.success(&format!("Set {} = {}", key, value));
        formatter.info(&format!("Saved to {}", ctx.config_path.display()));
    }
    Ok(())
}

fn execute_validate(ctx: &CommandContext) -> Result<()> {
    let formatter = ctx.formatter();
    let path = ctx.config_path.display().to_string();

    let config = match Config::load(&ctx.config_path) {
        Ok(config) => config,
        Err(_) if !ctx.config_path.exists() => {
            if ctx.format.is_json() {
                formatter.print_json(&serde_json::json!({
                    "valid": true,
                    "config_path": path,
                    "defaults": true,
                    "errors": [],
                }));
            } else {
                formatter.info(&format!("Configuration file not found at {}", path));
                formatter.info("Using default configuration. Run 'meddir config set <key> <value>' to create one.");
            }
            return Ok(());
        }
        Err(e) => {
            if ctx.format.is_json() {
                formatter.print_json(&serde_json::json!({
                    "valid": false,
                    "config_path": path,
                    "errors": [format!("Failed to parse configuration: {}", e)],
                }));
            } else {
                formatter.error(&format!("Failed to parse configuration: {}", e));
                formatter.info(&format!("File: {}", path));
            }
            return Ok(());
        }
    };

    info!(config_path = %path, "Validating configuration");
    let errors = config.validate();

    if ctx.format.is_json() {
        let messages: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
        formatter.print_json(&serde_json::json!({
            "valid": errors.is_empty(),
            "config_path": path,
            "errors": messages,
        }));
    } else if errors.is_empty() {
        formatter.success("Configuration is valid");
        formatter.info(&format!("File: {}", path));
    } else {
        formatter.error(&format!(
            "Configuration has {} error{}:",
            errors.len(),
            plural(errors.len() as u64)
        ));
        formatter.info(&format!("File: {}", path));
        formatter.info("");
        for error in &errors {
            formatter.info(&format!("  {} - {}", error.field, error.message));
        }
    }
    Ok(())
}

fn save_config(config: &Config, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).context("Failed to create configuration directory")?;
    }
    let yaml = serde_yaml::to_string(config).context("Failed to serialize configuration")?;
    std::fs::write(path, yaml).context("Failed to write configuration file")?;
    Ok(())
}

const SUPPORTED_KEYS: &[(&str, &str)] = &[
    ("remote.base_url", "Origin of the remote authority"),
    ("remote.auth_header", "Authentication header name (\"none\" to unset)"),
    ("remote.auth_token", "Authentication token (\"none\" to unset)"),
    ("remote.timeout_secs", "Per-request timeout in seconds"),
    ("store.database_path", "Local store database file"),
    ("sync.poll_interval_secs", "Seconds between periodic cycles (0 disables)"),
    ("sync.startup_delay_ms", "Delay before the first cycle"),
    ("sync.max_attempts", "Attempts before an operation is marked failed"),
    ("sync.backoff.enabled", "true|false"),
    ("sync.backoff.base_ms", "Backoff after the first failure"),
    ("sync.backoff.max_ms", "Backoff upper bound"),
    ("content_cache.dir", "Content cache directory"),
    ("content_cache.max_size_mb", "Document cache ceiling (MiB)"),
    ("content_cache.target_percent", "Eviction target share of the ceiling"),
    ("content_cache.prime_delay_ms", "Pause between priming downloads"),
    ("intercept.max_dynamic_entries", "Dynamic cache entry cap"),
    ("intercept.offline_page", "Page served to offline navigations"),
    ("logging.level", "trace|debug|info|warn|error"),
];

fn parse<T: std::str::FromStr>(key: &str, value: &str) -> Result<T>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    value
        .parse::<T>()
        .with_context(|| format!("Invalid value for {}: '{}'", key, value))
}

fn optional(value: &str) -> Option<String> {
    if value.is_empty() || value == "none" {
        None
    } else {
        Some(value.to_string())
    }
}

/// Apply a dot-notation key/value pair to a Config struct
fn apply_config_value(config: &mut Config, key: &str, value: &str) -> Result<()> {
    match key {
        // --- remote ---
        "remote.base_url" => config.remote.base_url = value.to_string(),
        "remote.auth_header" => config.remote.auth_header = optional(value),
        "remote.auth_token" => config.remote.auth_token = optional(value),
        "remote.timeout_secs" => config.remote.timeout_secs = parse(key, value)?,

        // --- store ---
        "store.database_path" => config.store.database_path = PathBuf::from(value),

        // --- sync ---
        "sync.poll_interval_secs" => config.sync.poll_interval_secs = parse(key, value)?,
        "sync.startup_delay_ms" => config.sync.startup_delay_ms = parse(key, value)?,
        "sync.max_attempts" => config.sync.max_attempts = parse(key, value)?,
        "sync.backoff.enabled" => config.sync.backoff.enabled = parse(key, value)?,
        "sync.backoff.base_ms" => config.sync.backoff.base_ms = parse(key, value)?,
        "sync.backoff.max_ms" => config.sync.backoff.max_ms = parse(key, value)?,

        // --- content_cache ---
        "content_cache.dir" => config.content_cache.dir = PathBuf::from(value),
        "content_cache.max_size_mb" => config.content_cache.max_size_mb = parse(key, value)?,
        "content_cache.target_percent" => {
            config.content_cache.target_percent = parse(key, value)?
        }
        "content_cache.prime_delay_ms" => {
            config.content_cache.prime_delay_ms = parse(key, value)?
        }

        // --- intercept ---
        "intercept.max_dynamic_entries" => {
            config.intercept.max_dynamic_entries = parse(key, value)?
        }
        "intercept.offline_page" => config.intercept.offline_page = value.to_string(),

        // --- logging ---
        "logging.level" => config.logging.level = value.to_string(),

        _ => anyhow::bail!("Unknown configuration key: '{}'", key),
    }

    Ok(())
}
