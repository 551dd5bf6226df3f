use std::path::{Path, PathBuf};

use crate::config::schema::Config;
use crate::error::ConfigError;

const SCHEMA_JSON: &str = include_str!("../../schema/config-v1.json");

const MAX_RETRIES_LIMIT: u32 = 10;

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;

    load_config_from_str(&content)
}

/// Loads the config at `path`, or the built-in defaults when the file does
/// not exist. Any other read or validation failure is an error.
pub fn load_config_or_default<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let path = path.as_ref();
    if !path.exists() {
        log::info!(
            "No config file at {}, using defaults",
            path.display()
        );
        return Ok(Config::default());
    }
    load_config(path)
}

pub fn load_config_from_str(content: &str) -> Result<Config, ConfigError> {
    let json_value: serde_json::Value = serde_json::from_str(content)?;

    validate_schema(&json_value)?;

    let config: Config = serde_json::from_value(json_value)?;

    validate_config(&config)?;

    Ok(config)
}

/// Returns the canonical config path: `~/.propertypulse/config.json`.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join(".propertypulse").join("config.json"))
}

fn validate_schema(json_value: &serde_json::Value) -> Result<(), ConfigError> {
    let schema: serde_json::Value =
        serde_json::from_str(SCHEMA_JSON).map_err(|e| ConfigError::Validation {
            message: format!("Invalid embedded schema JSON: {}", e),
        })?;

    let validator = jsonschema::validator_for(&schema).map_err(|e| ConfigError::Validation {
        message: format!("Failed to compile JSON schema: {}", e),
    })?;

    let error_messages: Vec<String> = validator
        .iter_errors(json_value)
        .map(|e| e.to_string())
        .collect();
    if !error_messages.is_empty() {
        return Err(ConfigError::SchemaValidation {
            errors: error_messages.join("; "),
        });
    }

    Ok(())
}

pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.version != "1.0" {
        return Err(ConfigError::Validation {
            message: format!("Unsupported config version: {}", config.version),
        });
    }

    if config.pipeline.concurrency == 0 {
        return Err(ConfigError::Validation {
            message: "pipeline.concurrency must be at least 1".to_string(),
        });
    }

    if config.retry.max_retries > MAX_RETRIES_LIMIT {
        return Err(ConfigError::Validation {
            message: format!(
                "retry.max_retries must be at most {}, got {}",
                MAX_RETRIES_LIMIT, config.retry.max_retries
            ),
        });
    }

    if config.retry.max_backoff_ms < config.retry.initial_backoff_ms {
        return Err(ConfigError::Validation {
            message: "retry.max_backoff_ms must not be below retry.initial_backoff_ms".to_string(),
        });
    }

    if config.events.channel_capacity == 0 {
        return Err(ConfigError::Validation {
            message: "events.channel_capacity must be at least 1".to_string(),
        });
    }

    for host in &config.listing.allowed_hosts {
        if host.trim().is_empty() || host.contains('/') {
            return Err(ConfigError::Validation {
                message: format!("Invalid listing host: '{}'", host),
            });
        }
    }

    let endpoints = [
        ("extraction_url", &config.adapters.extraction_url),
        ("analysis_url", &config.adapters.analysis_url),
        ("visualization_url", &config.adapters.visualization_url),
    ];
    for (name, endpoint) in endpoints {
        if let Some(raw) = endpoint {
            validate_endpoint(name, raw)?;
        }
    }

    Ok(())
}

fn validate_endpoint(name: &str, raw: &str) -> Result<(), ConfigError> {
    let parsed = url::Url::parse(raw).map_err(|e| ConfigError::InvalidEndpoint {
        name: name.to_string(),
        reason: e.to_string(),
    })?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(ConfigError::InvalidEndpoint {
            name: name.to_string(),
            reason: format!("unsupported scheme '{}'", parsed.scheme()),
        });
    }
    Ok(())
}
