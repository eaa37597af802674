//! Environment configuration.

use std::{env, fmt::Display, fs::read_to_string, path::PathBuf, str::FromStr, time::Duration};

use thiserror::Error;
use tracing::{info, warn};

pub const DEFAULT_DB_PATH: &str = "dietdesk.db";
pub const DEFAULT_LOG_FILTER: &str = "info";
pub const DEFAULT_AI_TIMEOUT_SECS: u64 = 30;

#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("{0} is required")]
    Missing(&'static str),

    #[error("Invalid {key} value: {message}")]
    Invalid { key: &'static str, message: String },
}

/// Connection details for the diet generation service.
#[derive(Debug, Clone, PartialEq)]
pub struct AiConfig {
    pub endpoint: String,
    pub model: String,
    pub api_key: Option<String>,
    pub timeout: Duration,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PracticeConfig {
    pub db_path: PathBuf,
    pub log_filter: String,
    /// `None` when no endpoint is configured
    pub ai: Option<AiConfig>,
}

impl PracticeConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let db_path: PathBuf = try_load(&lookup, "DIETDESK_DB_PATH", DEFAULT_DB_PATH)?;
        let log_filter: String = try_load(&lookup, "DIETDESK_LOG", DEFAULT_LOG_FILTER)?;

        let ai = match var(&lookup, "DIETDESK_AI_ENDPOINT") {
            Some(endpoint) => {
                let model = var(&lookup, "DIETDESK_AI_MODEL")
                    .ok_or(ConfigError::Missing("DIETDESK_AI_MODEL"))?;
                let timeout_secs: u64 = try_load(
                    &lookup,
                    "DIETDESK_AI_TIMEOUT_SECS",
                    &DEFAULT_AI_TIMEOUT_SECS.to_string(),
                )?;
                if timeout_secs == 0 {
                    return Err(ConfigError::Invalid {
                        key: "DIETDESK_AI_TIMEOUT_SECS",
                        message: "must be at least 1".into(),
                    });
                }
                Some(AiConfig {
                    endpoint: endpoint.trim_end_matches('/').to_string(),
                    model,
                    api_key: api_key(&lookup)?,
                    timeout: Duration::from_secs(timeout_secs),
                })
            }
            None => {
                info!("DIETDESK_AI_ENDPOINT not set, AI diet generation disabled");
                None
            }
        };

        Ok(Self {
            db_path,
            log_filter,
            ai,
        })
    }
}

fn var<F>(lookup: &F, key: &str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key).filter(|v| !v.trim().is_empty())
}

fn try_load<F, T>(lookup: &F, key: &'static str, default: &str) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: Display,
{
    var(lookup, key)
        .unwrap_or_else(|| {
            info!("{key} not set, using default: {default}");
            default.to_string()
        })
        .parse()
        .map_err(|e: T::Err| {
            warn!("Invalid {key} value: {e}");
            ConfigError::Invalid {
                key,
                message: e.to_string(),
            }
        })
}

/// Key from `DIETDESK_AI_API_KEY`, or from the file named by
/// `DIETDESK_AI_API_KEY_FILE` (container secrets).
fn api_key<F>(lookup: &F) -> Result<Option<String>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(key) = var(lookup, "DIETDESK_AI_API_KEY") {
        return Ok(Some(key.trim().to_string()));
    }
    let Some(path) = var(lookup, "DIETDESK_AI_API_KEY_FILE") else {
        warn!("No AI API key configured, requests will be unauthenticated");
        return Ok(None);
    };

    read_to_string(&path)
        .map(|s| Some(s.trim().to_string()))
        .map_err(|e| {
            warn!("Failed to read AI API key from {path}: {e}");
            ConfigError::Invalid {
                key: "DIETDESK_AI_API_KEY_FILE",
                message: e.to_string(),
            }
        })
}
