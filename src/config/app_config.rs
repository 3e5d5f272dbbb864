//! User config (`config.json`).

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use crate::error::{BasecampError, Result};

use super::write_atomic;

/// `{ "env": { "<KEY>": "<value>" } }`, plus any keys the UI layer adds.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub env: BTreeMap<String, String>,

    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl AppConfig {
    /// Load the config, treating a missing file as empty.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_json::from_str(&content).map_err(|e| BasecampError::ConfigParseError {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Write the config atomically.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content =
            serde_json::to_string_pretty(self).map_err(|e| BasecampError::ConfigValidationError {
                message: format!("Failed to serialize config: {}", e),
            })?;
        write_atomic(path, content.as_bytes())
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.env.get(key).map(String::as_str)
    }

    /// Set a value, returning the previous one.
    pub fn set(&mut self, key: &str, value: &str) -> Option<String> {
        self.env.insert(key.to_string(), value.to_string())
    }

    /// Remove a value, returning it.
    pub fn unset(&mut self, key: &str) -> Option<String> {
        self.env.remove(key)
    }

    /// Service port: `env.PORT` when it parses, else `default_port`.
    pub fn port(&self, default_port: u16) -> u16 {
        match self.env.get("PORT").map(|p| p.trim().parse::<u16>()) {
            Some(Ok(port)) if port != 0 => port,
            Some(_) => {
                tracing::warn!("ignoring invalid PORT in config, using {}", default_port);
                default_port
            }
            None => default_port,
        }
    }
}

/// Split `KEY=VALUE` from the command line.
pub fn parse_assignment(input: &str) -> Result<(String, String)> {
    let (key, value) = input
        .split_once('=')
        .ok_or_else(|| BasecampError::ConfigValidationError {
            message: format!("expected KEY=VALUE, got '{}'", input),
        })?;
    let key = key.trim();
    if !super::env_file::is_valid_key(key) {
        return Err(BasecampError::ConfigValidationError {
            message: format!("'{}' is not a valid environment key", key),
        });
    }
    Ok((key.to_string(), value.to_string()))
}
