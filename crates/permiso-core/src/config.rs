//! Configuration resolution for Permiso.
//!
//! Implements hierarchical config resolution:
//! 1. Built-in defaults
//! 2. Global config (~/.config/permiso/settings.json)
//! 3. Explicit config file (e.g. `--config`)
//! 4. Environment variables

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{Error, Result};

/// Coordinator configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoordinatorConfig {
    /// First request token handed out. Zero is reserved for "no token".
    pub first_token: u32,
    /// Largest token before the counter wraps back to `first_token`.
    pub max_token: u32,
    /// Expire requests the host has not answered after this many seconds.
    /// `None` keeps them outstanding indefinitely.
    pub request_timeout_secs: Option<u64>,
    pub log_level: String,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            first_token: 1,
            max_token: u32::MAX,
            request_timeout_secs: None,
            log_level: "info".to_string(),
        }
    }
}

impl CoordinatorConfig {
    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.map(Duration::from_secs)
    }

    /// Validate the configuration. Returns an error on invalid values.
    pub fn validate(&self) -> Result<()> {
        if self.first_token == 0 {
            return Err(Error::Config(
                "first_token must be at least 1 (0 is reserved)".to_string(),
            ));
        }
        if self.max_token < self.first_token {
            return Err(Error::Config(format!(
                "max_token ({}) must not be below first_token ({})",
                self.max_token, self.first_token
            )));
        }
        if self.request_timeout_secs == Some(0) {
            return Err(Error::Config(
                "request_timeout_secs must be positive when set".to_string(),
            ));
        }
        Ok(())
    }
}

/// Load configuration with hierarchical resolution.
pub fn load_config(explicit: Option<&Path>) -> Result<CoordinatorConfig> {
    let mut config = CoordinatorConfig::default();

    if let Some(global_path) = global_config_path() {
        if global_path.exists() {
            config = load_config_file(&global_path)?;
        }
    }

    if let Some(path) = explicit {
        config = load_config_file(path)?;
    }

    apply_env_overrides(&mut config, |key| std::env::var(key).ok());
    config.validate()?;
    Ok(config)
}

/// Get the global config file path.
pub fn global_config_path() -> Option<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .ok()
            .map(|h| PathBuf::from(h).join(".permiso").join("settings.json"))
    }
    #[cfg(target_os = "macos")]
    {
        std::env::var("HOME")
            .ok()
            .map(|h| PathBuf::from(h).join("Library/Application Support/permiso/settings.json"))
    }
    #[cfg(target_os = "linux")]
    {
        std::env::var("XDG_CONFIG_HOME")
            .ok()
            .map(PathBuf::from)
            .or_else(|| std::env::var("HOME").ok().map(|h| PathBuf::from(h).join(".config")))
            .map(|p| p.join("permiso").join("settings.json"))
    }
    #[cfg(not(any(target_os = "windows", target_os = "macos", target_os = "linux")))]
    {
        None
    }
}

/// Read a single JSON config file. Missing fields take their defaults.
pub fn load_config_file(path: &Path) -> Result<CoordinatorConfig> {
    let content = std::fs::read_to_string(path)
        .inspect_err(|e| warn!(path = %path.display(), error = %e, "Failed to read config file"))?;
    let config = serde_json::from_str(&content)
        .inspect_err(|e| warn!(path = %path.display(), error = %e, "Failed to parse config file"))?;
    Ok(config)
}

/// Apply `PERMISO_*` overrides read through `lookup`. Unparseable values are
/// ignored.
pub fn apply_env_overrides(config: &mut CoordinatorConfig, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(n) = lookup("PERMISO_FIRST_TOKEN").and_then(|v| v.parse().ok()) {
        config.first_token = n;
    }
    if let Some(n) = lookup("PERMISO_MAX_TOKEN").and_then(|v| v.parse().ok()) {
        config.max_token = n;
    }
    if let Some(val) = lookup("PERMISO_REQUEST_TIMEOUT_SECS") {
        if val.is_empty() || val == "none" {
            config.request_timeout_secs = None;
        } else if let Ok(n) = val.parse() {
            config.request_timeout_secs = Some(n);
        }
    }
    if let Some(val) = lookup("PERMISO_LOG_LEVEL") {
        config.log_level = val;
    }
}
