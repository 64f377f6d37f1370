//! Shared configuration for Kramer switch tools.
//!
//! TOML device profiles, loading from file + environment, and translation
//! to `kramer_core` runtime types. The CLI layers its flag overrides on top.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use kramer_core::{CoordinatorConfig, DEFAULT_PORT, DeviceIdentity};

/// Prefix for environment overrides, e.g. `KRAMER_DEFAULTS__OUTPUT=json`.
pub const ENV_PREFIX: &str = "KRAMER_";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("no device selected and no default_device configured")]
    NoDevice,

    #[error("unknown device profile '{0}'")]
    UnknownDevice(String),

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct Config {
    /// Device profile used when none is named on the command line.
    pub default_device: Option<String>,

    /// Global defaults.
    #[serde(default)]
    pub defaults: Defaults,

    /// Named device profiles.
    #[serde(default)]
    pub devices: HashMap<String, DeviceProfile>,
}

impl Config {
    /// Look up the profile `id`, falling back to `default_device`.
    pub fn resolve_device<'a>(
        &'a self,
        id: Option<&'a str>,
    ) -> Result<(&'a str, &'a DeviceProfile), ConfigError> {
        let id = id
            .or(self.default_device.as_deref())
            .ok_or(ConfigError::NoDevice)?;
        let profile = self
            .devices
            .get(id)
            .ok_or_else(|| ConfigError::UnknownDevice(id.to_owned()))?;
        Ok((id, profile))
    }
}

#[derive(Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct Defaults {
    /// Seconds between scheduled refreshes. Zero disables the timer.
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,

    #[serde(default = "default_output")]
    pub output: String,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval(),
            output: default_output(),
        }
    }
}

fn default_poll_interval() -> u64 {
    kramer_core::DEFAULT_UPDATE_INTERVAL.as_secs()
}
fn default_output() -> String {
    "table".into()
}

/// A named switch.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct DeviceProfile {
    /// Display name, also used in logs and errors.
    pub name: String,

    /// Hostname or IP address.
    pub host: String,

    /// TCP port; the switch default when omitted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
}

impl DeviceProfile {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.name.trim().is_empty() {
            return Err(ConfigError::Validation {
                field: "name".into(),
                reason: "must not be empty".into(),
            });
        }

        url::Host::parse(&self.host).map_err(|e| ConfigError::Validation {
            field: "host".into(),
            reason: format!("'{}': {e}", self.host),
        })?;

        if self.port == Some(0) {
            return Err(ConfigError::Validation {
                field: "port".into(),
                reason: "must be between 1 and 65535".into(),
            });
        }

        Ok(())
    }
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("com", "kramer", "kramer").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("kramer");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the full Config from the canonical file + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load the full Config from `path` + environment. A missing file is not
/// an error; defaults apply.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed(ENV_PREFIX).split("__"));

    let config: Config = figment.extract()?;
    Ok(config)
}

/// Load config, returning a default if it can't be read.
pub fn load_config_or_default() -> Config {
    load_config().unwrap_or_default()
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write to the canonical config path.
pub fn save_config(cfg: &Config) -> Result<(), ConfigError> {
    save_config_to(cfg, &config_path())
}

pub fn save_config_to(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

// ── Translation to core types ───────────────────────────────────────

/// Build a validated `DeviceIdentity` from a profile. The port falls back
/// to the switch default.
pub fn profile_to_identity(profile: &DeviceProfile) -> Result<DeviceIdentity, ConfigError> {
    profile.validate()?;
    Ok(DeviceIdentity::new(
        profile.name.clone(),
        profile.host.clone(),
        Some(profile.port.unwrap_or(DEFAULT_PORT)),
    ))
}

/// Coordinator settings from the global defaults.
pub fn coordinator_config(defaults: &Defaults) -> CoordinatorConfig {
    CoordinatorConfig {
        update_interval: Duration::from_secs(defaults.poll_interval_secs),
        ..CoordinatorConfig::default()
    }
}
