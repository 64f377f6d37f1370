//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` variants into user-facing errors with
//! actionable help text.

use miette::Diagnostic;
use thiserror::Error;

use kramer_config::ConfigError;
use kramer_core::CoreError;

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const NOT_FOUND: i32 = 4;
    pub const CONNECTION: i32 = 7;
    pub const TIMEOUT: i32 = 8;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Device ───────────────────────────────────────────────────────

    #[error("Could not connect to '{device}' at {endpoint}")]
    #[diagnostic(
        code(kramer::cannot_connect),
        help(
            "Check that the switch is powered on and reachable.\n\
             Endpoint: {endpoint}\n\
             Try: kramer validate --device <id>"
        )
    )]
    ConnectionFailed {
        device: String,
        endpoint: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Timed out talking to '{device}' at {endpoint}")]
    #[diagnostic(
        code(kramer::timeout),
        help("The switch accepted the connection but stopped answering.")
    )]
    Timeout { device: String, endpoint: String },

    #[error("Unexpected error from '{device}' at {endpoint}: {message}")]
    #[diagnostic(code(kramer::unknown))]
    DeviceError {
        device: String,
        endpoint: String,
        message: String,
    },

    #[error("Device '{device}' is not connected")]
    #[diagnostic(
        code(kramer::not_connected),
        help("The device session was lost; the next refresh reconnects.")
    )]
    NotConnected { device: String },

    // ── Commands ─────────────────────────────────────────────────────

    #[error("Invalid source '{identifier}'")]
    #[diagnostic(
        code(kramer::invalid_source),
        help("Sources are input indexes, e.g. `kramer select 2`. Run `kramer status` to list them.")
    )]
    InvalidSource { identifier: String },

    // ── Validation ───────────────────────────────────────────────────

    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(kramer::validation))]
    Validation { field: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────

    #[error("Device profile '{name}' not found in configuration")]
    #[diagnostic(
        code(kramer::device_not_found),
        help(
            "Available profiles: {available}\n\
             Add one with: kramer config add <id> --host <host>"
        )
    )]
    DeviceNotFound { name: String, available: String },

    #[error("No device configured")]
    #[diagnostic(
        code(kramer::no_device),
        help(
            "Pass --host, or add a profile with: kramer config add <id> --host <host> --default\n\
             Config file: {path}"
        )
    )]
    NoDevice { path: String },

    #[error(transparent)]
    #[diagnostic(code(kramer::config))]
    Config(Box<figment::Error>),

    #[error("Failed to serialize configuration: {0}")]
    #[diagnostic(code(kramer::config_serialize))]
    ConfigSerialize(#[from] toml::ser::Error),

    // ── Internal ─────────────────────────────────────────────────────

    #[error("Internal error: {0}")]
    #[diagnostic(code(kramer::internal))]
    Internal(String),

    // ── IO / Serialization ───────────────────────────────────────────

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Failed to render JSON: {0}")]
    #[diagnostic(code(kramer::json))]
    Json(#[from] serde_json::Error),

    #[error("Failed to render YAML: {0}")]
    #[diagnostic(code(kramer::yaml))]
    Yaml(#[from] serde_yaml::Error),
}

impl From<figment::Error> for CliError {
    fn from(err: figment::Error) -> Self {
        Self::Config(Box::new(err))
    }
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConnectionFailed { .. } | Self::NotConnected { .. } => exit_code::CONNECTION,
            Self::Timeout { .. } => exit_code::TIMEOUT,
            Self::DeviceNotFound { .. } => exit_code::NOT_FOUND,
            Self::InvalidSource { .. } | Self::Validation { .. } | Self::NoDevice { .. } => {
                exit_code::USAGE
            }
            _ => exit_code::GENERAL,
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        Self::from(&err)
    }
}

impl From<&CoreError> for CliError {
    fn from(err: &CoreError) -> Self {
        match err {
            CoreError::Communication {
                device,
                endpoint,
                source,
            } => {
                if source.is_timeout() {
                    CliError::Timeout {
                        device: device.clone(),
                        endpoint: endpoint.clone(),
                    }
                } else {
                    CliError::ConnectionFailed {
                        device: device.clone(),
                        endpoint: endpoint.clone(),
                        source: source.to_string().into(),
                    }
                }
            }

            CoreError::Generic {
                device,
                endpoint,
                source,
            } => CliError::DeviceError {
                device: device.clone(),
                endpoint: endpoint.clone(),
                message: source.to_string(),
            },

            CoreError::NotConnected { device } => CliError::NotConnected {
                device: device.clone(),
            },

            CoreError::InvalidSource { identifier, .. } => CliError::InvalidSource {
                identifier: identifier.clone(),
            },

            // Report the failure that stopped the refresh, not the wrapper.
            CoreError::Update(failed) => CliError::from(failed.error()),

            CoreError::Stopped { .. } => CliError::Internal(err.to_string()),

            CoreError::Internal(message) => CliError::Internal(message.clone()),
        }
    }
}

// ── ConfigError → CliError mapping ───────────────────────────────────

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Validation { field, reason } => CliError::Validation { field, reason },
            ConfigError::NoDevice => CliError::NoDevice {
                path: kramer_config::config_path().display().to_string(),
            },
            ConfigError::UnknownDevice(name) => CliError::DeviceNotFound {
                name,
                available: String::new(),
            },
            ConfigError::Serialization(e) => CliError::ConfigSerialize(e),
            ConfigError::Figment(e) => CliError::Config(e),
            ConfigError::Io(e) => CliError::Io(e),
        }
    }
}
