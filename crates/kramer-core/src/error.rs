// ── Core error types ──
//
// Domain errors from kramer-core. Driver failures are sorted into
// communication problems (timeout, refused) and everything else, and
// always carry the device name and endpoint they happened against.

use std::num::ParseIntError;
use std::sync::Arc;

use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Device errors ────────────────────────────────────────────────
    #[error("Failed connecting to device '{device}' at {endpoint}: {source}")]
    Communication {
        device: String,
        endpoint: String,
        #[source]
        source: kramer_api::Error,
    },

    #[error("Unknown error talking to device '{device}' at {endpoint}: {source}")]
    Generic {
        device: String,
        endpoint: String,
        #[source]
        source: kramer_api::Error,
    },

    #[error("Device '{device}' is not connected")]
    NotConnected { device: String },

    // ── Command errors ───────────────────────────────────────────────
    #[error("Invalid source identifier '{identifier}'")]
    InvalidSource {
        identifier: String,
        #[source]
        source: ParseIntError,
    },

    // ── Coordinator ──────────────────────────────────────────────────
    #[error("Coordinator for device '{device}' has been shut down")]
    Stopped { device: String },

    #[error(transparent)]
    Update(#[from] UpdateFailed),

    // ── Internal errors ──────────────────────────────────────────────
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// Classify a driver failure against `device` at `endpoint`.
    pub(crate) fn from_driver(device: &str, endpoint: &str, source: kramer_api::Error) -> Self {
        let device = device.to_owned();
        let endpoint = endpoint.to_owned();
        if source.is_timeout() || source.is_connect() {
            Self::Communication {
                device,
                endpoint,
                source,
            }
        } else {
            Self::Generic {
                device,
                endpoint,
                source,
            }
        }
    }

    /// `true` for timeouts and refused connections, including when wrapped
    /// in a failed update.
    pub fn is_communication(&self) -> bool {
        match self {
            Self::Communication { .. } => true,
            Self::Update(failed) => failed.error().is_communication(),
            _ => false,
        }
    }
}

/// A refresh that did not produce a new state.
///
/// Reported to every waiter and subscriber of the failed refresh, so the
/// underlying error is shared rather than owned.
#[derive(Debug, Clone, Error)]
#[error("Update failed: {source}")]
pub struct UpdateFailed {
    #[source]
    source: Arc<CoreError>,
}

impl UpdateFailed {
    pub fn error(&self) -> &CoreError {
        &self.source
    }

    pub fn is_communication(&self) -> bool {
        self.source.is_communication()
    }
}

impl From<CoreError> for UpdateFailed {
    fn from(err: CoreError) -> Self {
        Self {
            source: Arc::new(err),
        }
    }
}
