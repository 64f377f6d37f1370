use thiserror::Error;

/// Top-level error type for the `kramer-api` crate.
///
/// Covers every failure a driver can raise while opening a session,
/// pulling state, or switching sources. `kramer-core` sorts these into
/// communication failures and everything else.
#[derive(Debug, Error)]
pub enum Error {
    // ── Transport ───────────────────────────────────────────────────
    /// The device did not answer within the transport timeout.
    #[error("Connection to {endpoint} timed out")]
    Timeout { endpoint: String },

    /// The device actively refused the connection.
    #[error("Connection refused by {endpoint}")]
    ConnectionRefused { endpoint: String },

    /// Raw socket failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Endpoint string could not be parsed.
    #[error("Invalid endpoint: {0}")]
    InvalidEndpoint(#[from] url::ParseError),

    /// Endpoint parsed, but is not something a switch driver can dial.
    #[error("Unsupported endpoint '{endpoint}': {reason}")]
    UnsupportedEndpoint { endpoint: String, reason: String },

    // ── Device ──────────────────────────────────────────────────────
    /// The device answered with something the driver did not understand.
    #[error("Device protocol error: {0}")]
    Protocol(String),

    /// Requested input does not exist on this device.
    #[error("Source {index} out of range (device has {input_count} inputs)")]
    SourceOutOfRange { index: u32, input_count: u32 },
}

impl Error {
    /// Returns `true` if the failure was a transport timeout.
    pub fn is_timeout(&self) -> bool {
        match self {
            Self::Timeout { .. } => true,
            Self::Io(e) => e.kind() == std::io::ErrorKind::TimedOut,
            _ => false,
        }
    }

    /// Returns `true` if the device refused the connection.
    pub fn is_connect(&self) -> bool {
        match self {
            Self::ConnectionRefused { .. } => true,
            Self::Io(e) => e.kind() == std::io::ErrorKind::ConnectionRefused,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_errors_are_classified_by_kind() {
        let timed_out = Error::from(std::io::Error::from(std::io::ErrorKind::TimedOut));
        assert!(timed_out.is_timeout());
        assert!(!timed_out.is_connect());

        let refused = Error::from(std::io::Error::from(std::io::ErrorKind::ConnectionRefused));
        assert!(refused.is_connect());
        assert!(!refused.is_timeout());

        let reset = Error::from(std::io::Error::from(std::io::ErrorKind::ConnectionReset));
        assert!(!reset.is_connect());
        assert!(!reset.is_timeout());
    }

    #[test]
    fn protocol_errors_are_neither_timeout_nor_connect() {
        let err = Error::Protocol("garbled frame".into());
        assert!(!err.is_timeout());
        assert!(!err.is_connect());
    }
}
