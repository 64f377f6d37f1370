// ── Runtime device configuration ──
//
// These types describe *which* device to talk to and *how often*.
// They never touch disk: `kramer-config` or the CLI builds them and
// hands them in.

use std::sync::OnceLock;
use std::time::Duration;

use kramer_api::Endpoint;

/// Port the switch listens on when none is configured.
pub const DEFAULT_PORT: u16 = 5000;

/// Fixed interval between scheduled refreshes.
pub const DEFAULT_UPDATE_INTERVAL: Duration = Duration::from_secs(5 * 60);

/// Name, host, and optional port of one physical switch.
///
/// Immutable after construction. The endpoint string is derived on first
/// use and cached.
#[derive(Debug, Clone)]
pub struct DeviceIdentity {
    name: String,
    host: String,
    port: Option<u16>,
    endpoint: OnceLock<String>,
}

impl DeviceIdentity {
    pub fn new(name: impl Into<String>, host: impl Into<String>, port: Option<u16>) -> Self {
        Self {
            name: name.into(),
            host: host.into(),
            port,
            endpoint: OnceLock::new(),
        }
    }

    /// User-provided device name.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> Option<u16> {
        self.port
    }

    /// Connection endpoint, `tcp://host[:port]`.
    pub fn endpoint(&self) -> &str {
        self.endpoint.get_or_init(|| {
            Endpoint {
                host: self.host.clone(),
                port: self.port,
            }
            .to_string()
        })
    }
}

impl PartialEq for DeviceIdentity {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.host == other.host && self.port == other.port
    }
}

impl Eq for DeviceIdentity {}

/// Configuration for a [`PollingCoordinator`](crate::PollingCoordinator).
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    /// How often to refresh in the background. Zero disables the timer.
    pub update_interval: Duration,
    /// Capacity of the update event broadcast channel.
    pub event_capacity: usize,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            update_interval: DEFAULT_UPDATE_INTERVAL,
            event_capacity: 16,
        }
    }
}
