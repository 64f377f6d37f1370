// ── Driver traits ──
//
// The narrow call interface every switch driver exposes: open a session,
// pull state, switch the routed input. All calls block on device I/O.

use std::fmt;
use std::str::FromStr;

use url::Url;

use crate::error::Error;

/// Scheme used by switch endpoints (`tcp://host[:port]`).
pub const ENDPOINT_SCHEME: &str = "tcp";

/// A live session with one matrix switch.
///
/// Accessors return the values read by the most recent `update()` (or by
/// the initial read performed when the session was opened).
pub trait MediaSwitch: Send {
    /// Pull fresh state from the device.
    fn update(&mut self) -> Result<(), Error>;

    /// Route input `index` to the output. `0` disconnects the output.
    fn select_source(&mut self, index: u32) -> Result<(), Error>;

    /// Number of inputs the device reports.
    fn input_count(&self) -> u32;

    /// Currently routed input.
    fn selected_source(&self) -> u32;
}

/// Opens sessions against a device endpoint.
pub trait Connector: Send + Sync + 'static {
    type Switch: MediaSwitch + 'static;

    /// Connect to `endpoint` and read the initial device state.
    fn connect(&self, endpoint: &str) -> Result<Self::Switch, Error>;
}

/// Parsed form of a `tcp://host[:port]` endpoint string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub host: String,
    pub port: Option<u16>,
}

impl FromStr for Endpoint {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let url = Url::parse(s)?;

        if url.scheme() != ENDPOINT_SCHEME {
            return Err(Error::UnsupportedEndpoint {
                endpoint: s.to_owned(),
                reason: format!("expected scheme '{ENDPOINT_SCHEME}', got '{}'", url.scheme()),
            });
        }

        let host = url
            .host_str()
            .filter(|h| !h.is_empty())
            .ok_or_else(|| Error::UnsupportedEndpoint {
                endpoint: s.to_owned(),
                reason: "missing host".into(),
            })?;

        Ok(Self {
            host: host.to_owned(),
            port: url.port(),
        })
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.port {
            Some(port) => write!(f, "{ENDPOINT_SCHEME}://{}:{port}", self.host),
            None => write!(f, "{ENDPOINT_SCHEME}://{}", self.host),
        }
    }
}
