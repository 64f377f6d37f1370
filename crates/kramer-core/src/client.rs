// ── Device client ──
//
// Owns the single driver session for one switch. Every driver failure
// drops the session; the next refresh dials a fresh one. All methods
// block on device I/O and must run on a blocking-capable thread.

use std::fmt;
use std::sync::Arc;

use kramer_api::{Connector, MediaSwitch};
use tracing::{debug, error, warn};

use crate::config::DeviceIdentity;
use crate::error::CoreError;
use crate::model::{ConnectionState, DEFAULT_SELECTED_SOURCE, DeviceState};

/// Blocking client for one matrix switch.
pub struct DeviceClient<C: Connector> {
    identity: DeviceIdentity,
    connector: C,
    device: Option<C::Switch>,
    input_count: u32,
    source_list: Arc<[String]>,
    selected_source: String,
}

impl<C: Connector> DeviceClient<C> {
    /// Create a client. Does NOT connect -- the first
    /// [`refresh_state()`](Self::refresh_state) opens the session.
    pub fn new(identity: DeviceIdentity, connector: C) -> Self {
        Self {
            identity,
            connector,
            device: None,
            input_count: 0,
            source_list: Arc::from([]),
            selected_source: DEFAULT_SELECTED_SOURCE.to_owned(),
        }
    }

    pub fn identity(&self) -> &DeviceIdentity {
        &self.identity
    }

    pub fn name(&self) -> &str {
        self.identity.name()
    }

    pub fn connector(&self) -> &C {
        &self.connector
    }

    /// Fetch and update device state.
    ///
    /// Opens a session if none exists, otherwise asks the live session to
    /// pull fresh state. On failure the session is dropped and the cached
    /// fields are left as they were.
    pub fn refresh_state(&mut self) -> Result<(), CoreError> {
        let result = if let Some(device) = self.device.as_mut() {
            device.update()
        } else {
            debug!(endpoint = %self.identity.endpoint(), "opening device session");
            self.connector
                .connect(self.identity.endpoint())
                .map(|device| self.device = Some(device))
        };

        if let Err(e) = result {
            return Err(self.drop_session(e));
        }

        let Some(device) = self.device.as_ref() else {
            return Err(self.not_connected());
        };

        let input_count = device.input_count();
        let selected = device.selected_source();

        // Only rebuild the source list when the input count changes.
        if input_count != self.input_count {
            debug!(
                from = self.input_count,
                to = input_count,
                "input count changed, rebuilding source list"
            );
            self.input_count = input_count;
            self.source_list = DeviceState::source_list_for(input_count);
        }
        self.selected_source = selected.to_string();

        Ok(())
    }

    /// Route `source` to the output.
    ///
    /// The identifier is parsed before any device I/O; a malformed one
    /// fails with [`CoreError::InvalidSource`] and touches nothing.
    pub fn select_source(&mut self, source: &str) -> Result<(), CoreError> {
        let index = parse_source(source)?;

        let Some(device) = self.device.as_mut() else {
            return Err(self.not_connected());
        };

        if let Err(e) = device.select_source(index) {
            return Err(self.drop_session(e));
        }

        debug!(index, "source selected");
        Ok(())
    }

    /// Drop the live session, if any.
    pub fn disconnect(&mut self) {
        if self.device.take().is_some() {
            debug!(device = %self.identity.name(), "device session closed");
        }
    }

    /// Current state, or the disconnected default if there is no session.
    pub fn state(&self) -> DeviceState {
        if !self.is_connected() {
            return DeviceState::disconnected();
        }

        DeviceState {
            input_count: self.input_count,
            source_list: Arc::clone(&self.source_list),
            selected_source: self.selected_source.clone(),
            connection_state: ConnectionState::Connected,
        }
    }

    /// `true` while a session is held.
    pub fn is_connected(&self) -> bool {
        self.device.is_some()
    }

    /// Input count from the last successful refresh.
    pub fn input_count(&self) -> u32 {
        self.input_count
    }

    /// Selected source from the last successful refresh.
    pub fn selected_source(&self) -> &str {
        &self.selected_source
    }

    /// Source list from the last input count change.
    pub fn source_list(&self) -> &Arc<[String]> {
        &self.source_list
    }

    fn drop_session(&mut self, source: kramer_api::Error) -> CoreError {
        self.device = None;
        let err = CoreError::from_driver(self.identity.name(), self.identity.endpoint(), source);
        if err.is_communication() {
            warn!(error = %err, "device unreachable");
        } else {
            error!(error = ?err, "unexpected device failure");
        }
        err
    }

    fn not_connected(&self) -> CoreError {
        CoreError::NotConnected {
            device: self.identity.name().to_owned(),
        }
    }
}

impl<C: Connector> fmt::Debug for DeviceClient<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceClient")
            .field("identity", &self.identity)
            .field("connected", &self.is_connected())
            .field("input_count", &self.input_count)
            .field("selected_source", &self.selected_source)
            .finish_non_exhaustive()
    }
}

/// Parse a source identifier into a device input index.
pub fn parse_source(source: &str) -> Result<u32, CoreError> {
    source
        .trim()
        .parse::<u32>()
        .map_err(|e| CoreError::InvalidSource {
            identifier: source.to_owned(),
            source: e,
        })
}

/// Validate device details with one connect-and-refresh cycle.
///
/// Runs on the blocking pool and returns the state read, or the
/// communication/generic error that stopped it.
pub async fn validate_connection<C: Connector>(
    identity: DeviceIdentity,
    connector: C,
) -> Result<DeviceState, CoreError> {
    tokio::task::spawn_blocking(move || {
        let mut client = DeviceClient::new(identity, connector);
        client.refresh_state()?;
        Ok(client.state())
    })
    .await
    .map_err(|e| CoreError::Internal(format!("validation task failed: {e}")))?
}
