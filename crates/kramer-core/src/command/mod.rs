// ── Command API ──
//
// Write operations against a switch flow through the `Command` enum.
// The dispatcher runs each one against the coordinator's client and then
// asks for a refresh so the published state reflects the change.

use std::sync::Arc;

use kramer_api::Connector;
use tracing::{info, warn};

use crate::coordinator::PollingCoordinator;
use crate::error::{CoreError, UpdateFailed};
use crate::model::DeviceState;

/// All possible write operations against a switch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Route the input named by `source` (a decimal index) to the output.
    SelectSource { source: String },
}

/// Outcome of a command that reached the device.
#[derive(Debug, Clone)]
pub enum CommandResult {
    /// The follow-up refresh published this state.
    Refreshed(Arc<DeviceState>),
    /// The command was applied but the follow-up refresh failed; the
    /// published state is unchanged.
    Stale(UpdateFailed),
}

impl CommandResult {
    /// The freshly published state, if the follow-up refresh succeeded.
    pub fn state(&self) -> Option<&Arc<DeviceState>> {
        match self {
            Self::Refreshed(state) => Some(state),
            Self::Stale(_) => None,
        }
    }
}

impl From<Result<Arc<DeviceState>, UpdateFailed>> for CommandResult {
    fn from(outcome: Result<Arc<DeviceState>, UpdateFailed>) -> Self {
        match outcome {
            Ok(state) => Self::Refreshed(state),
            Err(failed) => Self::Stale(failed),
        }
    }
}

/// Routes user commands to the device behind a coordinator.
pub struct CommandDispatcher<C: Connector> {
    coordinator: PollingCoordinator<C>,
}

impl<C: Connector> Clone for CommandDispatcher<C> {
    fn clone(&self) -> Self {
        Self {
            coordinator: self.coordinator.clone(),
        }
    }
}

impl<C: Connector> CommandDispatcher<C> {
    pub fn new(coordinator: PollingCoordinator<C>) -> Self {
        Self { coordinator }
    }

    pub fn coordinator(&self) -> &PollingCoordinator<C> {
        &self.coordinator
    }

    /// Execute a command.
    ///
    /// Errors from the device are returned unmodified and trigger no
    /// refresh. A follow-up refresh failure is not an error: the command
    /// did happen, so it surfaces as [`CommandResult::Stale`].
    pub async fn execute(&self, cmd: Command) -> Result<CommandResult, CoreError> {
        match cmd {
            Command::SelectSource { source } => self.select_source(&source).await,
        }
    }

    /// Select `source` as the active input, then refresh.
    pub async fn select_source(&self, source: &str) -> Result<CommandResult, CoreError> {
        let owned = source.to_owned();
        let selected = match self.coordinator.ensure_running() {
            Ok(()) => {
                self.coordinator
                    .with_client(move |client| client.select_source(&owned))
                    .await
            }
            Err(e) => Err(e),
        };

        if let Err(e) = selected {
            warn!(
                device = %self.coordinator.name(),
                source,
                error = %e,
                "source selection failed"
            );
            return Err(e);
        }

        info!(device = %self.coordinator.name(), source, "source selected");
        Ok(self.coordinator.refresh_after_command().await.into())
    }
}
