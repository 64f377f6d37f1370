// kramer-core: State synchronization between a kramer-api switch and consumers (CLI).

pub mod client;
pub mod command;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod model;
pub mod store;
pub mod stream;

// ── Primary re-exports ──────────────────────────────────────────────
pub use client::{DeviceClient, parse_source, validate_connection};
pub use command::{Command, CommandDispatcher, CommandResult};
pub use config::{CoordinatorConfig, DEFAULT_PORT, DEFAULT_UPDATE_INTERVAL, DeviceIdentity};
pub use coordinator::{ListenerId, PollingCoordinator, RefreshOutcome, RefreshState, UpdateEvent};
pub use error::{CoreError, UpdateFailed};
pub use model::{ConnectionState, DEFAULT_SELECTED_SOURCE, DeviceState};
pub use store::StateCache;
pub use stream::{StateStream, StateWatchStream};
