//! Command dispatch: bridges CLI args -> core operations -> output formatting.

pub mod config_cmd;
pub mod select;
pub mod status;
pub mod validate;
pub mod watch;

use kramer_api::SimConnector;
use kramer_core::DeviceClient;

use crate::cli::Command;
use crate::config::Context;
use crate::error::CliError;

/// Dispatch a device-bound command to the appropriate handler.
pub async fn dispatch(cmd: Command, ctx: &Context) -> Result<(), CliError> {
    match cmd {
        Command::Status => status::handle(ctx).await,
        Command::Select(args) => select::handle(ctx, args).await,
        Command::Watch(args) => watch::handle(ctx, args).await,
        Command::Validate => validate::handle(ctx).await,
        // Config and Completions are handled before dispatch
        Command::Config(_) | Command::Completions(_) => Err(CliError::Internal(
            "config and completions are not device commands".into(),
        )),
    }
}

/// A fresh, unconnected client for the context's device.
fn device_client(ctx: &Context) -> DeviceClient<SimConnector> {
    DeviceClient::new(ctx.target.identity.clone(), ctx.matrix.connector())
}
