//! Select command handler.

use kramer_core::{CommandDispatcher, CommandResult, PollingCoordinator};

use crate::cli::SelectArgs;
use crate::config::Context;
use crate::error::CliError;
use crate::output;

pub async fn handle(ctx: &Context, args: SelectArgs) -> Result<(), CliError> {
    let result = PollingCoordinator::oneshot(
        super::device_client(ctx),
        ctx.target.coordinator.clone(),
        |coordinator| async move {
            CommandDispatcher::new(coordinator)
                .select_source(&args.source)
                .await
        },
    )
    .await?;

    match result {
        CommandResult::Refreshed(state) => {
            output::print_output(&super::status::render_state(ctx, &state)?, ctx.quiet);
            Ok(())
        }
        // The switch took the command; only the read-back failed.
        CommandResult::Stale(failed) => Err(CliError::from(failed.error())),
    }
}
