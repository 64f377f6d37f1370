//! Validate command handler.

use kramer_core::validate_connection;

use crate::config::Context;
use crate::error::CliError;
use crate::output;

pub async fn handle(ctx: &Context) -> Result<(), CliError> {
    let identity = ctx.target.identity.clone();
    let state = validate_connection(identity, ctx.matrix.connector()).await?;

    let message = format!(
        "Connected to '{}' at {}: {} inputs, source {} selected",
        ctx.target.identity.name(),
        ctx.target.identity.endpoint(),
        state.input_count,
        state.selected_source,
    );
    output::print_output(&message, ctx.quiet);
    Ok(())
}
