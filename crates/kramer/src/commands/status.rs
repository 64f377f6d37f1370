//! Status command handler.

use std::sync::Arc;

use tabled::Tabled;

use kramer_core::{DeviceState, PollingCoordinator};

use crate::config::Context;
use crate::error::CliError;
use crate::output;

// ── Table row ───────────────────────────────────────────────────────

#[derive(Tabled)]
struct StateRow {
    #[tabled(rename = "Device")]
    device: String,
    #[tabled(rename = "Endpoint")]
    endpoint: String,
    #[tabled(rename = "State")]
    state: String,
    #[tabled(rename = "Inputs")]
    inputs: u32,
    #[tabled(rename = "Source")]
    source: String,
    #[tabled(rename = "Sources")]
    sources: String,
}

/// Render one state snapshot in the context's output format.
pub(super) fn render_state(ctx: &Context, state: &Arc<DeviceState>) -> Result<String, CliError> {
    output::render_single(
        ctx.format,
        state.as_ref(),
        |s| {
            output::render_table(&[StateRow {
                device: ctx.target.identity.name().to_owned(),
                endpoint: ctx.target.identity.endpoint().to_owned(),
                state: output::paint_state(s.connection_state, ctx.color),
                inputs: s.input_count,
                source: s.selected_source.clone(),
                sources: s.source_list.join(", "),
            }])
        },
        |s| s.selected_source.clone(),
    )
}

pub async fn handle(ctx: &Context) -> Result<(), CliError> {
    let state = PollingCoordinator::oneshot(
        super::device_client(ctx),
        ctx.target.coordinator.clone(),
        |coordinator| async move { Ok(coordinator.state()) },
    )
    .await?;

    output::print_output(&render_state(ctx, &state)?, ctx.quiet);
    Ok(())
}
