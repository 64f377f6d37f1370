//! Watch command handler.
//!
//! Runs the coordinator with its timer and prints every update until
//! Ctrl-C (or `--count` updates).

use std::sync::Arc;

use chrono::Local;
use tokio::sync::broadcast::error::RecvError;
use tracing::warn;

use kramer_core::{DeviceState, PollingCoordinator, UpdateEvent, UpdateFailed};

use crate::cli::{OutputFormat, WatchArgs};
use crate::config::Context;
use crate::error::CliError;
use crate::output;

pub async fn handle(ctx: &Context, args: WatchArgs) -> Result<(), CliError> {
    let coordinator =
        PollingCoordinator::new(super::device_client(ctx), ctx.target.coordinator.clone());
    // Subscribe first so the initial refresh is reported too.
    let mut events = coordinator.updates();
    let _ = coordinator.start().await;

    let result = watch_loop(ctx, &mut events, args.count).await;
    coordinator.shutdown().await;
    result
}

async fn watch_loop(
    ctx: &Context,
    events: &mut tokio::sync::broadcast::Receiver<UpdateEvent>,
    limit: Option<usize>,
) -> Result<(), CliError> {
    let mut seen = 0usize;

    while limit.is_none_or(|n| seen < n) {
        tokio::select! {
            biased;
            _ = tokio::signal::ctrl_c() => break,
            event = events.recv() => match event {
                Ok(UpdateEvent::Published(state)) => print_state(ctx, &state)?,
                Ok(UpdateEvent::Failed(failed)) => print_failure(ctx, &failed),
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "watch fell behind; updates dropped");
                    continue;
                }
                Err(RecvError::Closed) => break,
            },
        }
        seen += 1;
    }

    Ok(())
}

fn print_state(ctx: &Context, state: &Arc<DeviceState>) -> Result<(), CliError> {
    let line = match ctx.format {
        // One line per update reads better than a table per update.
        OutputFormat::Table => format!(
            "{}  {}  state={} inputs={} source={}",
            Local::now().format("%H:%M:%S"),
            ctx.target.identity.name(),
            output::paint_state(state.connection_state, ctx.color),
            state.input_count,
            state.selected_source,
        ),
        OutputFormat::Json => output::render_single(
            OutputFormat::JsonCompact,
            state.as_ref(),
            |_| String::new(),
            |_| String::new(),
        )?,
        OutputFormat::Yaml => format!(
            "---\n{}",
            output::render_single(ctx.format, state.as_ref(), |_| String::new(), |_| {
                String::new()
            })?
            .trim_end()
        ),
        OutputFormat::JsonCompact | OutputFormat::Plain => {
            super::status::render_state(ctx, state)?
        }
    };
    output::print_output(&line, ctx.quiet);
    Ok(())
}

fn print_failure(ctx: &Context, failed: &UpdateFailed) {
    if !ctx.quiet {
        eprintln!(
            "{}  {}  {failed}",
            Local::now().format("%H:%M:%S"),
            ctx.target.identity.name(),
        );
    }
}
