//! CLI configuration -- thin wrapper around `kramer_config` shared types.
//!
//! Re-exports the shared types and adds CLI-specific resolution that
//! respects `GlobalOpts` flag overrides (--host, --port, --interval, etc.).

use std::time::Duration;

use clap::ValueEnum;
use kramer_api::SimulatedMatrix;
use kramer_core::{CoordinatorConfig, DeviceIdentity};

use crate::cli::{GlobalOpts, OutputFormat};
use crate::error::CliError;
use crate::output;

// ── Re-exports from shared crate ────────────────────────────────────

pub use kramer_config::{
    Config, DeviceProfile, config_path, load_config_or_default, save_config,
};

// ── CLI-specific helpers ────────────────────────────────────────────

/// The device a command runs against, with flag overrides applied.
#[derive(Debug)]
pub struct Target {
    /// Profile the device came from, if any.
    pub profile: Option<String>,
    pub identity: DeviceIdentity,
    pub coordinator: CoordinatorConfig,
}

/// Everything a device command needs besides its own arguments.
pub struct Context {
    pub target: Target,
    pub format: OutputFormat,
    pub color: bool,
    pub quiet: bool,
    /// Switch the commands talk to.
    pub matrix: SimulatedMatrix,
}

/// Output format: flag (or `KRAMER_OUTPUT`) > config default > table.
pub fn output_format(global: &GlobalOpts, cfg: &Config) -> OutputFormat {
    global.output.unwrap_or_else(|| {
        OutputFormat::from_str(&cfg.defaults.output, true).unwrap_or(OutputFormat::Table)
    })
}

/// Build the device profile the flags and config describe.
///
/// With `--host` the flags alone describe the device; otherwise the
/// selected (or default) profile is used and individual flags override it.
pub fn resolve_profile(
    global: &GlobalOpts,
    cfg: &Config,
) -> Result<(Option<String>, DeviceProfile), CliError> {
    if let Some(ref host) = global.host {
        let base = global
            .device
            .as_deref()
            .and_then(|id| cfg.devices.get(id));
        let profile = DeviceProfile {
            name: global
                .name
                .clone()
                .or_else(|| base.map(|p| p.name.clone()))
                .unwrap_or_else(|| host.clone()),
            host: host.clone(),
            port: global.port.or_else(|| base.and_then(|p| p.port)),
        };
        return Ok((global.device.clone(), profile));
    }

    let (id, base) = cfg
        .resolve_device(global.device.as_deref())
        .map_err(|e| match CliError::from(e) {
            CliError::DeviceNotFound { name, .. } => CliError::DeviceNotFound {
                name,
                available: available_profiles(cfg),
            },
            other => other,
        })?;

    let profile = DeviceProfile {
        name: global.name.clone().unwrap_or_else(|| base.name.clone()),
        host: base.host.clone(),
        port: global.port.or(base.port),
    };
    Ok((Some(id.to_owned()), profile))
}

/// Resolve the command target from config plus flag overrides.
pub fn resolve_target(global: &GlobalOpts, cfg: &Config) -> Result<Target, CliError> {
    let (profile_id, profile) = resolve_profile(global, cfg)?;
    let identity = kramer_config::profile_to_identity(&profile)?;

    let mut coordinator = kramer_config::coordinator_config(&cfg.defaults);
    if let Some(secs) = global.interval {
        coordinator.update_interval = Duration::from_secs(secs);
    }

    Ok(Target {
        profile: profile_id,
        identity,
        coordinator,
    })
}

/// Shape the simulated switch from the `--sim-*` flags.
pub fn simulated_matrix(global: &GlobalOpts) -> SimulatedMatrix {
    let mut matrix = SimulatedMatrix::new(global.sim_inputs);
    if let Some(selected) = global.sim_selected {
        matrix = matrix.with_selected(selected);
    }
    if global.sim_offline {
        matrix.set_online(false);
    }
    matrix
}

pub fn build_context(global: &GlobalOpts, cfg: &Config) -> Result<Context, CliError> {
    Ok(Context {
        target: resolve_target(global, cfg)?,
        format: output_format(global, cfg),
        color: output::should_color(global.color),
        quiet: global.quiet,
        matrix: simulated_matrix(global),
    })
}

fn available_profiles(cfg: &Config) -> String {
    let mut ids: Vec<&str> = cfg.devices.keys().map(String::as_str).collect();
    if ids.is_empty() {
        return "(none)".into();
    }
    ids.sort_unstable();
    ids.join(", ")
}
