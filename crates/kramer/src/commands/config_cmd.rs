//! Config subcommand handlers.

use tabled::Tabled;

use kramer_core::validate_connection;

use crate::cli::{ConfigAddArgs, ConfigArgs, ConfigCommand, GlobalOpts, OutputFormat};
use crate::config::{self, Config, DeviceProfile};
use crate::error::CliError;
use crate::output;

// ── Table row ───────────────────────────────────────────────────────

#[derive(Tabled)]
struct ProfileRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Host")]
    host: String,
    #[tabled(rename = "Port")]
    port: String,
    #[tabled(rename = "Default")]
    default: String,
}

#[derive(serde::Serialize)]
struct ListedProfile<'a> {
    id: &'a str,
    #[serde(flatten)]
    profile: &'a DeviceProfile,
    default: bool,
}

// ── Handler ─────────────────────────────────────────────────────────

pub async fn handle(args: ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        ConfigCommand::Path => {
            output::print_output(&config::config_path().display().to_string(), global.quiet);
            Ok(())
        }

        ConfigCommand::Show => {
            let cfg = config::load_config_or_default();
            let rendered = toml::to_string_pretty(&cfg)?;
            output::print_output(rendered.trim_end(), global.quiet);
            Ok(())
        }

        ConfigCommand::List => {
            let cfg = config::load_config_or_default();
            list(&cfg, config::output_format(global, &cfg), global.quiet)
        }

        ConfigCommand::Add(add) => add_profile(add, global).await,

        ConfigCommand::Remove { id } => {
            let mut cfg = config::load_config_or_default();
            if cfg.devices.remove(&id).is_none() {
                let mut ids: Vec<_> = cfg.devices.keys().cloned().collect();
                ids.sort_unstable();
                return Err(CliError::DeviceNotFound {
                    name: id,
                    available: ids.join(", "),
                });
            }
            if cfg.default_device.as_deref() == Some(id.as_str()) {
                cfg.default_device = None;
            }
            config::save_config(&cfg)?;
            if !global.quiet {
                eprintln!("Removed device profile '{id}'");
            }
            Ok(())
        }
    }
}

fn list(cfg: &Config, format: OutputFormat, quiet: bool) -> Result<(), CliError> {
    let mut ids: Vec<&String> = cfg.devices.keys().collect();
    ids.sort_unstable();

    let listed: Vec<ListedProfile<'_>> = ids
        .into_iter()
        .map(|id| ListedProfile {
            id,
            profile: &cfg.devices[id],
            default: cfg.default_device.as_ref() == Some(id),
        })
        .collect();

    let rendered = output::render_list(
        format,
        &listed,
        |p| ProfileRow {
            id: p.id.to_owned(),
            name: p.profile.name.clone(),
            host: p.profile.host.clone(),
            port: p
                .profile
                .port
                .map_or_else(|| format!("{} (default)", kramer_core::DEFAULT_PORT), |port| {
                    port.to_string()
                }),
            default: if p.default { "*".into() } else { String::new() },
        },
        |p| p.id.to_owned(),
    )?;
    output::print_output(&rendered, quiet);
    Ok(())
}

async fn add_profile(args: ConfigAddArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let host = global.host.clone().ok_or_else(|| CliError::Validation {
        field: "host".into(),
        reason: "`config add` needs --host".into(),
    })?;
    let profile = DeviceProfile {
        name: global.name.clone().unwrap_or_else(|| args.id.clone()),
        host,
        port: global.port,
    };
    let identity = kramer_config::profile_to_identity(&profile)?;

    if !args.no_validate {
        let state = validate_connection(identity, config::simulated_matrix(global).connector())
            .await?;
        tracing::info!(
            device = %profile.name,
            inputs = state.input_count,
            "device validated"
        );
    }

    let mut cfg = config::load_config_or_default();
    if args.default || cfg.default_device.is_none() {
        cfg.default_device = Some(args.id.clone());
    }
    cfg.devices.insert(args.id.clone(), profile);
    config::save_config(&cfg)?;

    if !global.quiet {
        eprintln!(
            "Saved device profile '{}' to {}",
            args.id,
            config::config_path().display()
        );
    }
    Ok(())
}
