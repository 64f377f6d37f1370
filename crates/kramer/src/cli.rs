//! Clap derive structures for the `kramer` CLI.
//!
//! Defines the command tree, global flags, and shared types.

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// kramer -- keep a Kramer AV matrix switch in sync from the command line
#[derive(Debug, Parser)]
#[command(
    name = "kramer",
    version,
    about = "Monitor and control Kramer AV matrix switches",
    long_about = "Polls a Kramer AV matrix switch for its input count and routed source,\n\
        and routes inputs on demand.\n\n\
        Device I/O runs against the built-in simulated switch; the --sim-* flags\n\
        shape it.",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Device profile to use
    #[arg(long, short = 'd', env = "KRAMER_DEVICE", global = true)]
    pub device: Option<String>,

    /// Device display name (overrides profile)
    #[arg(long, global = true)]
    pub name: Option<String>,

    /// Device hostname or IP (overrides profile)
    #[arg(long, env = "KRAMER_HOST", global = true)]
    pub host: Option<String>,

    /// Device TCP port (overrides profile)
    #[arg(long, env = "KRAMER_PORT", global = true)]
    pub port: Option<u16>,

    /// Seconds between background refreshes; 0 disables the timer
    #[arg(long, global = true)]
    pub interval: Option<u64>,

    /// Number of inputs on the simulated switch
    #[arg(long, default_value = "4", global = true)]
    pub sim_inputs: u32,

    /// Input initially routed on the simulated switch
    #[arg(long, global = true)]
    pub sim_selected: Option<u32>,

    /// Make the simulated switch refuse every connection
    #[arg(long, global = true)]
    pub sim_offline: bool,

    /// Output format (defaults to the configured format, then table)
    #[arg(long, short = 'o', env = "KRAMER_OUTPUT", global = true)]
    pub output: Option<OutputFormat>,

    /// When to use color output
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorMode,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,
}

// ── Output & Color Enums ─────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table (default, interactive)
    Table,
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON
    JsonCompact,
    /// YAML
    Yaml,
    /// Plain text, one value per line (scripting)
    Plain,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ColorMode {
    /// Auto-detect (color if terminal is interactive)
    Auto,
    /// Always emit color codes
    Always,
    /// Never emit color codes
    Never,
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Refresh once and show the device state
    #[command(alias = "st")]
    Status,

    /// Route an input to the output
    #[command(alias = "sel")]
    Select(SelectArgs),

    /// Poll in the background and print every update
    Watch(WatchArgs),

    /// Check that the device is reachable
    Validate,

    /// Manage CLI configuration and device profiles
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ── Device commands ──────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct SelectArgs {
    /// Input index to route, e.g. "2"
    pub source: String,
}

#[derive(Debug, Args)]
pub struct WatchArgs {
    /// Exit after this many updates
    #[arg(long, short = 'n')]
    pub count: Option<usize>,
}

// ── Config ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Print the config file path
    Path,

    /// Show the current configuration
    Show,

    /// List device profiles
    #[command(alias = "ls")]
    List,

    /// Add or replace a device profile
    Add(ConfigAddArgs),

    /// Remove a device profile
    #[command(alias = "rm")]
    Remove {
        /// Profile identifier
        id: String,
    },
}

/// Device details come from the global `--host`, `--port`, and `--name`.
#[derive(Debug, Args)]
pub struct ConfigAddArgs {
    /// Profile identifier, used with --device
    pub id: String,

    /// Make this the default device
    #[arg(long)]
    pub default: bool,

    /// Save without checking that the device is reachable
    #[arg(long)]
    pub no_validate: bool,
}

// ── Completions ──────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
