//! Command-line interface for bondkeep.

use std::path::PathBuf;

use bondkeep_primitives::{Address, Transport};
use clap::{Args, Parser, Subcommand, ValueEnum};

/// Bondkeep - bonding lifecycle orchestration
#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
pub(crate) struct Cli {
    /// Logging configuration
    #[command(flatten)]
    pub(crate) log_args: LogArgs,

    /// Path to a TOML config file. A missing file means defaults.
    #[arg(long, global = true, value_name = "PATH", env = "BONDKEEP_CONFIG")]
    pub(crate) config: Option<PathBuf>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub(crate) command: Commands,
}

/// Logging configuration
#[derive(Debug, Args, Clone)]
pub(crate) struct LogArgs {
    /// Silence all output
    #[arg(short, long, global = true)]
    pub(crate) quiet: bool,

    /// Verbose mode (-v, -vv, -vvv, etc.)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub(crate) verbosity: u8,

    /// Log filter directive (e.g., "bondkeep_machine=trace")
    #[arg(long = "log.filter", global = true, value_name = "DIRECTIVE")]
    pub(crate) filter: Option<String>,

    /// Use JSON format for log output
    #[arg(long = "log.json", global = true)]
    pub(crate) json: bool,
}

#[derive(Debug, Subcommand)]
pub(crate) enum Commands {
    /// Print the effective configuration as TOML
    Config,

    /// Drive one pairing end to end against a loopback lower layer
    Simulate(SimulateArgs),
}

/// Arguments for the 'simulate' command
#[derive(Debug, Args)]
pub(crate) struct SimulateArgs {
    /// Remote device address
    #[arg(long, default_value = "00:11:22:33:44:55")]
    pub(crate) address: Address,

    /// Transport to bond over
    #[arg(long, value_enum, default_value_t = TransportArg::Classic)]
    pub(crate) transport: TransportArg,

    /// Never complete service discovery, so the bonded deadline fires
    #[arg(long)]
    pub(crate) no_discovery: bool,

    /// Passkey the remote shows for numeric comparison
    #[arg(long)]
    pub(crate) passkey: Option<u32>,

    /// Remove the bond once it completes
    #[arg(long)]
    pub(crate) remove: bool,

    /// JSON device store to load before and save after the run
    #[arg(long, value_name = "PATH")]
    pub(crate) store: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum TransportArg {
    Auto,
    Classic,
    Le,
}

impl From<TransportArg> for Transport {
    fn from(arg: TransportArg) -> Self {
        match arg {
            TransportArg::Auto => Self::Auto,
            TransportArg::Classic => Self::Classic,
            TransportArg::Le => Self::Le,
        }
    }
}
