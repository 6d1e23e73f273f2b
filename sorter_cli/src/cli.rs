//! CLI argument definitions and shared statics.

use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::OnceLock;

pub static FILE_GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();
/// Whether the user asked for JSON output (controls structured error output).
pub static JSON_MODE: OnceLock<bool> = OnceLock::new();

#[derive(Parser, Debug)]
#[command(name = "sorter", version, about = "Box sorting work-cell controller")]
pub struct Cli {
    /// Path to config TOML (typed)
    #[arg(long, value_name = "FILE", default_value = "etc/sorter_config.toml")]
    pub config: PathBuf,

    /// Log as JSON lines and print results as JSON
    #[arg(long, action = ArgAction::SetTrue)]
    pub json: bool,

    /// Console log level (error|warn|info|debug|trace)
    #[arg(long = "log-level", value_name = "LEVEL", default_value = "info")]
    pub log_level: String,

    /// Command to execute
    #[command(subcommand)]
    pub cmd: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the sorting cycle until Ctrl-C (or --ticks), then drain
    Run {
        /// Drive the simulated plant instead of the serial controller
        #[arg(long, action = ArgAction::SetTrue)]
        sim: bool,
        /// Stop after this many ticks (overrides runner.max_ticks; 0 = unbounded)
        #[arg(long, value_name = "N")]
        ticks: Option<u64>,
        /// Control tick period in ms (overrides runner.tick_ms)
        #[arg(long = "tick-ms", value_name = "MS")]
        tick_ms: Option<u64>,
    },
    /// Validate the config and catalog without touching hardware
    SelfCheck,
    /// Match one measurement against the pending catalog records
    Match {
        #[arg(long, value_name = "MM")]
        length: f32,
        #[arg(long, value_name = "MM")]
        width: f32,
        /// Measured height; 0 when unknown
        #[arg(long, value_name = "MM", default_value_t = 0.0)]
        height: f32,
        /// box | cylinder
        #[arg(long, default_value = "box")]
        shape: String,
    },
    /// Validate one raw controller command and send it
    Send {
        /// Send to the simulated plant instead of the serial controller
        #[arg(long, action = ArgAction::SetTrue)]
        sim: bool,
        /// Command line, e.g. "SET 0 FWD" or "POS 3 110"
        #[arg(value_name = "LINE")]
        line: String,
    },
}
