//! CLI argument definitions and shared statics.

use clap::{ArgAction, ArgGroup, Args, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::{Mutex, OnceLock};

/// File log worker guard; taken and dropped on exit to flush buffered lines.
pub static FILE_GUARD: OnceLock<Mutex<Option<tracing_appender::non_blocking::WorkerGuard>>> =
    OnceLock::new();
/// Whether the user asked for JSON output (controls structured error output).
pub static JSON_MODE: OnceLock<bool> = OnceLock::new();
/// Scan request of the current run, echoed in JSON error details.
pub static LAST_REQUEST: OnceLock<RangeArgs> = OnceLock::new();

#[derive(Parser, Debug)]
#[command(name = "flyscan", version, about = "Bragg monochromator fly-scan controller")]
pub struct Cli {
    /// Path to config TOML (typed); built-in defaults when omitted
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Crystal preset or table entry, overriding [crystal] in the config
    #[arg(long, value_name = "NAME")]
    pub crystal: Option<String>,

    /// Print results and errors as JSON lines instead of text
    #[arg(long, action = ArgAction::SetTrue)]
    pub json: bool,

    /// Console log level (error|warn|info|debug|trace)
    #[arg(long = "log-level", value_name = "LEVEL", default_value = "warn")]
    pub log_level: String,

    /// Command to execute
    #[command(subcommand)]
    pub cmd: Commands,
}

/// Energy range shared by `plan` and `scan`.
#[derive(Args, Debug, Clone, Copy)]
pub struct RangeArgs {
    /// First energy of the scan, eV
    #[arg(long, value_name = "EV")]
    pub start: f64,
    /// Last energy of the scan, eV
    #[arg(long, value_name = "EV")]
    pub end: f64,
    /// Number of detector frames
    #[arg(long, value_name = "N")]
    pub points: u32,
    /// Time spent between start and end, seconds
    #[arg(long, value_name = "SECONDS")]
    pub time: f64,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Compute the motion plan and gate settings without touching hardware
    Plan {
        #[command(flatten)]
        range: RangeArgs,
    },
    /// Convert between photon energy and Bragg angle
    #[command(group(ArgGroup::new("value").required(true).args(["energy", "angle"])))]
    Convert {
        /// Photon energy in eV
        #[arg(long, value_name = "EV")]
        energy: Option<f64>,
        /// Bragg angle in degrees
        #[arg(long, value_name = "DEG")]
        angle: Option<f64>,
    },
    /// Run a fly scan against the simulated beamline
    Scan {
        #[command(flatten)]
        range: RangeArgs,
        /// Print every frame with its energy after the scan
        #[arg(long, action = ArgAction::SetTrue)]
        print_frames: bool,
        /// Show live actuator position while the scan runs
        #[arg(long, action = ArgAction::SetTrue)]
        progress: bool,
    },
    /// Quick health check of the simulated beamline
    SelfCheck,
}
