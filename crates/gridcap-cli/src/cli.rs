use clap::{Parser, Subcommand, ValueHint};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about = "Hosting-capacity analysis of transmission cases", long_about = None)]
pub struct Cli {
    /// Set the logging level
    #[arg(long, default_value = "info", global = true)]
    pub log_level: tracing::Level,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Per-bus load and generation headroom under normal and N-1 conditions
    Headroom {
        /// Analysis config (JSON)
        #[arg(value_hint = ValueHint::FilePath)]
        config: PathBuf,
        /// Log violation events as warnings
        #[arg(long)]
        violations_as_warnings: bool,
        /// Directory for the JSON reports (defaults to the case directory)
        #[arg(long, value_hint = ValueHint::DirPath)]
        out_dir: Option<PathBuf>,
        /// Skip the console tables
        #[arg(long)]
        no_print: bool,
    },
    /// Build the N-1 contingency scenario of a case
    Scenario {
        /// Case file (MATPOWER .m or JSON)
        #[arg(value_hint = ValueHint::FilePath)]
        case: PathBuf,
        /// Contingency limits (JSON); the default contingency limits otherwise
        #[arg(long, value_hint = ValueHint::FilePath)]
        contingency_limits: Option<PathBuf>,
        /// Solve with full Newton-Raphson instead of FDNS
        #[arg(long)]
        full_newton: bool,
        /// Write the scenario here instead of printing it
        #[arg(short, long, value_hint = ValueHint::FilePath)]
        out: Option<PathBuf>,
    },
    /// Solve a case once and list its violations
    Check {
        /// Case file (MATPOWER .m or JSON)
        #[arg(value_hint = ValueHint::FilePath)]
        case: PathBuf,
        /// Violation limits (JSON); the default normal limits otherwise
        #[arg(long, value_hint = ValueHint::FilePath)]
        limits: Option<PathBuf>,
        /// Solve with full Newton-Raphson instead of FDNS
        #[arg(long)]
        full_newton: bool,
    },
    /// Export the element tables of a case as JSON
    Export {
        /// Case file (MATPOWER .m or JSON)
        #[arg(value_hint = ValueHint::FilePath)]
        case: PathBuf,
        /// Output directory (defaults to the case directory)
        #[arg(long, value_hint = ValueHint::DirPath)]
        out_dir: Option<PathBuf>,
    },
}
