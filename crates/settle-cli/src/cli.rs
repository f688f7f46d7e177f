use std::path::PathBuf;

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand, ValueHint};

#[derive(Parser, Debug)]
#[command(name = "settle", author, version, about, long_about = None)]
pub struct Cli {
    /// Set the logging level
    #[arg(long, default_value = "info", global = true)]
    pub log_level: tracing::Level,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Settle one period: aggregate readings, compute grid loss and publish every table
    Run(RunArgs),
    /// Apply master-data change events to stored period partitions
    Mutate {
        /// Period partitions (JSON array)
        #[arg(long, value_hint = ValueHint::FilePath)]
        periods: PathBuf,
        /// Change events (JSON array), applied in order
        #[arg(long, value_hint = ValueHint::FilePath)]
        events: PathBuf,
        /// Where to write the updated partitions (defaults to overwriting --periods)
        #[arg(short, long, value_hint = ValueHint::FilePath)]
        out: Option<PathBuf>,
        /// Run config whose coordinator receives the snapshot notification
        #[arg(long, value_hint = ValueHint::FilePath)]
        config: Option<PathBuf>,
    },
    /// Validate responsibility intervals and period partitions without settling
    CheckMasterData {
        /// Grid-loss / system-correction responsibility CSV
        #[arg(long, value_hint = ValueHint::FilePath)]
        responsibilities: Option<PathBuf>,
        /// Period partitions (JSON array)
        #[arg(long, value_hint = ValueHint::FilePath)]
        periods: Option<PathBuf>,
    },
}

#[derive(clap::Args, Debug, Default)]
pub struct RunArgs {
    /// TOML run configuration; flags below override its values
    #[arg(short, long, value_hint = ValueHint::FilePath)]
    pub config: Option<PathBuf>,
    /// Start of the settled period (RFC 3339)
    #[arg(long)]
    pub beginning: Option<DateTime<Utc>>,
    /// End of the settled period, exclusive (RFC 3339)
    #[arg(long)]
    pub end: Option<DateTime<Utc>>,
    /// Comma-separated grid areas (e.g., "500,501")
    #[arg(long)]
    pub grid_areas: Option<String>,
    /// Readings CSV
    #[arg(long, value_hint = ValueHint::FilePath)]
    pub readings: Option<PathBuf>,
    /// Responsibility CSV
    #[arg(long, value_hint = ValueHint::FilePath)]
    pub responsibilities: Option<PathBuf>,
    /// Result root; tables go to <output>/Results/<stamp>/
    #[arg(short, long, value_hint = ValueHint::DirPath)]
    pub output: Option<PathBuf>,
    /// Run stamp used as the result directory name (defaults to the current time)
    #[arg(long)]
    pub stamp: Option<String>,
    /// Worker threads ("auto" or a number)
    #[arg(long)]
    pub threads: Option<String>,
    /// Skip coordinator notification even if the config enables it
    #[arg(long)]
    pub no_notify: bool,
}
