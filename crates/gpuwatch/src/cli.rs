//! CLI - Command-line argument parsing
//!
//! Defines the CLI structure using clap. Flags given here override the
//! settings file.

use std::path::PathBuf;

use clap::Parser;
use gpuwatch_common::config::DEFAULT_HOSTS_FILE;
use gpuwatch_common::{Settings, Strategy};

/// Live GPU dashboard for a fleet of ssh-reachable hosts
#[derive(Parser, Debug)]
#[command(name = "gpuwatch")]
#[command(about = "Live GPU utilization and memory across remote hosts", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Hosts file: one `<name> <address> [check-err]` per line
    #[arg(default_value = DEFAULT_HOSTS_FILE)]
    pub servers: PathBuf,

    /// TOML settings file
    #[arg(long)]
    pub settings: Option<PathBuf>,

    /// Session strategy: stateless (ssh per poll) or persistent (control master)
    #[arg(long)]
    pub strategy: Option<Strategy>,

    /// Seconds between polls of each host
    #[arg(long, value_name = "SECS")]
    pub poll_interval: Option<u64>,

    /// Dashboard redraw cadence in milliseconds
    #[arg(long, value_name = "MS")]
    pub refresh_ms: Option<u64>,

    /// Deadline for one remote query in seconds
    #[arg(long, value_name = "SECS")]
    pub query_timeout: Option<u64>,

    /// Write logs here (the dashboard owns the terminal)
    #[arg(long)]
    pub log_file: Option<PathBuf>,

    /// Poll every host once, print the table and exit
    #[arg(long)]
    pub once: bool,

    /// With --once, print JSON instead of a table
    #[arg(long, requires = "once")]
    pub json: bool,
}

impl Cli {
    /// Apply command-line overrides on top of `settings`.
    pub fn apply(&self, mut settings: Settings) -> Settings {
        if let Some(strategy) = self.strategy {
            settings.strategy = strategy;
        }
        if let Some(secs) = self.poll_interval {
            settings.poll_interval_secs = secs;
        }
        if let Some(ms) = self.refresh_ms {
            settings.refresh_interval_ms = ms;
        }
        if let Some(secs) = self.query_timeout {
            settings.query_timeout_secs = secs;
        }
        settings
    }
}
