//! gpuwatch - live GPU dashboard over ssh

use anyhow::Result;
use clap::Parser;
use gpuwatch::app;
use gpuwatch::cli::Cli;
use gpuwatch::logging::{self, LogTarget};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let target = match (&cli.log_file, cli.once) {
        (Some(path), _) => LogTarget::File(path.as_path()),
        (None, true) => LogTarget::Stderr,
        (None, false) => LogTarget::Discard,
    };
    logging::init(target)?;

    let plan = app::plan(&cli)?;

    // Shown before the dashboard takes over the screen.
    for warning in &plan.hosts.warnings {
        eprintln!("warning: {}", warning);
    }

    if cli.once {
        app::run_once(plan, cli.json).await
    } else {
        app::run_dashboard(plan).await
    }
}
