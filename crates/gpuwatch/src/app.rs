//! Startup wiring: settings, hosts, store, monitors and renderer.

use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use gpuwatch_common::config::{load_hosts, HostsFile};
use gpuwatch_common::fleet::poll_all_once;
use gpuwatch_common::{Connector, Fleet, ObservationStore, Settings, SshConnector};
use tracing::info;

use crate::cli::Cli;
use crate::output;
use crate::tui;

/// Resolved configuration for one run.
pub struct Plan {
    pub settings: Settings,
    pub hosts: HostsFile,
}

pub fn plan(cli: &Cli) -> Result<Plan> {
    let settings = match &cli.settings {
        Some(path) => Settings::load(path)
            .with_context(|| format!("Failed to load settings from {}", path.display()))?,
        None => Settings::default(),
    };
    let settings = cli.apply(settings);

    let hosts = load_hosts(&cli.servers)
        .with_context(|| format!("Failed to load hosts from {}", cli.servers.display()))?;

    Ok(Plan { settings, hosts })
}

fn connector(settings: &Settings) -> Arc<dyn Connector> {
    Arc::new(SshConnector::new(settings.strategy, settings.ssh_options()))
}

/// Live dashboard until the user quits.
pub async fn run_dashboard(plan: Plan) -> Result<()> {
    let Plan { settings, hosts } = plan;
    let store = ObservationStore::new(&hosts.hosts);

    info!(
        "Dashboard starting: {} host(s), strategy={}, poll every {}s",
        hosts.hosts.len(),
        settings.strategy,
        settings.poll_interval_secs
    );

    let fleet = Fleet::start(&hosts.hosts, connector(&settings), &store, settings.timing());
    let result = tui::run(store, settings.refresh_interval()).await;
    fleet.shutdown().await;
    result
}

/// Poll each host once and print the result.
pub async fn run_once(plan: Plan, json: bool) -> Result<()> {
    let Plan { settings, hosts } = plan;
    let store = ObservationStore::new(&hosts.hosts);

    poll_all_once(&hosts.hosts, connector(&settings), &store, settings.timing()).await;

    let snapshot = store.snapshot().await;
    if json {
        println!("{}", output::json(&snapshot)?);
    } else {
        print!("{}", output::plain_table(&snapshot, Utc::now()));
    }
    Ok(())
}
