//! Supervised pool of host monitors: one task per configured host,
//! started together and torn down together.

use std::sync::Arc;

use tokio::task::JoinSet;
use tracing::{error, info};

use crate::host::HostSpec;
use crate::monitor::{HostMonitor, PollTiming};
use crate::session::Connector;
use crate::store::ObservationStore;

pub struct Fleet {
    tasks: JoinSet<()>,
    size: usize,
}

impl Fleet {
    /// Spawn a monitor loop per host. The store must already hold an
    /// entry for each of them.
    pub fn start(
        hosts: &[HostSpec],
        connector: Arc<dyn Connector>,
        store: &ObservationStore,
        timing: PollTiming,
    ) -> Self {
        let mut tasks = JoinSet::new();
        for host in hosts {
            let monitor =
                HostMonitor::new(host.clone(), Arc::clone(&connector), store.clone(), timing);
            tasks.spawn(monitor.run());
        }
        info!("Started {} host monitor(s)", hosts.len());
        Self {
            tasks,
            size: hosts.len(),
        }
    }

    pub fn len(&self) -> usize {
        self.size
    }

    /// Abort every monitor without waiting for in-flight remote calls,
    /// then reap the tasks.
    pub async fn shutdown(mut self) {
        self.tasks.abort_all();
        while let Some(result) = self.tasks.join_next().await {
            if let Err(e) = result {
                if e.is_panic() {
                    error!("Host monitor panicked: {}", e);
                }
            }
        }
        info!("Host monitors stopped");
    }
}

/// Poll every host exactly once, concurrently, and return when all are done.
pub async fn poll_all_once(
    hosts: &[HostSpec],
    connector: Arc<dyn Connector>,
    store: &ObservationStore,
    timing: PollTiming,
) {
    let mut tasks = JoinSet::new();
    for host in hosts {
        let mut monitor =
            HostMonitor::new(host.clone(), Arc::clone(&connector), store.clone(), timing);
        tasks.spawn(async move {
            monitor.poll_once().await;
            monitor.shutdown().await;
        });
    }
    while let Some(result) = tasks.join_next().await {
        if let Err(e) = result {
            error!("One-shot poll task failed: {}", e);
        }
    }
}
