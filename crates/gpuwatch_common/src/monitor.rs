//! Per-host monitor loop.
//!
//! Each cycle connects if there is no live session, runs the telemetry
//! query and publishes exactly one full observation per outcome. Failures
//! are retried forever at a fixed interval. Reconnection is lazy: a session
//! is only replaced after a transport failure or a timeout was observed on
//! it.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::error::PollError;
use crate::host::HostSpec;
use crate::query::{self, QUERY_TIMEOUT};
use crate::session::{Connector, Session};
use crate::store::ObservationStore;
use crate::types::{HostObservation, StatusKind};

/// Fixed timings of the monitor loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollTiming {
    /// Pause after a completed query, successful or not.
    pub poll_interval: Duration,
    /// Pause after a failed connect.
    pub retry_interval: Duration,
    pub query_timeout: Duration,
    pub connect_timeout: Duration,
}

impl Default for PollTiming {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(5),
            retry_interval: Duration::from_secs(5),
            query_timeout: QUERY_TIMEOUT,
            connect_timeout: Duration::from_secs(10),
        }
    }
}

/// Supervises one host. Owns the session and the host's current
/// observation; the store only ever receives copies.
pub struct HostMonitor {
    host: HostSpec,
    connector: Arc<dyn Connector>,
    store: ObservationStore,
    timing: PollTiming,
    session: Option<Box<dyn Session>>,
    current: HostObservation,
}

impl HostMonitor {
    pub fn new(
        host: HostSpec,
        connector: Arc<dyn Connector>,
        store: ObservationStore,
        timing: PollTiming,
    ) -> Self {
        Self {
            host,
            connector,
            store,
            timing,
            session: None,
            current: HostObservation::default(),
        }
    }

    pub fn has_session(&self) -> bool {
        self.session.is_some()
    }

    /// Run forever. Only cancellation of the task stops it.
    pub async fn run(mut self) {
        info!("{}: monitoring {}", self.host.name, self.host.address);
        loop {
            let pause = self.poll_once().await;
            tokio::time::sleep(pause).await;
        }
    }

    /// One poll cycle. Returns how long to sleep before the next one.
    pub async fn poll_once(&mut self) -> Duration {
        let mut session = match self.session.take() {
            Some(session) => session,
            None => match self.connect().await {
                Ok(session) => session,
                Err(err) => {
                    warn!("{}: connect failed: {}", self.host.name, err);
                    self.publish(self.current.failed(err.status())).await;
                    return self.timing.retry_interval;
                }
            },
        };

        self.publish(self.current.with_status(StatusKind::Refreshing))
            .await;

        let result =
            query::query_gpus(session.as_mut(), self.host.check_faults, self.timing.query_timeout)
                .await;

        match result {
            Ok(readings) => {
                debug!("{}: {} GPU(s)", self.host.name, readings.len());
                self.session = Some(session);
                self.publish(HostObservation::succeeded(readings, Utc::now()))
                    .await;
            }
            Err(err) => {
                warn!("{}: poll failed: {}", self.host.name, err);
                if err.discards_session() {
                    session.close().await;
                    info!("{}: session dropped, reconnecting next cycle", self.host.name);
                } else {
                    self.session = Some(session);
                }
                self.publish(self.current.failed(err.status())).await;
            }
        }

        self.timing.poll_interval
    }

    async fn connect(&mut self) -> Result<Box<dyn Session>, PollError> {
        self.publish(self.current.with_status(StatusKind::Connecting))
            .await;

        match tokio::time::timeout(self.timing.connect_timeout, self.connector.open(&self.host))
            .await
        {
            Ok(result) => result.map_err(PollError::into_connection),
            Err(_) => Err(PollError::Connection(format!(
                "connect timed out after {}s",
                self.timing.connect_timeout.as_secs()
            ))),
        }
    }

    async fn publish(&mut self, observation: HostObservation) {
        self.current = observation;
        self.store.write(&self.host.name, self.current.clone()).await;
    }

    /// Close the live session, if any.
    pub async fn shutdown(&mut self) {
        if let Some(mut session) = self.session.take() {
            session.close().await;
        }
    }
}
