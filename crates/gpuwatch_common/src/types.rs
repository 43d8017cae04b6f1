//! Observation data model shared by monitors, the store and the renderer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One GPU's telemetry from a single query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GpuReading {
    pub index: usize,
    pub utilization_percent: u32,
    pub memory_used_mib: u64,
    pub memory_total_mib: u64,
    /// Reset required. Numeric fields are not meaningful when set.
    pub faulted: bool,
}

/// Status classification of a host, written only by its monitor loop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum StatusKind {
    Waiting,
    Connecting,
    Refreshing,
    Ok,
    Timeout,
    CommandError,
    ConnectionError(String),
    OutputError(String),
}

impl StatusKind {
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            StatusKind::Timeout
                | StatusKind::CommandError
                | StatusKind::ConnectionError(_)
                | StatusKind::OutputError(_)
        )
    }
}

/// Latest known state of one host. Always replaced as a whole.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostObservation {
    pub readings: Vec<GpuReading>,
    pub status: StatusKind,
    pub last_success_at: Option<DateTime<Utc>>,
}

impl Default for HostObservation {
    fn default() -> Self {
        Self {
            readings: Vec::new(),
            status: StatusKind::Waiting,
            last_success_at: None,
        }
    }
}

impl HostObservation {
    /// Same readings and timestamp, new status.
    pub fn with_status(&self, status: StatusKind) -> Self {
        Self {
            readings: self.readings.clone(),
            status,
            last_success_at: self.last_success_at,
        }
    }

    /// Failed cycle: readings cleared, last success kept.
    pub fn failed(&self, status: StatusKind) -> Self {
        Self {
            readings: Vec::new(),
            status,
            last_success_at: self.last_success_at,
        }
    }

    pub fn succeeded(readings: Vec<GpuReading>, at: DateTime<Utc>) -> Self {
        Self {
            readings,
            status: StatusKind::Ok,
            last_success_at: Some(at),
        }
    }
}
