//! Display table model built from a store snapshot.
//!
//! Pure and infallible: any snapshot renders, an empty host renders as a
//! placeholder row. Colors are left to the terminal layer via [`Tone`].

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::store::StoreSnapshot;
use crate::types::{GpuReading, HostObservation, StatusKind};

pub const COLUMNS: [&str; 5] = ["Server", "GPU", "Util", "Memory", "Status"];

const PLACEHOLDER: &str = "...";
const FAULT_MARKER: &str = "ERR";

/// Visual weight of a cell, mapped to colors by the terminal layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Tone {
    Dim,
    Pending,
    Good,
    Bad,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusLabel {
    pub text: String,
    pub tone: Tone,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DisplayRow {
    /// Empty on continuation rows of the same host.
    pub host: String,
    pub gpu: String,
    pub utilization: String,
    pub memory: String,
    pub faulted: bool,
    /// Only on the first row of a host.
    pub status: Option<StatusLabel>,
}

/// MiB as GiB, one decimal, right-aligned to four columns.
pub fn format_gib(mib: u64) -> String {
    format!("{:>4.1}", mib as f64 / 1024.0)
}

/// Status text as of `now`. `Ok` turns into the age of the last success.
pub fn status_label(observation: &HostObservation, now: DateTime<Utc>) -> StatusLabel {
    let (text, tone) = match &observation.status {
        StatusKind::Waiting => ("Waiting...".to_string(), Tone::Dim),
        StatusKind::Connecting => ("Connecting...".to_string(), Tone::Pending),
        StatusKind::Refreshing => ("Refreshing...".to_string(), Tone::Pending),
        StatusKind::Ok => match observation.last_success_at {
            Some(at) => {
                let seconds = (now - at).num_seconds().max(0);
                (format!("{}s ago", seconds), Tone::Good)
            }
            None => ("OK".to_string(), Tone::Good),
        },
        StatusKind::Timeout => ("Timeout".to_string(), Tone::Bad),
        StatusKind::CommandError => ("Command Error".to_string(), Tone::Bad),
        StatusKind::ConnectionError(detail) => {
            (format!("Connection Error: {}", detail), Tone::Bad)
        }
        StatusKind::OutputError(_) => ("Output Error".to_string(), Tone::Bad),
    };
    StatusLabel { text, tone }
}

fn gpu_row(host: &str, reading: &GpuReading, status: Option<StatusLabel>) -> DisplayRow {
    let (utilization, memory) = if reading.faulted {
        (FAULT_MARKER.to_string(), FAULT_MARKER.to_string())
    } else {
        (
            format!("{}%", reading.utilization_percent),
            format!(
                "{} / {} GiB",
                format_gib(reading.memory_used_mib),
                format_gib(reading.memory_total_mib)
            ),
        )
    };
    DisplayRow {
        host: host.to_string(),
        gpu: reading.index.to_string(),
        utilization,
        memory,
        faulted: reading.faulted,
        status,
    }
}

/// Rows for every host, in declared order.
pub fn build_rows(snapshot: &StoreSnapshot, now: DateTime<Utc>) -> Vec<DisplayRow> {
    let mut rows = Vec::new();
    for (name, observation) in snapshot.iter() {
        let label = status_label(observation, now);

        if observation.readings.is_empty() {
            rows.push(DisplayRow {
                host: name.to_string(),
                gpu: PLACEHOLDER.to_string(),
                utilization: PLACEHOLDER.to_string(),
                memory: PLACEHOLDER.to_string(),
                faulted: false,
                status: Some(label),
            });
            continue;
        }

        let mut label = Some(label);
        for (position, reading) in observation.readings.iter().enumerate() {
            let host = if position == 0 { name } else { "" };
            rows.push(gpu_row(host, reading, label.take()));
        }
    }
    rows
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn reading(index: usize, faulted: bool) -> GpuReading {
        GpuReading {
            index,
            utilization_percent: 45,
            memory_used_mib: 2048,
            memory_total_mib: 8192,
            faulted,
        }
    }

    #[tokio::test]
    async fn test_build_rows_placeholder_and_continuation() {
        use crate::host::{Address, HostSpec};
        use crate::store::ObservationStore;

        let hosts = vec![
            HostSpec::new("alpha", Address::parse("alpha").unwrap(), false),
            HostSpec::new("beta", Address::parse("beta").unwrap(), false),
        ];
        let store = ObservationStore::new(&hosts);
        let now = Utc::now();
        store
            .write(
                "alpha",
                HostObservation::succeeded(vec![reading(0, false), reading(1, false)], now),
            )
            .await;

        let rows = build_rows(&store.snapshot().await, now);
        assert_eq!(rows.len(), 3);

        assert_eq!(rows[0].host, "alpha");
        assert_eq!(rows[0].status.as_ref().unwrap().text, "0s ago");
        assert_eq!(rows[1].host, "");
        assert_eq!(rows[1].gpu, "1");
        assert_eq!(rows[1].status, None);

        assert_eq!(rows[2].host, "beta");
        assert_eq!(rows[2].gpu, "...");
        assert_eq!(rows[2].utilization, "...");
        assert_eq!(rows[2].memory, "...");
        assert_eq!(rows[2].status.as_ref().unwrap().text, "Waiting...");
        assert_eq!(rows[2].status.as_ref().unwrap().tone, Tone::Dim);
    }

    #[test]
    fn test_format_gib() {
        assert_eq!(format_gib(2048), " 2.0");
        assert_eq!(format_gib(8192), " 8.0");
        assert_eq!(format_gib(81920), "80.0");
        assert_eq!(format_gib(0), " 0.0");
        assert_eq!(format_gib(1536), " 1.5");
    }

    #[test]
    fn test_ok_renders_age() {
        let now = Utc::now();
        let obs = HostObservation::succeeded(vec![], now - Duration::seconds(7));
        assert_eq!(status_label(&obs, now).text, "7s ago");
        assert_eq!(status_label(&obs, now).tone, Tone::Good);
    }

    #[test]
    fn test_age_never_negative() {
        let now = Utc::now();
        let obs = HostObservation::succeeded(vec![], now + Duration::seconds(3));
        assert_eq!(status_label(&obs, now).text, "0s ago");
    }

    #[test]
    fn test_connection_error_shows_detail() {
        let obs = HostObservation::default().failed(StatusKind::ConnectionError("refused".into()));
        let label = status_label(&obs, Utc::now());
        assert_eq!(label.text, "Connection Error: refused");
        assert_eq!(label.tone, Tone::Bad);
    }

    #[test]
    fn test_faulted_row_uses_marker() {
        let row = gpu_row("h", &reading(0, true), None);
        assert_eq!(row.utilization, "ERR");
        assert_eq!(row.memory, "ERR");
        assert!(row.faulted);
    }

    #[test]
    fn test_healthy_row_format() {
        let row = gpu_row("h", &reading(2, false), None);
        assert_eq!(row.gpu, "2");
        assert_eq!(row.utilization, "45%");
        assert_eq!(row.memory, " 2.0 /  8.0 GiB");
    }
}
