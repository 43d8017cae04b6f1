//! Error types for gpuwatch.

use std::time::Duration;

use thiserror::Error;

use crate::types::StatusKind;

/// Failure of a single poll against one host.
///
/// Every variant is contained inside the host's monitor loop and ends up
/// as a [`StatusKind`] in the store; none of them stops the process.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PollError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Timed out after {}s", .0.as_secs())]
    Timeout(Duration),

    #[error("Remote command failed: {0}")]
    Command(String),

    #[error("Malformed output: {0}")]
    Output(String),
}

impl PollError {
    /// Status recorded for this failure.
    pub fn status(&self) -> StatusKind {
        match self {
            PollError::Connection(detail) => StatusKind::ConnectionError(detail.clone()),
            PollError::Timeout(_) => StatusKind::Timeout,
            PollError::Command(_) => StatusKind::CommandError,
            PollError::Output(detail) => StatusKind::OutputError(detail.clone()),
        }
    }

    /// Whether the session that produced this error must be closed and
    /// replaced before the next cycle.
    pub fn discards_session(&self) -> bool {
        matches!(self, PollError::Connection(_) | PollError::Timeout(_))
    }

    /// Recast as a connection failure. Anything that goes wrong while
    /// establishing a session is reported as one.
    pub fn into_connection(self) -> PollError {
        match self {
            PollError::Connection(detail) => PollError::Connection(detail),
            PollError::Timeout(after) => {
                PollError::Connection(format!("handshake timed out after {}s", after.as_secs()))
            }
            PollError::Command(detail) | PollError::Output(detail) => PollError::Connection(detail),
        }
    }
}

/// Startup configuration errors (hosts file, settings file, addresses).
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Line {line}: expected `<name> <address> [check-err]`")]
    MissingAddress { line: usize },

    #[error("Line {line}: duplicate host name '{name}'")]
    DuplicateName { name: String, line: usize },

    #[error("Invalid address '{address}': {reason}")]
    InvalidAddress { address: String, reason: String },

    #[error("No hosts configured")]
    NoHosts,

    #[error("Invalid settings: {0}")]
    Settings(#[from] toml::de::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_into_connection() {
        assert_eq!(
            PollError::Timeout(Duration::from_secs(4)).into_connection(),
            PollError::Connection("handshake timed out after 4s".to_string())
        );
        assert_eq!(
            PollError::Command("exit status 1".to_string()).into_connection(),
            PollError::Connection("exit status 1".to_string())
        );
        assert_eq!(
            PollError::Connection("refused".to_string()).into_connection(),
            PollError::Connection("refused".to_string())
        );
    }

    #[test]
    fn test_transport_failures_discard_session() {
        assert!(PollError::Connection("reset".into()).discards_session());
        assert!(PollError::Timeout(Duration::from_secs(8)).discards_session());
        assert!(!PollError::Command("exit 9".into()).discards_session());
        assert!(!PollError::Output("arity".into()).discards_session());
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            PollError::Connection("no route".into()).status(),
            StatusKind::ConnectionError("no route".into())
        );
        assert_eq!(PollError::Timeout(Duration::from_secs(1)).status(), StatusKind::Timeout);
        assert_eq!(PollError::Command("x".into()).status(), StatusKind::CommandError);
        assert!(matches!(
            PollError::Output("x".into()).status(),
            StatusKind::OutputError(_)
        ));
    }
}
