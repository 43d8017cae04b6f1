//! gpuwatch core - host sessions, telemetry query, monitor loops and the
//! observation store behind the dashboard.

pub mod config;
pub mod error;
pub mod fleet;
pub mod host;
pub mod monitor;
pub mod query;
pub mod render;
pub mod session;
pub mod settings;
pub mod store;
pub mod types;

pub use error::{ConfigError, PollError};
pub use fleet::Fleet;
pub use host::{Address, HostSpec};
pub use monitor::{HostMonitor, PollTiming};
pub use session::{Connector, Session, SshConnector, SshOptions, Strategy};
pub use settings::Settings;
pub use store::{ObservationStore, StoreSnapshot};
pub use types::{GpuReading, HostObservation, StatusKind};
