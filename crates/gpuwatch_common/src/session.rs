//! Host sessions over OpenSSH.
//!
//! Two strategies sit behind the same [`Session`] trait:
//! - stateless: every execute spawns a fresh `ssh host cmd`, paying the
//!   handshake each time
//! - persistent: `open` starts a control master once and every execute
//!   multiplexes over its socket
//!
//! Sessions never retry. A transport failure is reported as
//! [`PollError::Connection`] and the caller decides whether to reconnect.

use std::fmt;
use std::path::PathBuf;
use std::process::Stdio;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::error::PollError;
use crate::host::HostSpec;

/// ssh exits with 255 when the failure is its own rather than the remote command's.
const SSH_TRANSPORT_EXIT: i32 = 255;

/// Deadline for `ssh -O exit` when tearing down a control master.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(2);

/// A connection to one host able to run commands.
#[async_trait]
pub trait Session: Send {
    /// Run `command` remotely, returning its stdout.
    async fn execute(&mut self, command: &str, timeout: Duration) -> Result<String, PollError>;

    /// Tear down the session. Idempotent; errors are swallowed.
    async fn close(&mut self);
}

/// Opens sessions for hosts.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn open(&self, host: &HostSpec) -> Result<Box<dyn Session>, PollError>;
}

/// Session strategy selected per deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    #[default]
    Stateless,
    Persistent,
}

impl FromStr for Strategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "stateless" => Ok(Strategy::Stateless),
            "persistent" => Ok(Strategy::Persistent),
            other => Err(format!(
                "unknown strategy '{}' (expected 'stateless' or 'persistent')",
                other
            )),
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Strategy::Stateless => write!(f, "stateless"),
            Strategy::Persistent => write!(f, "persistent"),
        }
    }
}

/// How ssh is invoked.
#[derive(Debug, Clone)]
pub struct SshOptions {
    pub program: String,
    pub connect_timeout: Duration,
    /// Extra `-o` options, e.g. `StrictHostKeyChecking=accept-new`.
    pub extra_options: Vec<String>,
    /// Directory holding control sockets for persistent sessions.
    pub control_dir: PathBuf,
}

impl Default for SshOptions {
    fn default() -> Self {
        Self {
            program: "ssh".to_string(),
            connect_timeout: Duration::from_secs(5),
            extra_options: Vec::new(),
            control_dir: std::env::temp_dir().join(format!("gpuwatch-{}", std::process::id())),
        }
    }
}

impl SshOptions {
    /// Arguments shared by every invocation against `host`, up to but
    /// excluding the destination.
    fn base_args(&self, host: &HostSpec) -> Vec<String> {
        let mut args = vec![
            "-o".to_string(),
            "BatchMode=yes".to_string(),
            "-o".to_string(),
            format!("ConnectTimeout={}", self.connect_timeout.as_secs().max(1)),
        ];
        for option in &self.extra_options {
            args.push("-o".to_string());
            args.push(option.clone());
        }
        if let Some(port) = host.address.port {
            args.push("-p".to_string());
            args.push(port.to_string());
        }
        if let Some(user) = &host.address.user {
            args.push("-l".to_string());
            args.push(user.clone());
        }
        args
    }

    /// Socket for `host`. Bytes outside `[A-Za-z0-9-]` are written as
    /// `_xx` hex escapes, so distinct names never share a socket.
    fn control_path(&self, host: &HostSpec) -> PathBuf {
        let mut safe = String::with_capacity(host.name.len());
        for byte in host.name.bytes() {
            if byte.is_ascii_alphanumeric() || byte == b'-' {
                safe.push(char::from(byte));
            } else {
                safe.push_str(&format!("_{:02x}", byte));
            }
        }
        self.control_dir.join(format!("{}.sock", safe))
    }
}

/// Builds ssh command lines. Split out for testing.
pub fn stateless_args(options: &SshOptions, host: &HostSpec, command: &str) -> Vec<String> {
    let mut args = options.base_args(host);
    args.push(host.address.host.clone());
    args.push(command.to_string());
    args
}

/// Run ssh to completion under `timeout`. The child is killed if the
/// deadline passes.
async fn run_ssh(program: &str, args: &[String], timeout: Duration) -> Result<String, PollError> {
    let child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| PollError::Connection(format!("failed to spawn {}: {}", program, e)))?;

    let output = match tokio::time::timeout(timeout, child.wait_with_output()).await {
        Ok(result) => result.map_err(|e| PollError::Connection(format!("ssh I/O error: {}", e)))?,
        Err(_) => return Err(PollError::Timeout(timeout)),
    };

    let stderr = String::from_utf8_lossy(&output.stderr);
    let detail = stderr
        .lines()
        .rev()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .map(str::to_string);

    match output.status.code() {
        Some(0) => Ok(String::from_utf8_lossy(&output.stdout).into_owned()),
        Some(SSH_TRANSPORT_EXIT) => Err(PollError::Connection(
            detail.unwrap_or_else(|| "ssh exited with status 255".to_string()),
        )),
        Some(code) => Err(PollError::Command(
            detail.unwrap_or_else(|| format!("exit status {}", code)),
        )),
        None => Err(PollError::Command("terminated by signal".to_string())),
    }
}

/// Fresh ssh process per execute.
pub struct StatelessSession {
    host: HostSpec,
    options: Arc<SshOptions>,
}

#[async_trait]
impl Session for StatelessSession {
    async fn execute(&mut self, command: &str, timeout: Duration) -> Result<String, PollError> {
        let args = stateless_args(&self.options, &self.host, command);
        run_ssh(&self.options.program, &args, timeout).await
    }

    async fn close(&mut self) {}
}

/// Control-master backed session.
pub struct PersistentSession {
    host: HostSpec,
    options: Arc<SshOptions>,
    control_path: PathBuf,
    closed: bool,
}

impl PersistentSession {
    pub async fn open(host: &HostSpec, options: Arc<SshOptions>) -> Result<Self, PollError> {
        tokio::fs::create_dir_all(&options.control_dir)
            .await
            .map_err(|e| {
                PollError::Connection(format!(
                    "cannot create {}: {}",
                    options.control_dir.display(),
                    e
                ))
            })?;

        let control_path = options.control_path(host);
        let mut args = options.base_args(host);
        args.extend([
            "-o".to_string(),
            "ControlMaster=yes".to_string(),
            "-o".to_string(),
            format!("ControlPath={}", control_path.display()),
            "-o".to_string(),
            "ServerAliveInterval=5".to_string(),
            "-o".to_string(),
            "ServerAliveCountMax=2".to_string(),
            "-N".to_string(),
            "-f".to_string(),
            host.address.host.clone(),
        ]);

        // -f returns once authentication is done, so this bounds the handshake.
        run_ssh(&options.program, &args, options.connect_timeout * 2)
            .await
            .map_err(PollError::into_connection)?;
        info!("{}: control master up at {}", host.name, control_path.display());

        Ok(Self {
            host: host.clone(),
            options,
            control_path,
            closed: false,
        })
    }

    fn multiplex_args(&self) -> Vec<String> {
        let mut args = self.options.base_args(&self.host);
        args.extend([
            "-o".to_string(),
            "ControlMaster=no".to_string(),
            "-o".to_string(),
            format!("ControlPath={}", self.control_path.display()),
        ]);
        args
    }

    fn exit_args(&self) -> Vec<String> {
        let mut args = self.multiplex_args();
        args.extend([
            "-O".to_string(),
            "exit".to_string(),
            self.host.address.host.clone(),
        ]);
        args
    }
}

#[async_trait]
impl Session for PersistentSession {
    async fn execute(&mut self, command: &str, timeout: Duration) -> Result<String, PollError> {
        if self.closed {
            return Err(PollError::Connection("session closed".to_string()));
        }
        let mut args = self.multiplex_args();
        args.push(self.host.address.host.clone());
        args.push(command.to_string());
        run_ssh(&self.options.program, &args, timeout).await
    }

    async fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        if let Err(e) = run_ssh(&self.options.program, &self.exit_args(), CLOSE_TIMEOUT).await {
            debug!("{}: control master exit: {}", self.host.name, e);
        }
        let _ = tokio::fs::remove_file(&self.control_path).await;
        info!("{}: control master closed", self.host.name);
    }
}

impl Drop for PersistentSession {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        // Aborted task: the exit request is reaped off the runtime threads.
        let spawned = std::process::Command::new(&self.options.program)
            .args(self.exit_args())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn();
        let control_path = self.control_path.clone();
        match spawned {
            Ok(mut child) => {
                std::thread::spawn(move || {
                    let _ = child.wait();
                    let _ = std::fs::remove_file(control_path);
                });
            }
            Err(e) => {
                warn!("{}: could not stop control master: {}", self.host.name, e);
                let _ = std::fs::remove_file(control_path);
            }
        }
    }
}

/// Production connector choosing the session type from [`Strategy`].
pub struct SshConnector {
    strategy: Strategy,
    options: Arc<SshOptions>,
}

impl SshConnector {
    pub fn new(strategy: Strategy, options: SshOptions) -> Self {
        Self {
            strategy,
            options: Arc::new(options),
        }
    }
}

#[async_trait]
impl Connector for SshConnector {
    async fn open(&self, host: &HostSpec) -> Result<Box<dyn Session>, PollError> {
        match self.strategy {
            Strategy::Stateless => Ok(Box::new(StatelessSession {
                host: host.clone(),
                options: Arc::clone(&self.options),
            })),
            Strategy::Persistent => {
                let session = PersistentSession::open(host, Arc::clone(&self.options)).await?;
                Ok(Box::new(session))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::Address;

    fn host(addr: &str) -> HostSpec {
        HostSpec::new("gpu-01", Address::parse(addr).unwrap(), false)
    }

    #[test]
    fn test_stateless_args_plain_host() {
        let options = SshOptions::default();
        let args = stateless_args(&options, &host("gpu01"), "nvidia-smi");
        assert_eq!(
            args,
            vec!["-o", "BatchMode=yes", "-o", "ConnectTimeout=5", "gpu01", "nvidia-smi"]
        );
    }

    #[test]
    fn test_stateless_args_user_and_port() {
        let options = SshOptions {
            extra_options: vec!["StrictHostKeyChecking=accept-new".to_string()],
            ..SshOptions::default()
        };
        let args = stateless_args(&options, &host("alice@gpu01:2222"), "true");
        let joined = args.join(" ");
        assert!(joined.contains("-o StrictHostKeyChecking=accept-new"));
        assert!(joined.contains("-p 2222"));
        assert!(joined.contains("-l alice"));
        assert!(joined.ends_with("gpu01 true"));
    }

    #[test]
    fn test_control_path_is_sanitized() {
        let options = SshOptions {
            control_dir: PathBuf::from("/tmp/gw"),
            ..SshOptions::default()
        };
        let spec = HostSpec::new("rack 3/gpu", Address::parse("h").unwrap(), false);
        assert_eq!(options.control_path(&spec), PathBuf::from("/tmp/gw/rack_203_2fgpu.sock"));
    }

    #[test]
    fn test_control_paths_stay_distinct() {
        let options = SshOptions {
            control_dir: PathBuf::from("/tmp/gw"),
            ..SshOptions::default()
        };
        let path = |name: &str| {
            options.control_path(&HostSpec::new(name, Address::parse("h").unwrap(), false))
        };
        assert_ne!(path("gpu.1"), path("gpu_1"));
        assert_ne!(path("gpu_1"), path("gpu_5f1"));
        assert_ne!(path("a b"), path("a_b"));
        assert_eq!(path("gpu-01"), PathBuf::from("/tmp/gw/gpu-01.sock"));
    }

    #[test]
    fn test_strategy_from_str() {
        assert_eq!("Persistent".parse::<Strategy>().unwrap(), Strategy::Persistent);
        assert_eq!("stateless".parse::<Strategy>().unwrap(), Strategy::Stateless);
        assert!("pooled".parse::<Strategy>().is_err());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_ssh_maps_exit_codes() {
        let sh = |script: &str| vec!["-c".to_string(), script.to_string()];

        let ok = run_ssh("sh", &sh("echo '45, 2048, 8192'"), Duration::from_secs(5)).await;
        assert_eq!(ok.unwrap().trim(), "45, 2048, 8192");

        let transport = run_ssh("sh", &sh("echo 'No route to host' >&2; exit 255"), Duration::from_secs(5)).await;
        assert_eq!(transport, Err(PollError::Connection("No route to host".to_string())));

        let command = run_ssh("sh", &sh("exit 9"), Duration::from_secs(5)).await;
        assert_eq!(command, Err(PollError::Command("exit status 9".to_string())));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_ssh_times_out() {
        let args = vec!["-c".to_string(), "sleep 5".to_string()];
        let result = run_ssh("sh", &args, Duration::from_millis(100)).await;
        assert_eq!(result, Err(PollError::Timeout(Duration::from_millis(100))));
    }

    #[tokio::test]
    async fn test_spawn_failure_is_connection_error() {
        let result = run_ssh("/nonexistent/ssh-binary", &[], Duration::from_secs(1)).await;
        assert!(matches!(result, Err(PollError::Connection(_))));
    }
}
