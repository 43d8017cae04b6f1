//! Hosts file loading.
//!
//! One host per line: `<name> <address> [check-err]`. Blank lines and
//! lines starting with `#` are ignored. Unknown flags are reported as
//! warnings and otherwise ignored.

use std::collections::HashSet;
use std::path::Path;

use tracing::warn;

use crate::error::ConfigError;
use crate::host::{Address, HostSpec};

/// Default hosts file, relative to the working directory.
pub const DEFAULT_HOSTS_FILE: &str = "servers";

const CHECK_FAULTS_FLAG: &str = "check-err";

/// Parsed hosts file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostsFile {
    /// In declaration order.
    pub hosts: Vec<HostSpec>,
    /// Non-fatal problems, one message each.
    pub warnings: Vec<String>,
}

pub fn parse_hosts(text: &str) -> Result<HostsFile, ConfigError> {
    let mut hosts = Vec::new();
    let mut warnings = Vec::new();
    let mut seen = HashSet::new();

    for (number, raw) in text.lines().enumerate() {
        let line_number = number + 1;
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let mut tokens = line.split_whitespace();
        let (name, address) = match (tokens.next(), tokens.next()) {
            (Some(name), Some(address)) => (name, address),
            _ => return Err(ConfigError::MissingAddress { line: line_number }),
        };

        if !seen.insert(name.to_string()) {
            return Err(ConfigError::DuplicateName {
                name: name.to_string(),
                line: line_number,
            });
        }

        let mut check_faults = false;
        for flag in tokens {
            if flag.eq_ignore_ascii_case(CHECK_FAULTS_FLAG) {
                check_faults = true;
            } else {
                let message = format!("Unknown flag '{}' in line {}: {}", flag, line_number, line);
                warn!("{}", message);
                warnings.push(message);
            }
        }

        hosts.push(HostSpec::new(name, Address::parse(address)?, check_faults));
    }

    if hosts.is_empty() {
        return Err(ConfigError::NoHosts);
    }

    Ok(HostsFile { hosts, warnings })
}

pub fn load_hosts(path: &Path) -> Result<HostsFile, ConfigError> {
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.display().to_string(),
        source,
    })?;
    parse_hosts(&text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_hosts_with_comments_and_flags() {
        let text = "\
# lab machines
gpu-a alice@10.0.0.1 check-err

gpu-b 10.0.0.2:2222
";
        let parsed = parse_hosts(text).unwrap();
        assert_eq!(parsed.hosts.len(), 2);
        assert_eq!(parsed.hosts[0].name, "gpu-a");
        assert!(parsed.hosts[0].check_faults);
        assert_eq!(parsed.hosts[0].address.user.as_deref(), Some("alice"));
        assert!(!parsed.hosts[1].check_faults);
        assert_eq!(parsed.hosts[1].address.port, Some(2222));
        assert!(parsed.warnings.is_empty());
    }

    #[test]
    fn test_flag_is_case_insensitive() {
        let parsed = parse_hosts("gpu-a host CHECK-ERR").unwrap();
        assert!(parsed.hosts[0].check_faults);
    }

    #[test]
    fn test_unknown_flag_warns_but_loads() {
        let parsed = parse_hosts("gpu-a host verbose check-err").unwrap();
        assert!(parsed.hosts[0].check_faults);
        assert_eq!(parsed.warnings.len(), 1);
        assert!(parsed.warnings[0].contains("'verbose'"));
    }

    #[test]
    fn test_duplicate_name_is_error() {
        let err = parse_hosts("a h1\na h2\n").unwrap_err();
        assert!(matches!(err, ConfigError::DuplicateName { line: 2, .. }));
    }

    #[test]
    fn test_missing_address_is_error() {
        let err = parse_hosts("lonely\n").unwrap_err();
        assert!(matches!(err, ConfigError::MissingAddress { line: 1 }));
    }

    #[test]
    fn test_empty_file_is_error() {
        assert!(matches!(parse_hosts("# nothing\n\n"), Err(ConfigError::NoHosts)));
    }

    #[test]
    fn test_load_missing_file() {
        let err = load_hosts(Path::new("/nonexistent/gpuwatch/servers")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
