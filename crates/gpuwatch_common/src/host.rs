//! Host specifications and ssh address parsing.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// A configured remote machine. Immutable after startup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostSpec {
    /// Unique key, shown in the first column.
    pub name: String,
    pub address: Address,
    /// Also query `reset_status.reset_required`.
    pub check_faults: bool,
}

impl HostSpec {
    pub fn new(name: impl Into<String>, address: Address, check_faults: bool) -> Self {
        Self {
            name: name.into(),
            address,
            check_faults,
        }
    }
}

/// `[user@]host[:port]`, with `[v6]:port` accepted for IPv6 literals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    pub user: Option<String>,
    pub host: String,
    /// `None` means the ssh default.
    pub port: Option<u16>,
}

impl Address {
    pub fn parse(raw: &str) -> Result<Self, ConfigError> {
        let invalid = |reason: &str| ConfigError::InvalidAddress {
            address: raw.to_string(),
            reason: reason.to_string(),
        };

        let (user, rest) = match raw.rsplit_once('@') {
            Some((user, rest)) => {
                if user.is_empty() {
                    return Err(invalid("empty user name"));
                }
                (Some(user.to_string()), rest)
            }
            None => (None, raw),
        };

        let (host, port) = if let Some(bracketed) = rest.strip_prefix('[') {
            let (host, tail) = bracketed
                .split_once(']')
                .ok_or_else(|| invalid("unterminated '['"))?;
            let port = match tail {
                "" => None,
                _ => Some(
                    tail.strip_prefix(':')
                        .ok_or_else(|| invalid("expected ':' after ']'"))?,
                ),
            };
            (host, port)
        } else {
            match rest.split_once(':') {
                Some((host, port)) => (host, Some(port)),
                None => (rest, None),
            }
        };

        if host.is_empty() {
            return Err(invalid("empty host"));
        }

        let port = match port {
            Some(p) => Some(
                p.parse::<u16>()
                    .ok()
                    .filter(|p| *p != 0)
                    .ok_or_else(|| invalid("port must be 1-65535"))?,
            ),
            None => None,
        };

        Ok(Self {
            user,
            host: host.to_string(),
            port,
        })
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(user) = &self.user {
            write!(f, "{}@", user)?;
        }
        if self.host.contains(':') {
            write!(f, "[{}]", self.host)?;
        } else {
            write!(f, "{}", self.host)?;
        }
        if let Some(port) = self.port {
            write!(f, ":{}", port)?;
        }
        Ok(())
    }
}
