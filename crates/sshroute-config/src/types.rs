use std::collections::HashMap;

use serde::{Deserialize, Deserializer, Serialize};

use crate::defaults::*;

/// Root of the configuration file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Named SSH endpoints: name → endpoint definition.
    #[serde(default, alias = "Proxies")]
    pub proxies: HashMap<String, ProxyConfig>,

    /// Ordered destination filters. The first matching filter wins.
    #[serde(default, alias = "Filters")]
    pub filters: Vec<FilterConfig>,

    #[serde(default)]
    pub ssh: SshConfig,
    #[serde(default)]
    pub tcp: TcpConfig,
    #[serde(default)]
    pub routing: RoutingConfig,
    #[serde(default)]
    pub relay: RelayConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// One SSH endpoint.
///
/// At most one of `variable`, `key` and `password` is expected; when several
/// are set they are tried in that order and only the first is used. None of
/// them means the password is prompted for on the terminal.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProxyConfig {
    #[serde(default)]
    pub host: String,
    #[serde(default = "default_ssh_port", deserialize_with = "deserialize_port")]
    pub port: u16,
    #[serde(default)]
    pub user: String,
    /// Name of the endpoint whose connection this one is tunneled through.
    #[serde(default)]
    pub parent: Option<String>,
    /// Private key file; a leading `~` is expanded.
    #[serde(default)]
    pub key: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    /// Environment variable holding the password.
    #[serde(default)]
    pub variable: Option<String>,
}

impl ProxyConfig {
    /// The parent name, ignoring empty strings.
    pub fn parent_name(&self) -> Option<&str> {
        non_empty(&self.parent)
    }

    pub fn key_path(&self) -> Option<&str> {
        non_empty(&self.key)
    }

    pub fn password_literal(&self) -> Option<&str> {
        non_empty(&self.password)
    }

    pub fn variable_name(&self) -> Option<&str> {
        non_empty(&self.variable)
    }

    /// Number of credential fields that are set.
    pub fn credential_count(&self) -> usize {
        [self.variable_name(), self.key_path(), self.password_literal()]
            .iter()
            .filter(|v| v.is_some())
            .count()
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|s| !s.is_empty())
}

/// Maps a destination pattern to a named endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterConfig {
    /// Destination pattern. A leading `.` matches the domain and its
    /// subdomains, a trailing `.` matches any continuation.
    pub url: String,
    /// Endpoint name to route matching destinations through.
    pub proxy: String,
}

/// How SSH server host keys are checked.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HostKeyCheck {
    /// Accept any host key (trust on first use, nothing is persisted).
    #[default]
    AcceptAny,
    /// Require the key to be present in a known_hosts file.
    KnownHosts,
}

/// SSH client settings shared by all endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SshConfig {
    #[serde(default)]
    pub host_key_policy: HostKeyCheck,
    /// known_hosts file used by the `known_hosts` policy.
    #[serde(default = "default_known_hosts")]
    pub known_hosts: String,
    /// SSH keepalive interval in seconds (0 = disabled).
    #[serde(default = "default_ssh_keepalive_secs")]
    pub keepalive_secs: u64,
    /// Close a session after this many idle seconds (0 = never).
    #[serde(default = "default_ssh_inactivity_timeout_secs")]
    pub inactivity_timeout_secs: u64,
}

impl Default for SshConfig {
    fn default() -> Self {
        Self {
            host_key_policy: HostKeyCheck::default(),
            known_hosts: default_known_hosts(),
            keepalive_secs: default_ssh_keepalive_secs(),
            inactivity_timeout_secs: default_ssh_inactivity_timeout_secs(),
        }
    }
}

/// TCP options for raw dials (root endpoints and direct connections).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TcpConfig {
    /// Disable Nagle's algorithm (TCP_NODELAY).
    #[serde(default = "default_tcp_no_delay")]
    pub no_delay: bool,
    /// TCP Keep-Alive interval in seconds (0 = disabled).
    #[serde(default = "default_tcp_keepalive_secs")]
    pub keepalive_secs: u64,
}

impl Default for TcpConfig {
    fn default() -> Self {
        Self {
            no_delay: default_tcp_no_delay(),
            keepalive_secs: default_tcp_keepalive_secs(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RoutingConfig {
    /// Reject the configuration when a filter pattern fails to compile,
    /// instead of keeping the filter as a rule that never matches.
    #[serde(default)]
    pub strict_patterns: bool,
}

/// SOCKS session relay settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayConfig {
    /// Close a session after this many idle seconds (0 = never).
    #[serde(default = "default_relay_idle_timeout_secs")]
    pub idle_timeout_secs: u64,
    #[serde(default = "default_relay_buffer_size")]
    pub buffer_size: usize,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            idle_timeout_secs: default_relay_idle_timeout_secs(),
            buffer_size: default_relay_buffer_size(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    pub level: Option<String>,
    /// Log format: json, pretty, or compact. Default: pretty.
    pub format: Option<String>,
    /// Output target: stdout or stderr. Default: stderr.
    pub output: Option<String>,
    /// Per-module log level filters (e.g., {"russh": "warn"}).
    #[serde(default)]
    pub filters: HashMap<String, String>,
}

/// Ports may be written as `22` or `"22"`.
fn deserialize_port<'de, D>(deserializer: D) -> Result<u16, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawPort {
        Number(i64),
        Text(String),
    }

    let value = match RawPort::deserialize(deserializer)? {
        RawPort::Number(n) => n,
        RawPort::Text(s) => s
            .trim()
            .parse::<i64>()
            .map_err(|_| serde::de::Error::custom(format!("invalid port '{s}'")))?,
    };
    u16::try_from(value)
        .ok()
        .filter(|p| *p != 0)
        .ok_or_else(|| serde::de::Error::custom(format!("port {value} out of range 1..=65535")))
}
