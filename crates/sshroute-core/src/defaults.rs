//! Default configuration values.
//!
//! Centralized default constants for use across all crates.

// ============================================================================
// Process Defaults
// ============================================================================

/// Default configuration file path.
pub const DEFAULT_CONFIG_FILE: &str = "proxy_config.toml";
/// Default SOCKS5 bind host.
pub const DEFAULT_BIND_HOST: &str = "127.0.0.1";
/// Default SOCKS5 bind port.
pub const DEFAULT_BIND_PORT: u16 = 8000;

// ============================================================================
// SSH Defaults
// ============================================================================

/// Default SSH port when an endpoint omits one.
pub const DEFAULT_SSH_PORT: u16 = 22;
/// Default SSH keepalive interval in seconds (0 = disabled).
pub const DEFAULT_SSH_KEEPALIVE_SECS: u64 = 0;
/// Default SSH inactivity timeout in seconds (0 = disabled).
pub const DEFAULT_SSH_INACTIVITY_TIMEOUT_SECS: u64 = 0;
/// Default known_hosts file, used by the `known_hosts` host key policy.
pub const DEFAULT_KNOWN_HOSTS: &str = "~/.ssh/known_hosts";
/// Originator address reported when opening `direct-tcpip` channels.
pub const DEFAULT_ORIGINATOR_ADDR: &str = "127.0.0.1";

// ============================================================================
// TCP Socket Defaults
// ============================================================================

/// Default TCP_NODELAY (disable Nagle's algorithm for lower latency).
pub const DEFAULT_TCP_NO_DELAY: bool = true;
/// Default TCP Keep-Alive interval in seconds (0 = disabled).
pub const DEFAULT_TCP_KEEPALIVE_SECS: u64 = 300;

// ============================================================================
// Relay Defaults
// ============================================================================

/// Default relay idle timeout in seconds (0 = disabled).
pub const DEFAULT_RELAY_IDLE_TIMEOUT_SECS: u64 = 0;
/// Default relay buffer size per direction (16 KiB).
pub const DEFAULT_RELAY_BUFFER_SIZE: usize = 16384;
/// Smallest accepted relay buffer size.
pub const MIN_RELAY_BUFFER_SIZE: usize = 1024;
/// Largest accepted relay buffer size.
pub const MAX_RELAY_BUFFER_SIZE: usize = 1024 * 1024;
