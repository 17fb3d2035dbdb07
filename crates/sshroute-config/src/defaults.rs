//! Serde default helpers backed by `sshroute_core::defaults`.

use sshroute_core::defaults;

pub fn default_ssh_port() -> u16 {
    defaults::DEFAULT_SSH_PORT
}

pub fn default_known_hosts() -> String {
    defaults::DEFAULT_KNOWN_HOSTS.to_string()
}

pub fn default_ssh_keepalive_secs() -> u64 {
    defaults::DEFAULT_SSH_KEEPALIVE_SECS
}

pub fn default_ssh_inactivity_timeout_secs() -> u64 {
    defaults::DEFAULT_SSH_INACTIVITY_TIMEOUT_SECS
}

pub fn default_tcp_no_delay() -> bool {
    defaults::DEFAULT_TCP_NO_DELAY
}

pub fn default_tcp_keepalive_secs() -> u64 {
    defaults::DEFAULT_TCP_KEEPALIVE_SECS
}

pub fn default_relay_idle_timeout_secs() -> u64 {
    defaults::DEFAULT_RELAY_IDLE_TIMEOUT_SECS
}

pub fn default_relay_buffer_size() -> usize {
    defaults::DEFAULT_RELAY_BUFFER_SIZE
}
