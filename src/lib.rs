//! # sshroute
//!
//! A SOCKS5 proxy that routes destinations through chained SSH tunnels.
//!
//! ## Crates
//!
//! - [`sshroute_core`] - Defaults and the bidirectional relay
//! - [`sshroute_config`] - Configuration loading and validation
//! - [`sshroute_rules`] - Destination patterns and the routing table
//! - [`sshroute_tunnel`] - Endpoint registry, chain connector and router
//! - [`sshroute_socks`] - SOCKS5 front end and CLI

pub use sshroute_config as config;
pub use sshroute_core as core;
pub use sshroute_rules as rules;
pub use sshroute_socks as socks;
pub use sshroute_tunnel as tunnel;
