//! Core constants and I/O helpers shared across sshroute crates.
//!
//! This crate provides:
//! - Default configuration values
//! - The bidirectional relay used by the SOCKS5 front end

pub mod defaults;
pub mod io;

pub use defaults::*;

/// Project name.
pub const PROJECT_NAME: &str = "sshroute";
/// Project version (from Cargo.toml).
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
