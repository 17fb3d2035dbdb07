//! Configuration loading and validation.
//!
//! Endpoints live under `[proxies.<name>]` and rules under `[[filters]]`,
//! with optional `[ssh]`, `[tcp]`, `[routing]`, `[relay]` and
//! `[logging]` sections.

pub mod defaults;
mod loader;
mod paths;
mod types;
mod validate;

pub use loader::{ConfigError, load_config, parse_config};
pub use paths::expand_home;
pub use types::*;
pub use validate::validate_config;
