//! I/O utilities shared by the front end and tunnel crates.

mod relay;

pub use relay::{RelayStats, relay_bidirectional};
