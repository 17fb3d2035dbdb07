//! Ordered destination rules for sshroute.
//!
//! Each rule pairs a host pattern with the name of the SSH endpoint that
//! destinations matching it are routed through. Patterns use a small
//! shorthand on top of regular expressions:
//!
//! - `.example.com` → `.*example.com` (the domain and its subdomains)
//! - `example.` → `example.*` (the prefix followed by anything)
//!
//! Matching is unanchored, so a pattern matches when it occurs anywhere in
//! the host name.
//!
//! # Example
//!
//! ```
//! use sshroute_rules::{PatternMode, RoutingTable};
//!
//! let table = RoutingTable::compile(
//!     [(".corp.", "internal"), ("github.com", "bastion")],
//!     PatternMode::Lenient,
//! )
//! .unwrap();
//!
//! let targets: Vec<_> = table.matches("db.corp.internal").map(|r| r.target()).collect();
//! assert_eq!(targets, ["internal"]);
//! ```

pub mod error;
pub mod pattern;
pub mod table;

pub use error::RulesError;
pub use pattern::{Rule, normalize_pattern};
pub use table::{PatternMode, RoutingTable};
