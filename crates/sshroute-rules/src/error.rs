//! Error types for rule compilation.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum RulesError {
    #[error("invalid pattern '{pattern}' for proxy '{target}': {source}")]
    Pattern {
        pattern: String,
        target: String,
        #[source]
        source: regex::Error,
    },
}
