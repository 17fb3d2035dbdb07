//! Pattern normalization and compilation.

use regex::{Regex, RegexBuilder};
use tracing::error;

use crate::error::RulesError;

/// A destination rule: host pattern → endpoint name.
#[derive(Debug, Clone)]
pub struct Rule {
    source: String,
    target: String,
    /// `None` when the pattern failed to compile; such a rule never matches.
    matcher: Option<Regex>,
}

/// Expand the `.domain` / `prefix.` shorthand into regular expression text.
pub fn normalize_pattern(pattern: &str) -> String {
    let mut normalized = match pattern.strip_prefix('.') {
        Some(rest) => format!(".*{rest}"),
        None => pattern.to_string(),
    };
    if normalized.ends_with('.') {
        normalized.push('*');
    }
    normalized
}

fn build_matcher(pattern: &str) -> Result<Regex, regex::Error> {
    // Case-insensitive unlike a plain regex match, since DNS names ignore case.
    RegexBuilder::new(&normalize_pattern(pattern))
        .case_insensitive(true)
        .build()
}

impl Rule {
    /// Compile a rule, keeping it as a never-matching rule if the pattern is
    /// invalid. The failure is logged.
    pub fn compile(pattern: impl Into<String>, target: impl Into<String>) -> Self {
        let source = pattern.into();
        let target = target.into();
        let matcher = match build_matcher(&source) {
            Ok(re) => Some(re),
            Err(e) => {
                error!(
                    pattern = %source,
                    proxy = %target,
                    error = %e,
                    "invalid filter pattern, rule disabled"
                );
                None
            }
        };
        Self {
            source,
            target,
            matcher,
        }
    }

    /// Compile a rule, failing on an invalid pattern.
    pub fn try_compile(
        pattern: impl Into<String>,
        target: impl Into<String>,
    ) -> Result<Self, RulesError> {
        let source = pattern.into();
        let target = target.into();
        match build_matcher(&source) {
            Ok(re) => Ok(Self {
                source,
                target,
                matcher: Some(re),
            }),
            Err(e) => Err(RulesError::Pattern {
                pattern: source,
                target,
                source: e,
            }),
        }
    }

    /// Whether `host` matches this rule. Always false for disabled rules.
    pub fn is_match(&self, host: &str) -> bool {
        self.matcher.as_ref().is_some_and(|re| re.is_match(host))
    }

    /// True if the pattern failed to compile.
    pub fn is_disabled(&self) -> bool {
        self.matcher.is_none()
    }

    /// The pattern as written in the configuration.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// The endpoint name this rule routes to.
    pub fn target(&self) -> &str {
        &self.target
    }
}
