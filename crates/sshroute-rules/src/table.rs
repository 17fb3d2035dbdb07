//! Ordered routing table.

use crate::error::RulesError;
use crate::pattern::Rule;

/// What to do with a pattern that does not compile.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PatternMode {
    /// Keep the rule; it never matches.
    #[default]
    Lenient,
    /// Reject the whole table.
    Strict,
}

/// Rules in priority order. The first matching rule wins.
#[derive(Debug, Clone, Default)]
pub struct RoutingTable {
    rules: Vec<Rule>,
}

impl RoutingTable {
    /// Compile `(pattern, endpoint)` pairs in order.
    pub fn compile<I, P, T>(filters: I, mode: PatternMode) -> Result<Self, RulesError>
    where
        I: IntoIterator<Item = (P, T)>,
        P: Into<String>,
        T: Into<String>,
    {
        let rules = filters
            .into_iter()
            .map(|(pattern, target)| match mode {
                PatternMode::Lenient => Ok(Rule::compile(pattern, target)),
                PatternMode::Strict => Rule::try_compile(pattern, target),
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { rules })
    }

    pub fn from_rules(rules: Vec<Rule>) -> Self {
        Self { rules }
    }

    /// Rules matching `host`, in priority order.
    ///
    /// Callers that cannot use a match (e.g. its endpoint is down) move on to
    /// the next item.
    pub fn matches<'a>(&'a self, host: &'a str) -> impl Iterator<Item = &'a Rule> + 'a {
        self.rules.iter().filter(move |rule| rule.is_match(host))
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}
