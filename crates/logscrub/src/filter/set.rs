//! Compiled redaction ruleset for one collection category.

use std::collections::HashMap;

use regex::{Regex, RegexBuilder};

use crate::config::FilterRule;
use crate::error::{Error, Result};

/// One configuration list of filter rules, compiled for fast lookup.
///
/// Holds an exact-name map (last literal rule for a name wins,
/// case-sensitive) and an ordered regex list (declaration order preserved,
/// first match wins). Read-only after compilation and safe for concurrent
/// reads.
#[derive(Debug, Default)]
pub struct FilterSet {
    exact: HashMap<String, String>,
    regexes: Vec<(Regex, String)>,
    suppress_all: bool,
}

impl FilterSet {
    /// Compile an ordered rule list.
    ///
    /// Regex rules with an empty pattern are dropped silently. Literal rules
    /// overwrite earlier literal rules for the same name; regex rules are
    /// never collapsed, even with identical pattern text.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidFilterPattern`] if a regex rule fails to
    /// compile. The whole compilation fails so misconfiguration is caught at
    /// startup, not mid-request.
    pub fn compile(rules: &[FilterRule]) -> Result<Self> {
        let mut exact = HashMap::new();
        let mut regexes = Vec::new();

        for rule in rules {
            if rule.name_is_regex {
                if rule.name.is_empty() {
                    continue;
                }
                let regex = RegexBuilder::new(&rule.name)
                    .case_insensitive(true)
                    .dot_matches_new_line(true)
                    .build()
                    .map_err(|source| Error::InvalidFilterPattern {
                        pattern: rule.name.clone(),
                        source,
                    })?;
                regexes.push((regex, rule.replace_with.clone()));
            } else {
                exact.insert(rule.name.clone(), rule.replace_with.clone());
            }
        }

        // A literal rule with an empty name is the sentinel for discarding
        // the entire collection.
        let suppress_all = exact.contains_key("");

        Ok(Self {
            exact,
            regexes,
            suppress_all,
        })
    }

    /// A set with no rules; every field passes through unchanged.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Whether the whole collection should be represented as empty.
    #[must_use]
    pub fn suppress_all(&self) -> bool {
        self.suppress_all
    }

    /// Whether this set carries no rules at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.exact.is_empty() && self.regexes.is_empty()
    }

    /// The replacement for a field name, if any rule matches it.
    ///
    /// An exact-name match short-circuits before the regex list is even
    /// consulted; regexes are tried in declaration order. The returned
    /// empty string means "discard the field".
    #[must_use]
    pub fn match_value(&self, name: &str) -> Option<&str> {
        if let Some(replacement) = self.exact.get(name) {
            return Some(replacement);
        }
        self.regexes
            .iter()
            .find(|(regex, _)| regex.is_match(name))
            .map(|(_, replacement)| replacement.as_str())
    }
}
