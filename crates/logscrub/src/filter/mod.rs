//! Field filtering and redaction.
//!
//! The engine walks a name/value collection and applies a two-tier filter:
//! an exact-name lookup first, then regex rules in declaration order. A
//! matched field is either discarded (empty replacement) or has its whole
//! value replaced; values are never partially redacted. A literal rule with
//! an empty name suppresses the entire collection.
//!
//! # Example
//!
//! ```
//! use logscrub::config::FilterRule;
//! use logscrub::filter::{CollectionRedactor, FilterSet};
//!
//! let set = FilterSet::compile(&[
//!     FilterRule::discard("AUTH_PASSWORD"),
//!     FilterRule::regex("X_SECRET_.*", "***"),
//! ])
//! .unwrap();
//!
//! let redactor = CollectionRedactor::new(&set);
//! let filtered = redactor.apply(&[
//!     ("AUTH_PASSWORD".to_string(), "123".to_string()),
//!     ("AUTH_TYPE".to_string(), "Forms".to_string()),
//! ]);
//! assert_eq!(filtered.len(), 1);
//! assert_eq!(filtered[0].name, "AUTH_TYPE");
//! ```

mod redactor;
mod set;

pub use redactor::{fetch_or_sentinel, passthrough, CollectionRedactor, COLLECTION_ERROR_KEY};
pub use set::FilterSet;

use regex::RegexBuilder;

use crate::config::FilterSettings;
use crate::error::{Error, Result};

/// The compiled, immutable form of one [`FilterSettings`].
///
/// Rebuilt wholesale whenever the owning configuration is replaced and
/// shared behind an `Arc`; concurrent readers always see one complete
/// generation, never a partially rebuilt mix.
#[derive(Debug, Default)]
pub struct CompiledFilters {
    /// Filter set for server variables.
    pub server_vars: FilterSet,
    /// Filter set for form fields.
    pub form: FilterSet,
    /// Filter set for cookies.
    pub cookies: FilterSet,
    /// Filter set for request headers.
    pub headers: FilterSet,
    /// Include pattern for exception data keys, if configured.
    pub data_include: Option<regex::Regex>,
    /// Append the current call-stack trace to exception details.
    pub append_full_stack_trace: bool,
}

impl CompiledFilters {
    /// Compile a settings object into its matching structures.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidFilterPattern`] if any regex rule or the data
    /// include pattern fails to compile. Compilation fails as a whole so a
    /// misconfigured enricher is rejected at setup.
    pub fn from_settings(settings: &FilterSettings) -> Result<Self> {
        let data_include = match settings.data_include_pattern.as_deref() {
            Some(pattern) if !pattern.is_empty() => Some(
                RegexBuilder::new(pattern)
                    .case_insensitive(true)
                    .dot_matches_new_line(true)
                    .build()
                    .map_err(|source| Error::InvalidFilterPattern {
                        pattern: pattern.to_string(),
                        source,
                    })?,
            ),
            _ => None,
        };

        Ok(Self {
            server_vars: FilterSet::compile(&settings.server_var_filters)?,
            form: FilterSet::compile(&settings.form_filters)?,
            cookies: FilterSet::compile(&settings.cookie_filters)?,
            headers: FilterSet::compile(&settings.header_filters)?,
            data_include,
            append_full_stack_trace: settings.append_full_stack_trace,
        })
    }
}
