//! Log event enrichment.
//!
//! The [`Enricher`] is the thin shim between the snapshot builder and a
//! structured logging pipeline: per log event at or above a minimum
//! severity, it builds one [`ContextSnapshot`] and emits its fields as named
//! properties, never overwriting a property the caller already set.

use std::sync::{Arc, RwLock};

use serde_json::Value;
use tracing::Level;

use crate::config::{Config, FilterSettings};
use crate::error::Result;
use crate::exception::ErrorRecord;
use crate::filter::CompiledFilters;
use crate::request::RequestContext;
use crate::snapshot::ContextSnapshot;

/// A log event property sink.
pub trait PropertySink {
    /// Attach a named property to the event, skipping if a property of that
    /// name already exists (first writer wins).
    fn add_if_absent(&mut self, name: &str, value: Value);
}

/// The slice of a log event the enricher consumes.
pub trait LogEvent: PropertySink {
    /// The event's severity level.
    fn level(&self) -> Level;

    /// The error attached to the event, if any.
    fn error(&self) -> Option<&ErrorRecord>;
}

/// Attaches redacted request/exception context to log events.
///
/// The compiled filter state is the only shared resource; it is rebuilt
/// wholesale on configuration change and exchanged behind an `Arc`, so
/// concurrent enrichments see either the old generation or the new one in
/// its entirety. Everything else is allocated per event.
#[derive(Debug)]
pub struct Enricher {
    minimum_level: Level,
    filters: RwLock<Arc<CompiledFilters>>,
}

impl Enricher {
    /// Create an enricher with no filters and the default minimum level
    /// (`ERROR`).
    #[must_use]
    pub fn new() -> Self {
        Self {
            minimum_level: Level::ERROR,
            filters: RwLock::new(Arc::new(CompiledFilters::default())),
        }
    }

    /// Create an enricher from filter settings.
    ///
    /// # Errors
    ///
    /// Returns an error if any filter rule fails to compile; a broken filter
    /// configuration must not silently activate.
    pub fn with_settings(settings: &FilterSettings) -> Result<Self> {
        let enricher = Self::new();
        enricher.set_filter_settings(settings)?;
        Ok(enricher)
    }

    /// Create an enricher from a loaded configuration, taking both the
    /// minimum level and the filter rule lists from it.
    ///
    /// # Errors
    ///
    /// Returns an error if the configured minimum level is unrecognized or
    /// any filter rule fails to compile.
    pub fn from_config(config: &Config) -> Result<Self> {
        let level = config.enrichment.minimum_level()?;
        Ok(Self::with_settings(&config.filters)?.with_minimum_level(level))
    }

    /// Set the minimum severity at which events are enriched.
    #[must_use]
    pub fn with_minimum_level(mut self, level: Level) -> Self {
        self.minimum_level = level;
        self
    }

    /// The minimum severity at which events are enriched.
    #[must_use]
    pub fn minimum_level(&self) -> Level {
        self.minimum_level
    }

    /// Replace the filter configuration.
    ///
    /// The settings are recompiled in full and swapped in as one unit.
    ///
    /// # Errors
    ///
    /// Returns an error if any filter rule fails to compile; the previous
    /// configuration stays active in that case.
    pub fn set_filter_settings(&self, settings: &FilterSettings) -> Result<()> {
        let compiled = Arc::new(settings.compile()?);
        let mut guard = self.filters.write().expect("filter lock poisoned");
        *guard = compiled;
        Ok(())
    }

    /// Enrich one log event from the given request context.
    ///
    /// Events below the minimum level are left untouched and pay no snapshot
    /// cost. Property names already present on the event are never
    /// overwritten.
    pub fn enrich<E: LogEvent>(&self, event: &mut E, request: Option<&dyn RequestContext>) {
        // tracing orders levels by verbosity: ERROR is the least verbose and
        // compares smallest.
        if event.level() > self.minimum_level {
            return;
        }

        let filters = {
            let guard = self.filters.read().expect("filter lock poisoned");
            Arc::clone(&guard)
        };
        let has_error = event.error().is_some();
        let mut snapshot = ContextSnapshot::build(event.error(), request, &filters);

        if has_error {
            add_optional(event, "_ExceptionMessage", snapshot.exception_message.take());
            add_optional(event, "_ExceptionDetail", snapshot.exception_detail.take());
            add_optional(event, "_ExceptionSource", snapshot.exception_source.take());
            add_optional(event, "_ExceptionType", snapshot.exception_type.take());
        }

        let host = snapshot.host().to_string();
        event.add_if_absent("_Host", Value::String(host));
        let method = snapshot.http_method().to_string();
        event.add_if_absent("_HTTPMethod", Value::String(method));
        let ip = snapshot.ip_address().to_string();
        event.add_if_absent("_IPAddress", Value::String(ip));
        let url = snapshot.url().to_string();
        event.add_if_absent("_Url", Value::String(url));
        event.add_if_absent(
            "_StatusCode",
            snapshot.status_code.map_or(Value::Null, Value::from),
        );

        if let Some(custom_data) = &snapshot.custom_data {
            for (key, value) in custom_data {
                event.add_if_absent(&format!("cd: {key}"), Value::String(value.clone()));
            }
        }

        add_pairs(event, "sv: ", &snapshot.server_variables);
        add_pairs(event, "rh: ", &snapshot.request_headers);
        add_pairs(event, "qs: ", &snapshot.query_string);
        add_pairs(event, "cookie: ", &snapshot.cookies);
    }
}

impl Default for Enricher {
    fn default() -> Self {
        Self::new()
    }
}

fn add_optional<E: LogEvent>(event: &mut E, name: &str, value: Option<String>) {
    event.add_if_absent(name, value.map_or(Value::Null, Value::String));
}

fn add_pairs<E: LogEvent>(event: &mut E, prefix: &str, pairs: &[crate::collection::NameValuePair]) {
    for pair in pairs {
        event.add_if_absent(
            &format!("{prefix}{}", pair.name),
            pair.value.clone().map_or(Value::Null, Value::String),
        );
    }
}
