//! Redacted request/exception snapshots.
//!
//! A [`ContextSnapshot`] is built once per log event needing enrichment,
//! filled eagerly during construction (exception properties, then context
//! properties), and discarded after the event is dispatched. The only
//! post-construction mutation is the lazy derivation of a few scalar fields
//! from the already-filtered server variables.

use std::collections::BTreeMap;
use std::env;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::collection::{self, NameValuePair};
use crate::error::Result;
use crate::exception::{current_stack_trace, ErrorRecord};
use crate::filter::{fetch_or_sentinel, passthrough, CollectionRedactor, CompiledFilters};
use crate::request::RequestContext;

/// Frames of the snapshot machinery itself, dropped from appended traces.
const OWN_TRACE_FRAMES: usize = 2;

/// A scalar derived lazily from source data, with sticky explicit override.
///
/// `get` derives and caches on first read; `set` pins the value permanently,
/// before or after the first read.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
enum LazyField {
    #[default]
    Unset,
    Cached(String),
    Explicit(String),
}

impl LazyField {
    fn get_or_derive(&mut self, derive: impl FnOnce() -> String) -> &str {
        if matches!(self, Self::Unset) {
            *self = Self::Cached(derive());
        }
        match self {
            Self::Unset => unreachable!("derived above"),
            Self::Cached(value) | Self::Explicit(value) => value,
        }
    }

    fn set(&mut self, value: String) {
        *self = Self::Explicit(value);
    }
}

/// The redacted, serializable snapshot of one request/exception context.
///
/// Collection fields are flat, order-preserving pair lists; each was
/// filtered by its own rule list during construction (the query string is
/// never filtered by design).
#[derive(Debug, Default)]
pub struct ContextSnapshot {
    /// Type name of the logged error, if one was attached.
    pub exception_type: Option<String>,
    /// Message of the logged error.
    pub exception_message: Option<String>,
    /// Component the logged error originated in.
    pub exception_source: Option<String>,
    /// Full chain-aware rendering of the logged error.
    pub exception_detail: Option<String>,
    /// Name of the machine the snapshot was taken on.
    pub machine_name: String,
    /// Response (or web-error) status code.
    pub status_code: Option<u16>,
    /// Exception data entries matching the configured include pattern.
    /// Absent (not merely empty) when no include pattern is configured.
    pub custom_data: Option<BTreeMap<String, String>>,
    /// When the snapshot was taken.
    pub captured_at: DateTime<Utc>,
    /// Filtered server variables.
    pub server_variables: Vec<NameValuePair>,
    /// Query string entries, unfiltered.
    pub query_string: Vec<NameValuePair>,
    /// Filtered form fields.
    pub form: Vec<NameValuePair>,
    /// Filtered cookies.
    pub cookies: Vec<NameValuePair>,
    /// Filtered request headers, minus any `Cookie` header.
    pub request_headers: Vec<NameValuePair>,

    host: LazyField,
    url: LazyField,
    http_method: LazyField,
    ip_address: LazyField,
}

impl ContextSnapshot {
    /// Build a snapshot from a request context only, with no filtering.
    #[must_use]
    pub fn from_request(request: &dyn RequestContext) -> Self {
        Self::build(None, Some(request), &CompiledFilters::default())
    }

    /// Build a snapshot from an error only, with no filtering.
    #[must_use]
    pub fn from_error(error: &ErrorRecord) -> Self {
        Self::build(Some(error), None, &CompiledFilters::default())
    }

    /// Build a snapshot from whatever is available.
    ///
    /// The exception phase runs first when an error is supplied; the context
    /// phase runs when a request is supplied. Per-collection read failures
    /// degrade to a sentinel entry in that collection; nothing else is
    /// swallowed.
    #[must_use]
    pub fn build(
        error: Option<&ErrorRecord>,
        request: Option<&dyn RequestContext>,
        filters: &CompiledFilters,
    ) -> Self {
        let mut snapshot = Self {
            machine_name: machine_name(),
            captured_at: Utc::now(),
            ..Self::default()
        };

        if let Some(error) = error {
            snapshot.set_exception_properties(error, filters);
        }
        if let Some(request) = request {
            snapshot.set_context_properties(request, filters);
        }
        snapshot
    }

    fn set_exception_properties(&mut self, error: &ErrorRecord, filters: &CompiledFilters) {
        // A built-in wrapper usually adds nothing of its own; report the
        // innermost cause instead. The detail always renders the full chain
        // from the originally supplied record.
        let reported = if error.is_builtin() {
            error.base()
        } else {
            error
        };

        self.exception_type = Some(reported.type_name().to_string());
        self.exception_message = Some(reported.message().to_string());
        self.exception_source = reported.source().map(String::from);
        self.status_code = error.status_code();

        let mut detail = error.detail();
        if filters.append_full_stack_trace {
            detail.push_str("\n\nFull Trace:\n\n");
            detail.push_str(&current_stack_trace(OWN_TRACE_FRAMES));
        }
        self.exception_detail = Some(detail);

        for record in error.chain() {
            self.add_custom_data(record, filters);
        }
    }

    fn add_custom_data(&mut self, record: &ErrorRecord, filters: &CompiledFilters) {
        let Some(include) = filters.data_include.as_ref() else {
            return;
        };

        for (key, value) in record.data() {
            if include.is_match(key) {
                // The map is created only once a key actually matches, so a
                // chain with no matching data leaves it absent, not empty.
                // Deeper records in the chain overwrite on key collision.
                self.custom_data
                    .get_or_insert_with(BTreeMap::new)
                    .insert(key.clone(), value.clone());
            }
        }
    }

    fn set_context_properties(&mut self, request: &dyn RequestContext, filters: &CompiledFilters) {
        if let Some(status_code) = request.status_code() {
            self.status_code = Some(status_code);
        }
        if let Some(method) = request.http_method() {
            self.http_method.set(method);
        }

        // When a whole collection is suppressed, skip the fetch entirely.
        let server_variables = if filters.server_vars.suppress_all() {
            Vec::new()
        } else {
            fetch_or_sentinel("server_variables", request.server_variables())
        };
        let query_string = fetch_or_sentinel("query_string", request.query_string());
        let form = if filters.form.suppress_all() {
            Vec::new()
        } else {
            fetch_or_sentinel("form", request.form())
        };

        self.server_variables =
            CollectionRedactor::new(&filters.server_vars).apply(&server_variables);
        self.query_string = passthrough(&query_string);
        self.form = CollectionRedactor::new(&filters.form).apply(&form);
        self.cookies = CollectionRedactor::new(&filters.cookies).apply(&request.cookies());
        self.request_headers =
            CollectionRedactor::new(&filters.headers).apply_to_headers(&request.headers());
    }

    /// The request's host, derived from the `HTTP_HOST` server variable on
    /// first read.
    pub fn host(&mut self) -> &str {
        let server_variables = &self.server_variables;
        self.host
            .get_or_derive(|| derive_server_variable(server_variables, "HTTP_HOST"))
    }

    /// Pin the host to an explicit value.
    pub fn set_host(&mut self, host: impl Into<String>) {
        self.host.set(host.into());
    }

    /// The request's URL, derived from the `URL` server variable on first
    /// read.
    pub fn url(&mut self) -> &str {
        let server_variables = &self.server_variables;
        self.url
            .get_or_derive(|| derive_server_variable(server_variables, "URL"))
    }

    /// Pin the URL to an explicit value.
    pub fn set_url(&mut self, url: impl Into<String>) {
        self.url.set(url.into());
    }

    /// The request's HTTP method. Captured from the request context during
    /// construction when available, otherwise derived from the
    /// `REQUEST_METHOD` server variable on first read.
    pub fn http_method(&mut self) -> &str {
        let server_variables = &self.server_variables;
        self.http_method
            .get_or_derive(|| derive_server_variable(server_variables, "REQUEST_METHOD"))
    }

    /// Pin the HTTP method to an explicit value.
    pub fn set_http_method(&mut self, method: impl Into<String>) {
        self.http_method.set(method.into());
    }

    /// The client IP address, derived from `REMOTE_ADDR` and
    /// `HTTP_X_FORWARDED_FOR` on first read.
    pub fn ip_address(&mut self) -> &str {
        let server_variables = &self.server_variables;
        self.ip_address
            .get_or_derive(|| collection::remote_ip(server_variables))
    }

    /// Pin the client IP address to an explicit value.
    pub fn set_ip_address(&mut self, ip_address: impl Into<String>) {
        self.ip_address.set(ip_address.into());
    }

    /// Serialize the snapshot's flat shape (scalars plus pair lists).
    ///
    /// # Errors
    ///
    /// Returns an error if JSON serialization fails.
    pub fn to_json(&mut self) -> Result<String> {
        let view = FlatView {
            exception_type: self.exception_type.clone(),
            exception_source: self.exception_source.clone(),
            exception_message: self.exception_message.clone(),
            exception_detail: self.exception_detail.clone(),
            machine_name: self.machine_name.clone(),
            status_code: self.status_code,
            custom_data: self.custom_data.clone(),
            captured_at: self.captured_at,
            host: self.host().to_string(),
            url: self.url().to_string(),
            http_method: self.http_method().to_string(),
            ip_address: self.ip_address().to_string(),
            server_variables: &self.server_variables,
            query_string: &self.query_string,
            form: &self.form,
            cookies: &self.cookies,
            request_headers: &self.request_headers,
        };
        Ok(serde_json::to_string(&view)?)
    }

    /// Build the consolidated summary view: scalars plus dictionary views of
    /// every collection and the query-string convenience value.
    #[must_use]
    pub fn summary(&mut self) -> Summary {
        Summary {
            exception_type: self.exception_type.clone(),
            exception_source: self.exception_source.clone(),
            exception_message: self.exception_message.clone(),
            exception_detail: self.exception_detail.clone(),
            custom_data: self.custom_data.clone(),
            machine_name: self.machine_name.clone(),
            status_code: self.status_code,
            captured_at: self.captured_at,
            host: self.host().to_string(),
            url: self.url().to_string(),
            http_method: self.http_method().to_string(),
            ip_address: self.ip_address().to_string(),
            query_string: collection::lookup(&self.server_variables, "QUERY_STRING")
                .map(String::from),
            server_variables: collection::to_dictionary(&self.server_variables),
            cookie_variables: collection::to_dictionary(&self.cookies),
            request_headers: collection::to_dictionary(&self.request_headers),
            query_string_variables: collection::to_dictionary(&self.query_string),
            form_variables: collection::to_dictionary(&self.form),
        }
    }

    /// Serialize the consolidated summary view.
    ///
    /// # Errors
    ///
    /// Returns an error if JSON serialization fails.
    pub fn to_summary_json(&mut self) -> Result<String> {
        Ok(serde_json::to_string(&self.summary())?)
    }
}

/// Name of the machine this process runs on, from the environment.
fn machine_name() -> String {
    env::var("HOSTNAME")
        .or_else(|_| env::var("COMPUTERNAME"))
        .unwrap_or_default()
}

fn derive_server_variable(server_variables: &[NameValuePair], name: &str) -> String {
    collection::lookup(server_variables, name)
        .unwrap_or_default()
        .to_string()
}

#[derive(Serialize)]
struct FlatView<'a> {
    exception_type: Option<String>,
    exception_source: Option<String>,
    exception_message: Option<String>,
    exception_detail: Option<String>,
    machine_name: String,
    status_code: Option<u16>,
    custom_data: Option<BTreeMap<String, String>>,
    captured_at: DateTime<Utc>,
    host: String,
    url: String,
    http_method: String,
    ip_address: String,
    server_variables: &'a [NameValuePair],
    query_string: &'a [NameValuePair],
    form: &'a [NameValuePair],
    cookies: &'a [NameValuePair],
    request_headers: &'a [NameValuePair],
}

/// Consolidated summary of one snapshot, suitable for JSON emission.
#[derive(Debug, Clone, Serialize)]
pub struct Summary {
    /// Type name of the logged error.
    pub exception_type: Option<String>,
    /// Component the logged error originated in.
    pub exception_source: Option<String>,
    /// Message of the logged error.
    pub exception_message: Option<String>,
    /// Full chain-aware rendering of the logged error.
    pub exception_detail: Option<String>,
    /// Included exception data entries.
    pub custom_data: Option<BTreeMap<String, String>>,
    /// Name of the machine the snapshot was taken on.
    pub machine_name: String,
    /// Response (or web-error) status code.
    pub status_code: Option<u16>,
    /// When the snapshot was taken.
    pub captured_at: DateTime<Utc>,
    /// The request's host.
    pub host: String,
    /// The request's URL.
    pub url: String,
    /// The request's HTTP method.
    pub http_method: String,
    /// The client IP address.
    pub ip_address: String,
    /// The raw query string, as reported by the `QUERY_STRING` server
    /// variable.
    pub query_string: Option<String>,
    /// Dictionary view of the filtered server variables.
    pub server_variables: BTreeMap<String, String>,
    /// Dictionary view of the filtered cookies.
    pub cookie_variables: BTreeMap<String, String>,
    /// Dictionary view of the filtered request headers.
    pub request_headers: BTreeMap<String, String>,
    /// Dictionary view of the query string entries.
    pub query_string_variables: BTreeMap<String, String>,
    /// Dictionary view of the filtered form fields.
    pub form_variables: BTreeMap<String, String>,
}
