//! Request/response accessor abstraction.
//!
//! The snapshot builder does not talk to any particular HTTP server. Hosts
//! implement [`RequestContext`] over their live request object; tests and
//! simple integrations can use [`RecordedRequest`].

use crate::error::CollectionAccessError;

/// A raw multi-valued collection as read from the host, or the host's
/// refusal to expose it.
pub type CollectionResult = Result<Vec<(String, String)>, CollectionAccessError>;

/// Read access to one in-flight HTTP request/response pair.
///
/// Server variables, query string, and form fields may be rejected by the
/// host's request validation (values containing disallowed characters); the
/// snapshot builder recovers from that per collection. Headers and cookies
/// are ordered pair lists and always readable.
pub trait RequestContext {
    /// The request's HTTP method, if known.
    fn http_method(&self) -> Option<String>;

    /// The response status code, if a response exists yet.
    fn status_code(&self) -> Option<u16>;

    /// Server variables for this request.
    ///
    /// # Errors
    ///
    /// Returns [`CollectionAccessError`] when the host refuses to expose the
    /// raw collection.
    fn server_variables(&self) -> CollectionResult;

    /// Query string entries, in request order, duplicates permitted.
    ///
    /// # Errors
    ///
    /// Returns [`CollectionAccessError`] when the host refuses to expose the
    /// raw collection.
    fn query_string(&self) -> CollectionResult;

    /// Submitted form fields.
    ///
    /// # Errors
    ///
    /// Returns [`CollectionAccessError`] when the host refuses to expose the
    /// raw collection.
    fn form(&self) -> CollectionResult;

    /// Request headers, in request order.
    fn headers(&self) -> Vec<(String, String)>;

    /// Request cookies as an ordered (name, value) list.
    fn cookies(&self) -> Vec<(String, String)>;
}

/// An in-memory [`RequestContext`].
///
/// Useful for hosts that have already buffered their request data, and for
/// tests.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordedRequest {
    /// HTTP method.
    pub http_method: Option<String>,
    /// Response status code.
    pub status_code: Option<u16>,
    /// Server variables.
    pub server_variables: Vec<(String, String)>,
    /// Query string entries.
    pub query_string: Vec<(String, String)>,
    /// Form fields.
    pub form: Vec<(String, String)>,
    /// Request headers.
    pub headers: Vec<(String, String)>,
    /// Request cookies.
    pub cookies: Vec<(String, String)>,
}

impl RecordedRequest {
    /// Create an empty request record.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl RequestContext for RecordedRequest {
    fn http_method(&self) -> Option<String> {
        self.http_method.clone()
    }

    fn status_code(&self) -> Option<u16> {
        self.status_code
    }

    fn server_variables(&self) -> CollectionResult {
        Ok(self.server_variables.clone())
    }

    fn query_string(&self) -> CollectionResult {
        Ok(self.query_string.clone())
    }

    fn form(&self) -> CollectionResult {
        Ok(self.form.clone())
    }

    fn headers(&self) -> Vec<(String, String)> {
        self.headers.clone()
    }

    fn cookies(&self) -> Vec<(String, String)> {
        self.cookies.clone()
    }
}
