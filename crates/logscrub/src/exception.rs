//! Chain-aware error abstraction.
//!
//! [`ErrorRecord`] is the exception shape the snapshot builder consumes:
//! type name, message, source component, an optional HTTP status code, an
//! always-present string-keyed data bag, and an optional inner cause. The
//! data bag replaces the nullable auxiliary dictionary some platforms hang
//! off their exception type; an empty map simply contributes nothing.

use std::backtrace::Backtrace;
use std::collections::BTreeMap;
use std::fmt;

/// A captured error with its cause chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorRecord {
    type_name: String,
    message: String,
    source: Option<String>,
    status_code: Option<u16>,
    builtin: bool,
    data: BTreeMap<String, String>,
    cause: Option<Box<ErrorRecord>>,
}

impl ErrorRecord {
    /// Create a new record with a type name and message.
    #[must_use]
    pub fn new(type_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            message: message.into(),
            source: None,
            status_code: None,
            builtin: false,
            data: BTreeMap::new(),
            cause: None,
        }
    }

    /// Capture a [`std::error::Error`] and its source chain.
    #[must_use]
    pub fn from_error<E: std::error::Error>(err: &E) -> Self {
        let mut record = Self::new(std::any::type_name::<E>(), err.to_string());
        record.cause = err.source().map(|src| Box::new(Self::from_dyn(src)));
        record
    }

    fn from_dyn(err: &(dyn std::error::Error + 'static)) -> Self {
        let mut record = Self::new("", err.to_string());
        record.cause = err.source().map(|src| Box::new(Self::from_dyn(src)));
        record
    }

    /// Set the component the error originated in.
    #[must_use]
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Attach an HTTP status code (for web-level errors).
    #[must_use]
    pub fn with_status_code(mut self, status_code: u16) -> Self {
        self.status_code = Some(status_code);
        self
    }

    /// Mark this record as a runtime built-in wrapper.
    ///
    /// Built-in wrappers usually add no information of their own, so the
    /// snapshot takes type, message, and source from the innermost cause
    /// instead. Non-built-in errors are reported as supplied.
    #[must_use]
    pub fn builtin(mut self, builtin: bool) -> Self {
        self.builtin = builtin;
        self
    }

    /// Add one key/value entry to the data bag.
    #[must_use]
    pub fn with_data_entry(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.data.insert(key.into(), value.into());
        self
    }

    /// Attach an inner cause.
    #[must_use]
    pub fn with_cause(mut self, cause: ErrorRecord) -> Self {
        self.cause = Some(Box::new(cause));
        self
    }

    /// The record's type name.
    #[must_use]
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// The record's message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// The component the error originated in, if known.
    #[must_use]
    pub fn source(&self) -> Option<&str> {
        self.source.as_deref()
    }

    /// HTTP status code carried by this record, if any.
    #[must_use]
    pub fn status_code(&self) -> Option<u16> {
        self.status_code
    }

    /// Whether this record is a runtime built-in wrapper.
    #[must_use]
    pub fn is_builtin(&self) -> bool {
        self.builtin
    }

    /// The auxiliary data attached to this record (possibly empty).
    #[must_use]
    pub fn data(&self) -> &BTreeMap<String, String> {
        &self.data
    }

    /// The direct inner cause, if any.
    #[must_use]
    pub fn cause(&self) -> Option<&ErrorRecord> {
        self.cause.as_deref()
    }

    /// The innermost record of the cause chain.
    #[must_use]
    pub fn base(&self) -> &ErrorRecord {
        let mut current = self;
        while let Some(cause) = current.cause.as_deref() {
            current = cause;
        }
        current
    }

    /// Iterate the chain from this record down to the innermost cause.
    pub fn chain(&self) -> impl Iterator<Item = &ErrorRecord> {
        Chain {
            next: Some(self),
        }
    }

    /// Format the full chain, outermost first.
    #[must_use]
    pub fn detail(&self) -> String {
        let mut out = String::new();
        for (i, record) in self.chain().enumerate() {
            if i > 0 {
                out.push_str("\ncaused by: ");
            }
            if record.type_name.is_empty() {
                out.push_str(&record.message);
            } else {
                out.push_str(&record.type_name);
                out.push_str(": ");
                out.push_str(&record.message);
            }
        }
        out
    }
}

impl fmt::Display for ErrorRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.message.is_empty() {
            write!(f, "{}", self.type_name)
        } else {
            write!(f, "{}", self.message)
        }
    }
}

struct Chain<'a> {
    next: Option<&'a ErrorRecord>,
}

impl<'a> Iterator for Chain<'a> {
    type Item = &'a ErrorRecord;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next?;
        self.next = current.cause.as_deref();
        Some(current)
    }
}

/// Capture the current call-stack trace, skipping the innermost frames that
/// belong to the capture machinery itself.
#[must_use]
pub(crate) fn current_stack_trace(skip_frames: usize) -> String {
    let raw = Backtrace::force_capture().to_string();
    skip_trace_frames(&raw, skip_frames)
}

/// Drop the first `skip` frames of a rendered backtrace. Frames start with
/// lines like `  12: some::symbol`; their `at file:line` continuations are
/// dropped along with them.
fn skip_trace_frames(trace: &str, skip: usize) -> String {
    let mut seen = 0usize;
    let mut kept = Vec::new();
    for line in trace.lines() {
        if is_frame_header(line) {
            seen += 1;
        }
        if seen > skip {
            kept.push(line);
        }
    }
    kept.join("\n")
}

fn is_frame_header(line: &str) -> bool {
    let trimmed = line.trim_start();
    let digits = trimmed.chars().take_while(char::is_ascii_digit).count();
    digits > 0 && trimmed[digits..].starts_with(':')
}
