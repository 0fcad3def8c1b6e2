//! `logscrub` - HTTP request context capture and redaction for log enrichment
//!
//! This library extracts and redacts sensitive fields from an HTTP
//! request/response context and an associated error, producing a structured,
//! serializable snapshot for attachment to a log event. Server variables,
//! form fields, cookies, and request headers each carry their own ordered
//! filter rule list; a rule either discards a matched field or replaces its
//! whole value.

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

pub mod collection;
pub mod config;
pub mod enrich;
pub mod error;
pub mod exception;
pub mod filter;
pub mod logging;
pub mod request;
pub mod snapshot;

pub use collection::NameValuePair;
pub use config::{Config, FilterRule, FilterSettings};
pub use enrich::{Enricher, LogEvent, PropertySink};
pub use error::{CollectionAccessError, Error, Result};
pub use exception::ErrorRecord;
pub use filter::{CollectionRedactor, CompiledFilters, FilterSet};
pub use logging::{init_logging, Verbosity};
pub use request::{CollectionResult, RecordedRequest, RequestContext};
pub use snapshot::{ContextSnapshot, Summary};
