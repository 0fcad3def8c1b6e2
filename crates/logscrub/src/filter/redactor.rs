//! Applies one [`FilterSet`] to one name/value collection.

use tracing::{debug, warn};

use super::FilterSet;
use crate::collection::NameValuePair;
use crate::request::CollectionResult;

/// Sentinel key substituted when a host refuses to expose a collection.
pub const COLLECTION_ERROR_KEY: &str = "CollectionFetchError";

/// Applies a compiled filter set to raw collections, producing filtered
/// copies.
///
/// The same per-field policy covers every collection shape: exact match
/// first, then regexes in declaration order; no match copies the field,
/// an empty replacement discards it, anything else replaces the whole
/// value. Filtering is a pure function of (collection, set) and is
/// idempotent.
#[derive(Debug)]
pub struct CollectionRedactor<'a> {
    set: &'a FilterSet,
}

impl<'a> CollectionRedactor<'a> {
    /// Create a redactor over a compiled filter set.
    #[must_use]
    pub fn new(set: &'a FilterSet) -> Self {
        Self { set }
    }

    /// Produce the filtered copy of a raw collection.
    ///
    /// Output preserves source order except for discarded fields; duplicate
    /// names stay separate entries. When the set suppresses the whole
    /// collection the result is empty regardless of contents.
    #[must_use]
    pub fn apply(&self, source: &[(String, String)]) -> Vec<NameValuePair> {
        if self.set.suppress_all() {
            return Vec::new();
        }

        source
            .iter()
            .filter_map(|(name, value)| self.apply_one(name, value))
            .collect()
    }

    /// Like [`apply`](Self::apply), but unconditionally drops any `Cookie`
    /// header first (cookies are represented by their own collection).
    #[must_use]
    pub fn apply_to_headers(&self, source: &[(String, String)]) -> Vec<NameValuePair> {
        if self.set.suppress_all() {
            return Vec::new();
        }

        source
            .iter()
            .filter(|(name, _)| !name.eq_ignore_ascii_case("cookie"))
            .filter_map(|(name, value)| self.apply_one(name, value))
            .collect()
    }

    fn apply_one(&self, name: &str, value: &str) -> Option<NameValuePair> {
        match self.set.match_value(name) {
            None => Some(NameValuePair::new(name, Some(value))),
            Some("") => {
                debug!(field = %name, "field discarded by filter");
                None
            }
            Some(replacement) => Some(NameValuePair::new(name, Some(replacement))),
        }
    }
}

/// Copy a raw collection without filtering (query strings bypass redaction
/// by design).
#[must_use]
pub fn passthrough(source: &[(String, String)]) -> Vec<NameValuePair> {
    source
        .iter()
        .map(|(name, value)| NameValuePair::new(name, Some(value)))
        .collect()
}

/// Unwrap a collection fetch, degrading a host refusal to a one-entry
/// sentinel collection carrying the error message.
///
/// This is a recovered, non-fatal condition: the failure is traced and the
/// rest of the snapshot is unaffected.
#[must_use]
pub fn fetch_or_sentinel(label: &'static str, result: CollectionResult) -> Vec<(String, String)> {
    match result {
        Ok(pairs) => pairs,
        Err(err) => {
            warn!(collection = label, error = %err, "error reading request collection");
            vec![(COLLECTION_ERROR_KEY.to_string(), err.message)]
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FilterRule;
    use crate::error::CollectionAccessError;

    fn raw(entries: &[(&str, &str)]) -> Vec<(String, String)> {
        entries
            .iter()
            .map(|(n, v)| ((*n).to_string(), (*v).to_string()))
            .collect()
    }

    fn names(pairs: &[NameValuePair]) -> Vec<&str> {
        pairs.iter().map(|p| p.name.as_str()).collect()
    }

    fn value_of<'a>(pairs: &'a [NameValuePair], name: &str) -> Option<&'a str> {
        crate::collection::lookup(pairs, name)
    }

    #[test]
    fn test_exact_discard_removes_only_that_field() {
        let set = FilterSet::compile(&[FilterRule::discard("AUTH_PASSWORD")]).unwrap();
        let source = raw(&[("AUTH_PASSWORD", "123"), ("AUTH_TYPE", "Forms")]);

        let filtered = CollectionRedactor::new(&set).apply(&source);
        assert_eq!(names(&filtered), vec!["AUTH_TYPE"]);
        assert_eq!(value_of(&filtered, "AUTH_TYPE"), Some("Forms"));
    }

    #[test]
    fn test_exact_replace_overwrites_only_that_field() {
        let set = FilterSet::compile(&[FilterRule::exact("AUTH_PASSWORD", "***")]).unwrap();
        let source = raw(&[("AUTH_PASSWORD", "123"), ("AUTH_TYPE", "Forms")]);

        let filtered = CollectionRedactor::new(&set).apply(&source);
        assert_eq!(filtered.len(), 2);
        assert_eq!(value_of(&filtered, "AUTH_PASSWORD"), Some("***"));
        assert_eq!(value_of(&filtered, "AUTH_TYPE"), Some("Forms"));
    }

    #[test]
    fn test_regex_and_exact_combined_sample() {
        // regex discards COOKIE_10/COOKIE_11, exact discards COOKIE_2,
        // exact replaces COOKIE_3; COOKIE_4 passes through.
        let set = FilterSet::compile(&[
            FilterRule::regex("COOKIE_1.*", ""),
            FilterRule::discard("COOKIE_2"),
            FilterRule::exact("COOKIE_3", "***"),
        ])
        .unwrap();
        let source = raw(&[
            ("COOKIE_10", "ck1"),
            ("COOKIE_11", "ck2"),
            ("COOKIE_2", "ck3"),
            ("COOKIE_3", "ck4"),
            ("COOKIE_4", "ck5"),
        ]);

        let filtered = CollectionRedactor::new(&set).apply(&source);
        assert_eq!(filtered.len(), 2);
        assert_eq!(value_of(&filtered, "COOKIE_3"), Some("***"));
        assert_eq!(value_of(&filtered, "COOKIE_4"), Some("ck5"));
    }

    #[test]
    fn test_suppress_all_empties_collection() {
        let set = FilterSet::compile(&[FilterRule::suppress_all()]).unwrap();
        let source = raw(&[("anything", "at all"), ("more", "data")]);

        assert!(CollectionRedactor::new(&set).apply(&source).is_empty());
        assert!(CollectionRedactor::new(&set)
            .apply_to_headers(&source)
            .is_empty());
    }

    #[test]
    fn test_cookie_header_always_skipped() {
        let set = FilterSet::empty();
        let source = raw(&[
            ("Accept", "*/*"),
            ("Cookie", "session=abc"),
            ("COOKIE", "other=def"),
            ("cookie", "third=ghi"),
        ]);

        let filtered = CollectionRedactor::new(&set).apply_to_headers(&source);
        assert_eq!(names(&filtered), vec!["Accept"]);
    }

    #[test]
    fn test_order_and_duplicates_preserved() {
        let set = FilterSet::compile(&[FilterRule::discard("b")]).unwrap();
        let source = raw(&[("c", "1"), ("a", "2"), ("b", "x"), ("a", "3")]);

        let filtered = CollectionRedactor::new(&set).apply(&source);
        assert_eq!(names(&filtered), vec!["c", "a", "a"]);
    }

    #[test]
    fn test_filtering_is_idempotent() {
        let set = FilterSet::compile(&[
            FilterRule::regex("COOKIE_1.*", ""),
            FilterRule::exact("COOKIE_3", "***"),
        ])
        .unwrap();
        let source = raw(&[("COOKIE_10", "ck1"), ("COOKIE_3", "ck4"), ("COOKIE_4", "ck5")]);

        let redactor = CollectionRedactor::new(&set);
        let once = redactor.apply(&source);
        let again_source: Vec<(String, String)> = once
            .iter()
            .map(|p| (p.name.clone(), p.value.clone().unwrap_or_default()))
            .collect();
        let twice = redactor.apply(&again_source);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_passthrough_copies_everything() {
        let source = raw(&[("q", "1"), ("q", "2"), ("password", "visible")]);
        let copied = passthrough(&source);
        assert_eq!(names(&copied), vec!["q", "q", "password"]);
        assert_eq!(copied[2].value.as_deref(), Some("visible"));
    }

    #[test]
    fn test_fetch_or_sentinel_ok_passes_through() {
        let pairs = fetch_or_sentinel("form", Ok(raw(&[("user", "ali")])));
        assert_eq!(pairs, raw(&[("user", "ali")]));
    }

    #[test]
    fn test_fetch_or_sentinel_substitutes_error_entry() {
        let err = CollectionAccessError::new("a potentially dangerous value was detected");
        let pairs = fetch_or_sentinel("form", Err(err));

        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0].0, COLLECTION_ERROR_KEY);
        assert!(pairs[0].1.contains("dangerous value"));
    }
}
