//! Flat name/value collection types.
//!
//! Query strings and headers may carry repeated names, so filtered
//! collections are represented as order-preserving, duplicate-permitting
//! pair lists rather than maps.

use std::collections::BTreeMap;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Reported when no client address can be derived from server variables.
pub const UNKNOWN_IP: &str = "0.0.0.0";

/// Trailing IPv4 address, as it appears at the end of a forwarded-for entry.
static IPV4_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b([0-9]{1,3}\.){3}[0-9]{1,3}$").expect("static pattern compiles"));

/// One entry of a filtered name/value collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NameValuePair {
    /// The name for this variable.
    pub name: String,
    /// The value for this variable.
    pub value: Option<String>,
}

impl NameValuePair {
    /// Create a new pair.
    #[must_use]
    pub fn new(name: impl Into<String>, value: Option<&str>) -> Self {
        Self {
            name: name.into(),
            value: value.map(String::from),
        }
    }
}

/// First value recorded under `name`, if any.
#[must_use]
pub fn lookup<'a>(pairs: &'a [NameValuePair], name: &str) -> Option<&'a str> {
    pairs
        .iter()
        .find(|p| p.name == name)
        .and_then(|p| p.value.as_deref())
}

/// Collapse a pair list into a name→value map for JSON emission.
///
/// Later entries win on duplicate names; entries with empty names are
/// skipped.
#[must_use]
pub fn to_dictionary(pairs: &[NameValuePair]) -> BTreeMap<String, String> {
    let mut result = BTreeMap::new();
    for pair in pairs {
        if !pair.name.is_empty() {
            result.insert(pair.name.clone(), pair.value.clone().unwrap_or_default());
        }
    }
    result
}

/// Derive the client IP address from server variables.
///
/// `REMOTE_ADDR` could be a proxy; when `HTTP_X_FORWARDED_FOR` carries a
/// public IPv4 address at its tail, that address is preferred. Private
/// network ranges never override the direct address.
#[must_use]
pub fn remote_ip(server_variables: &[NameValuePair]) -> String {
    let direct = lookup(server_variables, "REMOTE_ADDR").unwrap_or("");
    let forwarded = lookup(server_variables, "HTTP_X_FORWARDED_FOR").unwrap_or("");

    let mut ip = direct;
    if !forwarded.is_empty() {
        if let Some(m) = IPV4_RE.find(forwarded) {
            if !is_private_ip(m.as_str()) {
                ip = m.as_str();
            }
        }
    }

    if ip.is_empty() {
        UNKNOWN_IP.to_string()
    } else {
        ip.to_string()
    }
}

/// <http://en.wikipedia.org/wiki/Private_network>
fn is_private_ip(s: &str) -> bool {
    s.starts_with("192.168.") || s.starts_with("10.") || s.starts_with("127.0.0.")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pairs(entries: &[(&str, &str)]) -> Vec<NameValuePair> {
        entries
            .iter()
            .map(|(n, v)| NameValuePair::new(*n, Some(v)))
            .collect()
    }

    #[test]
    fn test_lookup_first_match() {
        let list = pairs(&[("a", "1"), ("b", "2"), ("a", "3")]);
        assert_eq!(lookup(&list, "a"), Some("1"));
        assert_eq!(lookup(&list, "b"), Some("2"));
        assert_eq!(lookup(&list, "c"), None);
    }

    #[test]
    fn test_to_dictionary_last_wins_and_skips_empty_names() {
        let mut list = pairs(&[("a", "1"), ("a", "2"), ("", "ignored")]);
        list.push(NameValuePair::new("b", None));

        let dict = to_dictionary(&list);
        assert_eq!(dict.get("a").map(String::as_str), Some("2"));
        assert_eq!(dict.get("b").map(String::as_str), Some(""));
        assert!(!dict.contains_key(""));
    }

    #[test]
    fn test_remote_ip_direct() {
        let sv = pairs(&[("REMOTE_ADDR", "203.0.113.9")]);
        assert_eq!(remote_ip(&sv), "203.0.113.9");
    }

    #[test]
    fn test_remote_ip_forwarded_public_wins() {
        let sv = pairs(&[
            ("REMOTE_ADDR", "10.0.0.1"),
            ("HTTP_X_FORWARDED_FOR", "198.51.100.7"),
        ]);
        assert_eq!(remote_ip(&sv), "198.51.100.7");
    }

    #[test]
    fn test_remote_ip_forwarded_private_ignored() {
        let sv = pairs(&[
            ("REMOTE_ADDR", "203.0.113.9"),
            ("HTTP_X_FORWARDED_FOR", "192.168.1.44"),
        ]);
        assert_eq!(remote_ip(&sv), "203.0.113.9");
    }

    #[test]
    fn test_remote_ip_forwarded_chain_takes_tail() {
        let sv = pairs(&[
            ("REMOTE_ADDR", "10.0.0.1"),
            ("HTTP_X_FORWARDED_FOR", "70.41.3.18, 150.172.238.178"),
        ]);
        assert_eq!(remote_ip(&sv), "150.172.238.178");
    }

    #[test]
    fn test_remote_ip_forwarded_malformed_ignored() {
        // A tail that only looks like an address when torn out of a longer
        // token must not override the direct address.
        let sv = pairs(&[
            ("REMOTE_ADDR", "203.0.113.9"),
            ("HTTP_X_FORWARDED_FOR", "x12.34.56.78"),
        ]);
        assert_eq!(remote_ip(&sv), "203.0.113.9");
    }

    #[test]
    fn test_remote_ip_unknown() {
        assert_eq!(remote_ip(&[]), UNKNOWN_IP);
    }

    #[test]
    fn test_pair_serialization_keeps_null_value() {
        let pair = NameValuePair::new("a", None);
        let json = serde_json::to_string(&pair).unwrap();
        assert_eq!(json, r#"{"name":"a","value":null}"#);

        let parsed: NameValuePair = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, pair);
    }
}
