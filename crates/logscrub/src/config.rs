//! Configuration management for logscrub.
//!
//! This module provides configuration loading and validation using figment,
//! supporting TOML config files, environment variables, and defaults. The
//! filter rule lists declared here are compiled into a
//! [`CompiledFilters`](crate::filter::CompiledFilters) object before any
//! request is processed, so a malformed rule fails at startup rather than
//! mid-request.

use std::path::PathBuf;
use std::str::FromStr;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use tracing::Level;

use crate::error::{Error, Result};
use crate::filter::CompiledFilters;

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "config.toml";

/// Default config directory name.
const CONFIG_DIR_NAME: &str = "logscrub";

/// One redaction rule for one collection category.
///
/// The rule either names a field literally or carries a regex over field
/// names. An empty `replace_with` discards the matched field entirely; any
/// other string replaces the field's value wholesale.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterRule {
    /// The field name to match, or a regex over field names when
    /// `name_is_regex` is set.
    pub name: String,
    /// The value to log instead of the real value. Empty string means the
    /// field is removed from the output entirely.
    pub replace_with: String,
    /// Interpret `name` as a regex (case-insensitive, dot matches newline).
    pub name_is_regex: bool,
}

impl FilterRule {
    /// Rule matching a field name literally, replacing its value.
    #[must_use]
    pub fn exact(name: impl Into<String>, replace_with: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            replace_with: replace_with.into(),
            name_is_regex: false,
        }
    }

    /// Rule matching field names by regex, replacing matched values.
    #[must_use]
    pub fn regex(pattern: impl Into<String>, replace_with: impl Into<String>) -> Self {
        Self {
            name: pattern.into(),
            replace_with: replace_with.into(),
            name_is_regex: true,
        }
    }

    /// Rule that removes the named field from the output entirely.
    #[must_use]
    pub fn discard(name: impl Into<String>) -> Self {
        Self::exact(name, "")
    }

    /// Sentinel rule that discards the entire collection.
    #[must_use]
    pub fn suppress_all() -> Self {
        Self::exact("", "")
    }
}

/// Redaction rules and exception-data settings for one enricher.
///
/// Each collection category carries its own independently ordered rule list.
/// Within a list, the last literal rule for a given name wins; regex rules
/// are tried in declaration order after literal rules.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterSettings {
    /// Rules applied to server variables.
    pub server_var_filters: Vec<FilterRule>,
    /// Rules applied to submitted form fields.
    pub form_filters: Vec<FilterRule>,
    /// Rules applied to request cookies.
    pub cookie_filters: Vec<FilterRule>,
    /// Rules applied to request headers.
    pub header_filters: Vec<FilterRule>,
    /// Regex of exception data keys to include in the snapshot's custom
    /// data. For example, `"Redis.*"` includes all keys starting with
    /// `Redis`. When unset, no custom data is collected at all.
    pub data_include_pattern: Option<String>,
    /// Append the current call-stack trace to the exception detail.
    pub append_full_stack_trace: bool,
}

impl FilterSettings {
    /// Compile these settings into their immutable matching structures.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidFilterPattern`] if any regex rule or the data
    /// include pattern fails to compile.
    pub fn compile(&self) -> Result<CompiledFilters> {
        CompiledFilters::from_settings(self)
    }
}

/// Enrichment behavior configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnrichmentConfig {
    /// Minimum log level at which a snapshot is built, as a level name
    /// (`error`, `warn`, `info`, `debug`, `trace`). Events below this level
    /// are not enriched and pay no snapshot cost.
    pub minimum_level: String,
}

impl Default for EnrichmentConfig {
    fn default() -> Self {
        Self {
            minimum_level: "error".to_string(),
        }
    }
}

impl EnrichmentConfig {
    /// Parse the configured minimum level.
    ///
    /// # Errors
    ///
    /// Returns a validation error if the level name is not recognized.
    pub fn minimum_level(&self) -> Result<Level> {
        Level::from_str(&self.minimum_level).map_err(|_| {
            Error::config_validation(format!(
                "unrecognized minimum_level '{}'",
                self.minimum_level
            ))
        })
    }
}

/// Application configuration.
///
/// Configuration is loaded from (in order of precedence, highest first):
/// 1. Environment variables (prefixed with `LOGSCRUB_`)
/// 2. TOML config file at `~/.config/logscrub/config.toml`
/// 3. Default values
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Enrichment configuration.
    pub enrichment: EnrichmentConfig,
    /// Filter configuration.
    pub filters: FilterSettings,
}

impl Config {
    /// Load configuration from all sources.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading, parsing, or validation
    /// fails.
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load configuration with an optional custom config path.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading, parsing, or validation
    /// fails.
    pub fn load_from(config_path: Option<PathBuf>) -> Result<Self> {
        let config_file = config_path.unwrap_or_else(Self::default_config_path);

        let figment = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(&config_file).nested())
            .merge(Env::prefixed("LOGSCRUB_").split("__"));

        let config: Config = figment.extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Get the default configuration file path.
    #[must_use]
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from(".config"))
            .join(CONFIG_DIR_NAME)
            .join(CONFIG_FILE_NAME)
    }

    /// Validate the configuration.
    ///
    /// Compiles every filter rule list and the data include pattern so a
    /// malformed regex is rejected here instead of mid-request.
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration values are invalid.
    pub fn validate(&self) -> Result<()> {
        self.enrichment.minimum_level()?;
        self.filters.compile()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();

        assert_eq!(config.enrichment.minimum_level, "error");
        assert!(config.filters.server_var_filters.is_empty());
        assert!(config.filters.data_include_pattern.is_none());
        assert!(!config.filters.append_full_stack_trace);
    }

    #[test]
    fn test_validate_valid_config() {
        let config = Config::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_invalid_regex_rule() {
        let mut config = Config::default();
        config
            .filters
            .form_filters
            .push(FilterRule::regex("[unclosed", ""));

        let result = config.validate();
        assert!(result.is_err());
        assert!(result.unwrap_err().is_pattern_error());
    }

    #[test]
    fn test_validate_invalid_data_include_pattern() {
        let mut config = Config::default();
        config.filters.data_include_pattern = Some("(broken".to_string());

        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_unknown_minimum_level() {
        let mut config = Config::default();
        config.enrichment.minimum_level = "loud".to_string();

        let result = config.validate();
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("loud"));
    }

    #[test]
    fn test_minimum_level_parses_known_names() {
        for (name, level) in [
            ("error", Level::ERROR),
            ("warn", Level::WARN),
            ("info", Level::INFO),
            ("debug", Level::DEBUG),
            ("trace", Level::TRACE),
        ] {
            let enrichment = EnrichmentConfig {
                minimum_level: name.to_string(),
            };
            assert_eq!(enrichment.minimum_level().unwrap(), level);
        }
    }

    #[test]
    fn test_filter_rule_constructors() {
        let exact = FilterRule::exact("AUTH_PASSWORD", "***");
        assert!(!exact.name_is_regex);
        assert_eq!(exact.replace_with, "***");

        let regex = FilterRule::regex("COOKIE_1.*", "");
        assert!(regex.name_is_regex);

        let discard = FilterRule::discard("AUTH_PASSWORD");
        assert_eq!(discard.replace_with, "");
        assert!(!discard.name_is_regex);

        let suppress = FilterRule::suppress_all();
        assert_eq!(suppress.name, "");
        assert!(!suppress.name_is_regex);
    }

    #[test]
    fn test_filter_rule_deserialization_defaults() {
        let rule: FilterRule = serde_json::from_str(r#"{"name": "AUTH_PASSWORD"}"#).unwrap();
        assert_eq!(rule.name, "AUTH_PASSWORD");
        assert_eq!(rule.replace_with, "");
        assert!(!rule.name_is_regex);
    }

    #[test]
    fn test_filter_settings_serialization() {
        let settings = FilterSettings {
            header_filters: vec![FilterRule::discard("Authorization")],
            data_include_pattern: Some("Redis.*".to_string()),
            ..Default::default()
        };

        let json = serde_json::to_string(&settings).unwrap();
        let parsed: FilterSettings = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, settings);
    }

    #[test]
    fn test_load_nonexistent_config() {
        // Loading from a nonexistent path should work (uses defaults)
        let result = Config::load_from(Some(PathBuf::from("/nonexistent/config.toml")));
        assert!(result.is_ok());
        assert_eq!(result.unwrap(), Config::default());
    }

    #[test]
    fn test_default_config_path() {
        let path = Config::default_config_path();
        assert!(path.to_string_lossy().contains("logscrub"));
        assert!(path.to_string_lossy().contains("config.toml"));
    }
}
