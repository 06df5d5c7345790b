//! Configuration validation rules.
//!
//! This module provides validation logic for `AppConfig` values
//! after they have been loaded from environment, files, or defaults.

use crate::config::AppConfig;
use thiserror::Error;
use url::Url;

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("invalid configuration: {field} - {reason}")]
    Invalid { field: String, reason: String },
}

impl AppConfig {
    /// Validate configuration values after loading.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if:
    /// - `origin` is not an http(s) URL with a host
    /// - `timeout_ms` is less than 100ms or exceeds 5 minutes
    /// - `cache_version` is set but empty or contains whitespace
    /// - `user_agent` is empty
    pub fn validate(&self) -> Result<(), ConfigError> {
        let origin = Url::parse(&self.origin)
            .map_err(|e| ConfigError::Invalid { field: "origin".into(), reason: e.to_string() })?;
        if !matches!(origin.scheme(), "http" | "https") {
            return Err(ConfigError::Invalid { field: "origin".into(), reason: "scheme must be http or https".into() });
        }
        if origin.host_str().is_none() {
            return Err(ConfigError::Invalid { field: "origin".into(), reason: "must include a host".into() });
        }
        if origin.path() != "/" || origin.query().is_some() {
            tracing::warn!(origin = %self.origin, "origin has a path or query; only scheme, host and port are used");
        }

        if self.timeout_ms < 100 {
            return Err(ConfigError::Invalid { field: "timeout_ms".into(), reason: "must be at least 100ms".into() });
        }
        if self.timeout_ms > 300_000 {
            return Err(ConfigError::Invalid {
                field: "timeout_ms".into(),
                reason: "must not exceed 5 minutes (300000ms)".into(),
            });
        }

        if let Some(version) = &self.cache_version
            && (version.is_empty() || version.chars().any(char::is_whitespace))
        {
            return Err(ConfigError::Invalid {
                field: "cache_version".into(),
                reason: "must be non-empty and contain no whitespace".into(),
            });
        }

        if self.user_agent.is_empty() {
            return Err(ConfigError::Invalid { field: "user_agent".into(), reason: "must not be empty".into() });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field_of(result: Result<(), ConfigError>) -> Option<String> {
        match result {
            Err(ConfigError::Invalid { field, .. }) => Some(field),
            _ => None,
        }
    }

    #[test]
    fn test_validate_default_config() {
        assert!(AppConfig::default().validate().is_ok());
    }

    #[test]
    fn test_validate_origin_unparseable() {
        let config = AppConfig { origin: "not a url".into(), ..Default::default() };
        assert_eq!(field_of(config.validate()).as_deref(), Some("origin"));
    }

    #[test]
    fn test_validate_origin_scheme() {
        let config = AppConfig { origin: "blob:https://clinic.example/abc".into(), ..Default::default() };
        assert_eq!(field_of(config.validate()).as_deref(), Some("origin"));
    }

    #[test]
    fn test_validate_timeout_bounds() {
        let low = AppConfig { timeout_ms: 50, ..Default::default() };
        assert_eq!(field_of(low.validate()).as_deref(), Some("timeout_ms"));

        let high = AppConfig { timeout_ms: 301_000, ..Default::default() };
        assert_eq!(field_of(high.validate()).as_deref(), Some("timeout_ms"));

        let edge = AppConfig { timeout_ms: 100, ..Default::default() };
        assert!(edge.validate().is_ok());
    }

    #[test]
    fn test_validate_cache_version() {
        let empty = AppConfig { cache_version: Some(String::new()), ..Default::default() };
        assert_eq!(field_of(empty.validate()).as_deref(), Some("cache_version"));

        let spaced = AppConfig { cache_version: Some("v 5".into()), ..Default::default() };
        assert_eq!(field_of(spaced.validate()).as_deref(), Some("cache_version"));

        let ok = AppConfig { cache_version: Some("v5".into()), ..Default::default() };
        assert!(ok.validate().is_ok());
    }

    #[test]
    fn test_validate_empty_user_agent() {
        let config = AppConfig { user_agent: String::new(), ..Default::default() };
        assert_eq!(field_of(config.validate()).as_deref(), Some("user_agent"));
    }
}
