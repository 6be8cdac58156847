//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, addresses parse)
//! - Check the upstream endpoint and credential before any connection is made
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ProxyConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use axum::http::HeaderValue;
use thiserror::Error;

use crate::config::schema::ProxyConfig;

/// Path reserved for the liveness route.
pub const HEALTH_PATH: &str = "/health";

/// A single semantic problem with a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("upstream.api_key is not set (use OPENAI_API_KEY or --api-key)")]
    MissingCredential,

    #[error("upstream.api_key contains characters not allowed in an HTTP header")]
    InvalidCredential,

    #[error("upstream.endpoint '{endpoint}' is not a valid URL: {reason}")]
    InvalidEndpoint { endpoint: String, reason: String },

    #[error("upstream.endpoint must use ws or wss, got '{0}'")]
    UnsupportedScheme(String),

    #[error("upstream.{field} is not a valid header value")]
    InvalidHeaderValue { field: &'static str },

    #[error("listener.bind_address '{0}' is not a valid socket address")]
    InvalidBindAddress(String),

    #[error("listener.path '{0}' must start with '/' and must not be '{HEALTH_PATH}'")]
    InvalidPath(String),

    #[error("timeouts.{0} must be greater than zero")]
    ZeroTimeout(&'static str),

    #[error("observability.metrics_address '{0}' is not a valid socket address")]
    InvalidMetricsAddress(String),
}

/// Validate a configuration, collecting every problem found.
pub fn validate_config(config: &ProxyConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    let upstream = &config.upstream;
    if upstream.api_key.trim().is_empty() {
        errors.push(ValidationError::MissingCredential);
    } else if HeaderValue::from_str(&format!("Bearer {}", upstream.api_key)).is_err() {
        errors.push(ValidationError::InvalidCredential);
    }

    match url::Url::parse(&upstream.endpoint) {
        Ok(url) if matches!(url.scheme(), "ws" | "wss") => {}
        Ok(url) => errors.push(ValidationError::UnsupportedScheme(url.scheme().to_string())),
        Err(e) => errors.push(ValidationError::InvalidEndpoint {
            endpoint: upstream.endpoint.clone(),
            reason: e.to_string(),
        }),
    }

    if HeaderValue::from_str(&upstream.user_agent).is_err() {
        errors.push(ValidationError::InvalidHeaderValue { field: "user_agent" });
    }
    if HeaderValue::from_str(&upstream.beta).is_err() {
        errors.push(ValidationError::InvalidHeaderValue { field: "beta" });
    }

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidBindAddress(
            config.listener.bind_address.clone(),
        ));
    }
    let path = &config.listener.path;
    if !is_literal_path(path) || path == HEALTH_PATH {
        errors.push(ValidationError::InvalidPath(path.clone()));
    }

    if config.timeouts.connect_secs == 0 {
        errors.push(ValidationError::ZeroTimeout("connect_secs"));
    }
    if config.timeouts.close_grace_secs == 0 {
        errors.push(ValidationError::ZeroTimeout("close_grace_secs"));
    }

    let observability = &config.observability;
    if observability.metrics_enabled
        && observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::InvalidMetricsAddress(
            observability.metrics_address.clone(),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// A route path the router matches literally: no captures or wildcards.
fn is_literal_path(path: &str) -> bool {
    path.starts_with('/')
        && !path.contains(['{', '}'])
        && path
            .split('/')
            .all(|segment| !segment.starts_with(':') && !segment.starts_with('*'))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> ProxyConfig {
        let mut config = ProxyConfig::default();
        config.upstream.api_key = "sk-test".to_string();
        config
    }

    #[test]
    fn defaults_with_credential_are_valid() {
        assert_eq!(validate_config(&valid()), Ok(()));
    }

    #[test]
    fn missing_credential_is_rejected() {
        let config = ProxyConfig::default();
        assert_eq!(
            validate_config(&config),
            Err(vec![ValidationError::MissingCredential])
        );
    }

    #[test]
    fn credential_with_newline_is_rejected() {
        let mut config = valid();
        config.upstream.api_key = "sk-\nsmuggled: header".to_string();
        assert_eq!(
            validate_config(&config),
            Err(vec![ValidationError::InvalidCredential])
        );
    }

    #[test]
    fn endpoint_must_be_websocket() {
        let mut config = valid();
        config.upstream.endpoint = "https://api.openai.com/v1/realtime".to_string();
        assert_eq!(
            validate_config(&config),
            Err(vec![ValidationError::UnsupportedScheme("https".to_string())])
        );

        config.upstream.endpoint = "not a url".to_string();
        let errors = validate_config(&config).unwrap_err();
        assert!(matches!(errors[0], ValidationError::InvalidEndpoint { .. }));
    }

    #[test]
    fn collects_every_error() {
        let mut config = ProxyConfig::default();
        config.listener.bind_address = "nowhere".to_string();
        config.listener.path = HEALTH_PATH.to_string();
        config.timeouts.connect_secs = 0;
        config.observability.metrics_enabled = true;
        config.observability.metrics_address = "bad".to_string();

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(
            errors,
            vec![
                ValidationError::MissingCredential,
                ValidationError::InvalidBindAddress("nowhere".to_string()),
                ValidationError::InvalidPath(HEALTH_PATH.to_string()),
                ValidationError::ZeroTimeout("connect_secs"),
                ValidationError::InvalidMetricsAddress("bad".to_string()),
            ]
        );
    }

    #[test]
    fn metrics_address_ignored_when_disabled() {
        let mut config = valid();
        config.observability.metrics_address = "bad".to_string();
        assert_eq!(validate_config(&config), Ok(()));
    }

    #[test]
    fn path_must_be_literal() {
        for path in ["/:id", "/v1/*rest", "/{", "/ws/{session}", "ws"] {
            let mut config = valid();
            config.listener.path = path.to_string();
            assert_eq!(
                validate_config(&config),
                Err(vec![ValidationError::InvalidPath(path.to_string())]),
                "{path}"
            );
        }

        let mut config = valid();
        config.listener.path = "/v1/realtime".to_string();
        assert_eq!(validate_config(&config), Ok(()));
    }
}
