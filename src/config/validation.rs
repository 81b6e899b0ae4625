//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, limits > 0)
//! - Check that addresses, URLs and origins parse
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GatewayConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use axum::http::HeaderValue;
use thiserror::Error;
use url::Url;

use crate::config::schema::{CorsMode, GatewayConfig};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("listener.bind_address '{0}' is not a socket address")]
    BindAddress(String),

    #[error("observability.metrics_address '{0}' is not a socket address")]
    MetricsAddress(String),

    #[error("{field} must be greater than zero")]
    Zero { field: &'static str },

    #[error("timeouts.request_secs ({request}) must exceed timeouts.upstream_secs ({upstream})")]
    DeadlineOrder { request: u64, upstream: u64 },

    #[error("auth.upstream '{0}' must be an absolute http:// URL")]
    UpstreamUrl(String),

    #[error("cors.allowed_origins entry '{0}' is not a valid header value")]
    Origin(String),

    #[error("rate_limit.path_prefixes entry '{0}' must start with '/'")]
    PathPrefix(String),

    #[error("security.cross_origin_resource_policy '{0}' must be same-origin, same-site or cross-origin")]
    ResourcePolicy(String),
}

pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::BindAddress(config.listener.bind_address.clone()));
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::MetricsAddress(
            config.observability.metrics_address.clone(),
        ));
    }

    let positive = [
        ("timeouts.request_secs", config.timeouts.request_secs),
        ("timeouts.upstream_secs", config.timeouts.upstream_secs),
        ("body.limit_bytes", config.body.limit_bytes as u64),
        ("database.max_connections", u64::from(config.database.max_connections)),
        ("database.connect_timeout_secs", config.database.connect_timeout_secs),
    ];
    for (field, value) in positive {
        if value == 0 {
            errors.push(ValidationError::Zero { field });
        }
    }

    // Otherwise the overall deadline answers 408 before the auth service can 504.
    let (request, upstream) = (config.timeouts.request_secs, config.timeouts.upstream_secs);
    if request > 0 && upstream > 0 && request <= upstream {
        errors.push(ValidationError::DeadlineOrder { request, upstream });
    }

    if config.rate_limit.enabled {
        if config.rate_limit.window_secs == 0 {
            errors.push(ValidationError::Zero { field: "rate_limit.window_secs" });
        }
        if config.rate_limit.max_requests == 0 {
            errors.push(ValidationError::Zero { field: "rate_limit.max_requests" });
        }
        if config.rate_limit.sweep_interval_secs == 0 {
            errors.push(ValidationError::Zero { field: "rate_limit.sweep_interval_secs" });
        }
        for prefix in &config.rate_limit.path_prefixes {
            if !prefix.starts_with('/') {
                errors.push(ValidationError::PathPrefix(prefix.clone()));
            }
        }
    }

    if let Some(upstream) = &config.auth.upstream {
        let ok = Url::parse(upstream)
            .map(|u| u.scheme() == "http" && u.host().is_some())
            .unwrap_or(false);
        if !ok {
            errors.push(ValidationError::UpstreamUrl(upstream.clone()));
        }
    }

    if config.cors.mode == CorsMode::AllowList {
        for origin in &config.cors.allowed_origins {
            if HeaderValue::from_str(origin).is_err() {
                errors.push(ValidationError::Origin(origin.clone()));
            }
        }
    }

    let policy = config.security.cross_origin_resource_policy.as_str();
    if !matches!(policy, "same-origin" | "same-site" | "cross-origin") {
        errors.push(ValidationError::ResourcePolicy(policy.to_string()));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert_eq!(validate_config(&GatewayConfig::default()), Ok(()));
    }

    #[test]
    fn collects_every_error() {
        let mut config = GatewayConfig::default();
        config.listener.bind_address = "nowhere".into();
        config.rate_limit.max_requests = 0;
        config.auth.upstream = Some("ftp://auth.internal".into());
        config.body.limit_bytes = 0;

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 4);
        assert!(errors.contains(&ValidationError::BindAddress("nowhere".into())));
        assert!(errors.contains(&ValidationError::Zero { field: "rate_limit.max_requests" }));
        assert!(errors.contains(&ValidationError::Zero { field: "body.limit_bytes" }));
        assert!(errors.contains(&ValidationError::UpstreamUrl("ftp://auth.internal".into())));
    }

    #[test]
    fn request_deadline_must_outlast_upstream() {
        let mut config = GatewayConfig::default();
        config.timeouts.request_secs = 10;
        config.timeouts.upstream_secs = 10;
        assert_eq!(
            validate_config(&config).unwrap_err(),
            vec![ValidationError::DeadlineOrder { request: 10, upstream: 10 }]
        );

        config.timeouts.request_secs = 11;
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn disabled_limiter_is_not_checked() {
        let mut config = GatewayConfig::default();
        config.rate_limit.enabled = false;
        config.rate_limit.window_secs = 0;
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn origins_with_control_characters_are_rejected() {
        let mut config = GatewayConfig::default();
        config.cors.allowed_origins = vec!["https://ok.example".into(), "bad\norigin".into()];
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors, vec![ValidationError::Origin("bad\norigin".into())]);
    }
}
