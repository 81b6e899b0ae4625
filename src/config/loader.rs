//! Configuration loading from disk and the process environment.

use std::fs;
use std::path::Path;
use std::str::FromStr;

use thiserror::Error;

use crate::config::schema::GatewayConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid value for {key}: {message}")]
    Env { key: &'static str, message: String },

    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load configuration: defaults, then the optional TOML file, then
/// environment overrides. The result is validated before it is returned.
pub fn load_config(path: Option<&Path>) -> Result<GatewayConfig, ConfigError> {
    let mut config = match path {
        Some(path) => {
            let content = fs::read_to_string(path)?;
            toml::from_str(&content)?
        }
        None => GatewayConfig::default(),
    };

    apply_env_overrides(&mut config, |key| std::env::var(key).ok())?;
    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// Overlay environment variables onto `config`.
///
/// `lookup` abstracts the environment so tests do not mutate process state.
pub fn apply_env_overrides<F>(config: &mut GatewayConfig, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

    if let Some(v) = get("APP_ENV") {
        config.environment = parse_value("APP_ENV", &v)?;
    }

    if let Some(addr) = get("BIND_ADDRESS") {
        config.listener.bind_address = addr;
    } else if let Some(port) = get("PORT") {
        let port: u16 = parse_value("PORT", &port)?;
        let host = config
            .listener
            .bind_address
            .rsplit_once(':')
            .map(|(host, _)| host.to_string())
            .unwrap_or_else(|| "0.0.0.0".to_string());
        config.listener.bind_address = format!("{host}:{port}");
    }

    if let Some(url) = get("DATABASE_URL") {
        config.database.url = Some(url);
    }
    if let Some(v) = get("DATABASE_MAX_CONNECTIONS") {
        config.database.max_connections = parse_value("DATABASE_MAX_CONNECTIONS", &v)?;
    }

    if let Some(v) = get("CORS_MODE") {
        config.cors.mode = parse_value("CORS_MODE", &v)?;
    }
    if let Some(v) = get("CORS_ALLOWED_ORIGINS") {
        config.cors.allowed_origins = split_list(&v);
    }
    if let Some(v) = get("CORS_ALLOW_ALL_IN_DEV") {
        config.cors.allow_all_in_dev = parse_value("CORS_ALLOW_ALL_IN_DEV", &v)?;
    }

    if let Some(url) = get("AUTH_UPSTREAM_URL") {
        config.auth.upstream = Some(url);
    }

    if let Some(url) = get("PUBLIC_URL") {
        config.docs.public_url = Some(url);
    }
    if let Some(host) = get("VERCEL_URL") {
        config.docs.vercel_url = Some(host);
    }

    if let Some(v) = get("LOG_FORMAT") {
        config.observability.log_format = parse_value("LOG_FORMAT", &v)?;
    }
    if let Some(level) = get("LOG_LEVEL") {
        config.observability.log_level = level;
    }

    if let Some(v) = get("EXPOSE_ERROR_DETAILS") {
        config.errors.expose_details = parse_value("EXPOSE_ERROR_DETAILS", &v)?;
    }

    Ok(())
}

fn parse_value<T>(key: &'static str, raw: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim().parse().map_err(|e: T::Err| ConfigError::Env {
        key,
        message: e.to_string(),
    })
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
