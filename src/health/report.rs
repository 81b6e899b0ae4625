use axum::http::{Method, Uri};
use chrono::{SecondsFormat, Utc};
use serde::Serialize;

use crate::config::GatewayConfig;
use crate::db::DbStatus;

/// Body of a successful health probe.
#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub status: &'static str,
    pub service: String,
    /// ISO-8601 UTC with millisecond precision.
    pub timestamp: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub features: Option<Vec<&'static str>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub db: Option<DbStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl HealthReport {
    pub fn ok(service: &str) -> Self {
        Self {
            status: "OK",
            service: service.to_string(),
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            version: None,
            features: None,
            db: None,
            method: None,
            url: None,
        }
    }

    pub fn verbose(
        mut self,
        version: &str,
        features: Vec<&'static str>,
        db: DbStatus,
        method: &Method,
        uri: &Uri,
    ) -> Self {
        self.version = Some(version.to_string());
        self.features = Some(features);
        self.db = Some(db);
        self.method = Some(method.to_string());
        self.url = Some(
            uri.path_and_query()
                .map(|pq| pq.as_str().to_string())
                .unwrap_or_else(|| uri.path().to_string()),
        );
        self
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthFailure {
    pub status: &'static str,
    pub message: String,
}

impl HealthFailure {
    pub fn new(message: String) -> Self {
        Self {
            status: "ERROR",
            message,
        }
    }
}

/// Names of the pipeline stages active under `config`.
pub fn enabled_features(config: &GatewayConfig, auth_upstream: bool) -> Vec<&'static str> {
    let mut features = vec!["axum", "cors"];
    if config.security.enable_headers {
        features.push("security-headers");
    }
    if config.rate_limit.enabled {
        features.push("rate-limit");
    }
    features.push("body-parser");
    features.push("locale");
    features.push("postgres");
    if config.docs.enabled {
        features.push("docs");
    }
    if auth_upstream {
        features.push("auth-proxy");
    }
    features
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::DateTime;
    use serde_json::json;

    #[test]
    fn compact_report_omits_verbose_fields() {
        let value = serde_json::to_value(HealthReport::ok("Djulah API")).unwrap();
        let object = value.as_object().unwrap();
        assert_eq!(object.len(), 3);
        assert_eq!(value["status"], "OK");
        assert_eq!(value["service"], "Djulah API");
    }

    #[test]
    fn timestamp_is_iso_millis_utc() {
        let report = HealthReport::ok("svc");
        assert!(report.timestamp.ends_with('Z'));
        // 2026-01-01T00:00:00.000Z
        assert_eq!(report.timestamp.len(), 24);
        assert!(DateTime::parse_from_rfc3339(&report.timestamp).is_ok());
    }

    #[test]
    fn verbose_report_echoes_request() {
        let report = HealthReport::ok("svc").verbose(
            "1.0.0",
            vec!["axum"],
            DbStatus::Disconnected,
            &Method::GET,
            &"/api/health?probe=1".parse().unwrap(),
        );
        let value = serde_json::to_value(report).unwrap();
        assert_eq!(value["db"], "disconnected");
        assert_eq!(value["method"], "GET");
        assert_eq!(value["url"], "/api/health?probe=1");
        assert_eq!(value["features"], json!(["axum"]));
    }

    #[test]
    fn features_follow_config() {
        let mut config = GatewayConfig::default();
        config.rate_limit.enabled = false;
        config.docs.enabled = true;
        let features = enabled_features(&config, true);
        assert!(!features.contains(&"rate-limit"));
        assert!(features.contains(&"docs"));
        assert!(features.contains(&"auth-proxy"));
    }

    #[test]
    fn failure_body_shape() {
        let value = serde_json::to_value(HealthFailure::new("down".into())).unwrap();
        assert_eq!(value, json!({"status": "ERROR", "message": "down"}));
    }
}
