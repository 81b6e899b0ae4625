//! OpenAPI 3.0 description of the gateway's public surface.

use serde_json::{json, Value};

use crate::config::{DocsConfig, GatewayConfig};

/// Server entry advertised in the document: the platform hostname when
/// deployed, an explicit public URL when configured, localhost otherwise.
pub fn server_entry(docs: &DocsConfig, port: u16) -> (String, &'static str) {
    if let Some(host) = docs.vercel_url.as_deref().filter(|h| !h.is_empty()) {
        return (format!("https://{host}"), "Production server");
    }
    if let Some(url) = docs.public_url.as_deref().filter(|u| !u.is_empty()) {
        return (url.trim_end_matches('/').to_string(), "Production server");
    }
    (format!("http://localhost:{port}"), "Development server")
}

fn error_schema() -> Value {
    json!({
        "type": "object",
        "required": ["success", "message"],
        "properties": {
            "success": { "type": "boolean", "example": false },
            "message": { "type": "string" },
            "path": { "type": "string" }
        }
    })
}

fn error_response(description: &str) -> Value {
    json!({
        "description": description,
        "content": {
            "application/json": { "schema": { "$ref": "#/components/schemas/Error" } }
        }
    })
}

pub fn build_document(config: &GatewayConfig) -> Value {
    let port = config.listener.port().unwrap_or(5000);
    let (server_url, server_description) = server_entry(&config.docs, port);

    let forwarded = json!({
        "tags": ["Auth"],
        "summary": "Forwarded to the authentication service",
        "parameters": [{
            "name": "path",
            "in": "path",
            "required": true,
            "schema": { "type": "string" },
            "description": "Remainder of the auth route, e.g. `login`"
        }],
        "responses": {
            "200": { "description": "Response of the authentication service" },
            "429": error_response("Too many requests"),
            "502": error_response("Authentication service unreachable"),
            "503": error_response("Authentication service not configured"),
            "504": error_response("Authentication service timed out")
        }
    });

    json!({
        "openapi": "3.0.0",
        "info": {
            "title": config.service.name,
            "version": config.service.version,
            "description": config.service.description
        },
        "servers": [{ "url": server_url, "description": server_description }],
        "paths": {
            "/api": {
                "get": {
                    "tags": ["Meta"],
                    "summary": "Welcome banner",
                    "responses": {
                        "200": {
                            "description": "Service name, version and entry points",
                            "content": { "application/json": { "schema": {
                                "type": "object",
                                "properties": {
                                    "message": { "type": "string" },
                                    "version": { "type": "string" },
                                    "endpoints": { "type": "array", "items": { "type": "string" } }
                                }
                            } } }
                        }
                    }
                }
            },
            "/api/health": {
                "get": {
                    "tags": ["Meta"],
                    "summary": "Health check",
                    "responses": {
                        "200": {
                            "description": "Service is up",
                            "content": { "application/json": { "schema": {
                                "type": "object",
                                "properties": {
                                    "status": { "type": "string", "example": "OK" },
                                    "service": { "type": "string" },
                                    "timestamp": { "type": "string", "format": "date-time" }
                                }
                            } } }
                        },
                        "500": { "description": "Database unavailable" }
                    }
                }
            },
            "/api/auth/{path}": {
                "get": forwarded.clone(),
                "post": forwarded
            }
        },
        "components": {
            "schemas": { "Error": error_schema() }
        }
    })
}
