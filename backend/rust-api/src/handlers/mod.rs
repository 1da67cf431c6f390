use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use base64::{engine::general_purpose, Engine as _};
use serde_json::json;
use std::sync::Arc;

use crate::metrics;
use crate::services::AppState;

pub mod analytics;
pub mod auth;
pub mod error;
pub mod questions;
pub mod quiz;
pub mod users;

use error::ApiError;

pub async fn root() -> impl IntoResponse {
    Json(json!({
        "message": "Welcome to the Adaptive Quiz API",
        "version": env!("CARGO_PKG_VERSION"),
        "docs": "/api/v1"
    }))
}

pub async fn health_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let storage = check_storage(&state).await;
    let healthy = storage.get("status").and_then(|v| v.as_str()) == Some("healthy");

    let status_code = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status_code,
        Json(json!({
            "status": if healthy { "healthy" } else { "degraded" },
            "service": "adaptive-quiz-api",
            "version": env!("CARGO_PKG_VERSION"),
            "dependencies": { "storage": storage }
        })),
    )
}

async fn check_storage(state: &AppState) -> serde_json::Map<String, serde_json::Value> {
    let mut result = serde_json::Map::new();
    result.insert("backend".to_string(), json!(state.store.backend_name()));

    match tokio::time::timeout(std::time::Duration::from_secs(1), state.store.ping()).await {
        Ok(Ok(())) => {
            result.insert("status".to_string(), json!("healthy"));
        }
        Ok(Err(e)) => {
            tracing::warn!(error = %e, "Storage health check failed");
            result.insert("status".to_string(), json!("unhealthy"));
            result.insert("error".to_string(), json!(e.to_string()));
        }
        Err(_) => {
            result.insert("status".to_string(), json!("unhealthy"));
            result.insert("error".to_string(), json!("Storage ping timeout after 1s"));
        }
    }

    result
}

pub async fn metrics_handler() -> impl IntoResponse {
    match metrics::render_metrics() {
        Ok(metrics_text) => (StatusCode::OK, metrics_text),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Failed to render metrics: {}", e),
        ),
    }
}

pub async fn not_found() -> ApiError {
    ApiError::not_found("Not found")
}

/// Protects /metrics with HTTP Basic auth; credentials come from METRICS_AUTH (`user:password`)
pub async fn metrics_auth_middleware(
    headers: HeaderMap,
    request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let auth_header = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or(StatusCode::UNAUTHORIZED)?;

    let encoded = auth_header
        .strip_prefix("Basic ")
        .ok_or(StatusCode::UNAUTHORIZED)?;
    let decoded = general_purpose::STANDARD
        .decode(encoded)
        .map_err(|_| StatusCode::UNAUTHORIZED)?;
    let credentials = String::from_utf8(decoded).map_err(|_| StatusCode::UNAUTHORIZED)?;

    let expected = std::env::var("METRICS_AUTH").unwrap_or_else(|_| "admin:changeme".to_string());
    if credentials != expected {
        return Err(StatusCode::UNAUTHORIZED);
    }

    Ok(next.run(request).await)
}
