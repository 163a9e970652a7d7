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
use std::time::Duration;

use crate::metrics;
use crate::services::AppState;

pub mod agent;
pub mod content;
pub mod exercises;

/// Reports service health with a per-dependency breakdown. Any unhealthy
/// dependency degrades the whole service to 503.
pub async fn health_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let mongo = probe_mongo(&state).await;
    let redis = probe_redis(&state).await;
    let healthy = mongo.is_ok() && redis.is_ok();

    let status_code = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status_code,
        Json(json!({
            "status": if healthy { "healthy" } else { "degraded" },
            "service": "tutorflow-api",
            "version": env!("CARGO_PKG_VERSION"),
            "dependencies": {
                "mongodb": dependency_report(&mongo),
                "redis": dependency_report(&redis),
            },
        })),
    )
}

fn dependency_report(probe: &Result<(), String>) -> serde_json::Value {
    match probe {
        Ok(()) => json!({ "status": "healthy" }),
        Err(reason) => json!({ "status": "unhealthy", "error": reason }),
    }
}

async fn probe_mongo(state: &AppState) -> Result<(), String> {
    match tokio::time::timeout(
        Duration::from_secs(1),
        state.mongo.run_command(mongodb::bson::doc! { "ping": 1 }),
    )
    .await
    {
        Ok(Ok(_)) => Ok(()),
        Ok(Err(e)) => Err(format!("MongoDB error: {}", e)),
        Err(_) => Err("MongoDB timeout after 1s".to_string()),
    }
}

async fn probe_redis(state: &AppState) -> Result<(), String> {
    let mut conn = state.redis.clone();
    match tokio::time::timeout(
        Duration::from_millis(500),
        redis::cmd("PING").query_async::<String>(&mut conn),
    )
    .await
    {
        Ok(Ok(_)) => Ok(()),
        Ok(Err(e)) => Err(format!("Redis error: {}", e)),
        Err(_) => Err("Redis timeout after 500ms".to_string()),
    }
}

pub async fn metrics_handler() -> impl IntoResponse {
    match metrics::render_metrics() {
        Ok(text) => (StatusCode::OK, text),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Failed to render metrics: {}", e),
        ),
    }
}

/// HTTP Basic Auth for the /metrics endpoint. Expected credentials come from
/// the METRICS_AUTH environment variable as `username:password`.
pub async fn metrics_auth_middleware(
    headers: HeaderMap,
    request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let encoded = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Basic "))
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
