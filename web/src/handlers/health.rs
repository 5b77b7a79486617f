//! Health check endpoints.
//!
//! Used by load balancers and orchestrators to verify service health.

use crate::state::AppState;
use axum::{Json, extract::State, http::StatusCode};
use conference_core::cache::ANNOUNCEMENT_KEY;
use conference_core::key::EntityKey;
use serde::Serialize;

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Service status
    pub status: String,
    /// Service version
    pub version: String,
}

/// Liveness check.
///
/// Returns 200 OK if the process is serving requests. Dependencies are not
/// checked.
///
/// ```text
/// GET /health
/// {"status":"ok","version":"0.1.0"}
/// ```
#[allow(clippy::unused_async)]
pub async fn health_check() -> (StatusCode, Json<HealthResponse>) {
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "ok".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }),
    )
}

/// Readiness check response.
#[derive(Debug, Serialize)]
pub struct ReadinessResponse {
    /// Overall readiness status
    pub ready: bool,
    /// Entity store reachable
    pub store: bool,
    /// Cache reachable
    pub cache: bool,
}

/// Readiness check.
///
/// Performs one read against the entity store and one against the cache.
/// Returns 503 if either fails.
///
/// ```text
/// GET /ready
/// {"ready":true,"store":true,"cache":true}
/// ```
pub async fn readiness_check(State(state): State<AppState>) -> (StatusCode, Json<ReadinessResponse>) {
    let store = match state.service.store().get(EntityKey::profile("readiness-probe")).await {
        Ok(_) => true,
        Err(e) => {
            tracing::warn!(error = %e, "Readiness: entity store unreachable");
            false
        }
    };
    let cache = match state.service.cache().get(ANNOUNCEMENT_KEY).await {
        Ok(_) => true,
        Err(e) => {
            tracing::warn!(error = %e, "Readiness: cache unreachable");
            false
        }
    };

    let ready = store && cache;
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status, Json(ReadinessResponse { ready, store, cache }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_health_check() {
        let (status, Json(body)) = health_check().await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.status, "ok");
        assert_eq!(body.version, env!("CARGO_PKG_VERSION"));
    }
}
