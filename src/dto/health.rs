use serde::Serialize;
use utoipa::ToSchema;

/// Simple health response returned by the `/healthcheck` route.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// Health status ("ok" or "degraded").
    pub status: String,
    /// Server clock (Unix ms), for viewers that want to gauge their drift.
    pub server_time_ms: u64,
}

impl HealthResponse {
    /// Create a health response indicating the system is operational.
    pub fn ok(server_time_ms: u64) -> Self {
        Self {
            status: "ok".to_string(),
            server_time_ms,
        }
    }

    /// Create a health response indicating the system is in degraded mode.
    pub fn degraded(server_time_ms: u64) -> Self {
        Self {
            status: "degraded".to_string(),
            server_time_ms,
        }
    }
}
