use tracing::warn;

use crate::{
    dto::health::HealthResponse,
    state::{SharedState, timer::unix_now_ms},
};

/// Respond with a health payload while logging connectivity issues.
pub async fn health_status(state: &SharedState) -> HealthResponse {
    match state.session_store().await {
        Some(store) => {
            if let Err(err) = store.health_check().await {
                warn!(error = %err, "storage health check failed");
            }
        }
        None => warn!("storage unavailable (still starting up)"),
    }

    if state.is_degraded() {
        HealthResponse::degraded(unix_now_ms())
    } else {
        HealthResponse::ok(unix_now_ms())
    }
}
