use std::convert::Infallible;

use axum::{Router, extract::State, response::sse::Sse, routing::get};
use futures::Stream;
use tracing::info;

use crate::{
    services::sse_service::{self, StreamKind},
    state::SharedState,
};

#[utoipa::path(
    get,
    path = "/sse/monitor",
    responses((status = 200, description = "Monitor SSE stream", content_type = "text/event-stream", body = String))
)]
/// Stream realtime board events to read-only monitor pages.
pub async fn monitor_stream(
    State(state): State<SharedState>,
) -> Sse<impl Stream<Item = Result<axum::response::sse::Event, Infallible>>> {
    let receiver = sse_service::subscribe_monitor(&state);
    info!("New monitor SSE connection");
    sse_service::to_sse_stream(&state, receiver, StreamKind::Monitor).await
}

#[utoipa::path(
    get,
    path = "/sse/admin",
    responses((status = 200, description = "Admin SSE stream", content_type = "text/event-stream", body = String))
)]
/// Stream board and storage events to the admin console.
pub async fn admin_stream(
    State(state): State<SharedState>,
) -> Sse<impl Stream<Item = Result<axum::response::sse::Event, Infallible>>> {
    let receiver = sse_service::subscribe_admin(&state);
    info!("New admin SSE connection");
    sse_service::to_sse_stream(&state, receiver, StreamKind::Admin).await
}

/// Configure the SSE endpoints.
pub fn router() -> Router<SharedState> {
    Router::<SharedState>::new()
        .route("/sse/monitor", get(monitor_stream))
        .route("/sse/admin", get(admin_stream))
}
