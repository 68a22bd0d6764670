use axum::{
    Json, Router,
    extract::{Query, State},
    routing::get,
};
use axum_valid::Valid;

use crate::{
    dto::board::{BoardSnapshot, FinishedView, WaitingQuery, WaitingResponse},
    services::board_service,
    state::SharedState,
};

/// Read-only endpoints that expose the current board to exam monitors.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/monitor/board", get(get_board))
        .route("/monitor/waiting", get(get_waiting))
        .route("/monitor/finished", get(get_finished))
}

#[utoipa::path(
    get,
    path = "/monitor/board",
    tag = "monitor",
    responses((status = 200, description = "Current board snapshot", body = BoardSnapshot))
)]
/// Return the full board with countdowns evaluated at server time.
pub async fn get_board(State(state): State<SharedState>) -> Json<BoardSnapshot> {
    Json(board_service::board_snapshot(&state).await)
}

#[utoipa::path(
    get,
    path = "/monitor/waiting",
    tag = "monitor",
    params(WaitingQuery),
    responses((status = 200, description = "Waiting queue in arrival order", body = WaitingResponse))
)]
/// Return the derived waiting queue, optionally filtered by name or exam number.
pub async fn get_waiting(
    State(state): State<SharedState>,
    Valid(Query(query)): Valid<Query<WaitingQuery>>,
) -> Json<WaitingResponse> {
    Json(board_service::waiting(&state, query.filter.as_deref()).await)
}

#[utoipa::path(
    get,
    path = "/monitor/finished",
    tag = "monitor",
    responses((status = 200, description = "Finished sessions in rank order", body = [FinishedView]))
)]
/// Return the finished sessions ranked by time used.
pub async fn get_finished(State(state): State<SharedState>) -> Json<Vec<FinishedView>> {
    Json(board_service::finished(&state).await)
}
