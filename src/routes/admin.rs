use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{get, post},
};
use axum_valid::Valid;
use uuid::Uuid;

use crate::{
    dto::admin::{
        ActionResponse, FinishSessionRequest, FinishSessionResponse, ReportResponse,
        StartSessionRequest, StartSessionResponse, ToggleResponse,
    },
    error::AppError,
    services::{board_service, lifecycle_service},
    state::SharedState,
};

/// Admin console endpoints driving the session lifecycle.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/admin/slots/start", post(start_session))
        .route("/admin/slots/{occupant_id}/toggle", post(toggle_timer))
        .route("/admin/slots/{occupant_id}/finish", post(finish_session))
        .route("/admin/session/reset", post(reset_session))
        .route("/admin/report", get(report))
}

/// Seat a waiting student into a free slot, paused with the full allowance.
#[utoipa::path(
    post,
    path = "/admin/slots/start",
    tag = "admin",
    request_body = StartSessionRequest,
    responses(
        (status = 200, description = "Session created in a paused state", body = StartSessionResponse),
        (status = 404, description = "Student is not on the roster"),
        (status = 409, description = "No free slot, or the student is not waiting")
    )
)]
pub async fn start_session(
    State(state): State<SharedState>,
    Json(payload): Json<StartSessionRequest>,
) -> Result<Json<StartSessionResponse>, AppError> {
    Ok(Json(
        lifecycle_service::start_from_queue(&state, payload).await?,
    ))
}

/// Toggle a countdown between running and paused.
#[utoipa::path(
    post,
    path = "/admin/slots/{occupant_id}/toggle",
    tag = "admin",
    params(("occupant_id" = Uuid, Path, description = "Student whose timer to toggle")),
    responses(
        (status = 200, description = "Timer toggled", body = ToggleResponse),
        (status = 404, description = "No active session for this student")
    )
)]
pub async fn toggle_timer(
    State(state): State<SharedState>,
    Path(occupant_id): Path<Uuid>,
) -> Result<Json<ToggleResponse>, AppError> {
    Ok(Json(lifecycle_service::toggle(&state, occupant_id).await?))
}

/// Close a session and move the student to the finished ranking.
#[utoipa::path(
    post,
    path = "/admin/slots/{occupant_id}/finish",
    tag = "admin",
    params(("occupant_id" = Uuid, Path, description = "Student whose session to finish")),
    request_body = FinishSessionRequest,
    responses(
        (status = 200, description = "Session finished and ranked", body = FinishSessionResponse),
        (status = 404, description = "No active session for this student")
    )
)]
pub async fn finish_session(
    State(state): State<SharedState>,
    Path(occupant_id): Path<Uuid>,
    Valid(Json(payload)): Valid<Json<FinishSessionRequest>>,
) -> Result<Json<FinishSessionResponse>, AppError> {
    Ok(Json(
        lifecycle_service::finish(&state, occupant_id, payload.remaining_secs).await?,
    ))
}

/// Wipe every slot, timer and finished entry, restoring the full waiting queue.
#[utoipa::path(
    post,
    path = "/admin/session/reset",
    tag = "admin",
    responses(
        (status = 200, description = "Session data cleared", body = ActionResponse),
        (status = 503, description = "Storage refused the wipe")
    )
)]
pub async fn reset_session(
    State(state): State<SharedState>,
) -> Result<Json<ActionResponse>, AppError> {
    Ok(Json(lifecycle_service::reset(&state).await?))
}

/// Export the finished ranking as a report payload.
#[utoipa::path(
    get,
    path = "/admin/report",
    tag = "admin",
    responses((status = 200, description = "Ranked report of finished sessions", body = ReportResponse))
)]
pub async fn report(State(state): State<SharedState>) -> Json<ReportResponse> {
    Json(board_service::report(&state).await)
}
