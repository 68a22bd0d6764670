use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI specification for Exam Timer Back.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::monitor::get_board,
        crate::routes::monitor::get_waiting,
        crate::routes::monitor::get_finished,
        crate::routes::admin::start_session,
        crate::routes::admin::toggle_timer,
        crate::routes::admin::finish_session,
        crate::routes::admin::reset_session,
        crate::routes::admin::report,
        crate::routes::sse::monitor_stream,
        crate::routes::sse::admin_stream,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::board::BoardSnapshot,
            crate::dto::board::SlotView,
            crate::dto::board::StudentSummary,
            crate::dto::board::TimerSnapshot,
            crate::dto::board::FinishedView,
            crate::dto::board::WaitingResponse,
            crate::dto::admin::StartSessionRequest,
            crate::dto::admin::StartSessionResponse,
            crate::dto::admin::ToggleResponse,
            crate::dto::admin::FinishSessionRequest,
            crate::dto::admin::FinishSessionResponse,
            crate::dto::admin::ActionResponse,
            crate::dto::admin::ReportRow,
            crate::dto::admin::ReportResponse,
            crate::dto::sse::Handshake,
            crate::dto::sse::SystemStatus,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "monitor", description = "Read-only board projections"),
        (name = "admin", description = "Session lifecycle management"),
        (name = "sse", description = "Server-sent events streams"),
    )
)]
pub struct ApiDoc;
