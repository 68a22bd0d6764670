//! DTO definitions used by the admin REST API and documentation layer.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::dto::{
    board::{FinishedView, StudentSummary, TimerSnapshot},
    format_unix_ms,
};

/// Request to call the next student up from the waiting list.
#[derive(Debug, Deserialize, ToSchema)]
pub struct StartSessionRequest {
    pub student_id: Uuid,
}

/// Response emitted when a session starts, describing the seat taken.
#[derive(Debug, Serialize, ToSchema)]
pub struct StartSessionResponse {
    pub slot_index: usize,
    pub student: StudentSummary,
    pub timer: TimerSnapshot,
}

/// Result of pausing or resuming a countdown.
#[derive(Debug, Serialize, ToSchema)]
pub struct ToggleResponse {
    pub occupant_id: Uuid,
    pub timer: TimerSnapshot,
}

/// Request to close a running session.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct FinishSessionRequest {
    /// Corrected seconds left, when the proctor overrides the live countdown.
    /// Omitted to settle at whatever the clock says; negative for overtime.
    #[serde(default)]
    #[validate(range(min = -86_400, max = 86_400))]
    pub remaining_secs: Option<i64>,
}

/// Response returned when a session closes, with its ranked entry.
#[derive(Debug, Serialize, ToSchema)]
pub struct FinishSessionResponse {
    /// Slot freed by the finish.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slot_index: Option<usize>,
    pub finished: FinishedView,
}

/// Generic action acknowledgement used by admin endpoints.
#[derive(Debug, Serialize, ToSchema)]
pub struct ActionResponse {
    pub message: String,
}

/// One line of the final ranking report.
#[derive(Debug, Serialize, ToSchema)]
pub struct ReportRow {
    pub rank: usize,
    pub name: String,
    pub exam_number: String,
    pub time_used_secs: i64,
    pub overtime: bool,
    pub finished_at: String,
}

impl ReportRow {
    /// Flatten a ranked view into one report line.
    pub fn of(view: &FinishedView) -> Self {
        Self {
            rank: view.rank,
            name: view.student.name.clone(),
            exam_number: view.student.exam_number.clone(),
            time_used_secs: view.time_used_secs,
            overtime: view.overtime,
            finished_at: view.finished_at.clone(),
        }
    }
}

/// Final ranking report, fastest session first.
#[derive(Debug, Serialize, ToSchema)]
pub struct ReportResponse {
    /// RFC 3339 instant the report was assembled.
    pub generated_at: String,
    pub total: usize,
    pub rows: Vec<ReportRow>,
}

impl ReportResponse {
    /// Assemble the report envelope around its rows.
    pub fn of(generated_at_ms: u64, rows: Vec<ReportRow>) -> Self {
        Self {
            generated_at: format_unix_ms(generated_at_ms),
            total: rows.len(),
            rows,
        }
    }
}
