use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use crate::{
    dto::format_unix_ms,
    state::{
        board::{FinishedEntry, Student},
        timer::TimerRecord,
    },
};

/// Public projection of a roster entry exposed to REST/SSE clients.
#[derive(Clone, Debug, Serialize, ToSchema)]
pub struct StudentSummary {
    pub id: Uuid,
    pub name: String,
    pub exam_number: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub photo_url: Option<String>,
}

/// Wire form of a timer record, with the countdown already evaluated against
/// the server clock so viewers never have to trust their own.
#[derive(Clone, Debug, Serialize, ToSchema)]
pub struct TimerSnapshot {
    pub is_running: bool,
    /// Seconds left at `server_time_ms`. Negative once the session runs past
    /// its allowance.
    pub remaining_secs: i64,
    pub base_remaining_secs: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at_ms: Option<u64>,
    pub updated_at_ms: u64,
}

impl TimerSnapshot {
    /// Evaluate a record against the given server clock.
    pub fn of(record: &TimerRecord, now_ms: u64) -> Self {
        Self {
            is_running: record.is_running,
            remaining_secs: record.remaining_at(now_ms),
            base_remaining_secs: record.base_remaining_secs,
            started_at_ms: record.started_at_ms,
            updated_at_ms: record.updated_at_ms,
        }
    }
}

/// One examination place with its occupant and countdown, if any.
#[derive(Clone, Debug, Serialize, ToSchema)]
pub struct SlotView {
    pub index: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub student: Option<StudentSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timer: Option<TimerSnapshot>,
}

/// Completed session as shown on the ranking.
#[derive(Clone, Debug, Serialize, ToSchema)]
pub struct FinishedView {
    /// One-based position in the ranking, fastest first.
    pub rank: usize,
    pub student: StudentSummary,
    pub time_used_secs: i64,
    /// Whether the session ran past its allowance.
    pub overtime: bool,
    /// RFC 3339 instant the session was closed.
    pub finished_at: String,
}

impl FinishedView {
    /// Project a ranked entry, flagging overtime against the allowance the
    /// session started with.
    pub fn of(rank: usize, entry: &FinishedEntry, allowed_secs: i64) -> Self {
        Self {
            rank,
            student: (&entry.student).into(),
            time_used_secs: entry.time_used_secs,
            overtime: entry.time_used_secs > allowed_secs,
            finished_at: format_unix_ms(entry.finished_at_ms),
        }
    }
}

/// Complete projection of the board: every slot, the derived waiting list and
/// the ranking, all evaluated at one server instant.
///
/// Served on `GET /monitor/board` and pushed as the `board.snapshot` SSE
/// event, so a reloaded page and a long-lived one render the same state.
#[derive(Clone, Debug, Serialize, ToSchema)]
pub struct BoardSnapshot {
    /// Server clock (Unix ms) every contained countdown was evaluated at.
    pub server_time_ms: u64,
    pub slot_count: usize,
    pub default_time_secs: i64,
    /// True while state is held by the local fallback instead of CouchDB.
    pub degraded: bool,
    pub slots: Vec<SlotView>,
    pub waiting: Vec<StudentSummary>,
    pub finished: Vec<FinishedView>,
}

/// Optional narrowing of the waiting list.
#[derive(Debug, Deserialize, IntoParams, Validate)]
pub struct WaitingQuery {
    /// Case-insensitive substring matched against names and exam numbers.
    #[validate(length(max = 64))]
    pub filter: Option<String>,
}

/// Waiting list slice returned by `GET /monitor/waiting`.
#[derive(Debug, Serialize, ToSchema)]
pub struct WaitingResponse {
    /// Number of students still waiting, before any filter.
    pub total: usize,
    pub students: Vec<StudentSummary>,
}

impl From<&Student> for StudentSummary {
    fn from(student: &Student) -> Self {
        Self {
            id: student.id,
            name: student.name.clone(),
            exam_number: student.exam_number.clone(),
            photo_url: student.photo_url.clone(),
        }
    }
}

impl From<Student> for StudentSummary {
    fn from(student: Student) -> Self {
        Self {
            id: student.id,
            name: student.name,
            exam_number: student.exam_number,
            photo_url: student.photo_url,
        }
    }
}
