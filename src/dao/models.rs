use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Roster entry persisted by the storage layer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StudentEntity {
    /// Primary key of the student.
    pub id: Uuid,
    /// Display name.
    pub name: String,
    /// Exam number printed on the student's papers.
    pub exam_number: String,
    /// Optional portrait URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub photo_url: Option<String>,
}

/// Slot occupancy row persisted by the storage layer. One row exists per
/// configured slot; an empty cell is a row with no occupant, so occupancy
/// clears reach the store as ordinary upserts.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SlotRowEntity {
    /// Position of the cell on the board.
    pub index: usize,
    /// Student currently seated here, if any.
    #[serde(default)]
    pub occupant: Option<Uuid>,
    /// Stamp of the last occupancy change (Unix ms), for last-writer-wins.
    pub updated_at_ms: u64,
}

/// Countdown record persisted by the storage layer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TimerRecordEntity {
    /// Student the countdown belongs to.
    pub occupant_id: Uuid,
    /// Whether the countdown is consuming wall-clock time.
    pub is_running: bool,
    /// Wall-clock instant (Unix ms) the running stretch began.
    #[serde(default)]
    pub started_at_ms: Option<u64>,
    /// Seconds remaining at the start stamp, or the frozen value when paused.
    pub base_remaining_secs: i64,
    /// Stamp of the last accepted mutation (Unix ms).
    pub updated_at_ms: u64,
}

/// Completed session persisted by the storage layer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FinishedEntryEntity {
    /// The examinee, embedded whole so the row outlives roster edits.
    pub student: StudentEntity,
    /// Seconds of allowance consumed.
    pub time_used_secs: i64,
    /// Wall-clock instant (Unix ms) the session was closed.
    pub finished_at_ms: u64,
}
