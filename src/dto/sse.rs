use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::dto::board::{FinishedView, StudentSummary, TimerSnapshot};

#[derive(Clone, Debug)]
/// Dispatched payload carried across SSE channels.
pub struct ServerEvent {
    pub event: Option<String>,
    pub data: String,
}

impl ServerEvent {
    /// Wrap an already-serialised (or plain text) payload.
    pub fn new(event: Option<String>, data: String) -> Self {
        Self { event, data }
    }

    /// Convenience wrapper that serialises `payload` into the SSE data field.
    pub fn json<E, T>(event: E, payload: &T) -> serde_json::Result<Self>
    where
        E: Into<Option<String>>,
        T: Serialize,
    {
        Ok(Self {
            event: event.into(),
            data: serde_json::to_string(payload)?,
        })
    }
}

#[derive(Debug, Serialize, ToSchema)]
/// Initial metadata sent to an SSE client when it connects.
pub struct Handshake {
    /// Identifier of the SSE stream (`monitor` or `admin`).
    pub stream: String,
    /// Human-readable message confirming the subscription.
    pub message: String,
    /// Whether state is currently held by the local fallback store.
    pub degraded: bool,
}

#[derive(Debug, Serialize, ToSchema)]
/// Broadcast when the backend enters or leaves degraded mode.
pub struct SystemStatus {
    pub degraded: bool,
}

#[derive(Debug, Serialize, ToSchema)]
/// Broadcast when a student is called up from the waiting list into a slot.
pub struct SessionStartedEvent {
    /// Server clock (Unix ms) the countdown was evaluated at.
    pub server_time_ms: u64,
    pub slot_index: usize,
    pub student: StudentSummary,
    pub timer: TimerSnapshot,
}

#[derive(Debug, Serialize, ToSchema)]
/// Broadcast whenever a countdown is paused, resumed or corrected.
pub struct TimerUpdatedEvent {
    /// Server clock (Unix ms) the countdown was evaluated at.
    pub server_time_ms: u64,
    pub occupant_id: Uuid,
    pub timer: TimerSnapshot,
}

#[derive(Debug, Serialize, ToSchema)]
/// Broadcast when a session closes and its entry joins the ranking.
pub struct SessionFinishedEvent {
    /// Server clock (Unix ms) at the close.
    pub server_time_ms: u64,
    /// Slot freed by the finish.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slot_index: Option<usize>,
    pub finished: FinishedView,
}

#[derive(Debug, Serialize, ToSchema)]
/// Pushed to administrators when a durable write could not be completed.
pub struct StorageWarning {
    pub message: String,
}
