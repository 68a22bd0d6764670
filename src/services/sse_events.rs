use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    dto::{
        board::{BoardSnapshot, FinishedView, StudentSummary, TimerSnapshot},
        sse::{
            ServerEvent, SessionFinishedEvent, SessionStartedEvent, StorageWarning, SystemStatus,
            TimerUpdatedEvent,
        },
    },
    state::SharedState,
};

const EVENT_SESSION_STARTED: &str = "session.started";
const EVENT_TIMER_UPDATED: &str = "timer.updated";
const EVENT_SESSION_FINISHED: &str = "session.finished";
const EVENT_SESSION_RESET: &str = "session.reset";
const EVENT_BOARD_SNAPSHOT: &str = "board.snapshot";
const EVENT_STATUS: &str = "status";
const EVENT_STORAGE_WARNING: &str = "storage.warning";
const EVENT_INFO: &str = "info";

/// Broadcast that a student was called up from the waiting list into a slot.
pub fn broadcast_session_started(
    state: &SharedState,
    server_time_ms: u64,
    slot_index: usize,
    student: StudentSummary,
    timer: TimerSnapshot,
) {
    let payload = SessionStartedEvent {
        server_time_ms,
        slot_index,
        student,
        timer,
    };
    send_monitor_event(state, EVENT_SESSION_STARTED, &payload);
    send_admin_event(state, EVENT_SESSION_STARTED, &payload);
}

/// Broadcast a paused, resumed or corrected countdown.
pub fn broadcast_timer_updated(
    state: &SharedState,
    server_time_ms: u64,
    occupant_id: Uuid,
    timer: TimerSnapshot,
) {
    let payload = TimerUpdatedEvent {
        server_time_ms,
        occupant_id,
        timer,
    };
    send_monitor_event(state, EVENT_TIMER_UPDATED, &payload);
    send_admin_event(state, EVENT_TIMER_UPDATED, &payload);
}

/// Broadcast a closed session: the freed slot and its ranked entry travel in
/// one event so no client can observe one without the other.
pub fn broadcast_session_finished(
    state: &SharedState,
    server_time_ms: u64,
    slot_index: Option<usize>,
    finished: FinishedView,
) {
    let payload = SessionFinishedEvent {
        server_time_ms,
        slot_index,
        finished,
    };
    send_monitor_event(state, EVENT_SESSION_FINISHED, &payload);
    send_admin_event(state, EVENT_SESSION_FINISHED, &payload);
}

/// Broadcast that the whole session was wiped, carrying the blank board.
pub fn broadcast_session_reset(state: &SharedState, snapshot: &BoardSnapshot) {
    send_monitor_event(state, EVENT_SESSION_RESET, snapshot);
    send_admin_event(state, EVENT_SESSION_RESET, snapshot);
}

/// Broadcast a full board snapshot, typically after a storage reconcile
/// rewrote state under connected clients.
pub fn broadcast_board_snapshot(state: &SharedState, snapshot: &BoardSnapshot) {
    send_monitor_event(state, EVENT_BOARD_SNAPSHOT, snapshot);
    send_admin_event(state, EVENT_BOARD_SNAPSHOT, snapshot);
}

/// Build the snapshot event pushed to a single client right after it
/// subscribes.
pub fn snapshot_event(snapshot: &BoardSnapshot) -> serde_json::Result<ServerEvent> {
    ServerEvent::json(Some(EVENT_BOARD_SNAPSHOT.to_string()), snapshot)
}

/// Push a warning about a failed durable write onto the admin stream.
pub fn send_storage_warning(state: &SharedState, message: &str) {
    let payload = StorageWarning {
        message: message.to_string(),
    };
    send_admin_event(state, EVENT_STORAGE_WARNING, &payload);
}

/// Send a human-readable info message onto the monitor stream.
pub fn broadcast_info(state: &SharedState, message: &str) {
    state.monitor_sse().broadcast(ServerEvent::new(
        Some(EVENT_INFO.to_string()),
        message.to_string(),
    ));
}

/// Forward degraded flag flips to every connected client. Runs for the
/// lifetime of the process.
pub async fn watch_degraded(state: SharedState) {
    let mut watcher = state.degraded_watcher();
    loop {
        let degraded = *watcher.borrow_and_update();
        let payload = SystemStatus { degraded };
        send_monitor_event(&state, EVENT_STATUS, &payload);
        send_admin_event(&state, EVENT_STATUS, &payload);
        info!(degraded, "storage mode changed");

        if watcher.changed().await.is_err() {
            break;
        }
    }
}

fn send_monitor_event(state: &SharedState, event: &str, payload: &impl Serialize) {
    match ServerEvent::json(Some(event.to_string()), payload) {
        Ok(event) => state.monitor_sse().broadcast(event),
        Err(err) => warn!(event, error = %err, "failed to serialize monitor SSE payload"),
    }
}

fn send_admin_event(state: &SharedState, event: &str, payload: &impl Serialize) {
    match ServerEvent::json(Some(event.to_string()), payload) {
        Ok(event) => state.admin_sse().broadcast(event),
        Err(err) => warn!(event, error = %err, "failed to serialize admin SSE payload"),
    }
}
