//! Read-only projections of the shared board for the monitor REST routes and
//! SSE payloads. Every projection evaluates all countdowns against a single
//! server instant so one response is internally consistent.

use indexmap::IndexMap;
use tracing::warn;
use uuid::Uuid;

use crate::{
    config::AppConfig,
    dto::{
        admin::{ReportResponse, ReportRow},
        board::{
            BoardSnapshot, FinishedView, SlotView, StudentSummary, TimerSnapshot, WaitingResponse,
        },
    },
    state::{
        SharedState,
        board::{SessionBoard, Student},
        timer::unix_now_ms,
    },
};

/// Assemble the full board projection at one server instant.
pub async fn board_snapshot(state: &SharedState) -> BoardSnapshot {
    let now_ms = unix_now_ms();
    let board = state.board().read().await;
    let roster = state.roster().read().await;
    snapshot_of(&board, &roster, state.config(), state.is_degraded(), now_ms)
}

/// Waiting students in roster order, optionally narrowed by a name or exam
/// number fragment. `total` always counts the unfiltered set.
pub async fn waiting(state: &SharedState, filter: Option<&str>) -> WaitingResponse {
    let board = state.board().read().await;
    let roster = state.roster().read().await;
    let total = board.waiting_list(&roster, None).len();
    let students = board
        .waiting_list(&roster, filter)
        .into_iter()
        .map(StudentSummary::from)
        .collect();
    WaitingResponse { total, students }
}

/// Ranked finished list, fastest session first.
pub async fn finished(state: &SharedState) -> Vec<FinishedView> {
    let board = state.board().read().await;
    finished_views(&board, state.config().default_time_secs)
}

/// Flatten the ranking into the export report.
pub async fn report(state: &SharedState) -> ReportResponse {
    let views = finished(state).await;
    let rows = views.iter().map(ReportRow::of).collect();
    ReportResponse::of(unix_now_ms(), rows)
}

/// Project an already-locked board. Lifecycle operations call this while
/// still holding the write guard so the broadcast snapshot matches exactly
/// what was committed.
pub fn snapshot_of(
    board: &SessionBoard,
    roster: &IndexMap<Uuid, Student>,
    config: &AppConfig,
    degraded: bool,
    now_ms: u64,
) -> BoardSnapshot {
    let slots = board
        .slots()
        .iter()
        .enumerate()
        .map(|(index, cell)| {
            let student = cell.occupant.and_then(|occupant_id| {
                let found = roster.get(&occupant_id).map(StudentSummary::from);
                if found.is_none() {
                    warn!(%occupant_id, index, "seated student missing from roster");
                }
                found
            });
            let timer = cell
                .occupant
                .and_then(|occupant_id| board.timer(occupant_id))
                .map(|record| TimerSnapshot::of(record, now_ms));
            SlotView {
                index,
                student,
                timer,
            }
        })
        .collect();

    let waiting = board
        .waiting_list(roster, None)
        .into_iter()
        .map(StudentSummary::from)
        .collect();

    BoardSnapshot {
        server_time_ms: now_ms,
        slot_count: board.slot_count(),
        default_time_secs: config.default_time_secs,
        degraded,
        slots,
        waiting,
        finished: finished_views(board, config.default_time_secs),
    }
}

fn finished_views(board: &SessionBoard, allowed_secs: i64) -> Vec<FinishedView> {
    board
        .finished()
        .iter()
        .enumerate()
        .map(|(position, entry)| FinishedView::of(position + 1, entry, allowed_secs))
        .collect()
}
