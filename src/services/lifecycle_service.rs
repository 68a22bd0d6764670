//! Business logic powering the admin REST routes: calling students up from
//! the waiting queue, pausing and resuming countdowns, closing sessions and
//! wiping the board.
//!
//! Every mutation commits to the in-memory board first, broadcasts the change
//! over SSE, and then persists in the background so a slow or absent storage
//! backend never stalls the proctor. The one exception is [`reset`], which is
//! destructive and therefore waits for the store before touching memory.

use std::future::Future;

use tracing::warn;
use uuid::Uuid;

use crate::{
    dao::{models::SlotRowEntity, storage::StorageResult},
    dto::{
        admin::{
            ActionResponse, FinishSessionResponse, StartSessionRequest, StartSessionResponse,
            ToggleResponse,
        },
        board::{FinishedView, StudentSummary, TimerSnapshot},
    },
    error::ServiceError,
    services::{board_service, sse_events},
    state::{
        SharedState,
        board::FinishedEntry,
        timer::{TimerRecord, time_used_secs, unix_now_ms},
    },
};

/// Seat a waiting student in the lowest empty slot with a paused,
/// full-allowance countdown.
pub async fn start_from_queue(
    state: &SharedState,
    request: StartSessionRequest,
) -> Result<StartSessionResponse, ServiceError> {
    start_from_queue_at(state, request.student_id, unix_now_ms()).await
}

pub(crate) async fn start_from_queue_at(
    state: &SharedState,
    student_id: Uuid,
    now_ms: u64,
) -> Result<StartSessionResponse, ServiceError> {
    let store = state.session_store().await.ok_or(ServiceError::Degraded)?;

    let student = {
        let roster = state.roster().read().await;
        roster.get(&student_id).cloned().ok_or_else(|| {
            ServiceError::NotFound(format!("student `{student_id}` is not in the roster"))
        })?
    };

    let (slot_index, record) = {
        let mut board = state.board().write().await;
        if board.is_seated(student_id) || board.is_finished(student_id) {
            return Err(ServiceError::NotWaiting { student_id });
        }
        let slot_index = board.seat(student_id, now_ms)?;
        let record = TimerRecord::fresh(student_id, state.config().default_time_secs, now_ms);
        board.upsert_timer(record.clone())?;
        (slot_index, record)
    };

    let student: StudentSummary = student.into();
    let timer = TimerSnapshot::of(&record, now_ms);
    sse_events::broadcast_session_started(state, now_ms, slot_index, student.clone(), timer.clone());

    let slot = SlotRowEntity {
        index: slot_index,
        occupant: Some(student_id),
        updated_at_ms: now_ms,
    };
    spawn_persist(state, "session start", async move {
        store.save_slot(slot).await?;
        store.save_timer(record.into()).await
    });

    Ok(StartSessionResponse {
        slot_index,
        student,
        timer,
    })
}

/// Flip a countdown between running and paused. Pausing freezes the live
/// remaining value; resuming restarts the clock from the frozen value.
pub async fn toggle(
    state: &SharedState,
    occupant_id: Uuid,
) -> Result<ToggleResponse, ServiceError> {
    toggle_at(state, occupant_id, unix_now_ms()).await
}

pub(crate) async fn toggle_at(
    state: &SharedState,
    occupant_id: Uuid,
    now_ms: u64,
) -> Result<ToggleResponse, ServiceError> {
    let store = state.session_store().await.ok_or(ServiceError::Degraded)?;

    let record = {
        let mut board = state.board().write().await;
        let current = board.timer(occupant_id).cloned().ok_or_else(|| {
            ServiceError::NotFound(format!("no active session for student `{occupant_id}`"))
        })?;
        let toggled = current.toggled(now_ms);
        board.upsert_timer(toggled.clone())?;
        toggled
    };

    let timer = TimerSnapshot::of(&record, now_ms);
    sse_events::broadcast_timer_updated(state, now_ms, occupant_id, timer.clone());
    spawn_persist(state, "timer update", async move {
        store.save_timer(record.into()).await
    });

    Ok(ToggleResponse { occupant_id, timer })
}

/// Close a session: free the slot, drop the countdown, file the ranked entry.
///
/// `remaining_override` lets the proctor settle on a corrected value instead
/// of whatever the clock says; negative values record overtime.
pub async fn finish(
    state: &SharedState,
    occupant_id: Uuid,
    remaining_override: Option<i64>,
) -> Result<FinishSessionResponse, ServiceError> {
    finish_at(state, occupant_id, remaining_override, unix_now_ms()).await
}

pub(crate) async fn finish_at(
    state: &SharedState,
    occupant_id: Uuid,
    remaining_override: Option<i64>,
    now_ms: u64,
) -> Result<FinishSessionResponse, ServiceError> {
    let store = state.session_store().await.ok_or(ServiceError::Degraded)?;
    let allowed_secs = state.config().default_time_secs;

    let (outcome, entry) = {
        let mut board = state.board().write().await;
        if !board.is_seated(occupant_id) {
            return Err(ServiceError::NotFound(format!(
                "no active session for student `{occupant_id}`"
            )));
        }
        let record = board.timer(occupant_id).cloned().ok_or_else(|| {
            ServiceError::Internal(format!("seated student `{occupant_id}` has no timer record"))
        })?;
        let student = {
            let roster = state.roster().read().await;
            roster.get(&occupant_id).cloned().ok_or_else(|| {
                ServiceError::Internal(format!("seated student `{occupant_id}` not in roster"))
            })?
        };

        let remaining = remaining_override.unwrap_or_else(|| record.remaining_at(now_ms));
        let entry = FinishedEntry {
            student,
            time_used_secs: time_used_secs(allowed_secs, remaining),
            finished_at_ms: now_ms,
        };
        let outcome = board.finish(entry.clone());
        (outcome, entry)
    };

    let finished = FinishedView::of(outcome.rank + 1, &entry, allowed_secs);
    sse_events::broadcast_session_finished(state, now_ms, outcome.slot_index, finished.clone());

    // Durable order matters for crash recovery: once the finished entry is
    // written the student can never be resurrected into a slot, whatever
    // else was lost.
    let slot_index = outcome.slot_index;
    spawn_persist(state, "session finish", async move {
        store.save_finished(entry.into()).await?;
        if let Some(index) = slot_index {
            let cleared = SlotRowEntity {
                index,
                occupant: None,
                updated_at_ms: now_ms,
            };
            store.save_slot(cleared).await?;
        }
        store.delete_timer(occupant_id).await
    });

    Ok(FinishSessionResponse {
        slot_index: outcome.slot_index,
        finished,
    })
}

/// Wipe the whole session: every slot, countdown and ranking entry, in the
/// store first and then in memory. The roster survives.
pub async fn reset(state: &SharedState) -> Result<ActionResponse, ServiceError> {
    let store = state.session_store().await.ok_or(ServiceError::Degraded)?;
    store.clear_session().await?;

    let snapshot = {
        let mut board = state.board().write().await;
        board.clear();
        let roster = state.roster().read().await;
        board_service::snapshot_of(
            &board,
            &roster,
            state.config(),
            state.is_degraded(),
            unix_now_ms(),
        )
    };
    sse_events::broadcast_session_reset(state, &snapshot);

    Ok(ActionResponse {
        message: "session reset".to_string(),
    })
}

/// Run a durable write in the background, downgrading failures to an admin
/// warning plus a flush marker the storage supervisor picks up later.
fn spawn_persist<F>(state: &SharedState, op: &'static str, write: F)
where
    F: Future<Output = StorageResult<()>> + Send + 'static,
{
    let state = state.clone();
    tokio::spawn(async move {
        if let Err(err) = write.await {
            warn!(error = %err, op, "durable write failed; board will be flushed on recovery");
            state.mark_flush_pending();
            sse_events::send_storage_warning(&state, &format!("could not persist {op}: {err}"));
        }
    });
}

#[cfg(test)]
mod tests {
    use std::fs;

    use indexmap::IndexMap;

    use super::*;
    use crate::{
        config::AppConfig,
        dao::session_store::file::{FileConfig, FileSessionStore},
        state::{AppState, board::Student},
    };

    const T0: u64 = 1_700_000_000_000;

    async fn state_with_roster(count: usize) -> (SharedState, std::path::PathBuf) {
        let state = AppState::new(AppConfig {
            slot_count: 4,
            default_time_secs: 3600,
        });

        let dir = std::env::temp_dir().join(format!("exam-timer-lifecycle-{}", Uuid::new_v4()));
        let store = FileSessionStore::open(FileConfig::new(&dir)).unwrap();
        state
            .install_session_store(std::sync::Arc::new(store), false)
            .await;

        let roster: IndexMap<Uuid, Student> = (0..count)
            .map(|n| {
                let student = Student {
                    id: Uuid::new_v4(),
                    name: format!("Student {n}"),
                    exam_number: format!("EX-{n:03}"),
                    photo_url: None,
                };
                (student.id, student)
            })
            .collect();
        state.set_roster(roster).await;

        (state, dir)
    }

    async fn roster_ids(state: &SharedState) -> Vec<Uuid> {
        state.roster().read().await.keys().copied().collect()
    }

    async fn waiting_count(state: &SharedState) -> usize {
        let board = state.board().read().await;
        let roster = state.roster().read().await;
        board.waiting_list(&roster, None).len()
    }

    #[tokio::test]
    async fn start_seats_a_paused_full_allowance_session() {
        let (state, dir) = state_with_roster(2).await;
        let ids = roster_ids(&state).await;

        let response = start_from_queue_at(&state, ids[0], T0).await.unwrap();
        assert_eq!(response.slot_index, 0);
        assert!(!response.timer.is_running);
        assert_eq!(response.timer.remaining_secs, 3600);
        assert_eq!(response.timer.base_remaining_secs, 3600);
        assert_eq!(waiting_count(&state).await, 1);

        let _ = fs::remove_dir_all(dir);
    }

    #[tokio::test]
    async fn fifth_start_fails_and_leaves_the_queue_alone() {
        let (state, dir) = state_with_roster(6).await;
        let ids = roster_ids(&state).await;

        for id in ids.iter().take(4) {
            start_from_queue_at(&state, *id, T0).await.unwrap();
        }
        assert_eq!(waiting_count(&state).await, 2);

        let err = start_from_queue_at(&state, ids[4], T0).await.unwrap_err();
        assert!(matches!(err, ServiceError::NoCapacity { capacity: 4 }));
        assert_eq!(waiting_count(&state).await, 2);

        let _ = fs::remove_dir_all(dir);
    }

    #[tokio::test]
    async fn start_rejects_students_outside_the_waiting_queue() {
        let (state, dir) = state_with_roster(2).await;
        let ids = roster_ids(&state).await;

        start_from_queue_at(&state, ids[0], T0).await.unwrap();
        let seated = start_from_queue_at(&state, ids[0], T0).await.unwrap_err();
        assert!(matches!(seated, ServiceError::NotWaiting { .. }));

        finish_at(&state, ids[0], None, T0 + 60_000).await.unwrap();
        let done = start_from_queue_at(&state, ids[0], T0 + 61_000)
            .await
            .unwrap_err();
        assert!(matches!(done, ServiceError::NotWaiting { .. }));

        let unknown = start_from_queue_at(&state, Uuid::new_v4(), T0)
            .await
            .unwrap_err();
        assert!(matches!(unknown, ServiceError::NotFound(_)));

        let _ = fs::remove_dir_all(dir);
    }

    #[tokio::test]
    async fn toggle_round_trip_freezes_the_live_remaining() {
        let (state, dir) = state_with_roster(1).await;
        let ids = roster_ids(&state).await;
        start_from_queue_at(&state, ids[0], T0).await.unwrap();

        let running = toggle_at(&state, ids[0], T0).await.unwrap();
        assert!(running.timer.is_running);
        assert_eq!(running.timer.started_at_ms, Some(T0));

        let paused = toggle_at(&state, ids[0], T0 + 90_000).await.unwrap();
        assert!(!paused.timer.is_running);
        assert_eq!(paused.timer.started_at_ms, None);
        assert_eq!(paused.timer.base_remaining_secs, 3510);
        assert_eq!(paused.timer.remaining_secs, 3510);

        let _ = fs::remove_dir_all(dir);
    }

    #[tokio::test]
    async fn toggle_requires_an_active_session() {
        let (state, dir) = state_with_roster(1).await;
        let ids = roster_ids(&state).await;
        let err = toggle_at(&state, ids[0], T0).await.unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));

        let _ = fs::remove_dir_all(dir);
    }

    #[tokio::test]
    async fn finish_records_overtime_and_clears_membership() {
        let (state, dir) = state_with_roster(1).await;
        let ids = roster_ids(&state).await;
        start_from_queue_at(&state, ids[0], T0).await.unwrap();

        let response = finish_at(&state, ids[0], Some(-30), T0 + 3_630_000)
            .await
            .unwrap();
        assert_eq!(response.slot_index, Some(0));
        assert_eq!(response.finished.time_used_secs, 3630);
        assert!(response.finished.overtime);
        assert_eq!(response.finished.rank, 1);

        let board = state.board().read().await;
        assert!(!board.is_seated(ids[0]));
        assert!(board.is_finished(ids[0]));
        assert!(board.timer(ids[0]).is_none());

        let _ = fs::remove_dir_all(dir);
    }

    #[tokio::test]
    async fn finish_requires_an_active_session() {
        let (state, dir) = state_with_roster(1).await;
        let ids = roster_ids(&state).await;
        let err = finish_at(&state, ids[0], None, T0).await.unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));

        let _ = fs::remove_dir_all(dir);
    }

    #[tokio::test]
    async fn reset_wipes_the_store_and_the_board_but_not_the_roster() {
        let (state, dir) = state_with_roster(3).await;
        let ids = roster_ids(&state).await;
        start_from_queue_at(&state, ids[0], T0).await.unwrap();
        finish_at(&state, ids[0], None, T0 + 10_000).await.unwrap();
        start_from_queue_at(&state, ids[1], T0 + 20_000).await.unwrap();

        reset(&state).await.unwrap();

        {
            let board = state.board().read().await;
            assert!(board.finished().is_empty());
            assert_eq!(board.first_empty().unwrap(), 0);
        }
        assert_eq!(waiting_count(&state).await, 3);

        let store = state.session_store().await.unwrap();
        assert!(store.list_slots().await.unwrap().is_empty());
        assert!(store.list_timers().await.unwrap().is_empty());
        assert!(store.list_finished().await.unwrap().is_empty());

        let _ = fs::remove_dir_all(dir);
    }

    #[tokio::test]
    async fn operations_without_a_store_report_degraded() {
        let state = AppState::new(AppConfig {
            slot_count: 4,
            default_time_secs: 3600,
        });
        let err = start_from_queue_at(&state, Uuid::new_v4(), T0)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Degraded));
    }
}
