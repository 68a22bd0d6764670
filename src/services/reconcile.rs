//! Row-level reconciliation between storage backends. When the preferred
//! CouchDB store comes (back) online the session may exist in two places:
//! whatever the local fallback accumulated, and whatever the remote last saw.
//! Rows are merged last-writer-wins on their stamps, finished entries are
//! unioned, and the result is rebuilt through the board's invariant repairs
//! before it becomes authoritative.

use std::{collections::HashMap, sync::Arc};

use tracing::warn;
use uuid::Uuid;

use crate::{
    dao::{session_store::SessionStore, storage::StorageResult},
    state::board::{HydrationRepair, SessionBoard, SessionRows, SlotRow},
    state::timer::TimerRecord,
};

/// Read every session row out of a store.
pub async fn load_rows(store: &Arc<dyn SessionStore>) -> StorageResult<SessionRows> {
    let slots = store
        .list_slots()
        .await?
        .into_iter()
        .map(SlotRow::from)
        .collect();
    let timers = store
        .list_timers()
        .await?
        .into_iter()
        .map(TimerRecord::from)
        .collect();
    let finished = store
        .list_finished()
        .await?
        .into_iter()
        .map(Into::into)
        .collect();
    Ok(SessionRows {
        slots,
        timers,
        finished,
    })
}

/// Write the authoritative rows into a store, removing timer records the
/// board no longer knows about. Slot rows cover every index, so stale
/// occupancies are overwritten rather than deleted.
pub async fn flush_rows(store: &Arc<dyn SessionStore>, rows: &SessionRows) -> StorageResult<()> {
    for slot in &rows.slots {
        store.save_slot(slot.clone().into()).await?;
    }

    let kept: Vec<Uuid> = rows.timers.iter().map(|record| record.occupant_id).collect();
    for stale in store.list_timers().await? {
        if !kept.contains(&stale.occupant_id) {
            store.delete_timer(stale.occupant_id).await?;
        }
    }
    for timer in &rows.timers {
        store.save_timer(timer.clone().into()).await?;
    }

    for entry in &rows.finished {
        store.save_finished(entry.clone().into()).await?;
    }
    Ok(())
}

/// Merge two row sets. Slot and timer rows resolve last-writer-wins on
/// `updated_at_ms`, the remote side winning exact ties; finished entries are
/// unioned by student, keeping the earlier close when both sides have one.
pub fn merge(local: SessionRows, remote: SessionRows) -> SessionRows {
    let mut slots: HashMap<usize, SlotRow> = HashMap::new();
    for row in local.slots {
        slots.insert(row.index, row);
    }
    for row in remote.slots {
        match slots.get(&row.index) {
            Some(existing) if existing.updated_at_ms > row.updated_at_ms => {}
            _ => {
                slots.insert(row.index, row);
            }
        }
    }
    let mut slots: Vec<SlotRow> = slots.into_values().collect();
    slots.sort_by_key(|row| row.index);

    let mut timers: HashMap<Uuid, TimerRecord> = HashMap::new();
    for record in local.timers {
        timers.insert(record.occupant_id, record);
    }
    for record in remote.timers {
        match timers.get(&record.occupant_id) {
            Some(existing) if existing.updated_at_ms > record.updated_at_ms => {}
            _ => {
                timers.insert(record.occupant_id, record);
            }
        }
    }

    let mut finished = local.finished;
    for entry in remote.finished {
        match finished
            .iter_mut()
            .find(|existing| existing.student.id == entry.student.id)
        {
            Some(existing) => {
                if entry.finished_at_ms < existing.finished_at_ms {
                    *existing = entry;
                }
            }
            None => finished.push(entry),
        }
    }
    finished.sort_by_key(|entry| (entry.time_used_secs, entry.finished_at_ms));

    SessionRows {
        slots,
        timers: timers.into_values().collect(),
        finished,
    }
}

/// Load a store's rows and rebuild a board from them, logging every repair.
pub async fn hydrate_board(
    store: &Arc<dyn SessionStore>,
    slot_count: usize,
    allowed_secs: i64,
    now_ms: u64,
) -> StorageResult<(SessionBoard, Vec<HydrationRepair>)> {
    let rows = load_rows(store).await?;
    let (board, repairs) = SessionBoard::rebuild(slot_count, allowed_secs, rows, now_ms);
    log_repairs(&repairs);
    Ok((board, repairs))
}

/// Surface applied invariant repairs in the log. Each one points at a crash
/// or a concurrent writer somewhere in the past.
pub fn log_repairs(repairs: &[HydrationRepair]) {
    for repair in repairs {
        match repair {
            HydrationRepair::DuplicateOccupant {
                student_id,
                kept_index,
                dropped_index,
            } => warn!(
                %student_id, kept_index, dropped_index,
                "student was seated twice; kept the lowest slot"
            ),
            HydrationRepair::FinishedStillSeated { student_id, index } => warn!(
                %student_id, index,
                "finished student still held a slot; cleared it"
            ),
            HydrationRepair::MissingTimer { student_id, index } => warn!(
                %student_id, index,
                "occupied slot had no timer record; synthesized a paused one"
            ),
            HydrationRepair::OrphanTimer { student_id } => warn!(
                %student_id,
                "timer record without a seat; dropped it"
            ),
            HydrationRepair::SlotOutOfRange { index } => warn!(
                index,
                "slot row outside the configured board; dropped it"
            ),
            HydrationRepair::TimerNormalized { student_id } => warn!(
                %student_id,
                "timer record violated the running invariant; paused it"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;
    use crate::{
        dao::session_store::file::{FileConfig, FileSessionStore},
        state::board::{FinishedEntry, Student},
    };

    const T0: u64 = 1_700_000_000_000;

    fn slot(index: usize, occupant: Option<Uuid>, updated_at_ms: u64) -> SlotRow {
        SlotRow {
            index,
            occupant,
            updated_at_ms,
        }
    }

    fn rows_with_slots(slots: Vec<SlotRow>) -> SessionRows {
        SessionRows {
            slots,
            timers: Vec::new(),
            finished: Vec::new(),
        }
    }

    fn entry(name: &str, time_used_secs: i64, finished_at_ms: u64) -> FinishedEntry {
        FinishedEntry {
            student: Student {
                id: Uuid::new_v4(),
                name: name.to_string(),
                exam_number: name.to_string(),
                photo_url: None,
            },
            time_used_secs,
            finished_at_ms,
        }
    }

    #[test]
    fn merge_resolves_slot_rows_by_stamp() {
        let newer_local = Uuid::new_v4();
        let newer_remote = Uuid::new_v4();
        let local = rows_with_slots(vec![
            slot(0, Some(newer_local), T0 + 5_000),
            slot(1, None, T0),
        ]);
        let remote = rows_with_slots(vec![
            slot(0, None, T0),
            slot(1, Some(newer_remote), T0 + 5_000),
        ]);

        let merged = merge(local, remote);
        assert_eq!(merged.slots[0].occupant, Some(newer_local));
        assert_eq!(merged.slots[1].occupant, Some(newer_remote));
    }

    #[test]
    fn merge_ties_favor_the_remote_row() {
        let local_occupant = Uuid::new_v4();
        let remote_occupant = Uuid::new_v4();
        let local = rows_with_slots(vec![slot(0, Some(local_occupant), T0)]);
        let remote = rows_with_slots(vec![slot(0, Some(remote_occupant), T0)]);

        let merged = merge(local, remote);
        assert_eq!(merged.slots[0].occupant, Some(remote_occupant));
    }

    #[test]
    fn merge_resolves_timers_by_stamp() {
        let occupant = Uuid::new_v4();
        let older = TimerRecord::fresh(occupant, 3600, T0);
        let newer = older.resumed(T0 + 10_000);

        let local = SessionRows {
            timers: vec![newer.clone()],
            ..SessionRows::default()
        };
        let remote = SessionRows {
            timers: vec![older],
            ..SessionRows::default()
        };

        let merged = merge(local, remote);
        assert_eq!(merged.timers, vec![newer]);
    }

    #[test]
    fn merge_unions_finished_and_keeps_the_earlier_close() {
        let shared = entry("Ayu", 900, T0 + 60_000);
        let mut shared_later = shared.clone();
        shared_later.finished_at_ms = T0 + 90_000;

        let local = SessionRows {
            finished: vec![shared.clone(), entry("Budi", 300, T0)],
            ..SessionRows::default()
        };
        let remote = SessionRows {
            finished: vec![shared_later, entry("Citra", 600, T0 + 1_000)],
            ..SessionRows::default()
        };

        let merged = merge(local, remote);
        assert_eq!(merged.finished.len(), 3);
        let ayu = merged
            .finished
            .iter()
            .find(|filed| filed.student.id == shared.student.id)
            .unwrap();
        assert_eq!(ayu.finished_at_ms, T0 + 60_000);

        let used: Vec<i64> = merged
            .finished
            .iter()
            .map(|filed| filed.time_used_secs)
            .collect();
        assert_eq!(used, vec![300, 600, 900]);
    }

    #[tokio::test]
    async fn flush_removes_timers_the_board_dropped() {
        let dir = std::env::temp_dir().join(format!("exam-timer-reconcile-{}", Uuid::new_v4()));
        let store: Arc<dyn SessionStore> =
            Arc::new(FileSessionStore::open(FileConfig::new(&dir)).unwrap());

        let gone = Uuid::new_v4();
        let kept = Uuid::new_v4();
        store
            .save_timer(TimerRecord::fresh(gone, 3600, T0).into())
            .await
            .unwrap();

        let rows = SessionRows {
            slots: vec![slot(0, Some(kept), T0 + 1_000)],
            timers: vec![TimerRecord::fresh(kept, 3600, T0 + 1_000)],
            finished: Vec::new(),
        };
        flush_rows(&store, &rows).await.unwrap();

        let stored = load_rows(&store).await.unwrap();
        assert_eq!(stored.timers.len(), 1);
        assert_eq!(stored.timers[0].occupant_id, kept);
        assert_eq!(stored.slots, rows.slots);

        let _ = fs::remove_dir_all(dir);
    }

    #[tokio::test]
    async fn hydrate_repairs_what_the_store_returns() {
        let dir = std::env::temp_dir().join(format!("exam-timer-hydrate-{}", Uuid::new_v4()));
        let store: Arc<dyn SessionStore> =
            Arc::new(FileSessionStore::open(FileConfig::new(&dir)).unwrap());

        let seated = Uuid::new_v4();
        store
            .save_slot(slot(1, Some(seated), T0).into())
            .await
            .unwrap();

        let (board, repairs) = hydrate_board(&store, 4, 3600, T0 + 1_000).await.unwrap();
        assert!(board.is_seated(seated));
        assert!(board.timer(seated).is_some());
        assert_eq!(
            repairs,
            vec![HydrationRepair::MissingTimer {
                student_id: seated,
                index: 1
            }]
        );

        let _ = fs::remove_dir_all(dir);
    }
}
