use std::collections::HashMap;

use indexmap::IndexMap;
use thiserror::Error;
use uuid::Uuid;

use crate::dao::models::{FinishedEntryEntity, SlotRowEntity, StudentEntity, TimerRecordEntity};
use crate::state::timer::TimerRecord;

/// Roster entry for one examinee. Immutable for the lifetime of a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Student {
    /// Stable identifier used everywhere else in the engine.
    pub id: Uuid,
    /// Display name.
    pub name: String,
    /// Exam number printed on the student's papers.
    pub exam_number: String,
    /// Optional portrait shown on the monitor displays.
    pub photo_url: Option<String>,
}

/// One of the fixed examination places.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotCell {
    /// Student currently seated here, if any.
    pub occupant: Option<Uuid>,
    /// Stamp of the last occupancy change, used for last-writer-wins.
    pub updated_at_ms: u64,
}

impl SlotCell {
    fn empty() -> Self {
        Self {
            occupant: None,
            updated_at_ms: 0,
        }
    }
}

/// A slot cell together with its position, as loaded from or written to a
/// store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotRow {
    /// Position of the cell on the board.
    pub index: usize,
    /// Student currently seated here, if any.
    pub occupant: Option<Uuid>,
    /// Stamp of the last occupancy change.
    pub updated_at_ms: u64,
}

/// Completed session, ranked by consumed time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinishedEntry {
    /// The examinee, embedded whole so the entry survives roster edits.
    pub student: Student,
    /// Seconds of allowance consumed; exceeds the allowance on overtime.
    pub time_used_secs: i64,
    /// Wall-clock instant (Unix ms) the session was closed.
    pub finished_at_ms: u64,
}

/// Errors raised by slot registry mutations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SlotError {
    /// Every slot is occupied; the caller keeps waiting.
    #[error("all {capacity} slots are occupied")]
    NoCapacity {
        /// Number of slots on the board.
        capacity: usize,
    },
    /// The targeted cell already has an occupant.
    #[error("slot {index} is already occupied")]
    SlotOccupied {
        /// Position of the occupied cell.
        index: usize,
    },
    /// The student is already seated somewhere on the board.
    #[error("student {student_id} is already seated in slot {index}")]
    DuplicateAssignment {
        /// Student that was about to be seated twice.
        student_id: Uuid,
        /// Slot the student already occupies.
        index: usize,
    },
    /// The targeted cell does not exist on this board.
    #[error("slot {index} does not exist")]
    UnknownSlot {
        /// Position that was requested.
        index: usize,
    },
}

/// Outcome of a last-writer-wins timer upsert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerWrite {
    /// The record was newer (or as new) and replaced the stored one.
    Applied,
    /// The record was older than the stored one and was dropped.
    IgnoredStale,
}

/// What a completed finish changed on the board.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinishOutcome {
    /// Slot freed by the finish, when the student was seated.
    pub slot_index: Option<usize>,
    /// Zero-based position of the new entry in the ranking.
    pub rank: usize,
}

/// Raw session rows as exchanged with a store, before invariant repair.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionRows {
    /// Slot occupancy rows.
    pub slots: Vec<SlotRow>,
    /// Timer records keyed by their occupant inside.
    pub timers: Vec<TimerRecord>,
    /// Completed sessions.
    pub finished: Vec<FinishedEntry>,
}

/// Inconsistency found while rebuilding a board from stored rows, with the
/// repair that was applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HydrationRepair {
    /// The same student appeared in two slots; the higher index was cleared.
    DuplicateOccupant {
        /// Student that was seated twice.
        student_id: Uuid,
        /// Slot kept.
        kept_index: usize,
        /// Slot cleared.
        dropped_index: usize,
    },
    /// A finished student still held a slot; the slot was cleared.
    FinishedStillSeated {
        /// Student already on the finished list.
        student_id: Uuid,
        /// Slot that was cleared.
        index: usize,
    },
    /// An occupied slot had no timer record; a paused full-allowance record
    /// was synthesized.
    MissingTimer {
        /// Student the record was synthesized for.
        student_id: Uuid,
        /// Slot the student occupies.
        index: usize,
    },
    /// A timer record referenced a student seated nowhere; it was dropped.
    OrphanTimer {
        /// Student the dropped record referenced.
        student_id: Uuid,
    },
    /// A slot row pointed past the configured board size and was dropped.
    SlotOutOfRange {
        /// Out-of-range position.
        index: usize,
    },
    /// A timer record violated the running/start coupling and was paused.
    TimerNormalized {
        /// Student whose record was normalized.
        student_id: Uuid,
    },
}

/// Authoritative in-memory session state: the slot registry, the timer
/// records of the occupants, and the ranked finished list.
///
/// The waiting list is never materialized here; it is derived by excluding
/// seated and finished students from the roster, which keeps the three sets
/// disjoint by construction.
#[derive(Debug, Clone)]
pub struct SessionBoard {
    slots: Vec<SlotCell>,
    timers: HashMap<Uuid, TimerRecord>,
    finished: Vec<FinishedEntry>,
}

impl SessionBoard {
    /// Build an empty board with the given number of slots.
    pub fn new(slot_count: usize) -> Self {
        Self {
            slots: vec![SlotCell::empty(); slot_count],
            timers: HashMap::new(),
            finished: Vec::new(),
        }
    }

    /// Number of slots on the board.
    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    /// Slot cells in board order.
    pub fn slots(&self) -> &[SlotCell] {
        &self.slots
    }

    /// Ranked finished list, ascending by consumed time.
    pub fn finished(&self) -> &[FinishedEntry] {
        &self.finished
    }

    /// Timer record of the given occupant, if seated.
    pub fn timer(&self, occupant_id: Uuid) -> Option<&TimerRecord> {
        self.timers.get(&occupant_id)
    }

    /// Position of the slot the student occupies, if any.
    pub fn slot_of(&self, student_id: Uuid) -> Option<usize> {
        self.slots
            .iter()
            .position(|cell| cell.occupant == Some(student_id))
    }

    /// Whether the student currently occupies a slot.
    pub fn is_seated(&self, student_id: Uuid) -> bool {
        self.slot_of(student_id).is_some()
    }

    /// Whether the student already completed a session.
    pub fn is_finished(&self, student_id: Uuid) -> bool {
        self.finished
            .iter()
            .any(|entry| entry.student.id == student_id)
    }

    /// Lowest empty slot position.
    pub fn first_empty(&self) -> Result<usize, SlotError> {
        self.slots
            .iter()
            .position(|cell| cell.occupant.is_none())
            .ok_or(SlotError::NoCapacity {
                capacity: self.slots.len(),
            })
    }

    /// Seat a student in the given cell.
    pub fn assign(&mut self, index: usize, student_id: Uuid, now_ms: u64) -> Result<(), SlotError> {
        if let Some(existing) = self.slot_of(student_id) {
            return Err(SlotError::DuplicateAssignment {
                student_id,
                index: existing,
            });
        }
        let cell = self
            .slots
            .get_mut(index)
            .ok_or(SlotError::UnknownSlot { index })?;
        if cell.occupant.is_some() {
            return Err(SlotError::SlotOccupied { index });
        }
        *cell = SlotCell {
            occupant: Some(student_id),
            updated_at_ms: now_ms,
        };
        Ok(())
    }

    /// Seat a student in the lowest empty slot, returning its position.
    pub fn seat(&mut self, student_id: Uuid, now_ms: u64) -> Result<usize, SlotError> {
        if let Some(index) = self.slot_of(student_id) {
            return Err(SlotError::DuplicateAssignment { student_id, index });
        }
        let index = self.first_empty()?;
        self.assign(index, student_id, now_ms)?;
        Ok(index)
    }

    /// Free the slot the student occupies. A no-op when the student is not
    /// seated, so repeated releases converge.
    pub fn release(&mut self, student_id: Uuid, now_ms: u64) -> Option<usize> {
        let index = self.slot_of(student_id)?;
        self.slots[index] = SlotCell {
            occupant: None,
            updated_at_ms: now_ms,
        };
        Some(index)
    }

    /// Store a timer record, validating its shape and applying
    /// last-writer-wins against any record already held for the occupant.
    pub fn upsert_timer(
        &mut self,
        record: TimerRecord,
    ) -> Result<TimerWrite, crate::state::timer::TimerStateError> {
        record.validate()?;
        if let Some(existing) = self.timers.get(&record.occupant_id)
            && existing.updated_at_ms > record.updated_at_ms
        {
            return Ok(TimerWrite::IgnoredStale);
        }
        self.timers.insert(record.occupant_id, record);
        Ok(TimerWrite::Applied)
    }

    /// Drop the timer record of the given occupant, if present.
    pub fn remove_timer(&mut self, occupant_id: Uuid) -> Option<TimerRecord> {
        self.timers.remove(&occupant_id)
    }

    /// Close a session in one step: free the slot, drop the timer, and file
    /// the entry into the ranking.
    ///
    /// Callers hold the board lock across this call, so no observer can see
    /// the slot freed without the entry filed.
    pub fn finish(&mut self, entry: FinishedEntry) -> FinishOutcome {
        let slot_index = self.release(entry.student.id, entry.finished_at_ms);
        self.timers.remove(&entry.student.id);
        let rank = self
            .finished
            .partition_point(|filed| filed.time_used_secs <= entry.time_used_secs);
        self.finished.insert(rank, entry);
        FinishOutcome { slot_index, rank }
    }

    /// Wipe slots, timers and the finished list. The roster is not touched.
    pub fn clear(&mut self) {
        let slot_count = self.slots.len();
        self.slots = vec![SlotCell::empty(); slot_count];
        self.timers.clear();
        self.finished.clear();
    }

    /// Students neither seated nor finished, in roster order, optionally
    /// filtered by a case-insensitive substring of name or exam number.
    pub fn waiting_list<'a>(
        &self,
        roster: &'a IndexMap<Uuid, Student>,
        filter: Option<&str>,
    ) -> Vec<&'a Student> {
        let needle = filter
            .map(str::trim)
            .filter(|text| !text.is_empty())
            .map(str::to_lowercase);
        roster
            .values()
            .filter(|student| !self.is_seated(student.id) && !self.is_finished(student.id))
            .filter(|student| match &needle {
                Some(needle) => {
                    student.name.to_lowercase().contains(needle)
                        || student.exam_number.to_lowercase().contains(needle)
                }
                None => true,
            })
            .collect()
    }

    /// Export the board as store rows. Empty cells are included so occupancy
    /// clears propagate to the store.
    pub fn snapshot_rows(&self) -> SessionRows {
        SessionRows {
            slots: self
                .slots
                .iter()
                .enumerate()
                .map(|(index, cell)| SlotRow {
                    index,
                    occupant: cell.occupant,
                    updated_at_ms: cell.updated_at_ms,
                })
                .collect(),
            timers: self.timers.values().cloned().collect(),
            finished: self.finished.clone(),
        }
    }

    /// Rebuild a board from stored rows, repairing every inconsistency a
    /// crash between the ordered durable writes can leave behind.
    ///
    /// Repairs applied, in order: out-of-range slot rows are dropped, a
    /// student seated twice keeps the lowest slot, a finished student beats
    /// a stale slot row, malformed timer records are paused, records without
    /// a seat are dropped, and seats without a record get a paused
    /// full-allowance one.
    pub fn rebuild(
        slot_count: usize,
        allowed_secs: i64,
        rows: SessionRows,
        now_ms: u64,
    ) -> (Self, Vec<HydrationRepair>) {
        let mut repairs = Vec::new();
        let mut board = Self::new(slot_count);

        board.finished = rows.finished;
        board
            .finished
            .sort_by_key(|entry| (entry.time_used_secs, entry.finished_at_ms));

        for row in rows.slots {
            let Some(cell) = board.slots.get_mut(row.index) else {
                repairs.push(HydrationRepair::SlotOutOfRange { index: row.index });
                continue;
            };
            *cell = SlotCell {
                occupant: row.occupant,
                updated_at_ms: row.updated_at_ms,
            };
        }

        let mut seen: HashMap<Uuid, usize> = HashMap::new();
        for index in 0..board.slots.len() {
            let Some(student_id) = board.slots[index].occupant else {
                continue;
            };
            if let Some(&kept_index) = seen.get(&student_id) {
                board.slots[index].occupant = None;
                repairs.push(HydrationRepair::DuplicateOccupant {
                    student_id,
                    kept_index,
                    dropped_index: index,
                });
                continue;
            }
            if board.is_finished(student_id) {
                board.slots[index].occupant = None;
                repairs.push(HydrationRepair::FinishedStillSeated { student_id, index });
                continue;
            }
            seen.insert(student_id, index);
        }

        for mut record in rows.timers {
            if record.validate().is_err() {
                record = record.paused(record.updated_at_ms);
                repairs.push(HydrationRepair::TimerNormalized {
                    student_id: record.occupant_id,
                });
            }
            if !seen.contains_key(&record.occupant_id) {
                repairs.push(HydrationRepair::OrphanTimer {
                    student_id: record.occupant_id,
                });
                continue;
            }
            board.timers.insert(record.occupant_id, record);
        }

        for (&student_id, &index) in &seen {
            if !board.timers.contains_key(&student_id) {
                board
                    .timers
                    .insert(student_id, TimerRecord::fresh(student_id, allowed_secs, now_ms));
                repairs.push(HydrationRepair::MissingTimer { student_id, index });
            }
        }

        (board, repairs)
    }
}

impl From<StudentEntity> for Student {
    fn from(value: StudentEntity) -> Self {
        Self {
            id: value.id,
            name: value.name,
            exam_number: value.exam_number,
            photo_url: value.photo_url,
        }
    }
}

impl From<Student> for StudentEntity {
    fn from(value: Student) -> Self {
        Self {
            id: value.id,
            name: value.name,
            exam_number: value.exam_number,
            photo_url: value.photo_url,
        }
    }
}

impl From<SlotRowEntity> for SlotRow {
    fn from(value: SlotRowEntity) -> Self {
        Self {
            index: value.index,
            occupant: value.occupant,
            updated_at_ms: value.updated_at_ms,
        }
    }
}

impl From<SlotRow> for SlotRowEntity {
    fn from(value: SlotRow) -> Self {
        Self {
            index: value.index,
            occupant: value.occupant,
            updated_at_ms: value.updated_at_ms,
        }
    }
}

impl From<TimerRecordEntity> for TimerRecord {
    fn from(value: TimerRecordEntity) -> Self {
        Self {
            occupant_id: value.occupant_id,
            is_running: value.is_running,
            started_at_ms: value.started_at_ms,
            base_remaining_secs: value.base_remaining_secs,
            updated_at_ms: value.updated_at_ms,
        }
    }
}

impl From<TimerRecord> for TimerRecordEntity {
    fn from(value: TimerRecord) -> Self {
        Self {
            occupant_id: value.occupant_id,
            is_running: value.is_running,
            started_at_ms: value.started_at_ms,
            base_remaining_secs: value.base_remaining_secs,
            updated_at_ms: value.updated_at_ms,
        }
    }
}

impl From<FinishedEntryEntity> for FinishedEntry {
    fn from(value: FinishedEntryEntity) -> Self {
        Self {
            student: value.student.into(),
            time_used_secs: value.time_used_secs,
            finished_at_ms: value.finished_at_ms,
        }
    }
}

impl From<FinishedEntry> for FinishedEntryEntity {
    fn from(value: FinishedEntry) -> Self {
        Self {
            student: value.student.into(),
            time_used_secs: value.time_used_secs,
            finished_at_ms: value.finished_at_ms,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::timer::time_used_secs;

    const T0: u64 = 1_700_000_000_000;

    fn student(name: &str, exam_number: &str) -> Student {
        Student {
            id: Uuid::new_v4(),
            name: name.to_string(),
            exam_number: exam_number.to_string(),
            photo_url: None,
        }
    }

    fn roster_of(students: &[Student]) -> IndexMap<Uuid, Student> {
        students
            .iter()
            .map(|student| (student.id, student.clone()))
            .collect()
    }

    fn entry(student: Student, time_used_secs: i64, finished_at_ms: u64) -> FinishedEntry {
        FinishedEntry {
            student,
            time_used_secs,
            finished_at_ms,
        }
    }

    fn assert_disjoint(board: &SessionBoard, roster: &IndexMap<Uuid, Student>) {
        let waiting = board.waiting_list(roster, None);
        for student in roster.values() {
            let seated = board.is_seated(student.id) as u8;
            let finished = board.is_finished(student.id) as u8;
            let waiting = waiting.iter().any(|w| w.id == student.id) as u8;
            assert_eq!(
                seated + finished + waiting,
                1,
                "student {} is in {} sets",
                student.name,
                seated + finished + waiting
            );
        }
    }

    #[test]
    fn seat_fills_the_lowest_empty_slot() {
        let mut board = SessionBoard::new(4);
        let first = Uuid::new_v4();
        let second = Uuid::new_v4();
        assert_eq!(board.seat(first, T0).unwrap(), 0);
        assert_eq!(board.seat(second, T0).unwrap(), 1);
        board.release(first, T0 + 1_000);
        assert_eq!(board.seat(Uuid::new_v4(), T0 + 2_000).unwrap(), 0);
    }

    #[test]
    fn full_board_rejects_with_no_capacity() {
        let mut board = SessionBoard::new(2);
        board.seat(Uuid::new_v4(), T0).unwrap();
        board.seat(Uuid::new_v4(), T0).unwrap();
        assert_eq!(
            board.seat(Uuid::new_v4(), T0),
            Err(SlotError::NoCapacity { capacity: 2 })
        );
    }

    #[test]
    fn seating_a_seated_student_is_rejected() {
        let mut board = SessionBoard::new(4);
        let id = Uuid::new_v4();
        board.seat(id, T0).unwrap();
        assert_eq!(
            board.seat(id, T0),
            Err(SlotError::DuplicateAssignment {
                student_id: id,
                index: 0
            })
        );
    }

    #[test]
    fn assign_guards_occupied_and_unknown_cells() {
        let mut board = SessionBoard::new(2);
        let id = Uuid::new_v4();
        board.assign(1, id, T0).unwrap();
        assert_eq!(
            board.assign(1, Uuid::new_v4(), T0),
            Err(SlotError::SlotOccupied { index: 1 })
        );
        assert_eq!(
            board.assign(5, Uuid::new_v4(), T0),
            Err(SlotError::UnknownSlot { index: 5 })
        );
    }

    #[test]
    fn release_is_idempotent() {
        let mut board = SessionBoard::new(4);
        let id = Uuid::new_v4();
        board.seat(id, T0).unwrap();
        assert_eq!(board.release(id, T0 + 1_000), Some(0));
        assert_eq!(board.release(id, T0 + 2_000), None);
        assert_eq!(board.release(Uuid::new_v4(), T0), None);
    }

    #[test]
    fn stale_timer_writes_are_ignored() {
        let mut board = SessionBoard::new(4);
        let id = Uuid::new_v4();
        board.seat(id, T0).unwrap();

        let fresh = TimerRecord::fresh(id, 3600, T0 + 10_000);
        assert_eq!(board.upsert_timer(fresh.clone()).unwrap(), TimerWrite::Applied);

        let stale = TimerRecord::fresh(id, 1800, T0 + 5_000);
        assert_eq!(
            board.upsert_timer(stale).unwrap(),
            TimerWrite::IgnoredStale
        );
        assert_eq!(board.timer(id), Some(&fresh));

        let newer = fresh.resumed(T0 + 20_000);
        assert_eq!(board.upsert_timer(newer.clone()).unwrap(), TimerWrite::Applied);
        assert_eq!(board.timer(id), Some(&newer));
    }

    #[test]
    fn malformed_timer_records_are_rejected() {
        let mut board = SessionBoard::new(4);
        let mut record = TimerRecord::fresh(Uuid::new_v4(), 3600, T0);
        record.is_running = true;
        assert!(board.upsert_timer(record).is_err());
    }

    #[test]
    fn finish_clears_membership_and_files_the_entry_in_one_step() {
        let students = [student("Ayu", "EX-001"), student("Budi", "EX-002")];
        let roster = roster_of(&students);
        let mut board = SessionBoard::new(4);
        board.seat(students[0].id, T0).unwrap();
        board
            .upsert_timer(TimerRecord::fresh(students[0].id, 3600, T0))
            .unwrap();

        let outcome = board.finish(entry(students[0].clone(), 90, T0 + 90_000));
        assert_eq!(outcome.slot_index, Some(0));
        assert_eq!(outcome.rank, 0);
        assert!(!board.is_seated(students[0].id));
        assert!(board.is_finished(students[0].id));
        assert!(board.timer(students[0].id).is_none());
        assert_disjoint(&board, &roster);
    }

    #[test]
    fn finished_list_stays_sorted_through_inserts() {
        let mut board = SessionBoard::new(4);
        board.finish(entry(student("A", "1"), 300, T0));
        board.finish(entry(student("B", "2"), 100, T0 + 1_000));
        board.finish(entry(student("C", "3"), 200, T0 + 2_000));
        let outcome = board.finish(entry(student("D", "4"), 200, T0 + 3_000));

        let used: Vec<i64> = board
            .finished()
            .iter()
            .map(|entry| entry.time_used_secs)
            .collect();
        assert_eq!(used, vec![100, 200, 200, 300]);
        // Ties keep arrival order, so the later 200 files behind the earlier.
        assert_eq!(outcome.rank, 2);
        assert_eq!(board.finished()[1].student.name, "C");
        assert_eq!(board.finished()[2].student.name, "D");
    }

    #[test]
    fn overtime_finish_ranks_beyond_the_allowance() {
        let mut board = SessionBoard::new(4);
        let used = time_used_secs(3600, -30);
        board.finish(entry(student("Late", "9"), used, T0));
        assert_eq!(board.finished()[0].time_used_secs, 3630);
    }

    #[test]
    fn waiting_list_excludes_seated_and_finished() {
        let students = [
            student("Ayu Lestari", "EX-001"),
            student("Budi Santoso", "EX-002"),
            student("Citra Dewi", "EX-003"),
        ];
        let roster = roster_of(&students);
        let mut board = SessionBoard::new(4);
        board.seat(students[0].id, T0).unwrap();
        board.finish(entry(students[1].clone(), 120, T0));

        let waiting = board.waiting_list(&roster, None);
        assert_eq!(waiting.len(), 1);
        assert_eq!(waiting[0].id, students[2].id);
        assert_disjoint(&board, &roster);
    }

    #[test]
    fn waiting_list_filter_matches_name_or_exam_number() {
        let students = [
            student("Ayu Lestari", "EX-001"),
            student("Budi Santoso", "EX-002"),
            student("Citra Dewi", "CD-100"),
        ];
        let roster = roster_of(&students);
        let board = SessionBoard::new(4);

        let by_name = board.waiting_list(&roster, Some("LESTARI"));
        assert_eq!(by_name.len(), 1);
        assert_eq!(by_name[0].name, "Ayu Lestari");

        let by_number = board.waiting_list(&roster, Some("ex-00"));
        assert_eq!(by_number.len(), 2);

        let blank = board.waiting_list(&roster, Some("   "));
        assert_eq!(blank.len(), 3);
    }

    #[test]
    fn membership_stays_disjoint_across_a_session_sequence() {
        let students: Vec<Student> = (0..6)
            .map(|n| student(&format!("Student {n}"), &format!("EX-{n:03}")))
            .collect();
        let roster = roster_of(&students);
        let mut board = SessionBoard::new(4);

        for student in students.iter().take(4) {
            board.seat(student.id, T0).unwrap();
            board
                .upsert_timer(TimerRecord::fresh(student.id, 3600, T0))
                .unwrap();
            assert_disjoint(&board, &roster);
        }
        assert!(matches!(
            board.seat(students[4].id, T0),
            Err(SlotError::NoCapacity { .. })
        ));
        assert_disjoint(&board, &roster);

        board.finish(entry(students[1].clone(), 400, T0 + 400_000));
        assert_disjoint(&board, &roster);

        board.seat(students[4].id, T0 + 401_000).unwrap();
        assert_disjoint(&board, &roster);
    }

    #[test]
    fn clear_resets_the_session_but_keeps_the_roster_untouched() {
        let students = [student("Ayu", "EX-001")];
        let roster = roster_of(&students);
        let mut board = SessionBoard::new(4);
        board.seat(students[0].id, T0).unwrap();
        board.clear();
        assert_eq!(board.first_empty().unwrap(), 0);
        assert!(board.finished().is_empty());
        assert_eq!(board.waiting_list(&roster, None).len(), 1);
    }

    #[test]
    fn rebuild_round_trips_a_healthy_snapshot() {
        let mut board = SessionBoard::new(4);
        let seated = student("Ayu", "EX-001");
        let done = student("Budi", "EX-002");
        board.seat(seated.id, T0).unwrap();
        board
            .upsert_timer(TimerRecord::fresh(seated.id, 3600, T0).resumed(T0 + 1_000))
            .unwrap();
        board.finish(entry(done, 250, T0 + 2_000));

        let rows = board.snapshot_rows();
        let (rebuilt, repairs) = SessionBoard::rebuild(4, 3600, rows, T0 + 3_000);
        assert!(repairs.is_empty());
        assert_eq!(rebuilt.slot_of(seated.id), Some(0));
        assert_eq!(rebuilt.timer(seated.id), board.timer(seated.id));
        assert_eq!(rebuilt.finished(), board.finished());
    }

    #[test]
    fn rebuild_prefers_the_finished_list_over_a_stale_slot_row() {
        let done = student("Ayu", "EX-001");
        let rows = SessionRows {
            slots: vec![SlotRow {
                index: 0,
                occupant: Some(done.id),
                updated_at_ms: T0,
            }],
            timers: vec![TimerRecord::fresh(done.id, 3600, T0)],
            finished: vec![entry(done.clone(), 90, T0 + 90_000)],
        };

        let (board, repairs) = SessionBoard::rebuild(4, 3600, rows, T0 + 100_000);
        assert!(!board.is_seated(done.id));
        assert!(board.is_finished(done.id));
        assert!(board.timer(done.id).is_none());
        assert!(repairs
            .iter()
            .any(|repair| matches!(repair, HydrationRepair::FinishedStillSeated { .. })));
        assert!(repairs
            .iter()
            .any(|repair| matches!(repair, HydrationRepair::OrphanTimer { .. })));
    }

    #[test]
    fn rebuild_synthesizes_a_paused_record_for_a_bare_seat() {
        let seated = student("Ayu", "EX-001");
        let rows = SessionRows {
            slots: vec![SlotRow {
                index: 2,
                occupant: Some(seated.id),
                updated_at_ms: T0,
            }],
            timers: Vec::new(),
            finished: Vec::new(),
        };

        let (board, repairs) = SessionBoard::rebuild(4, 3600, rows, T0 + 1_000);
        let record = board.timer(seated.id).unwrap();
        assert!(!record.is_running);
        assert_eq!(record.base_remaining_secs, 3600);
        assert_eq!(
            repairs,
            vec![HydrationRepair::MissingTimer {
                student_id: seated.id,
                index: 2
            }]
        );
    }

    #[test]
    fn rebuild_keeps_the_lowest_slot_for_a_duplicated_occupant() {
        let seated = student("Ayu", "EX-001");
        let rows = SessionRows {
            slots: vec![
                SlotRow {
                    index: 3,
                    occupant: Some(seated.id),
                    updated_at_ms: T0,
                },
                SlotRow {
                    index: 1,
                    occupant: Some(seated.id),
                    updated_at_ms: T0,
                },
            ],
            timers: vec![TimerRecord::fresh(seated.id, 3600, T0)],
            finished: Vec::new(),
        };

        let (board, repairs) = SessionBoard::rebuild(4, 3600, rows, T0 + 1_000);
        assert_eq!(board.slot_of(seated.id), Some(1));
        assert_eq!(
            repairs,
            vec![HydrationRepair::DuplicateOccupant {
                student_id: seated.id,
                kept_index: 1,
                dropped_index: 3
            }]
        );
    }

    #[test]
    fn rebuild_drops_rows_outside_the_configured_board() {
        let rows = SessionRows {
            slots: vec![SlotRow {
                index: 7,
                occupant: Some(Uuid::new_v4()),
                updated_at_ms: T0,
            }],
            timers: Vec::new(),
            finished: Vec::new(),
        };
        let (board, repairs) = SessionBoard::rebuild(4, 3600, rows, T0);
        assert_eq!(board.first_empty().unwrap(), 0);
        assert_eq!(repairs, vec![HydrationRepair::SlotOutOfRange { index: 7 }]);
    }

    #[test]
    fn rebuild_pauses_a_malformed_running_record() {
        let seated = student("Ayu", "EX-001");
        let mut record = TimerRecord::fresh(seated.id, 3600, T0);
        record.is_running = true;
        let rows = SessionRows {
            slots: vec![SlotRow {
                index: 0,
                occupant: Some(seated.id),
                updated_at_ms: T0,
            }],
            timers: vec![record],
            finished: Vec::new(),
        };

        let (board, repairs) = SessionBoard::rebuild(4, 3600, rows, T0 + 1_000);
        let record = board.timer(seated.id).unwrap();
        record.validate().unwrap();
        assert!(!record.is_running);
        assert!(repairs
            .iter()
            .any(|repair| matches!(repair, HydrationRepair::TimerNormalized { .. })));
    }
}
