use std::{
    fs, io,
    path::PathBuf,
    sync::{Arc, Mutex},
};

use futures::future::BoxFuture;
use uuid::Uuid;

use crate::dao::{
    models::{FinishedEntryEntity, SlotRowEntity, StudentEntity, TimerRecordEntity},
    session_store::SessionStore,
    storage::StorageResult,
};

use super::{
    config::FileConfig,
    error::{FileDaoError, FileResult},
    models::{ROSTER_FILE, SNAPSHOT_FILE, SessionSnapshot},
};

/// Session store backed by JSON files in a local directory.
///
/// This is the always-available fallback: the whole session state lives in
/// one snapshot document, rewritten atomically on every change, while the
/// roster is a read-only file dropped in place by whoever provisions the
/// exam. A cached copy of the snapshot avoids re-reading the file on the
/// hot path; the process is the only writer.
#[derive(Clone)]
pub struct FileSessionStore {
    data_dir: Arc<PathBuf>,
    snapshot: Arc<Mutex<SessionSnapshot>>,
}

impl FileSessionStore {
    /// Open the store, creating the data directory and loading any existing
    /// snapshot.
    pub fn open(config: FileConfig) -> FileResult<Self> {
        fs::create_dir_all(&config.data_dir).map_err(|source| FileDaoError::Io {
            path: config.data_dir.clone(),
            source,
        })?;

        let snapshot_path = config.data_dir.join(SNAPSHOT_FILE);
        let snapshot = match fs::read(&snapshot_path) {
            Ok(bytes) => {
                serde_json::from_slice(&bytes).map_err(|source| FileDaoError::Parse {
                    path: snapshot_path.clone(),
                    source,
                })?
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => SessionSnapshot::default(),
            Err(source) => {
                return Err(FileDaoError::Io {
                    path: snapshot_path,
                    source,
                });
            }
        };

        Ok(Self {
            data_dir: Arc::new(config.data_dir),
            snapshot: Arc::new(Mutex::new(snapshot)),
        })
    }

    fn snapshot_path(&self) -> PathBuf {
        self.data_dir.join(SNAPSHOT_FILE)
    }

    fn roster_path(&self) -> PathBuf {
        self.data_dir.join(ROSTER_FILE)
    }

    /// Apply a change to the cached snapshot and persist it atomically
    /// (temp file, then rename over the live one).
    fn mutate<F>(&self, apply: F) -> FileResult<()>
    where
        F: FnOnce(&mut SessionSnapshot),
    {
        let mut guard = self
            .snapshot
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        apply(&mut guard);

        let bytes = serde_json::to_vec_pretty(&*guard)
            .map_err(|source| FileDaoError::Serialize { source })?;
        let path = self.snapshot_path();
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, &bytes).map_err(|source| FileDaoError::Io {
            path: tmp.clone(),
            source,
        })?;
        fs::rename(&tmp, &path).map_err(|source| FileDaoError::Io { path, source })
    }

    fn read_snapshot(&self) -> SessionSnapshot {
        self.snapshot
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    fn load_roster(&self) -> FileResult<Vec<StudentEntity>> {
        let path = self.roster_path();
        match fs::read(&path) {
            Ok(bytes) => {
                serde_json::from_slice(&bytes).map_err(|source| FileDaoError::Parse { path, source })
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(source) => Err(FileDaoError::Io { path, source }),
        }
    }
}

impl SessionStore for FileSessionStore {
    fn list_students(&self) -> BoxFuture<'static, StorageResult<Vec<StudentEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.load_roster().map_err(Into::into) })
    }

    fn save_slot(&self, slot: SlotRowEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .mutate(|snapshot| {
                    match snapshot
                        .active_slots
                        .iter_mut()
                        .find(|row| row.index == slot.index)
                    {
                        Some(row) => *row = slot,
                        None => snapshot.active_slots.push(slot),
                    }
                    snapshot.active_slots.sort_by_key(|row| row.index);
                })
                .map_err(Into::into)
        })
    }

    fn list_slots(&self) -> BoxFuture<'static, StorageResult<Vec<SlotRowEntity>>> {
        let store = self.clone();
        Box::pin(async move { Ok(store.read_snapshot().active_slots) })
    }

    fn save_timer(&self, timer: TimerRecordEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .mutate(|snapshot| {
                    match snapshot
                        .timer_states
                        .iter_mut()
                        .find(|record| record.occupant_id == timer.occupant_id)
                    {
                        Some(record) => *record = timer,
                        None => snapshot.timer_states.push(timer),
                    }
                })
                .map_err(Into::into)
        })
    }

    fn delete_timer(&self, occupant_id: Uuid) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .mutate(|snapshot| {
                    snapshot
                        .timer_states
                        .retain(|record| record.occupant_id != occupant_id);
                })
                .map_err(Into::into)
        })
    }

    fn list_timers(&self) -> BoxFuture<'static, StorageResult<Vec<TimerRecordEntity>>> {
        let store = self.clone();
        Box::pin(async move { Ok(store.read_snapshot().timer_states) })
    }

    fn save_finished(&self, entry: FinishedEntryEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .mutate(|snapshot| {
                    match snapshot
                        .finished_students
                        .iter_mut()
                        .find(|filed| filed.student.id == entry.student.id)
                    {
                        Some(filed) => *filed = entry,
                        None => snapshot.finished_students.push(entry),
                    }
                    snapshot
                        .finished_students
                        .sort_by_key(|filed| (filed.time_used_secs, filed.finished_at_ms));
                })
                .map_err(Into::into)
        })
    }

    fn list_finished(&self) -> BoxFuture<'static, StorageResult<Vec<FinishedEntryEntity>>> {
        let store = self.clone();
        Box::pin(async move { Ok(store.read_snapshot().finished_students) })
    }

    fn clear_session(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .mutate(|snapshot| *snapshot = SessionSnapshot::default())
                .map_err(Into::into)
        })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            fs::metadata(&*store.data_dir)
                .map(|_| ())
                .map_err(|source| {
                    FileDaoError::Io {
                        path: (*store.data_dir).clone(),
                        source,
                    }
                    .into()
                })
        })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            fs::create_dir_all(&*store.data_dir)
                .map_err(|source| {
                    FileDaoError::Io {
                        path: (*store.data_dir).clone(),
                        source,
                    }
                    .into()
                })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_store() -> (FileSessionStore, PathBuf) {
        let dir = std::env::temp_dir().join(format!("exam-timer-file-store-{}", Uuid::new_v4()));
        let store = FileSessionStore::open(FileConfig::new(&dir)).unwrap();
        (store, dir)
    }

    fn slot_row(index: usize, occupant: Option<Uuid>) -> SlotRowEntity {
        SlotRowEntity {
            index,
            occupant,
            updated_at_ms: 1_700_000_000_000,
        }
    }

    #[tokio::test]
    async fn snapshot_survives_a_reopen() {
        let (store, dir) = scratch_store();
        let occupant = Uuid::new_v4();
        store.save_slot(slot_row(0, Some(occupant))).await.unwrap();
        store
            .save_timer(TimerRecordEntity {
                occupant_id: occupant,
                is_running: false,
                started_at_ms: None,
                base_remaining_secs: 3600,
                updated_at_ms: 1_700_000_000_000,
            })
            .await
            .unwrap();
        drop(store);

        let reopened = FileSessionStore::open(FileConfig::new(&dir)).unwrap();
        let slots = reopened.list_slots().await.unwrap();
        let timers = reopened.list_timers().await.unwrap();
        assert_eq!(slots, vec![slot_row(0, Some(occupant))]);
        assert_eq!(timers.len(), 1);
        assert_eq!(timers[0].occupant_id, occupant);

        fs::remove_dir_all(dir).unwrap();
    }

    #[tokio::test]
    async fn save_slot_replaces_the_row_for_its_index() {
        let (store, dir) = scratch_store();
        store.save_slot(slot_row(1, Some(Uuid::new_v4()))).await.unwrap();
        store.save_slot(slot_row(1, None)).await.unwrap();

        let slots = store.list_slots().await.unwrap();
        assert_eq!(slots.len(), 1);
        assert_eq!(slots[0].occupant, None);

        fs::remove_dir_all(dir).unwrap();
    }

    #[tokio::test]
    async fn delete_timer_is_idempotent() {
        let (store, dir) = scratch_store();
        let occupant = Uuid::new_v4();
        store
            .save_timer(TimerRecordEntity {
                occupant_id: occupant,
                is_running: false,
                started_at_ms: None,
                base_remaining_secs: 600,
                updated_at_ms: 1,
            })
            .await
            .unwrap();

        store.delete_timer(occupant).await.unwrap();
        store.delete_timer(occupant).await.unwrap();
        assert!(store.list_timers().await.unwrap().is_empty());

        fs::remove_dir_all(dir).unwrap();
    }

    #[tokio::test]
    async fn clear_session_empties_the_snapshot() {
        let (store, dir) = scratch_store();
        store.save_slot(slot_row(0, Some(Uuid::new_v4()))).await.unwrap();
        store.clear_session().await.unwrap();

        assert!(store.list_slots().await.unwrap().is_empty());
        assert!(store.list_timers().await.unwrap().is_empty());
        assert!(store.list_finished().await.unwrap().is_empty());

        let reopened = FileSessionStore::open(FileConfig::new(&dir)).unwrap();
        assert!(reopened.list_slots().await.unwrap().is_empty());

        fs::remove_dir_all(dir).unwrap();
    }

    #[tokio::test]
    async fn roster_reads_as_empty_until_provisioned() {
        let (store, dir) = scratch_store();
        assert!(store.list_students().await.unwrap().is_empty());

        let roster = vec![StudentEntity {
            id: Uuid::new_v4(),
            name: "Ayu Lestari".to_string(),
            exam_number: "EX-001".to_string(),
            photo_url: None,
        }];
        fs::write(
            dir.join(ROSTER_FILE),
            serde_json::to_vec(&roster).unwrap(),
        )
        .unwrap();

        assert_eq!(store.list_students().await.unwrap(), roster);

        fs::remove_dir_all(dir).unwrap();
    }
}
