#[cfg(feature = "couch-store")]
pub mod couchdb;
pub mod file;

use crate::dao::models::{FinishedEntryEntity, SlotRowEntity, StudentEntity, TimerRecordEntity};
use crate::dao::storage::StorageResult;
use futures::future::BoxFuture;
use uuid::Uuid;

/// Abstraction over the persistence layer for the roster and session state.
///
/// The roster is read-only through this trait; slot rows, timer records and
/// finished entries are written row by row so the durable write order of a
/// finish (entry, then slot, then timer) stays observable to the backend.
pub trait SessionStore: Send + Sync {
    fn list_students(&self) -> BoxFuture<'static, StorageResult<Vec<StudentEntity>>>;
    fn save_slot(&self, slot: SlotRowEntity) -> BoxFuture<'static, StorageResult<()>>;
    fn list_slots(&self) -> BoxFuture<'static, StorageResult<Vec<SlotRowEntity>>>;
    fn save_timer(&self, timer: TimerRecordEntity) -> BoxFuture<'static, StorageResult<()>>;
    fn delete_timer(&self, occupant_id: Uuid) -> BoxFuture<'static, StorageResult<()>>;
    fn list_timers(&self) -> BoxFuture<'static, StorageResult<Vec<TimerRecordEntity>>>;
    fn save_finished(&self, entry: FinishedEntryEntity) -> BoxFuture<'static, StorageResult<()>>;
    fn list_finished(&self) -> BoxFuture<'static, StorageResult<Vec<FinishedEntryEntity>>>;
    fn clear_session(&self) -> BoxFuture<'static, StorageResult<()>>;
    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>>;
    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>>;
}
