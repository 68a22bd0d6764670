//! Keeps the engine attached to the best storage backend available.
//!
//! The local file store comes up first and the board hydrates from it, so the
//! server is usable before and without CouchDB. When CouchDB is configured
//! the supervisor connects with exponential backoff, reconciles both sides
//! row by row, flushes the merged state and promotes the remote to active.
//! It then health-polls the remote and demotes back to the file store when
//! it dies, leaving the in-memory board authoritative throughout.

use std::{sync::Arc, time::Duration};

use indexmap::IndexMap;
use tokio::time::sleep;
use tracing::{info, warn};
use uuid::Uuid;

#[cfg(feature = "couch-store")]
use crate::dao::session_store::couchdb::{CouchConfig, CouchSessionStore};
#[cfg(feature = "couch-store")]
use crate::{
    services::{board_service, sse_events},
    state::board::SessionBoard,
};
use crate::{
    dao::{
        models::StudentEntity,
        session_store::{
            SessionStore,
            file::{FileConfig, FileSessionStore},
        },
        storage::StorageResult,
    },
    services::reconcile,
    state::{SharedState, board::Student, timer::unix_now_ms},
};

const INITIAL_DELAY: Duration = Duration::from_millis(1_000);
const MAX_DELAY: Duration = Duration::from_secs(10);
const HEALTH_POLL_INTERVAL: Duration = Duration::from_secs(5);
const MAX_RECONNECT_ATTEMPTS: u32 = 3;

/// Supervise the storage backends for the lifetime of the process.
pub async fn run(state: SharedState) {
    #[cfg(feature = "couch-store")]
    {
        match CouchConfig::from_env() {
            Ok(config) => {
                let file_store = open_file_store(&state, true).await;
                supervise_couch(state, file_store, config).await;
                return;
            }
            Err(err) => info!(%err, "CouchDB not configured; the local file store is primary"),
        }
    }

    let file_store = open_file_store(&state, false).await;
    supervise_file_only(state, file_store).await;
}

/// Open the local fallback and hydrate the board from it, retrying with
/// backoff until it works. The server keeps answering (degraded) meanwhile.
async fn open_file_store(state: &SharedState, degraded: bool) -> Arc<dyn SessionStore> {
    let mut delay = INITIAL_DELAY;
    loop {
        match FileSessionStore::open(FileConfig::from_env()) {
            Ok(store) => {
                let store: Arc<dyn SessionStore> = Arc::new(store);
                match hydrate(state, &store).await {
                    Ok(()) => {
                        state.install_session_store(store.clone(), degraded).await;
                        info!("local file store ready; board hydrated");
                        return store;
                    }
                    Err(err) => warn!(error = %err, "failed to hydrate from the file store"),
                }
            }
            Err(err) => warn!(error = %err, "failed to open the local file store"),
        }
        sleep(delay).await;
        delay = (delay * 2).min(MAX_DELAY);
    }
}

/// Replace the in-memory roster and board with what the store holds.
async fn hydrate(state: &SharedState, store: &Arc<dyn SessionStore>) -> StorageResult<()> {
    let roster = roster_of(store.list_students().await?);
    let config = state.config();
    let (board, _repairs) = reconcile::hydrate_board(
        store,
        config.slot_count,
        config.default_time_secs,
        unix_now_ms(),
    )
    .await?;

    state.set_roster(roster).await;
    let mut guard = state.board().write().await;
    *guard = board;
    Ok(())
}

/// Keep an eye on the file store when it is the only backend.
async fn supervise_file_only(state: SharedState, store: Arc<dyn SessionStore>) {
    loop {
        sleep(HEALTH_POLL_INTERVAL).await;
        if state.take_flush_pending() && !flush_board(&state, &store).await {
            state.mark_flush_pending();
        }
        if let Err(err) = store.health_check().await {
            warn!(error = %err, "file store health check failed");
            let _ = store.try_reconnect().await;
        }
    }
}

#[cfg(feature = "couch-store")]
async fn supervise_couch(
    state: SharedState,
    file_store: Arc<dyn SessionStore>,
    config: CouchConfig,
) {
    let mut delay = INITIAL_DELAY;
    loop {
        if state.take_flush_pending() && !flush_board(&state, &file_store).await {
            state.mark_flush_pending();
        }

        match CouchSessionStore::connect(config.clone()).await {
            Ok(couch) => {
                let couch: Arc<dyn SessionStore> = Arc::new(couch);
                match promote_couch(&state, &couch).await {
                    Ok(()) => {
                        delay = INITIAL_DELAY;
                        monitor_couch(&state, &couch, &file_store).await;
                        // lost the remote; back to connection attempts
                    }
                    Err(err) => warn!(error = %err, "failed to reconcile with CouchDB"),
                }
            }
            Err(err) => warn!(error = %err, "CouchDB connection attempt failed"),
        }

        sleep(delay).await;
        delay = (delay * 2).min(MAX_DELAY);
    }
}

/// Merge the in-memory board with what CouchDB holds, flush the result back
/// and make CouchDB the active store.
#[cfg(feature = "couch-store")]
async fn promote_couch(state: &SharedState, couch: &Arc<dyn SessionStore>) -> StorageResult<()> {
    let config = state.config();
    let remote_students = couch.list_students().await?;
    let remote_rows = reconcile::load_rows(couch).await?;

    let merged_board = {
        let mut guard = state.board().write().await;
        let merged = reconcile::merge(guard.snapshot_rows(), remote_rows);
        let (board, repairs) = SessionBoard::rebuild(
            config.slot_count,
            config.default_time_secs,
            merged,
            unix_now_ms(),
        );
        reconcile::log_repairs(&repairs);
        *guard = board.clone();
        board
    };
    reconcile::flush_rows(couch, &merged_board.snapshot_rows()).await?;

    // The roster lives wherever it was provisioned; an empty remote one
    // keeps the file-provisioned roster in memory.
    if !remote_students.is_empty() {
        state.set_roster(roster_of(remote_students)).await;
    }

    state.install_session_store(couch.clone(), false).await;
    // Cover writes that raced the promotion; the monitor loop flushes them.
    state.mark_flush_pending();
    info!("CouchDB promoted to active store");

    let snapshot = board_service::board_snapshot(state).await;
    sse_events::broadcast_board_snapshot(state, &snapshot);
    sse_events::broadcast_info(state, "board reconciled with CouchDB");
    Ok(())
}

/// Health-poll the active CouchDB store. Returns once it is lost and the
/// file store has been promoted back.
#[cfg(feature = "couch-store")]
async fn monitor_couch(
    state: &SharedState,
    couch: &Arc<dyn SessionStore>,
    file_store: &Arc<dyn SessionStore>,
) {
    loop {
        if state.take_flush_pending() && !flush_board(state, couch).await {
            state.mark_flush_pending();
        }

        match couch.health_check().await {
            Ok(()) => sleep(HEALTH_POLL_INTERVAL).await,
            Err(err) => {
                warn!(error = %err, "CouchDB health check failed");
                if try_reconnect(couch).await {
                    continue;
                }

                warn!("exhausted CouchDB reconnect attempts; falling back to the file store");
                if !flush_board(state, file_store).await {
                    state.mark_flush_pending();
                }
                state.install_session_store(file_store.clone(), true).await;
                sse_events::send_storage_warning(
                    state,
                    "CouchDB unreachable; state is held by the local file store",
                );
                return;
            }
        }
    }
}

/// Bounded reconnect attempts with backoff after a failed health check.
#[cfg(feature = "couch-store")]
async fn try_reconnect(store: &Arc<dyn SessionStore>) -> bool {
    let mut delay = INITIAL_DELAY;
    for attempt in 0..MAX_RECONNECT_ATTEMPTS {
        match store.try_reconnect().await {
            Ok(()) => {
                info!("CouchDB reconnection succeeded after health check failure");
                return true;
            }
            Err(err) => {
                warn!(attempt, error = %err, "CouchDB reconnect attempt failed");
                sleep(delay).await;
                delay = (delay * 2).min(MAX_DELAY);
            }
        }
    }
    false
}

/// Write the current board rows into the given store.
async fn flush_board(state: &SharedState, store: &Arc<dyn SessionStore>) -> bool {
    let rows = {
        let board = state.board().read().await;
        board.snapshot_rows()
    };
    match reconcile::flush_rows(store, &rows).await {
        Ok(()) => true,
        Err(err) => {
            warn!(error = %err, "failed to flush board state");
            false
        }
    }
}

fn roster_of(mut students: Vec<StudentEntity>) -> IndexMap<Uuid, Student> {
    students.sort_by(|a, b| a.name.cmp(&b.name));
    students
        .into_iter()
        .map(|entity| {
            let student: Student = entity.into();
            (student.id, student)
        })
        .collect()
}
