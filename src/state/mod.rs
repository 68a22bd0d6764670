pub mod board;
mod sse;
pub mod timer;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use indexmap::IndexMap;
use tokio::sync::{RwLock, watch};
use uuid::Uuid;

use crate::{
    config::AppConfig,
    dao::session_store::SessionStore,
    state::board::{SessionBoard, Student},
};

pub use self::sse::SseHub;
use self::sse::SseState;

/// Shared handle to the application state.
pub type SharedState = Arc<AppState>;

/// Central application state: the authoritative session board, the roster
/// cache, the SSE hubs, and the active storage backend.
pub struct AppState {
    config: AppConfig,
    session_store: RwLock<Option<Arc<dyn SessionStore>>>,
    sse: SseState,
    roster: RwLock<IndexMap<Uuid, Student>>,
    board: RwLock<SessionBoard>,
    degraded: watch::Sender<bool>,
    flush_pending: AtomicBool,
}

impl AppState {
    /// Construct a new [`AppState`] wrapped in an [`Arc`] so it can be cloned cheaply.
    ///
    /// The application starts degraded until the storage supervisor installs
    /// a backend and hydrates the board.
    pub fn new(config: AppConfig) -> SharedState {
        let (degraded_tx, _rx) = watch::channel(true);
        let board = SessionBoard::new(config.slot_count);
        Arc::new(Self {
            config,
            session_store: RwLock::new(None),
            sse: SseState::new(16, 16),
            roster: RwLock::new(IndexMap::new()),
            board: RwLock::new(board),
            degraded: degraded_tx,
            flush_pending: AtomicBool::new(false),
        })
    }

    /// Effective configuration the server was booted with.
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Obtain a handle to the active session store, if one is installed.
    pub async fn session_store(&self) -> Option<Arc<dyn SessionStore>> {
        let guard = self.session_store.read().await;
        guard.as_ref().cloned()
    }

    /// Install a storage backend and flag whether the deployment is running
    /// on its preferred store or on the local fallback.
    pub async fn install_session_store(
        &self,
        store: Arc<dyn SessionStore>,
        degraded: bool,
    ) -> bool {
        {
            let mut guard = self.session_store.write().await;
            *guard = Some(store);
        }
        self.set_degraded(degraded)
    }

    /// Authoritative session board.
    pub fn board(&self) -> &RwLock<SessionBoard> {
        &self.board
    }

    /// Roster cache, keyed by student id and kept in display order.
    pub fn roster(&self) -> &RwLock<IndexMap<Uuid, Student>> {
        &self.roster
    }

    /// Replace the roster cache, typically right after hydration.
    pub async fn set_roster(&self, students: IndexMap<Uuid, Student>) {
        let mut guard = self.roster.write().await;
        *guard = students;
    }

    /// Current degraded flag.
    pub fn is_degraded(&self) -> bool {
        *self.degraded.borrow()
    }

    /// Update the degraded flag, returning whether the value changed.
    pub fn set_degraded(&self, value: bool) -> bool {
        self.degraded.send_if_modified(|flag| {
            if *flag == value {
                false
            } else {
                *flag = value;
                true
            }
        })
    }

    /// Subscribe to degraded mode updates.
    pub fn degraded_watcher(&self) -> watch::Receiver<bool> {
        self.degraded.subscribe()
    }

    /// Record that at least one durable write failed and the board must be
    /// flushed to the store once it recovers.
    pub fn mark_flush_pending(&self) {
        self.flush_pending.store(true, Ordering::Relaxed);
    }

    /// Consume the flush-pending flag.
    pub fn take_flush_pending(&self) -> bool {
        self.flush_pending.swap(false, Ordering::Relaxed)
    }

    /// Broadcast hub used for the shared viewer SSE stream.
    pub fn monitor_sse(&self) -> &SseHub {
        self.sse.monitor()
    }

    /// Broadcast hub used for the admin SSE stream.
    pub fn admin_sse(&self) -> &SseHub {
        self.sse.admin()
    }
}
