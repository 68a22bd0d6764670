use tokio::sync::broadcast;

use crate::dto::sse::ServerEvent;

/// SSE-specific sub-state carved out from [`AppState`](super::AppState).
pub struct SseState {
    monitor: SseHub,
    admin: SseHub,
}

impl SseState {
    /// Build the SSE sub-tree with per-stream channel capacities.
    pub fn new(monitor_capacity: usize, admin_capacity: usize) -> Self {
        Self {
            monitor: SseHub::new(monitor_capacity),
            admin: SseHub::new(admin_capacity),
        }
    }

    /// Access the hub that fans out events to every viewer.
    pub fn monitor(&self) -> &SseHub {
        &self.monitor
    }

    /// Access the hub reserved for the admin console (storage warnings and
    /// the like, on top of the shared feed).
    pub fn admin(&self) -> &SseHub {
        &self.admin
    }
}

/// Simple broadcast hub wrapper used by the SSE services.
pub struct SseHub {
    sender: broadcast::Sender<ServerEvent>,
}

impl SseHub {
    /// Construct a new hub backed by a Tokio broadcast channel with the given capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _receiver) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Register a new subscriber that will receive subsequent events.
    pub fn subscribe(&self) -> broadcast::Receiver<ServerEvent> {
        self.sender.subscribe()
    }

    /// Send an event to all current subscribers, ignoring delivery errors.
    pub fn broadcast(&self, event: ServerEvent) {
        let _ = self.sender.send(event);
    }
}
