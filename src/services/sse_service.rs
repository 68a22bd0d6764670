use std::{convert::Infallible, time::Duration};

use axum::response::sse::{Event, KeepAlive, Sse};
use futures::Stream;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::warn;

use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use crate::{
    dto::sse::{Handshake, ServerEvent},
    services::{board_service, sse_events},
    state::SharedState,
};

/// Subscribe to the read-only monitor SSE stream.
pub fn subscribe_monitor(state: &SharedState) -> broadcast::Receiver<ServerEvent> {
    state.monitor_sse().subscribe()
}

/// Subscribe to the admin console SSE stream.
pub fn subscribe_admin(state: &SharedState) -> broadcast::Receiver<ServerEvent> {
    state.admin_sse().subscribe()
}

/// Identifies the target SSE stream for handshakes and disconnect logs.
#[derive(Clone, Copy)]
pub enum StreamKind {
    Monitor,
    Admin,
}

impl StreamKind {
    fn label(self) -> &'static str {
        match self {
            StreamKind::Monitor => "monitor",
            StreamKind::Admin => "admin",
        }
    }
}

/// Convert a broadcast receiver into an SSE response, forwarding events and
/// cleaning up once the client disconnects.
///
/// Every connection is primed with a handshake and a full board snapshot
/// before live events flow, so a viewer attaching mid-session reconstructs
/// the countdowns without waiting for the next update. Callers subscribe the
/// receiver before handing it over; an update that races the snapshot is
/// replayed right after it, never lost.
pub async fn to_sse_stream(
    state: &SharedState,
    mut receiver: broadcast::Receiver<ServerEvent>,
    kind: StreamKind,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    // small bounded channel between forwarder and response
    let (tx, rx) = mpsc::channel::<Result<Event, Infallible>>(8);

    let mut primers = Vec::with_capacity(2);
    let handshake = Handshake {
        stream: kind.label().to_string(),
        message: format!("{} stream connected", kind.label()),
        degraded: state.is_degraded(),
    };
    match ServerEvent::json(Some("handshake".to_string()), &handshake) {
        Ok(event) => primers.push(event),
        Err(err) => warn!(%err, "Failed to serialize SSE handshake"),
    }
    let snapshot = board_service::board_snapshot(state).await;
    match sse_events::snapshot_event(&snapshot) {
        Ok(event) => primers.push(event),
        Err(err) => warn!(%err, "Failed to serialize SSE board snapshot"),
    }

    // forwarder task: emits the primers, then reads from broadcast into mpsc
    tokio::spawn(async move {
        for payload in primers {
            if tx.send(Ok(into_event(payload))).await.is_err() {
                return;
            }
        }

        loop {
            tokio::select! {
                _ = tx.closed() => break,
                recv_result = receiver.recv() => {
                    match recv_result {
                        Ok(payload) => {
                            if tx.send(Ok(into_event(payload))).await.is_err() {
                                break;
                            }
                        }
                        Err(RecvError::Closed) => break,
                        Err(RecvError::Lagged(_)) => {
                            // Skip lagged messages but keep the stream alive.
                            continue;
                        }
                    }
                }
            }
        }

        match kind {
            StreamKind::Monitor => tracing::info!("Monitor SSE stream disconnected"),
            StreamKind::Admin => tracing::info!("Admin SSE stream disconnected"),
        }
    });

    // response stream reads from mpsc; when client disconnects axum drops this stream
    let stream = ReceiverStream::new(rx);
    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}

fn into_event(payload: ServerEvent) -> Event {
    let mut event = Event::default().data(payload.data);
    if let Some(name) = payload.event {
        event = event.event(name);
    }
    event
}
