//! Per-room broadcast hubs feeding the SSE streams.

use dashmap::DashMap;
use tokio::sync::broadcast;

use crate::dto::sse::ServerEvent;

/// Registry of per-room broadcast hubs, created lazily on first subscribe.
pub struct RoomSseState {
    hubs: DashMap<String, SseHub>,
    capacity: usize,
}

impl RoomSseState {
    /// Build the registry with the per-room channel capacity.
    pub fn new(capacity: usize) -> Self {
        Self {
            hubs: DashMap::new(),
            capacity,
        }
    }

    /// Register a new subscriber for the given room's events.
    pub fn subscribe(&self, code: &str) -> broadcast::Receiver<ServerEvent> {
        self.hubs
            .entry(code.to_owned())
            .or_insert_with(|| SseHub::new(self.capacity))
            .subscribe()
    }

    /// Fan an event out to the room's subscribers, if any.
    ///
    /// Fire-and-forget: delivery is at-least-once across reconnects and must
    /// never block the mutation path.
    pub fn broadcast(&self, code: &str, event: ServerEvent) {
        if let Some(hub) = self.hubs.get(code) {
            hub.broadcast(event);
        }
    }

    /// Drop a room's hub once the room has reached a terminal state.
    pub fn remove(&self, code: &str) {
        self.hubs.remove(code);
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
