//! Shared application state: the storage slot with its degraded flag, the
//! per-room lock registry, the per-room SSE hubs, and the rating queue.

pub mod locks;
mod sse;

use std::sync::Arc;

use tokio::sync::{RwLock, watch};

use crate::{
    config::AppConfig,
    dao::{catalog::CandidateSource, room_store::RoomStore},
    error::ServiceError,
    services::rating_service::RatingQueue,
};

pub use self::locks::RoomLockRegistry;
pub use self::sse::{RoomSseState, SseHub};

/// Cheaply clonable handle to the process-wide application state.
pub type SharedState = Arc<AppState>;

/// Per-room SSE channel capacity.
const SSE_CAPACITY: usize = 16;

/// Central application state constructed once at process start and passed by
/// reference everywhere; there is no global mutable state beyond this value.
pub struct AppState {
    room_store: RwLock<Option<Arc<dyn RoomStore>>>,
    catalog: Arc<dyn CandidateSource>,
    sse: RoomSseState,
    locks: RoomLockRegistry,
    ratings: RatingQueue,
    degraded: watch::Sender<bool>,
    config: AppConfig,
}

impl AppState {
    /// Construct a new [`AppState`] wrapped in an [`Arc`] so it can be cloned cheaply.
    ///
    /// The application starts in degraded mode until a storage backend is installed.
    pub fn new(
        config: AppConfig,
        catalog: Arc<dyn CandidateSource>,
        ratings: RatingQueue,
    ) -> SharedState {
        let (degraded_tx, _rx) = watch::channel(true);
        Arc::new(Self {
            room_store: RwLock::new(None),
            catalog,
            sse: RoomSseState::new(SSE_CAPACITY),
            locks: RoomLockRegistry::new(),
            ratings,
            degraded: degraded_tx,
            config,
        })
    }

    /// Obtain a handle to the current room store, if one is installed.
    pub async fn room_store(&self) -> Option<Arc<dyn RoomStore>> {
        let guard = self.room_store.read().await;
        guard.as_ref().cloned()
    }

    /// Obtain the room store or fail with a degraded-mode error.
    pub async fn require_room_store(&self) -> Result<Arc<dyn RoomStore>, ServiceError> {
        self.room_store().await.ok_or(ServiceError::Degraded)
    }

    /// Install a new room store implementation and leave degraded mode.
    pub async fn install_room_store(&self, store: Arc<dyn RoomStore>) {
        {
            let mut guard = self.room_store.write().await;
            *guard = Some(store);
        }
        self.update_degraded(false).await;
    }

    /// Remove the current room store and enter degraded mode.
    pub async fn clear_room_store(&self) {
        {
            let mut guard = self.room_store.write().await;
            guard.take();
        }
        self.update_degraded(true).await;
    }

    /// Current degraded flag.
    pub async fn is_degraded(&self) -> bool {
        let guard = self.room_store.read().await;
        guard.is_none()
    }

    /// Subscribe to degraded mode updates.
    pub fn degraded_watcher(&self) -> watch::Receiver<bool> {
        self.degraded.subscribe()
    }

    /// Update and broadcast the degraded flag when the value changes.
    pub async fn update_degraded(&self, value: bool) {
        self.degraded.send_if_modified(|current| {
            let changed = *current != value;
            *current = value;
            changed
        });
    }

    /// Candidate catalog wired at process start.
    pub fn catalog(&self) -> Arc<dyn CandidateSource> {
        self.catalog.clone()
    }

    /// Per-room broadcast hubs for the SSE streams.
    pub fn room_sse(&self) -> &RoomSseState {
        &self.sse
    }

    /// Per-room lock registry serializing room mutations.
    pub fn room_locks(&self) -> &RoomLockRegistry {
        &self.locks
    }

    /// Queue handle feeding the preference-rating worker.
    pub fn ratings(&self) -> &RatingQueue {
        &self.ratings
    }

    /// Immutable runtime configuration.
    pub fn config(&self) -> &AppConfig {
        &self.config
    }
}
