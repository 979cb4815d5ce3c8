//! Business logic coordinating storage, in-memory state, and broadcasts.

pub mod action_service;
pub mod documentation;
pub mod health_service;
pub mod rating_service;
pub mod room_service;
pub mod sse_events;
pub mod sse_service;
pub mod storage_supervisor;
pub mod view_service;

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::Arc;

    use crate::{
        config::AppConfig,
        dao::{catalog::CandidateSource, catalog::FallbackCatalog, room_store::memory::InMemoryRoomStore},
        services::rating_service::RatingQueue,
        state::{AppState, SharedState},
    };

    /// State wired to the in-memory store and the default fallback catalog.
    pub async fn test_state() -> SharedState {
        let config = AppConfig::default();
        let catalog = Arc::new(FallbackCatalog::new(config.fallback_pool().to_vec()));
        test_state_with_catalog_and_config(catalog, config).await
    }

    /// State wired to the in-memory store and a caller-supplied catalog.
    pub async fn test_state_with_catalog(catalog: Arc<dyn CandidateSource>) -> SharedState {
        test_state_with_catalog_and_config(catalog, AppConfig::default()).await
    }

    async fn test_state_with_catalog_and_config(
        catalog: Arc<dyn CandidateSource>,
        config: AppConfig,
    ) -> SharedState {
        let (queue, _worker_rx) = RatingQueue::new();
        let state = AppState::new(config, catalog, queue);
        state
            .install_room_store(Arc::new(InMemoryRoomStore::new()))
            .await;
        state
    }
}
