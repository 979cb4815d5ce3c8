//! Movie Night backend binary entrypoint wiring REST, SSE, and storage layers.

use std::{env, net::SocketAddr, sync::Arc};

use anyhow::Context;
use axum::Router;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use movie_night_back::{
    config::AppConfig,
    dao::{
        catalog::{CandidateSource, FallbackCatalog},
        room_store::memory::InMemoryRoomStore,
    },
    routes,
    services::rating_service::{self, RatingQueue},
    state::{AppState, SharedState},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = AppConfig::load();
    let catalog = build_catalog(&config);

    let (rating_queue, rating_rx) = RatingQueue::new();
    let app_state = AppState::new(config, catalog, rating_queue);

    install_store(app_state.clone()).await;
    tokio::spawn(rating_service::run(app_state.clone(), rating_rx));

    // Build the HTTP router once the shared state is ready.
    let app = build_router(app_state);

    let port = env::var("PORT")
        .or_else(|_| env::var("SERVER_PORT"))
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(8080);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!(%addr, "starting server");

    let listener = TcpListener::bind(addr).await.context("binding server")?;
    let service = app.into_make_service();
    axum::serve(listener, service)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving axum")?;

    Ok(())
}

/// Pick the candidate catalog: the configured HTTP service when available,
/// the baked-in fallback pool otherwise.
fn build_catalog(config: &AppConfig) -> Arc<dyn CandidateSource> {
    #[cfg(feature = "http-catalog")]
    {
        use movie_night_back::dao::catalog::HttpCatalog;

        if let Some(url) = config.catalog_url() {
            info!(url, "using HTTP candidate catalog");
            return Arc::new(HttpCatalog::new(url.to_owned()));
        }
    }

    info!("no catalog configured; serving the fallback candidate pool");
    Arc::new(FallbackCatalog::new(config.fallback_pool().to_vec()))
}

/// Install the room store: a supervised MongoDB connection when `MONGO_URI`
/// is set, the in-memory store otherwise.
#[cfg(feature = "mongo-store")]
async fn install_store(state: SharedState) {
    use movie_night_back::dao::room_store::{
        RoomStore,
        mongodb::{MongoConfig, MongoRoomStore},
    };
    use movie_night_back::services::storage_supervisor;

    if let Ok(uri) = env::var("MONGO_URI") {
        let db_name = env::var("MONGO_DB").ok();
        tokio::spawn(storage_supervisor::run(state, move || {
            let uri = uri.clone();
            let db_name = db_name.clone();
            async move {
                let config = MongoConfig::from_uri(&uri, db_name.as_deref()).await?;
                let store = MongoRoomStore::connect(config).await?;
                Ok(Arc::new(store) as Arc<dyn RoomStore>)
            }
        }));
        return;
    }

    info!("MONGO_URI not set; using the in-memory room store");
    state
        .install_room_store(Arc::new(InMemoryRoomStore::new()))
        .await;
}

/// Install the in-memory room store (no database backend compiled in).
#[cfg(not(feature = "mongo-store"))]
async fn install_store(state: SharedState) {
    info!("using the in-memory room store");
    state
        .install_room_store(Arc::new(InMemoryRoomStore::new()))
        .await;
}

/// Build the top-level router and attach cross-cutting middleware layers.
fn build_router(state: SharedState) -> Router<()> {
    routes::router(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// Configure tracing subscribers so logs include spans by default.
fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,tower_http=debug".into());
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Wait for Ctrl+C or SIGTERM and shut the server down gracefully.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let mut term = signal(SignalKind::terminate()).expect("install SIGTERM handler");
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {},
            _ = term.recv() => {},
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
