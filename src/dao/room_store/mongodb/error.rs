use mongodb::error::Error as MongoError;
use thiserror::Error;
use uuid::Uuid;

pub type MongoResult<T> = std::result::Result<T, MongoDaoError>;

/// Errors raised by the MongoDB room store.
#[derive(Debug, Error)]
pub enum MongoDaoError {
    #[error("failed to parse MongoDB connection URI `{uri}`")]
    InvalidUri {
        uri: String,
        #[source]
        source: MongoError,
    },
    #[error("failed to build MongoDB client from options")]
    ClientConstruction {
        #[source]
        source: MongoError,
    },
    #[error("MongoDB ping failed during initial connection after {attempts} attempt(s)")]
    InitialPing {
        attempts: u32,
        #[source]
        source: MongoError,
    },
    #[error("MongoDB ping health check failed")]
    HealthPing {
        #[source]
        source: MongoError,
    },
    #[error("failed to ensure index `{index}` on collection `{collection}`")]
    EnsureIndex {
        collection: &'static str,
        index: &'static str,
        #[source]
        source: MongoError,
    },
    #[error("failed to save room `{code}`")]
    SaveRoom {
        code: String,
        #[source]
        source: MongoError,
    },
    #[error("failed to load room `{code}`")]
    LoadRoom {
        code: String,
        #[source]
        source: MongoError,
    },
    #[error("failed to save tournament state for room `{code}`")]
    SaveState {
        code: String,
        #[source]
        source: MongoError,
    },
    #[error("failed to load tournament state for room `{code}`")]
    LoadState {
        code: String,
        #[source]
        source: MongoError,
    },
    #[error("failed to append action record `{id}`")]
    AppendAction {
        id: Uuid,
        #[source]
        source: MongoError,
    },
    #[error("failed to update action record `{id}`")]
    UpdateAction {
        id: Uuid,
        #[source]
        source: MongoError,
    },
    #[error("failed to look up action records for room `{code}`")]
    FindAction {
        code: String,
        #[source]
        source: MongoError,
    },
    #[error("failed to insert pick for room `{code}`")]
    InsertPick {
        code: String,
        #[source]
        source: MongoError,
    },
    #[error("failed to list picks for room `{code}`")]
    ListPicks {
        code: String,
        #[source]
        source: MongoError,
    },
    #[error("failed to write watch-list entry for user `{user_id}`")]
    SaveWatchlist {
        user_id: Uuid,
        #[source]
        source: MongoError,
    },
    #[error("failed to list watch-list entries for user `{user_id}`")]
    ListWatchlist {
        user_id: Uuid,
        #[source]
        source: MongoError,
    },
    #[error("failed to access preference score for user `{user_id}`")]
    Preference {
        user_id: Uuid,
        #[source]
        source: MongoError,
    },
}
