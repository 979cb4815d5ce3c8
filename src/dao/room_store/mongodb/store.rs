use std::{sync::Arc, time::SystemTime};

use futures::{TryStreamExt, future::BoxFuture};
use mongodb::{
    Client, Collection, Database,
    bson::{DateTime, doc},
    error::{ErrorKind, WriteFailure},
    options::IndexOptions,
};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{
    config::MongoConfig,
    connection::establish_connection,
    error::{MongoDaoError, MongoResult},
    models::{
        MongoActionDocument, MongoPickDocument, MongoPreferenceDocument, MongoRoomDocument,
        MongoStateDocument, MongoWatchlistDocument, doc_code, uuid_as_binary,
    },
};
use crate::dao::{
    models::{
        ActionRecordEntity, ActionResultEntity, CandidateEntity, PickEntity, RoomEntity,
        TournamentStateEntity, WatchlistEntryEntity,
    },
    room_store::{PickInsert, RoomStore},
    storage::{StorageError, StorageResult},
};

const ROOM_COLLECTION: &str = "rooms";
const STATE_COLLECTION: &str = "tournament_states";
const ACTION_COLLECTION: &str = "action_records";
const PICK_COLLECTION: &str = "picks";
const WATCHLIST_COLLECTION: &str = "watchlist";
const PREFERENCE_COLLECTION: &str = "preference_scores";

/// MongoDB-backed room store.
#[derive(Clone)]
pub struct MongoRoomStore {
    inner: Arc<MongoInner>,
}

struct MongoInner {
    state: RwLock<MongoState>,
    config: MongoConfig,
}

struct MongoState {
    client: Client,
    database: Database,
}

impl MongoInner {
    async fn ping(&self) -> MongoResult<()> {
        let database = {
            let guard = self.state.read().await;
            guard.database.clone()
        };

        database
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|source| MongoDaoError::HealthPing { source })?;
        Ok(())
    }

    async fn reconnect(&self) -> MongoResult<()> {
        let (client, database) =
            establish_connection(&self.config.options, &self.config.database_name).await?;
        let mut guard = self.state.write().await;
        guard.client = client;
        guard.database = database;
        Ok(())
    }
}

impl MongoRoomStore {
    /// Establish a connection to MongoDB and ensure indexes are present.
    pub async fn connect(config: MongoConfig) -> MongoResult<Self> {
        let (client, database) =
            establish_connection(&config.options, &config.database_name).await?;

        let inner = Arc::new(MongoInner {
            state: RwLock::new(MongoState { client, database }),
            config,
        });

        let store = Self { inner };
        store.ensure_indexes().await?;
        Ok(store)
    }

    async fn ensure_indexes(&self) -> MongoResult<()> {
        let database = self.database().await;

        // Uniqueness arbiter for retried/racing pick submissions.
        let picks = database.collection::<MongoPickDocument>(PICK_COLLECTION);
        let pick_index = mongodb::IndexModel::builder()
            .keys(doc! {"room_code": 1, "participant_id": 1, "round": 1, "position": 1})
            .options(
                IndexOptions::builder()
                    .name(Some("pick_unique_idx".to_owned()))
                    .unique(Some(true))
                    .build(),
            )
            .build();
        picks
            .create_index(pick_index)
            .await
            .map_err(|source| MongoDaoError::EnsureIndex {
                collection: PICK_COLLECTION,
                index: "room_code,participant_id,round,position",
                source,
            })?;

        // One watch-list row per (user, candidate).
        let watchlist = database.collection::<MongoWatchlistDocument>(WATCHLIST_COLLECTION);
        let watchlist_index = mongodb::IndexModel::builder()
            .keys(doc! {"user_id": 1, "candidate_id": 1})
            .options(
                IndexOptions::builder()
                    .name(Some("watchlist_unique_idx".to_owned()))
                    .unique(Some(true))
                    .build(),
            )
            .build();
        watchlist
            .create_index(watchlist_index)
            .await
            .map_err(|source| MongoDaoError::EnsureIndex {
                collection: WATCHLIST_COLLECTION,
                index: "user_id,candidate_id",
                source,
            })?;

        // Idempotency-key replay lookups.
        let actions = database.collection::<MongoActionDocument>(ACTION_COLLECTION);
        let action_index = mongodb::IndexModel::builder()
            .keys(doc! {"room_code": 1, "participant_id": 1, "idempotency_key": 1})
            .options(
                IndexOptions::builder()
                    .name(Some("action_key_idx".to_owned()))
                    .build(),
            )
            .build();
        actions
            .create_index(action_index)
            .await
            .map_err(|source| MongoDaoError::EnsureIndex {
                collection: ACTION_COLLECTION,
                index: "room_code,participant_id,idempotency_key",
                source,
            })?;

        let preferences = database.collection::<MongoPreferenceDocument>(PREFERENCE_COLLECTION);
        let preference_index = mongodb::IndexModel::builder()
            .keys(doc! {"user_id": 1, "candidate_id": 1})
            .options(
                IndexOptions::builder()
                    .name(Some("preference_unique_idx".to_owned()))
                    .unique(Some(true))
                    .build(),
            )
            .build();
        preferences
            .create_index(preference_index)
            .await
            .map_err(|source| MongoDaoError::EnsureIndex {
                collection: PREFERENCE_COLLECTION,
                index: "user_id,candidate_id",
                source,
            })?;

        Ok(())
    }

    async fn database(&self) -> Database {
        let guard = self.inner.state.read().await;
        guard.database.clone()
    }

    async fn rooms(&self) -> Collection<MongoRoomDocument> {
        self.database().await.collection(ROOM_COLLECTION)
    }

    async fn states(&self) -> Collection<MongoStateDocument> {
        self.database().await.collection(STATE_COLLECTION)
    }

    async fn actions(&self) -> Collection<MongoActionDocument> {
        self.database().await.collection(ACTION_COLLECTION)
    }

    async fn picks(&self) -> Collection<MongoPickDocument> {
        self.database().await.collection(PICK_COLLECTION)
    }

    async fn watchlist(&self) -> Collection<MongoWatchlistDocument> {
        self.database().await.collection(WATCHLIST_COLLECTION)
    }

    async fn preferences(&self) -> Collection<MongoPreferenceDocument> {
        self.database().await.collection(PREFERENCE_COLLECTION)
    }

    async fn save_room(&self, room: RoomEntity) -> MongoResult<()> {
        let code = room.code.clone();
        let document: MongoRoomDocument = room.into();
        self.rooms()
            .await
            .replace_one(doc_code(&code), &document)
            .upsert(true)
            .await
            .map_err(|source| MongoDaoError::SaveRoom { code, source })?;
        Ok(())
    }

    async fn find_room(&self, code: String) -> MongoResult<Option<RoomEntity>> {
        let document = self
            .rooms()
            .await
            .find_one(doc_code(&code))
            .await
            .map_err(|source| MongoDaoError::LoadRoom { code, source })?;
        Ok(document.map(Into::into))
    }

    async fn save_state(
        &self,
        code: String,
        state: TournamentStateEntity,
        expected_version: u64,
    ) -> StorageResult<()> {
        let document = MongoStateDocument::from_entity(code.clone(), state);
        let collection = self.states().await;

        let filter = doc! {"_id": &code, "version": expected_version as i64};
        let result = collection
            .replace_one(filter, &document)
            .upsert(expected_version == 0)
            .await;

        match result {
            Ok(outcome) => {
                if expected_version > 0 && outcome.matched_count == 0 {
                    let actual = self.stored_version(&collection, &code).await;
                    return Err(StorageError::VersionConflict {
                        code,
                        expected: expected_version,
                        actual,
                    });
                }
                Ok(())
            }
            Err(err) if is_duplicate_key(&err) => {
                // The upsert raced an existing snapshot: version 0 expected
                // but one is already stored.
                let actual = self.stored_version(&collection, &code).await;
                Err(StorageError::VersionConflict {
                    code,
                    expected: expected_version,
                    actual,
                })
            }
            Err(source) => Err(MongoDaoError::SaveState { code, source }.into()),
        }
    }

    async fn stored_version(&self, collection: &Collection<MongoStateDocument>, code: &str) -> u64 {
        collection
            .find_one(doc_code(code))
            .await
            .ok()
            .flatten()
            .map(|doc| doc.version())
            .unwrap_or(0)
    }

    async fn find_state(&self, code: String) -> MongoResult<Option<TournamentStateEntity>> {
        let document = self
            .states()
            .await
            .find_one(doc_code(&code))
            .await
            .map_err(|source| MongoDaoError::LoadState { code, source })?;
        Ok(document.map(Into::into))
    }

    async fn append_action(&self, record: ActionRecordEntity) -> MongoResult<()> {
        let id = record.id;
        let document: MongoActionDocument = record.into();
        self.actions()
            .await
            .insert_one(&document)
            .await
            .map_err(|source| MongoDaoError::AppendAction { id, source })?;
        Ok(())
    }

    async fn update_action_result(
        &self,
        action_id: Uuid,
        result: ActionResultEntity,
    ) -> MongoResult<()> {
        let result_tag = match result {
            ActionResultEntity::Success => "success",
            ActionResultEntity::Error => "error",
            ActionResultEntity::Ignored => "ignored",
        };
        self.actions()
            .await
            .update_one(
                doc! {"_id": uuid_as_binary(action_id)},
                doc! {"$set": {"result": result_tag}},
            )
            .await
            .map_err(|source| MongoDaoError::UpdateAction {
                id: action_id,
                source,
            })?;
        Ok(())
    }

    async fn find_action_by_key(
        &self,
        code: String,
        participant_id: Uuid,
        key: String,
        newer_than: SystemTime,
    ) -> MongoResult<Option<ActionRecordEntity>> {
        let filter = doc! {
            "room_code": &code,
            "participant_id": uuid_as_binary(participant_id),
            "idempotency_key": key,
            "recorded_at": {"$gte": DateTime::from_system_time(newer_than)},
        };
        let document = self
            .actions()
            .await
            .find_one(filter)
            .sort(doc! {"recorded_at": -1})
            .await
            .map_err(|source| MongoDaoError::FindAction { code, source })?;
        Ok(document.map(Into::into))
    }

    async fn insert_pick(&self, code: String, pick: PickEntity) -> MongoResult<PickInsert> {
        let document = MongoPickDocument::from_entity(code.clone(), pick);
        match self.picks().await.insert_one(&document).await {
            Ok(_) => Ok(PickInsert::Inserted),
            Err(err) if is_duplicate_key(&err) => Ok(PickInsert::Duplicate),
            Err(source) => Err(MongoDaoError::InsertPick { code, source }),
        }
    }

    async fn list_picks(&self, code: String) -> MongoResult<Vec<PickEntity>> {
        let documents: Vec<MongoPickDocument> = self
            .picks()
            .await
            .find(doc! {"room_code": &code})
            .sort(doc! {"submitted_at": 1})
            .await
            .map_err(|source| MongoDaoError::ListPicks {
                code: code.clone(),
                source,
            })?
            .try_collect()
            .await
            .map_err(|source| MongoDaoError::ListPicks { code, source })?;

        Ok(documents.into_iter().map(Into::into).collect())
    }

    async fn add_watchlist_entry(
        &self,
        user_id: Uuid,
        candidate: CandidateEntity,
        pending_rating: bool,
    ) -> MongoResult<()> {
        let document = MongoWatchlistDocument::new(user_id, candidate, pending_rating);
        match self.watchlist().await.insert_one(&document).await {
            Ok(_) => Ok(()),
            // Already on the list: keep the original entry.
            Err(err) if is_duplicate_key(&err) => Ok(()),
            Err(source) => Err(MongoDaoError::SaveWatchlist { user_id, source }),
        }
    }

    async fn list_watchlist(&self, user_id: Uuid) -> MongoResult<Vec<WatchlistEntryEntity>> {
        let documents: Vec<MongoWatchlistDocument> = self
            .watchlist()
            .await
            .find(doc! {"user_id": uuid_as_binary(user_id)})
            .await
            .map_err(|source| MongoDaoError::ListWatchlist { user_id, source })?
            .try_collect()
            .await
            .map_err(|source| MongoDaoError::ListWatchlist { user_id, source })?;

        Ok(documents.into_iter().map(Into::into).collect())
    }

    async fn load_preference(&self, user_id: Uuid, candidate_id: i64) -> MongoResult<Option<f64>> {
        let document = self
            .preferences()
            .await
            .find_one(doc! {"user_id": uuid_as_binary(user_id), "candidate_id": candidate_id})
            .await
            .map_err(|source| MongoDaoError::Preference { user_id, source })?;
        Ok(document.map(|doc| doc.score))
    }

    async fn save_preference(
        &self,
        user_id: Uuid,
        candidate_id: i64,
        score: f64,
    ) -> MongoResult<()> {
        let document = MongoPreferenceDocument {
            user_id,
            candidate_id,
            score,
            updated_at: DateTime::now(),
        };
        self.preferences()
            .await
            .replace_one(
                doc! {"user_id": uuid_as_binary(user_id), "candidate_id": candidate_id},
                &document,
            )
            .upsert(true)
            .await
            .map_err(|source| MongoDaoError::Preference { user_id, source })?;
        Ok(())
    }
}

fn is_duplicate_key(err: &mongodb::error::Error) -> bool {
    matches!(
        &*err.kind,
        ErrorKind::Write(WriteFailure::WriteError(write_error)) if write_error.code == 11000
    )
}

impl RoomStore for MongoRoomStore {
    fn save_room(&self, room: RoomEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.save_room(room).await.map_err(Into::into) })
    }

    fn find_room(&self, code: String) -> BoxFuture<'static, StorageResult<Option<RoomEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.find_room(code).await.map_err(Into::into) })
    }

    fn save_state(
        &self,
        code: String,
        state: TournamentStateEntity,
        expected_version: u64,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.save_state(code, state, expected_version).await })
    }

    fn find_state(
        &self,
        code: String,
    ) -> BoxFuture<'static, StorageResult<Option<TournamentStateEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.find_state(code).await.map_err(Into::into) })
    }

    fn append_action(&self, record: ActionRecordEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.append_action(record).await.map_err(Into::into) })
    }

    fn update_action_result(
        &self,
        action_id: Uuid,
        result: ActionResultEntity,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .update_action_result(action_id, result)
                .await
                .map_err(Into::into)
        })
    }

    fn find_action_by_key(
        &self,
        code: String,
        participant_id: Uuid,
        key: String,
        newer_than: SystemTime,
    ) -> BoxFuture<'static, StorageResult<Option<ActionRecordEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .find_action_by_key(code, participant_id, key, newer_than)
                .await
                .map_err(Into::into)
        })
    }

    fn insert_pick(
        &self,
        code: String,
        pick: PickEntity,
    ) -> BoxFuture<'static, StorageResult<PickInsert>> {
        let store = self.clone();
        Box::pin(async move { store.insert_pick(code, pick).await.map_err(Into::into) })
    }

    fn list_picks(&self, code: String) -> BoxFuture<'static, StorageResult<Vec<PickEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.list_picks(code).await.map_err(Into::into) })
    }

    fn add_watchlist_entry(
        &self,
        user_id: Uuid,
        candidate: CandidateEntity,
        pending_rating: bool,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .add_watchlist_entry(user_id, candidate, pending_rating)
                .await
                .map_err(Into::into)
        })
    }

    fn list_watchlist(
        &self,
        user_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Vec<WatchlistEntryEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.list_watchlist(user_id).await.map_err(Into::into) })
    }

    fn load_preference(
        &self,
        user_id: Uuid,
        candidate_id: i64,
    ) -> BoxFuture<'static, StorageResult<Option<f64>>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .load_preference(user_id, candidate_id)
                .await
                .map_err(Into::into)
        })
    }

    fn save_preference(
        &self,
        user_id: Uuid,
        candidate_id: i64,
        score: f64,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .save_preference(user_id, candidate_id, score)
                .await
                .map_err(Into::into)
        })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.ping().await.map_err(Into::into) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.reconnect().await.map_err(Into::into) })
    }
}
