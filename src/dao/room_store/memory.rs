//! In-memory [`RoomStore`] backend.
//!
//! The default backend when no database is configured, and the backend used
//! by the test suite. Uniqueness and versioning guarantees are enforced with
//! the same semantics as the database-backed stores.

use std::time::SystemTime;

use dashmap::{DashMap, mapref::entry::Entry};
use futures::future::BoxFuture;
use uuid::Uuid;

use crate::dao::{
    models::{
        ActionRecordEntity, ActionResultEntity, CandidateEntity, MatchIdEntity, PickEntity,
        RoomEntity, TournamentStateEntity, WatchlistEntryEntity,
    },
    room_store::{PickInsert, RoomStore},
    storage::{StorageError, StorageResult},
};

/// Process-local store backed by concurrent maps.
#[derive(Default)]
pub struct InMemoryRoomStore {
    rooms: DashMap<String, RoomEntity>,
    states: DashMap<String, TournamentStateEntity>,
    actions: DashMap<Uuid, ActionRecordEntity>,
    picks: DashMap<(String, Uuid, MatchIdEntity), PickEntity>,
    watchlist: DashMap<(Uuid, i64), WatchlistEntryEntity>,
    preferences: DashMap<(Uuid, i64), f64>,
}

impl InMemoryRoomStore {
    /// Build an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl RoomStore for InMemoryRoomStore {
    fn save_room(&self, room: RoomEntity) -> BoxFuture<'static, StorageResult<()>> {
        self.rooms.insert(room.code.clone(), room);
        Box::pin(async { Ok(()) })
    }

    fn find_room(&self, code: String) -> BoxFuture<'static, StorageResult<Option<RoomEntity>>> {
        let room = self.rooms.get(&code).map(|entry| entry.value().clone());
        Box::pin(async move { Ok(room) })
    }

    fn save_state(
        &self,
        code: String,
        state: TournamentStateEntity,
        expected_version: u64,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let result = match self.states.entry(code.clone()) {
            Entry::Occupied(mut entry) => {
                let actual = entry.get().version;
                if actual != expected_version {
                    Err(StorageError::VersionConflict {
                        code,
                        expected: expected_version,
                        actual,
                    })
                } else {
                    entry.insert(state);
                    Ok(())
                }
            }
            Entry::Vacant(entry) => {
                if expected_version != 0 {
                    Err(StorageError::VersionConflict {
                        code,
                        expected: expected_version,
                        actual: 0,
                    })
                } else {
                    entry.insert(state);
                    Ok(())
                }
            }
        };
        Box::pin(async move { result })
    }

    fn find_state(
        &self,
        code: String,
    ) -> BoxFuture<'static, StorageResult<Option<TournamentStateEntity>>> {
        let state = self.states.get(&code).map(|entry| entry.value().clone());
        Box::pin(async move { Ok(state) })
    }

    fn append_action(&self, record: ActionRecordEntity) -> BoxFuture<'static, StorageResult<()>> {
        self.actions.insert(record.id, record);
        Box::pin(async { Ok(()) })
    }

    fn update_action_result(
        &self,
        action_id: Uuid,
        result: ActionResultEntity,
    ) -> BoxFuture<'static, StorageResult<()>> {
        if let Some(mut record) = self.actions.get_mut(&action_id) {
            record.result = result;
        }
        Box::pin(async { Ok(()) })
    }

    fn find_action_by_key(
        &self,
        code: String,
        participant_id: Uuid,
        key: String,
        newer_than: SystemTime,
    ) -> BoxFuture<'static, StorageResult<Option<ActionRecordEntity>>> {
        let found = self
            .actions
            .iter()
            .filter(|record| {
                record.room_code == code
                    && record.participant_id == participant_id
                    && record.idempotency_key.as_deref() == Some(key.as_str())
                    && record.recorded_at >= newer_than
            })
            .max_by_key(|record| record.recorded_at)
            .map(|record| record.value().clone());
        Box::pin(async move { Ok(found) })
    }

    fn insert_pick(
        &self,
        code: String,
        pick: PickEntity,
    ) -> BoxFuture<'static, StorageResult<PickInsert>> {
        let key = (code, pick.participant_id, pick.match_id);
        let outcome = match self.picks.entry(key) {
            Entry::Occupied(_) => PickInsert::Duplicate,
            Entry::Vacant(entry) => {
                entry.insert(pick);
                PickInsert::Inserted
            }
        };
        Box::pin(async move { Ok(outcome) })
    }

    fn list_picks(&self, code: String) -> BoxFuture<'static, StorageResult<Vec<PickEntity>>> {
        let mut picks: Vec<PickEntity> = self
            .picks
            .iter()
            .filter(|entry| entry.key().0 == code)
            .map(|entry| entry.value().clone())
            .collect();
        picks.sort_by_key(|pick| pick.submitted_at);
        Box::pin(async move { Ok(picks) })
    }

    fn add_watchlist_entry(
        &self,
        user_id: Uuid,
        candidate: CandidateEntity,
        pending_rating: bool,
    ) -> BoxFuture<'static, StorageResult<()>> {
        self.watchlist
            .entry((user_id, candidate.id))
            .or_insert_with(|| WatchlistEntryEntity {
                user_id,
                candidate,
                pending_rating,
                added_at: SystemTime::now(),
            });
        Box::pin(async { Ok(()) })
    }

    fn list_watchlist(
        &self,
        user_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Vec<WatchlistEntryEntity>>> {
        let entries: Vec<WatchlistEntryEntity> = self
            .watchlist
            .iter()
            .filter(|entry| entry.key().0 == user_id)
            .map(|entry| entry.value().clone())
            .collect();
        Box::pin(async move { Ok(entries) })
    }

    fn load_preference(
        &self,
        user_id: Uuid,
        candidate_id: i64,
    ) -> BoxFuture<'static, StorageResult<Option<f64>>> {
        let score = self
            .preferences
            .get(&(user_id, candidate_id))
            .map(|entry| *entry.value());
        Box::pin(async move { Ok(score) })
    }

    fn save_preference(
        &self,
        user_id: Uuid,
        candidate_id: i64,
        score: f64,
    ) -> BoxFuture<'static, StorageResult<()>> {
        self.preferences.insert((user_id, candidate_id), score);
        Box::pin(async { Ok(()) })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(async { Ok(()) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(async { Ok(()) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(id: i64) -> CandidateEntity {
        CandidateEntity {
            id,
            title: format!("movie {id}"),
            poster_ref: None,
            contributed_by: Vec::new(),
        }
    }

    fn pick(user: Uuid, round: u32, position: u32) -> PickEntity {
        PickEntity {
            match_id: MatchIdEntity { round, position },
            participant_id: user,
            candidate_id: 1,
            response_time_ms: None,
            submitted_at: SystemTime::now(),
        }
    }

    #[tokio::test]
    async fn duplicate_picks_are_rejected_without_error() {
        let store = InMemoryRoomStore::new();
        let user = Uuid::new_v4();

        let first = store
            .insert_pick("AAAAAA".into(), pick(user, 1, 0))
            .await
            .unwrap();
        let second = store
            .insert_pick("AAAAAA".into(), pick(user, 1, 0))
            .await
            .unwrap();

        assert_eq!(first, PickInsert::Inserted);
        assert_eq!(second, PickInsert::Duplicate);
        assert_eq!(store.list_picks("AAAAAA".into()).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn same_match_different_participants_both_insert() {
        let store = InMemoryRoomStore::new();
        let (alice, bob) = (Uuid::new_v4(), Uuid::new_v4());

        store
            .insert_pick("AAAAAA".into(), pick(alice, 1, 0))
            .await
            .unwrap();
        store
            .insert_pick("AAAAAA".into(), pick(bob, 1, 0))
            .await
            .unwrap();

        assert_eq!(store.list_picks("AAAAAA".into()).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn state_writes_enforce_the_expected_version() {
        let store = InMemoryRoomStore::new();
        let state = TournamentStateEntity {
            status: crate::dao::models::TournamentStatusEntity::Round { number: 1 },
            current_round: 1,
            total_rounds: 2,
            matches: Vec::new(),
            picks: Vec::new(),
            pool: Vec::new(),
            shuffle_seed: 0,
            version: 1,
            winner: None,
        };

        store
            .save_state("AAAAAA".into(), state.clone(), 0)
            .await
            .unwrap();

        let stale = store.save_state("AAAAAA".into(), state.clone(), 0).await;
        assert!(matches!(
            stale,
            Err(StorageError::VersionConflict {
                expected: 0,
                actual: 1,
                ..
            })
        ));

        let mut next = state;
        next.version = 2;
        store.save_state("AAAAAA".into(), next, 1).await.unwrap();
    }

    #[tokio::test]
    async fn watchlist_entries_are_written_exactly_once() {
        let store = InMemoryRoomStore::new();
        let user = Uuid::new_v4();

        store
            .add_watchlist_entry(user, candidate(42), true)
            .await
            .unwrap();
        store
            .add_watchlist_entry(user, candidate(42), true)
            .await
            .unwrap();

        let entries = store.list_watchlist(user).await.unwrap();
        assert_eq!(entries.len(), 1);
        assert!(entries[0].pending_rating);
    }

    #[tokio::test]
    async fn idempotency_lookup_honors_the_recency_window() {
        let store = InMemoryRoomStore::new();
        let user = Uuid::new_v4();
        let record = ActionRecordEntity {
            id: Uuid::new_v4(),
            room_code: "AAAAAA".into(),
            participant_id: user,
            kind: crate::dao::models::ActionKindEntity::Pick,
            payload: None,
            idempotency_key: Some("key-1".into()),
            result: ActionResultEntity::Success,
            recorded_at: SystemTime::now(),
        };
        store.append_action(record.clone()).await.unwrap();

        let past = SystemTime::now() - std::time::Duration::from_secs(60);
        let future = SystemTime::now() + std::time::Duration::from_secs(60);

        let hit = store
            .find_action_by_key("AAAAAA".into(), user, "key-1".into(), past)
            .await
            .unwrap();
        assert_eq!(hit.map(|r| r.id), Some(record.id));

        let miss = store
            .find_action_by_key("AAAAAA".into(), user, "key-1".into(), future)
            .await
            .unwrap();
        assert!(miss.is_none());
    }
}
