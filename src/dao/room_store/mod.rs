//! Persistence boundary for rooms, tournament snapshots, picks, action
//! records, watch-list entries, and preference scores.

pub mod memory;
#[cfg(feature = "mongo-store")]
pub mod mongodb;

use std::time::SystemTime;

use futures::future::BoxFuture;
use uuid::Uuid;

use crate::dao::{
    models::{
        ActionRecordEntity, ActionResultEntity, CandidateEntity, PickEntity, RoomEntity,
        TournamentStateEntity, WatchlistEntryEntity,
    },
    storage::StorageResult,
};

/// Outcome of attempting to insert a pick under the uniqueness constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PickInsert {
    /// The pick is new and was recorded.
    Inserted,
    /// A pick for this (room, participant, match) already exists; nothing
    /// was written.
    Duplicate,
}

/// Abstraction over the persistence layer for decision rooms.
///
/// Implementations must enforce the uniqueness constraint on
/// (room, participant, match) picks, the expected-version check on snapshot
/// writes, and exactly-once watch-list insertion per (user, candidate).
pub trait RoomStore: Send + Sync {
    /// Upsert a room and its participants.
    fn save_room(&self, room: RoomEntity) -> BoxFuture<'static, StorageResult<()>>;
    /// Load a room by code.
    fn find_room(&self, code: String) -> BoxFuture<'static, StorageResult<Option<RoomEntity>>>;
    /// Write a tournament snapshot, requiring the stored version to equal
    /// `expected_version` (0 meaning no snapshot exists yet).
    fn save_state(
        &self,
        code: String,
        state: TournamentStateEntity,
        expected_version: u64,
    ) -> BoxFuture<'static, StorageResult<()>>;
    /// Load a room's tournament snapshot.
    fn find_state(
        &self,
        code: String,
    ) -> BoxFuture<'static, StorageResult<Option<TournamentStateEntity>>>;
    /// Append an audit record for an action attempt.
    fn append_action(&self, record: ActionRecordEntity) -> BoxFuture<'static, StorageResult<()>>;
    /// Correct the recorded outcome of a previously appended action.
    fn update_action_result(
        &self,
        action_id: Uuid,
        result: ActionResultEntity,
    ) -> BoxFuture<'static, StorageResult<()>>;
    /// Most recent action by the given participant carrying the given
    /// idempotency key, recorded no earlier than `newer_than`.
    fn find_action_by_key(
        &self,
        code: String,
        participant_id: Uuid,
        key: String,
        newer_than: SystemTime,
    ) -> BoxFuture<'static, StorageResult<Option<ActionRecordEntity>>>;
    /// Insert a pick, honoring the (room, participant, match) uniqueness
    /// constraint.
    fn insert_pick(
        &self,
        code: String,
        pick: PickEntity,
    ) -> BoxFuture<'static, StorageResult<PickInsert>>;
    /// All picks recorded for a room.
    fn list_picks(&self, code: String) -> BoxFuture<'static, StorageResult<Vec<PickEntity>>>;
    /// Write a watch-list entry; at most one per (user, candidate) is kept.
    fn add_watchlist_entry(
        &self,
        user_id: Uuid,
        candidate: CandidateEntity,
        pending_rating: bool,
    ) -> BoxFuture<'static, StorageResult<()>>;
    /// Watch-list entries for a user.
    fn list_watchlist(
        &self,
        user_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Vec<WatchlistEntryEntity>>>;
    /// Current preference score for a (participant, candidate) pair.
    fn load_preference(
        &self,
        user_id: Uuid,
        candidate_id: i64,
    ) -> BoxFuture<'static, StorageResult<Option<f64>>>;
    /// Store a preference score for a (participant, candidate) pair.
    fn save_preference(
        &self,
        user_id: Uuid,
        candidate_id: i64,
        score: f64,
    ) -> BoxFuture<'static, StorageResult<()>>;
    /// Ping the backend.
    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>>;
    /// Attempt to re-establish a lost backend connection.
    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>>;
}
