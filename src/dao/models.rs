use serde::{Deserialize, Serialize};
use std::time::SystemTime;
use uuid::Uuid;

/// Candidate nominated into a tournament, as persisted by the storage layer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CandidateEntity {
    /// Stable catalog identifier of the movie.
    pub id: i64,
    /// Display title.
    pub title: String,
    /// Poster/image reference, when the catalog provides one.
    pub poster_ref: Option<String>,
    /// Participants whose lists contributed this candidate (empty for fallback entries).
    pub contributed_by: Vec<Uuid>,
}

/// Bracket position of a match, unique per (room, round, position).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct MatchIdEntity {
    /// One-based round number.
    pub round: u32,
    /// Zero-based position within the round.
    pub position: u32,
}

/// One bracket node pairing two candidates.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MatchEntity {
    /// Bracket position of this match.
    pub id: MatchIdEntity,
    /// First candidate slot.
    pub a: CandidateEntity,
    /// Second candidate slot.
    pub b: CandidateEntity,
}

/// A participant's recorded vote on one match.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PickEntity {
    /// Match the vote applies to.
    pub match_id: MatchIdEntity,
    /// Voting participant.
    pub participant_id: Uuid,
    /// Candidate the participant chose.
    pub candidate_id: i64,
    /// Client-reported decision latency in milliseconds.
    pub response_time_ms: Option<u64>,
    /// Server-side submission timestamp.
    pub submitted_at: SystemTime,
}

/// Lifecycle stage of a tournament snapshot.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TournamentStatusEntity {
    /// A numbered elimination round is in play.
    Round {
        /// One-based round number.
        number: u32,
    },
    /// The two-way final match is in play.
    Final,
    /// A winner has been decided.
    Completed,
}

/// Tournament winner together with the watch-list bookkeeping flag.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WinnerEntity {
    /// Winning candidate.
    pub candidate: CandidateEntity,
    /// Whether the winner was written to both participants' watch lists.
    pub added_to_both_lists: bool,
}

/// Authoritative per-room tournament snapshot persisted by the storage layer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TournamentStateEntity {
    /// Lifecycle stage.
    pub status: TournamentStatusEntity,
    /// One-based number of the round currently in play.
    pub current_round: u32,
    /// Total number of rounds for the bracket size.
    pub total_rounds: u32,
    /// Matches of the current round only; future rounds are never materialized.
    pub matches: Vec<MatchEntity>,
    /// Full accumulated pick history.
    pub picks: Vec<PickEntity>,
    /// Full candidate pool in bracket order.
    pub pool: Vec<CandidateEntity>,
    /// Per-tournament shuffle and tie-break seed.
    pub shuffle_seed: u64,
    /// Monotonically increasing snapshot version.
    pub version: u64,
    /// Winner fields, present once completed.
    pub winner: Option<WinnerEntity>,
}

/// Room lifecycle status.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RoomStatusEntity {
    /// Waiting for the second participant and the start action.
    Waiting,
    /// Tournament in progress.
    Active,
    /// Tournament finished with a winner.
    Completed,
    /// Terminal state after losing a required participant.
    Abandoned,
}

/// A user's membership in a room.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ParticipantEntity {
    /// Identity of the user.
    pub user_id: Uuid,
    /// Whether the participant is still active in the room.
    pub active: bool,
    /// Whether the participant owns the room.
    pub owner: bool,
    /// Ordered list of matches this participant has voted on.
    pub completed_matches: Vec<MatchIdEntity>,
    /// Timestamp of the participant's last action.
    pub last_action_at: SystemTime,
}

/// One decision session, persisted by the storage layer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RoomEntity {
    /// Unique join code.
    pub code: String,
    /// User id of the room owner.
    pub owner_id: Uuid,
    /// Lifecycle status.
    pub status: RoomStatusEntity,
    /// Members of the room in join order.
    pub participants: Vec<ParticipantEntity>,
    /// Creation timestamp.
    pub created_at: SystemTime,
    /// Timestamp of the waiting → active transition.
    pub started_at: Option<SystemTime>,
    /// Timestamp of tournament completion.
    pub completed_at: Option<SystemTime>,
    /// Last activity timestamp, refreshed by the extend action.
    pub last_activity_at: SystemTime,
    /// Final winner, present once completed.
    pub winner: Option<CandidateEntity>,
}

/// Kind of mutating request processed for a room.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ActionKindEntity {
    /// Start the tournament.
    Start,
    /// Submit a vote for a match.
    Pick,
    /// Leave the room.
    Leave,
    /// Refresh the room's activity timer.
    Extend,
}

/// Outcome recorded for a processed action.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ActionResultEntity {
    /// The action mutated (or validly read) state.
    Success,
    /// The action failed validation or processing.
    Error,
    /// The action was recognized as an already-applied duplicate.
    Ignored,
}

/// Append-only audit and idempotency record for one action attempt.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ActionRecordEntity {
    /// Unique record id.
    pub id: Uuid,
    /// Room the action targeted.
    pub room_code: String,
    /// Acting participant.
    pub participant_id: Uuid,
    /// Action kind.
    pub kind: ActionKindEntity,
    /// Raw action payload, when one was supplied.
    pub payload: Option<serde_json::Value>,
    /// Client-supplied idempotency key, when one was supplied.
    pub idempotency_key: Option<String>,
    /// Recorded outcome.
    pub result: ActionResultEntity,
    /// Timestamp the attempt was recorded.
    pub recorded_at: SystemTime,
}

/// Watch-list entry written when a tournament completes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WatchlistEntryEntity {
    /// Owner of the watch-list entry.
    pub user_id: Uuid,
    /// Candidate added to the list.
    pub candidate: CandidateEntity,
    /// Whether a post-viewing rating is still pending.
    pub pending_rating: bool,
    /// Timestamp the entry was written.
    pub added_at: SystemTime,
}

/// Pairwise preference score accumulated per (participant, candidate).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PreferenceScoreEntity {
    /// Participant the score belongs to.
    pub user_id: Uuid,
    /// Candidate the score applies to.
    pub candidate_id: i64,
    /// Current score value.
    pub score: f64,
    /// Last update timestamp.
    pub updated_at: SystemTime,
}
