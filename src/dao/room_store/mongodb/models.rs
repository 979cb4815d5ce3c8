use mongodb::bson::{Binary, DateTime, Document, doc, spec::BinarySubtype};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::dao::models::{
    ActionKindEntity, ActionResultEntity, CandidateEntity, MatchEntity, MatchIdEntity,
    ParticipantEntity, PickEntity, RoomEntity, RoomStatusEntity, TournamentStateEntity,
    TournamentStatusEntity, WatchlistEntryEntity, WinnerEntity,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoRoomDocument {
    #[serde(rename = "_id")]
    code: String,
    owner_id: Uuid,
    status: RoomStatusEntity,
    participants: Vec<ParticipantEntity>,
    created_at: DateTime,
    started_at: Option<DateTime>,
    completed_at: Option<DateTime>,
    last_activity_at: DateTime,
    winner: Option<CandidateEntity>,
}

impl From<RoomEntity> for MongoRoomDocument {
    fn from(value: RoomEntity) -> Self {
        Self {
            code: value.code,
            owner_id: value.owner_id,
            status: value.status,
            participants: value.participants,
            created_at: DateTime::from_system_time(value.created_at),
            started_at: value.started_at.map(DateTime::from_system_time),
            completed_at: value.completed_at.map(DateTime::from_system_time),
            last_activity_at: DateTime::from_system_time(value.last_activity_at),
            winner: value.winner,
        }
    }
}

impl From<MongoRoomDocument> for RoomEntity {
    fn from(value: MongoRoomDocument) -> Self {
        Self {
            code: value.code,
            owner_id: value.owner_id,
            status: value.status,
            participants: value.participants,
            created_at: value.created_at.to_system_time(),
            started_at: value.started_at.map(|ts| ts.to_system_time()),
            completed_at: value.completed_at.map(|ts| ts.to_system_time()),
            last_activity_at: value.last_activity_at.to_system_time(),
            winner: value.winner,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoStateDocument {
    #[serde(rename = "_id")]
    code: String,
    status: TournamentStatusEntity,
    current_round: u32,
    total_rounds: u32,
    matches: Vec<MatchEntity>,
    picks: Vec<PickEntity>,
    pool: Vec<CandidateEntity>,
    // Stored bit-cast: the seed is a full-range u64 and BSON only has i64.
    shuffle_seed: i64,
    version: i64,
    winner: Option<WinnerEntity>,
}

impl MongoStateDocument {
    pub fn from_entity(code: String, value: TournamentStateEntity) -> Self {
        Self {
            code,
            status: value.status,
            current_round: value.current_round,
            total_rounds: value.total_rounds,
            matches: value.matches,
            picks: value.picks,
            pool: value.pool,
            shuffle_seed: value.shuffle_seed as i64,
            version: value.version as i64,
            winner: value.winner,
        }
    }

    pub fn version(&self) -> u64 {
        self.version as u64
    }
}

impl From<MongoStateDocument> for TournamentStateEntity {
    fn from(value: MongoStateDocument) -> Self {
        Self {
            status: value.status,
            current_round: value.current_round,
            total_rounds: value.total_rounds,
            matches: value.matches,
            picks: value.picks,
            pool: value.pool,
            shuffle_seed: value.shuffle_seed as u64,
            version: value.version as u64,
            winner: value.winner,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoActionDocument {
    #[serde(rename = "_id")]
    id: Uuid,
    room_code: String,
    participant_id: Uuid,
    kind: ActionKindEntity,
    payload: Option<serde_json::Value>,
    idempotency_key: Option<String>,
    result: ActionResultEntity,
    recorded_at: DateTime,
}

impl From<crate::dao::models::ActionRecordEntity> for MongoActionDocument {
    fn from(value: crate::dao::models::ActionRecordEntity) -> Self {
        Self {
            id: value.id,
            room_code: value.room_code,
            participant_id: value.participant_id,
            kind: value.kind,
            payload: value.payload,
            idempotency_key: value.idempotency_key,
            result: value.result,
            recorded_at: DateTime::from_system_time(value.recorded_at),
        }
    }
}

impl From<MongoActionDocument> for crate::dao::models::ActionRecordEntity {
    fn from(value: MongoActionDocument) -> Self {
        Self {
            id: value.id,
            room_code: value.room_code,
            participant_id: value.participant_id,
            kind: value.kind,
            payload: value.payload,
            idempotency_key: value.idempotency_key,
            result: value.result,
            recorded_at: value.recorded_at.to_system_time(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoPickDocument {
    room_code: String,
    participant_id: Uuid,
    round: u32,
    position: u32,
    candidate_id: i64,
    response_time_ms: Option<u64>,
    submitted_at: DateTime,
}

impl MongoPickDocument {
    pub fn from_entity(room_code: String, value: PickEntity) -> Self {
        Self {
            room_code,
            participant_id: value.participant_id,
            round: value.match_id.round,
            position: value.match_id.position,
            candidate_id: value.candidate_id,
            response_time_ms: value.response_time_ms,
            submitted_at: DateTime::from_system_time(value.submitted_at),
        }
    }
}

impl From<MongoPickDocument> for PickEntity {
    fn from(value: MongoPickDocument) -> Self {
        Self {
            match_id: MatchIdEntity {
                round: value.round,
                position: value.position,
            },
            participant_id: value.participant_id,
            candidate_id: value.candidate_id,
            response_time_ms: value.response_time_ms,
            submitted_at: value.submitted_at.to_system_time(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoWatchlistDocument {
    user_id: Uuid,
    candidate_id: i64,
    candidate: CandidateEntity,
    pending_rating: bool,
    added_at: DateTime,
}

impl MongoWatchlistDocument {
    pub fn new(user_id: Uuid, candidate: CandidateEntity, pending_rating: bool) -> Self {
        Self {
            user_id,
            candidate_id: candidate.id,
            candidate,
            pending_rating,
            added_at: DateTime::now(),
        }
    }
}

impl From<MongoWatchlistDocument> for WatchlistEntryEntity {
    fn from(value: MongoWatchlistDocument) -> Self {
        Self {
            user_id: value.user_id,
            candidate: value.candidate,
            pending_rating: value.pending_rating,
            added_at: value.added_at.to_system_time(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoPreferenceDocument {
    pub user_id: Uuid,
    pub candidate_id: i64,
    pub score: f64,
    pub updated_at: DateTime,
}

pub fn uuid_as_binary(id: Uuid) -> Binary {
    Binary {
        subtype: BinarySubtype::Uuid,
        bytes: id.into_bytes().to_vec(),
    }
}

pub fn doc_code(code: &str) -> Document {
    doc! {"_id": code}
}
