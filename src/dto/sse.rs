//! Payloads carried on the per-room SSE streams.

use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::dto::personalized::CandidateSnapshot;

#[derive(Clone, Debug)]
/// Dispatched payload carried across SSE channels.
pub struct ServerEvent {
    /// Optional SSE event name.
    pub event: Option<String>,
    /// Serialized data field.
    pub data: String,
}

impl ServerEvent {
    /// Build an event from a raw data string.
    pub fn new(event: Option<String>, data: String) -> Self {
        Self { event, data }
    }

    /// Convenience wrapper that serialises `payload` into the SSE data field.
    pub fn json<E, T>(event: E, payload: &T) -> serde_json::Result<Self>
    where
        E: Into<Option<String>>,
        T: Serialize,
    {
        Ok(Self {
            event: event.into(),
            data: serde_json::to_string(payload)?,
        })
    }
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
/// Initial metadata sent to an SSE client when it connects.
pub struct Handshake {
    /// Room the stream is scoped to.
    pub room: String,
    /// Human-readable message confirming the subscription.
    pub message: String,
    /// Whether the backend is running without a storage backend connection.
    pub degraded: bool,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
/// Broadcast whenever a room's canonical state changes.
///
/// Delivery is at-least-once; clients must tolerate duplicate or stale
/// envelopes and always trust the highest version they have seen.
pub struct StateChangedEvent {
    /// New canonical snapshot version.
    pub version: u64,
    /// Tournament status label (`round_N`, `final`, `completed`).
    pub status: String,
    /// One-based current round.
    pub current_round: u32,
    /// Total rounds in the bracket.
    pub total_rounds: u32,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
/// Broadcast when a participant joins the room.
pub struct ParticipantJoinedEvent {
    /// The joining user.
    pub user_id: Uuid,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
/// Broadcast when a participant leaves the room.
pub struct ParticipantLeftEvent {
    /// The leaving user.
    pub user_id: Uuid,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
/// Broadcast when the room drops to the terminal abandoned state.
pub struct RoomAbandonedEvent {
    /// The abandoned room.
    pub code: String,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
/// Broadcast when the tournament is decided.
pub struct TournamentCompletedEvent {
    /// Winning candidate.
    pub winner: CandidateSnapshot,
    /// Whether the winner was written to both participants' watch lists.
    pub added_to_both_lists: bool,
}
