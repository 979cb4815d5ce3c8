//! Room bootstrap payloads and summaries.

use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    dto::{
        format_system_time,
        personalized::{CandidateSnapshot, ParticipantSnapshot, RoomLifecycle},
    },
    tournament::model::Room,
};

/// Request to open a fresh room; the caller becomes its owner.
#[derive(Debug, Clone, Deserialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateRoomRequest {
    /// Identity of the room owner.
    pub user_id: Uuid,
}

/// Request to join an existing waiting room as the second participant.
#[derive(Debug, Clone, Deserialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct JoinRoomRequest {
    /// Identity of the joining user.
    pub user_id: Uuid,
}

/// Query parameters identifying the reading participant.
#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StateQuery {
    /// Participant whose personalized state is requested.
    pub user_id: Uuid,
}

/// Summary returned by room bootstrap operations.
#[skip_serializing_none]
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RoomSummary {
    /// Join code.
    pub code: String,
    /// Lifecycle status.
    pub status: RoomLifecycle,
    /// Owner's user id.
    pub owner_id: Uuid,
    /// Members in join order.
    pub participants: Vec<ParticipantSnapshot>,
    /// RFC 3339 creation timestamp.
    pub created_at: String,
    /// RFC 3339 start timestamp, once active.
    pub started_at: Option<String>,
    /// RFC 3339 completion timestamp, once completed.
    pub completed_at: Option<String>,
    /// Final winner, once completed.
    pub winner: Option<CandidateSnapshot>,
}

impl From<&Room> for RoomSummary {
    fn from(value: &Room) -> Self {
        Self {
            code: value.code.clone(),
            status: value.status.into(),
            owner_id: value.owner_id,
            participants: value.participants.values().map(Into::into).collect(),
            created_at: format_system_time(value.created_at),
            started_at: value.started_at.map(format_system_time),
            completed_at: value.completed_at.map(format_system_time),
            winner: value.winner.as_ref().map(Into::into),
        }
    }
}
