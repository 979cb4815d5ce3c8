//! Personalized view of the canonical room state, shaped for one participant.

use serde::Serialize;
use serde_with::skip_serializing_none;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::tournament::model::{
    Candidate, Match, Participant, Room, RoomStatus, TournamentStatus, Winner,
};

/// Client screen implied by the personalized state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Screen {
    /// Waiting for the partner and the start action.
    Lobby,
    /// An elimination-round match is ready for this participant.
    Bracket,
    /// This participant is done with the round; the partner is still picking.
    Waiting,
    /// The two-way final match is ready for this participant.
    Final,
    /// The tournament is decided.
    Winner,
    /// The room is in a terminal error state.
    Error,
}

/// Room lifecycle status as exposed to clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum RoomLifecycle {
    /// Waiting for the second participant and the start action.
    Waiting,
    /// Tournament in progress.
    Active,
    /// Tournament finished with a winner.
    Completed,
    /// Terminal state after losing a required participant.
    Abandoned,
}

impl From<RoomStatus> for RoomLifecycle {
    fn from(value: RoomStatus) -> Self {
        match value {
            RoomStatus::Waiting => RoomLifecycle::Waiting,
            RoomStatus::Active => RoomLifecycle::Active,
            RoomStatus::Completed => RoomLifecycle::Completed,
            RoomStatus::Abandoned => RoomLifecycle::Abandoned,
        }
    }
}

/// Candidate as exposed to clients.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CandidateSnapshot {
    /// Stable catalog identifier.
    pub candidate_id: i64,
    /// Display title.
    pub title: String,
    /// Poster/image reference.
    pub poster_ref: Option<String>,
    /// Whether the candidate came from both participants' lists.
    pub from_both_lists: bool,
}

impl From<&Candidate> for CandidateSnapshot {
    fn from(value: &Candidate) -> Self {
        Self {
            candidate_id: value.id,
            title: value.title.clone(),
            poster_ref: value.poster_ref.clone(),
            from_both_lists: value.from_both_lists(),
        }
    }
}

/// Match as exposed to clients.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MatchSnapshot {
    /// Rendered match id, e.g. `r1m0`.
    pub match_id: String,
    /// One-based round number.
    pub round: u32,
    /// First candidate slot.
    pub a: CandidateSnapshot,
    /// Second candidate slot.
    pub b: CandidateSnapshot,
}

impl From<&Match> for MatchSnapshot {
    fn from(value: &Match) -> Self {
        Self {
            match_id: value.id.to_string(),
            round: value.id.round,
            a: (&value.a).into(),
            b: (&value.b).into(),
        }
    }
}

/// Room membership as exposed to clients.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantSnapshot {
    /// Identity of the user.
    pub user_id: Uuid,
    /// Whether the participant owns the room.
    pub owner: bool,
    /// Whether the participant is still active.
    pub active: bool,
}

impl From<&Participant> for ParticipantSnapshot {
    fn from(value: &Participant) -> Self {
        Self {
            user_id: value.user_id,
            owner: value.owner,
            active: value.active,
        }
    }
}

/// Room header shared by every personalized state.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RoomSnapshot {
    /// Join code.
    pub code: String,
    /// Lifecycle status.
    pub status: RoomLifecycle,
    /// Members in join order.
    pub participants: Vec<ParticipantSnapshot>,
}

impl From<&Room> for RoomSnapshot {
    fn from(value: &Room) -> Self {
        Self {
            code: value.code.clone(),
            status: value.status.into(),
            participants: value.participants.values().map(Into::into).collect(),
        }
    }
}

/// Per-round progress counters for one participant.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProgressSnapshot {
    /// Picks this participant has submitted in the current round.
    pub user_picks: usize,
    /// Picks required of each participant this round (= match count).
    pub total_picks: usize,
    /// One-based current round.
    pub current_round: u32,
    /// Total rounds in the bracket.
    pub total_rounds: u32,
}

/// Tournament section of the personalized state.
#[skip_serializing_none]
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TournamentSnapshot {
    /// This participant's next unplayed match, absent while waiting.
    pub current_match: Option<MatchSnapshot>,
    /// Progress counters.
    pub progress: ProgressSnapshot,
}

/// Winner section of the personalized state.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct WinnerSnapshot {
    /// Winning candidate.
    pub candidate: CandidateSnapshot,
    /// Whether the winner was written to both participants' watch lists.
    pub added_to_both_lists: bool,
}

impl From<&Winner> for WinnerSnapshot {
    fn from(value: &Winner) -> Self {
        Self {
            candidate: (&value.candidate).into(),
            added_to_both_lists: value.added_to_both_lists,
        }
    }
}

/// The personalized state returned to one participant.
///
/// Both participants read the same canonical snapshot but each sees only
/// their own next unplayed match; completion pace differs per participant.
#[skip_serializing_none]
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PersonalizedState {
    /// Canonical snapshot version; monotonic non-decreasing per room.
    pub version: u64,
    /// Screen the client should display.
    pub screen: Screen,
    /// Room header.
    pub room: RoomSnapshot,
    /// Tournament section, present while a tournament is running.
    pub tournament: Option<TournamentSnapshot>,
    /// Winner section, present once the tournament is decided.
    pub winner: Option<WinnerSnapshot>,
    /// Actions currently valid for this participant.
    pub available_actions: Vec<String>,
    /// Terminal error description, present on the error screen.
    pub error: Option<String>,
}

/// Render a tournament status the way clients and logs spell it.
pub fn status_label(status: TournamentStatus) -> String {
    match status {
        TournamentStatus::Round(number) => format!("round_{number}"),
        TournamentStatus::Final => "final".into(),
        TournamentStatus::Completed => "completed".into(),
    }
}
