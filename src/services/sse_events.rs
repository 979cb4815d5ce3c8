//! Typed broadcast helpers for the per-room SSE streams.

use tracing::warn;
use uuid::Uuid;

use crate::{
    dto::{
        personalized::{CandidateSnapshot, status_label},
        sse::{
            ParticipantJoinedEvent, ParticipantLeftEvent, RoomAbandonedEvent, ServerEvent,
            StateChangedEvent, TournamentCompletedEvent,
        },
    },
    state::SharedState,
    tournament::model::TournamentState,
};

const EVENT_STATE_CHANGED: &str = "state.changed";
const EVENT_PARTICIPANT_JOINED: &str = "participant.joined";
const EVENT_PARTICIPANT_LEFT: &str = "participant.left";
const EVENT_ROOM_ABANDONED: &str = "room.abandoned";
const EVENT_TOURNAMENT_COMPLETED: &str = "tournament.completed";

/// Broadcast a canonical state change to the room's subscribers.
pub fn broadcast_state_changed(state: &SharedState, code: &str, tournament: &TournamentState) {
    let payload = StateChangedEvent {
        version: tournament.version,
        status: status_label(tournament.status),
        current_round: tournament.current_round,
        total_rounds: tournament.total_rounds,
    };
    send_room_event(state, code, EVENT_STATE_CHANGED, &payload);
}

/// Broadcast that a participant joined the room.
pub fn broadcast_participant_joined(state: &SharedState, code: &str, user_id: Uuid) {
    let payload = ParticipantJoinedEvent { user_id };
    send_room_event(state, code, EVENT_PARTICIPANT_JOINED, &payload);
}

/// Broadcast that a participant left the room.
pub fn broadcast_participant_left(state: &SharedState, code: &str, user_id: Uuid) {
    let payload = ParticipantLeftEvent { user_id };
    send_room_event(state, code, EVENT_PARTICIPANT_LEFT, &payload);
}

/// Broadcast that the room dropped to the terminal abandoned state.
pub fn broadcast_room_abandoned(state: &SharedState, code: &str) {
    let payload = RoomAbandonedEvent {
        code: code.to_owned(),
    };
    send_room_event(state, code, EVENT_ROOM_ABANDONED, &payload);
}

/// Broadcast the decided tournament winner.
pub fn broadcast_tournament_completed(
    state: &SharedState,
    code: &str,
    winner: CandidateSnapshot,
    added_to_both_lists: bool,
) {
    let payload = TournamentCompletedEvent {
        winner,
        added_to_both_lists,
    };
    send_room_event(state, code, EVENT_TOURNAMENT_COMPLETED, &payload);
}

fn send_room_event<T: serde::Serialize>(
    state: &SharedState,
    code: &str,
    event_name: &str,
    payload: &T,
) {
    match ServerEvent::json(Some(event_name.to_string()), payload) {
        Ok(event) => state.room_sse().broadcast(code, event),
        Err(err) => warn!(event = event_name, error = %err, "failed to serialize SSE event"),
    }
}
