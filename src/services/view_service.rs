//! Projection of the canonical room state into one participant's view.

use uuid::Uuid;

use crate::{
    dto::personalized::{
        PersonalizedState, ProgressSnapshot, RoomSnapshot, Screen, TournamentSnapshot,
        WinnerSnapshot,
    },
    error::ServiceError,
    state::SharedState,
    tournament::model::{Participant, Room, RoomStatus, TournamentState, TournamentStatus},
};

fn actions(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| (*s).to_string()).collect()
}

/// Compute the personalized state for one participant from the canonical
/// room and tournament snapshots.
pub fn personalized_state(
    room: &Room,
    tournament: Option<&TournamentState>,
    user_id: Uuid,
) -> Result<PersonalizedState, ServiceError> {
    let participant = room.participant(user_id).ok_or_else(|| {
        ServiceError::NotFound(format!("user `{user_id}` is not in room `{}`", room.code))
    })?;

    let version = tournament.map(|t| t.version).unwrap_or(0);
    let room_snapshot = RoomSnapshot::from(room);

    let state = match room.status {
        RoomStatus::Waiting => {
            let can_start = participant.owner && room.active_participants().len() == 2;
            PersonalizedState {
                version,
                screen: Screen::Lobby,
                room: room_snapshot,
                tournament: None,
                winner: None,
                available_actions: if can_start {
                    actions(&["start", "leave", "extend"])
                } else {
                    actions(&["leave", "extend"])
                },
                error: None,
            }
        }
        RoomStatus::Abandoned => PersonalizedState {
            version,
            screen: Screen::Error,
            room: room_snapshot,
            tournament: None,
            winner: None,
            available_actions: Vec::new(),
            error: Some("room was abandoned".into()),
        },
        RoomStatus::Completed => {
            let winner = tournament
                .and_then(|t| t.winner.as_ref())
                .map(WinnerSnapshot::from);
            PersonalizedState {
                version,
                screen: Screen::Winner,
                room: room_snapshot,
                tournament: None,
                winner,
                available_actions: Vec::new(),
                error: None,
            }
        }
        RoomStatus::Active => {
            let tournament = tournament.ok_or_else(|| {
                ServiceError::Integrity(format!(
                    "active room `{}` has no tournament state",
                    room.code
                ))
            })?;
            active_state(tournament, room_snapshot, participant, version)
        }
    };

    Ok(state)
}

fn active_state(
    tournament: &TournamentState,
    room_snapshot: RoomSnapshot,
    participant: &Participant,
    version: u64,
) -> PersonalizedState {
    if !participant.active {
        return PersonalizedState {
            version,
            screen: Screen::Error,
            room: room_snapshot,
            tournament: None,
            winner: None,
            available_actions: Vec::new(),
            error: Some("participant has left the room".into()),
        };
    }

    // A completed tournament whose room flip has not been read back yet still
    // renders the winner screen.
    if let TournamentStatus::Completed = tournament.status {
        return PersonalizedState {
            version,
            screen: Screen::Winner,
            room: room_snapshot,
            tournament: None,
            winner: tournament.winner.as_ref().map(WinnerSnapshot::from),
            available_actions: Vec::new(),
            error: None,
        };
    }

    let current_match = tournament.next_match_for(&participant.completed_matches);
    let progress = ProgressSnapshot {
        user_picks: tournament.round_picks_by(participant.user_id),
        total_picks: tournament.matches.len(),
        current_round: tournament.current_round,
        total_rounds: tournament.total_rounds,
    };

    let screen = match (&tournament.status, current_match.is_some()) {
        (TournamentStatus::Final, true) => Screen::Final,
        (_, true) => Screen::Bracket,
        (_, false) => Screen::Waiting,
    };

    let available_actions = if current_match.is_some() {
        actions(&["pick", "leave", "extend"])
    } else {
        actions(&["leave", "extend"])
    };

    PersonalizedState {
        version,
        screen,
        room: room_snapshot,
        tournament: Some(TournamentSnapshot {
            current_match: current_match.map(Into::into),
            progress,
        }),
        winner: None,
        available_actions,
        error: None,
    }
}

/// Load a room and its tournament snapshot, then project the personalized
/// state for the requesting participant. Read-only.
pub async fn load_personalized_state(
    state: &SharedState,
    code: &str,
    user_id: Uuid,
) -> Result<PersonalizedState, ServiceError> {
    let store = state.require_room_store().await?;

    let room = store
        .find_room(code.to_owned())
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("room `{code}` not found")))?;
    let tournament = store.find_state(code.to_owned()).await?;

    let room: Room = room.into();
    let tournament: Option<TournamentState> = tournament.map(Into::into);
    personalized_state(&room, tournament.as_ref(), user_id)
}

#[cfg(test)]
mod tests {
    use std::time::SystemTime;

    use super::*;
    use crate::tournament::{
        bracket::{build_bracket, merge_candidates},
        model::{Participant, Pick},
    };
    use crate::dao::catalog::CandidateRecord;

    fn records(ids: &[i64]) -> Vec<CandidateRecord> {
        ids.iter()
            .map(|id| CandidateRecord {
                candidate_id: *id,
                title: format!("movie {id}"),
                poster_ref: None,
            })
            .collect()
    }

    fn active_room_with_state() -> (Room, TournamentState, Uuid, Uuid) {
        let owner = Uuid::new_v4();
        let partner = Uuid::new_v4();

        let mut room = Room::new("ABC123".into(), owner);
        room.participants
            .insert(partner, Participant::new(partner, false));
        room.status = RoomStatus::Active;
        room.started_at = Some(SystemTime::now());

        let merged = merge_candidates(
            (owner, records(&[1, 2, 3, 4])),
            (partner, records(&[3, 4, 5, 6])),
        );
        let bracket = build_bracket(merged, &[], 11).unwrap();
        let state = TournamentState::from_bracket(bracket);

        (room, state, owner, partner)
    }

    #[test]
    fn lobby_owner_with_partner_can_start() {
        let owner = Uuid::new_v4();
        let partner = Uuid::new_v4();
        let mut room = Room::new("ABC123".into(), owner);
        room.participants
            .insert(partner, Participant::new(partner, false));

        let view = personalized_state(&room, None, owner).unwrap();
        assert_eq!(view.screen, Screen::Lobby);
        assert_eq!(view.version, 0);
        assert!(view.available_actions.contains(&"start".to_string()));

        let partner_view = personalized_state(&room, None, partner).unwrap();
        assert!(!partner_view.available_actions.contains(&"start".to_string()));
    }

    #[test]
    fn lobby_owner_alone_cannot_start() {
        let owner = Uuid::new_v4();
        let room = Room::new("ABC123".into(), owner);
        let view = personalized_state(&room, None, owner).unwrap();
        assert!(!view.available_actions.contains(&"start".to_string()));
    }

    #[test]
    fn unknown_user_is_rejected() {
        let room = Room::new("ABC123".into(), Uuid::new_v4());
        let err = personalized_state(&room, None, Uuid::new_v4()).unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));
    }

    #[test]
    fn active_round_presents_the_next_unplayed_match() {
        let (room, state, owner, _) = active_room_with_state();

        let view = personalized_state(&room, Some(&state), owner).unwrap();
        assert_eq!(view.screen, Screen::Bracket);

        let tournament = view.tournament.unwrap();
        let current = tournament.current_match.unwrap();
        assert_eq!(current.match_id, "r1m0");
        assert_eq!(tournament.progress.user_picks, 0);
        assert_eq!(tournament.progress.total_picks, state.matches.len());
        assert!(view.available_actions.contains(&"pick".to_string()));
    }

    #[test]
    fn participant_done_with_round_sees_waiting() {
        let (mut room, mut state, owner, _) = active_room_with_state();

        // Owner votes every match of the round; partner has not.
        let completed: Vec<_> = state.matches.iter().map(|m| m.id).collect();
        for m in state.matches.clone() {
            state = state.with_pick(Pick {
                match_id: m.id,
                participant_id: owner,
                candidate_id: m.a.id,
                response_time_ms: None,
                submitted_at: SystemTime::now(),
            });
        }
        room.participant_mut(owner).unwrap().completed_matches = completed;

        let view = personalized_state(&room, Some(&state), owner).unwrap();
        assert_eq!(view.screen, Screen::Waiting);
        let tournament = view.tournament.unwrap();
        assert!(tournament.current_match.is_none());
        assert_eq!(tournament.progress.user_picks, tournament.progress.total_picks);
        assert!(!view.available_actions.contains(&"pick".to_string()));
    }

    #[test]
    fn abandoned_room_renders_the_error_screen() {
        let (mut room, state, owner, _) = active_room_with_state();
        room.status = RoomStatus::Abandoned;

        let view = personalized_state(&room, Some(&state), owner).unwrap();
        assert_eq!(view.screen, Screen::Error);
        assert!(view.available_actions.is_empty());
        assert!(view.error.is_some());
    }

    #[test]
    fn completed_tournament_renders_the_winner_screen() {
        let (mut room, state, owner, _) = active_room_with_state();
        let champion = state.pool[0].clone();
        let state = state.completed_with(champion.clone(), true);
        room.status = RoomStatus::Completed;
        room.winner = Some(champion.clone());

        let view = personalized_state(&room, Some(&state), owner).unwrap();
        assert_eq!(view.screen, Screen::Winner);
        let winner = view.winner.unwrap();
        assert_eq!(winner.candidate.candidate_id, champion.id);
        assert!(winner.added_to_both_lists);
    }
}
