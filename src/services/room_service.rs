//! Room lifecycle: creation, joining, and status rebuilds from participant
//! flags.

use std::{sync::Arc, time::SystemTime};

use indexmap::map::Entry;
use rand::Rng;
use tracing::info;

use crate::{
    dao::room_store::RoomStore,
    dto::{
        room::{CreateRoomRequest, JoinRoomRequest, RoomSummary},
        validation::{ROOM_CODE_LENGTH, validate_room_code},
    },
    error::ServiceError,
    services::sse_events,
    state::SharedState,
    tournament::model::{Participant, Room, RoomStatus},
};

/// Join codes avoid lookalike characters (0/O, 1/I/L) so they survive being
/// read out loud.
const CODE_ALPHABET: &[u8] = b"ABCDEFGHJKMNPQRSTUVWXYZ23456789";
const CODE_GENERATION_ATTEMPTS: usize = 8;

/// Uppercase and shape-check a client-supplied room code.
pub fn normalize_code(raw: &str) -> Result<String, ServiceError> {
    let code = raw.trim().to_ascii_uppercase();
    validate_room_code(&code)
        .map_err(|_| ServiceError::InvalidInput(format!("malformed room code `{raw}`")))?;
    Ok(code)
}

fn generate_code() -> String {
    let mut rng = rand::rng();
    (0..ROOM_CODE_LENGTH)
        .map(|_| CODE_ALPHABET[rng.random_range(0..CODE_ALPHABET.len())] as char)
        .collect()
}

/// Open a fresh waiting room owned by the requesting user.
pub async fn create_room(
    state: &SharedState,
    request: CreateRoomRequest,
) -> Result<RoomSummary, ServiceError> {
    let store = state.require_room_store().await?;

    for _ in 0..CODE_GENERATION_ATTEMPTS {
        let code = generate_code();
        if store.find_room(code.clone()).await?.is_some() {
            continue;
        }

        let room = Room::new(code.clone(), request.user_id);
        store.save_room(room.clone().into()).await?;
        info!(code, owner = %request.user_id, "room created");
        return Ok(RoomSummary::from(&room));
    }

    Err(ServiceError::Integrity(
        "failed to allocate a unique room code".into(),
    ))
}

/// Join a waiting room as its second participant.
///
/// Serialized against `start` through the room lock. A participant who left
/// a still-waiting room may rejoin.
pub async fn join_room(
    state: &SharedState,
    raw_code: &str,
    request: JoinRoomRequest,
) -> Result<RoomSummary, ServiceError> {
    let code = normalize_code(raw_code)?;
    let store = state.require_room_store().await?;
    let _guard = state.room_locks().acquire(&code).await?;

    let room = store
        .find_room(code.clone())
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("room `{code}` not found")))?;
    let mut room: Room = room.into();

    if room.status != RoomStatus::Waiting {
        return Err(ServiceError::InvalidState(format!(
            "room `{code}` is no longer accepting participants"
        )));
    }

    let now = SystemTime::now();
    let active_count = room.active_participants().len();
    match room.participants.entry(request.user_id) {
        Entry::Occupied(mut entry) => {
            let existing = entry.get_mut();
            if existing.active {
                return Err(ServiceError::InvalidState(format!(
                    "user `{}` already joined room `{code}`",
                    request.user_id
                )));
            }
            existing.active = true;
            existing.last_action_at = now;
        }
        Entry::Vacant(entry) => {
            if active_count >= 2 {
                return Err(ServiceError::InvalidState(format!(
                    "room `{code}` already has two active participants"
                )));
            }
            entry.insert(Participant::new(request.user_id, false));
        }
    }

    room.last_activity_at = now;
    store.save_room(room.clone().into()).await?;

    info!(code, user = %request.user_id, "participant joined");
    sse_events::broadcast_participant_joined(state, &code, request.user_id);
    Ok(RoomSummary::from(&room))
}

/// Recompute the room-level status purely from the participant active flags
/// currently in the store, persisting any change.
///
/// Deliberately reloads from storage instead of trusting caller-held state,
/// so the result is correct even after a process restart. A started room
/// needs two active participants; a waiting room survives on one (the
/// partner may still join) but dies at zero.
pub async fn rebuild_from_participants(
    store: &Arc<dyn RoomStore>,
    code: &str,
) -> Result<Room, ServiceError> {
    let room = store
        .find_room(code.to_owned())
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("room `{code}` not found")))?;
    let mut room: Room = room.into();

    let active = room.active_participants().len();
    let recomputed = match room.status {
        RoomStatus::Completed | RoomStatus::Abandoned => room.status,
        RoomStatus::Active if active < 2 => RoomStatus::Abandoned,
        RoomStatus::Active => RoomStatus::Active,
        RoomStatus::Waiting if active == 0 => RoomStatus::Abandoned,
        RoomStatus::Waiting => RoomStatus::Waiting,
    };

    if recomputed != room.status {
        room.status = recomputed;
        store.save_room(room.clone().into()).await?;
    }

    Ok(room)
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::*;
    use crate::services::test_support::test_state;

    #[tokio::test]
    async fn create_then_join_fills_the_room() {
        let state = test_state().await;
        let owner = Uuid::new_v4();
        let partner = Uuid::new_v4();

        let summary = create_room(
            &state,
            CreateRoomRequest { user_id: owner },
        )
        .await
        .unwrap();
        assert_eq!(summary.participants.len(), 1);
        validate_room_code(&summary.code).unwrap();

        let joined = join_room(
            &state,
            &summary.code,
            JoinRoomRequest { user_id: partner },
        )
        .await
        .unwrap();
        assert_eq!(joined.participants.len(), 2);
    }

    #[tokio::test]
    async fn third_participant_is_rejected() {
        let state = test_state().await;
        let summary = create_room(
            &state,
            CreateRoomRequest {
                user_id: Uuid::new_v4(),
            },
        )
        .await
        .unwrap();

        join_room(
            &state,
            &summary.code,
            JoinRoomRequest {
                user_id: Uuid::new_v4(),
            },
        )
        .await
        .unwrap();

        let err = join_room(
            &state,
            &summary.code,
            JoinRoomRequest {
                user_id: Uuid::new_v4(),
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidState(_)));
    }

    #[tokio::test]
    async fn joining_twice_is_rejected() {
        let state = test_state().await;
        let owner = Uuid::new_v4();
        let summary = create_room(&state, CreateRoomRequest { user_id: owner })
            .await
            .unwrap();

        let err = join_room(&state, &summary.code, JoinRoomRequest { user_id: owner })
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidState(_)));
    }

    #[tokio::test]
    async fn malformed_code_is_invalid_input() {
        let state = test_state().await;
        let err = join_room(
            &state,
            "not a code",
            JoinRoomRequest {
                user_id: Uuid::new_v4(),
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidInput(_)));
    }

    #[test]
    fn generated_codes_pass_validation() {
        for _ in 0..32 {
            validate_room_code(&generate_code()).unwrap();
        }
    }
}
