//! The action processor: the only path by which tournament state changes.
//!
//! Every mutating request goes through [`process`]: idempotency-key replay
//! detection, bounded per-room lock acquisition, an audit record for the
//! attempt, validation against the acting participant's personalized state,
//! the state transition itself, persistence, and the room broadcast.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use rand::Rng;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::{
    dao::{
        models::{ActionRecordEntity, ActionResultEntity},
        room_store::{PickInsert, RoomStore},
    },
    dto::action::{ActionKind, ActionRequest, ActionResponse},
    error::ServiceError,
    services::{
        rating_service::RatingUpdate, room_service, sse_events, view_service,
    },
    state::SharedState,
    tournament::{
        advance::{RoundOutcome, advance_round},
        bracket::{build_bracket, merge_candidates},
        model::{
            Candidate, MatchId, Pick, Room, RoomStatus, TournamentState, TournamentStatus,
        },
    },
};

/// How long a successful action record short-circuits a retried key.
pub const IDEMPOTENCY_WINDOW: Duration = Duration::from_secs(5 * 60);
/// Hard ceiling on lock-holding work; beyond it the lock is force-released.
pub const PROCESS_TIMEOUT: Duration = Duration::from_secs(5);

/// Outcome of applying a validated action.
enum Applied {
    /// Canonical state was mutated.
    Mutated(ActionResponse),
    /// The action was an already-applied duplicate; nothing was mutated.
    Ignored(ActionResponse),
}

/// Process one action against a room.
///
/// Within a room, actions apply in lock-grant order; across rooms there is
/// no ordering. Validation failures return typed errors without mutating
/// anything; duplicate picks are ignored-as-success.
pub async fn process(
    state: &SharedState,
    raw_code: &str,
    request: ActionRequest,
) -> Result<ActionResponse, ServiceError> {
    let code = room_service::normalize_code(raw_code)?;
    let store = state.require_room_store().await?;
    let user_id = request.user_id;

    // Step 1: a successful prior action with the same key is not reapplied;
    // the caller simply observes the current state.
    if let Some(key) = request.idempotency_key.as_deref() {
        let window_start = SystemTime::now()
            .checked_sub(IDEMPOTENCY_WINDOW)
            .unwrap_or(UNIX_EPOCH);
        if let Some(prior) = store
            .find_action_by_key(code.clone(), user_id, key.to_owned(), window_start)
            .await?
        {
            if prior.result == ActionResultEntity::Success {
                debug!(code, %user_id, key, "idempotency key replay; returning current state");
                let view = view_service::load_personalized_state(state, &code, user_id).await?;
                return Ok(ActionResponse::ok(view));
            }
        }
    }

    // Step 2: exclusive per-room lock, bounded retry.
    let guard = state.room_locks().acquire(&code).await?;

    // Step 3: provisional audit record, corrected below when the attempt
    // does not end in a mutation.
    let record_id = Uuid::new_v4();
    store
        .append_action(ActionRecordEntity {
            id: record_id,
            room_code: code.clone(),
            participant_id: user_id,
            kind: request.action.into(),
            payload: request
                .payload
                .as_ref()
                .and_then(|p| serde_json::to_value(p).ok()),
            idempotency_key: request.idempotency_key.clone(),
            result: ActionResultEntity::Success,
            recorded_at: SystemTime::now(),
        })
        .await?;

    // Steps 4-6 under the hard processing timeout.
    let applied = match timeout(PROCESS_TIMEOUT, apply_action(state, &store, &code, &request)).await
    {
        Ok(outcome) => outcome,
        Err(_) => {
            drop(guard);
            error!(
                code, %user_id, action = ?request.action,
                "action processing exceeded the hard timeout; lock force-released"
            );
            correct_record(&store, record_id, ActionResultEntity::Error).await;
            return Err(ServiceError::Timeout);
        }
    };
    drop(guard);

    match applied {
        Ok(Applied::Mutated(response)) => Ok(response),
        Ok(Applied::Ignored(response)) => {
            correct_record(&store, record_id, ActionResultEntity::Ignored).await;
            Ok(response)
        }
        Err(err) => {
            correct_record(&store, record_id, ActionResultEntity::Error).await;
            Err(err)
        }
    }
}

async fn correct_record(
    store: &std::sync::Arc<dyn RoomStore>,
    record_id: Uuid,
    result: ActionResultEntity,
) {
    if let Err(err) = store.update_action_result(record_id, result).await {
        warn!(%record_id, error = %err, "failed to correct audit record");
    }
}

async fn apply_action(
    state: &SharedState,
    store: &std::sync::Arc<dyn RoomStore>,
    code: &str,
    request: &ActionRequest,
) -> Result<Applied, ServiceError> {
    let room = store
        .find_room(code.to_owned())
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("room `{code}` not found")))?;
    let room: Room = room.into();
    let tournament: Option<TournamentState> =
        store.find_state(code.to_owned()).await?.map(Into::into);

    if room.participant(request.user_id).is_none() {
        return Err(ServiceError::NotFound(format!(
            "user `{}` is not in room `{code}`",
            request.user_id
        )));
    }

    match request.action {
        ActionKind::Start => apply_start(state, store, code, room, request.user_id).await,
        ActionKind::Pick => apply_pick(state, store, code, room, tournament, request).await,
        ActionKind::Leave => apply_leave(state, store, code, room, request.user_id).await,
        ActionKind::Extend => apply_extend(store, code, room, tournament, request.user_id).await,
    }
}

/// `waiting → active`: merge both candidate lists, build the bracket, and
/// commit the version-1 snapshot.
async fn apply_start(
    state: &SharedState,
    store: &std::sync::Arc<dyn RoomStore>,
    code: &str,
    mut room: Room,
    user_id: Uuid,
) -> Result<Applied, ServiceError> {
    if user_id != room.owner_id {
        return Err(ServiceError::Unauthorized(
            "only the room owner can start the tournament".into(),
        ));
    }
    if room.status != RoomStatus::Waiting {
        return Err(ServiceError::InvalidState(format!(
            "room `{code}` has already started"
        )));
    }
    let active = room.active_participants();
    if active.len() != 2 {
        return Err(ServiceError::InvalidState(
            "exactly two active participants are required to start".into(),
        ));
    }

    let catalog = state.catalog();
    let first = catalog.unwatched_for(active[0]).await?;
    let second = catalog.unwatched_for(active[1]).await?;

    let merged = merge_candidates((active[0], first), (active[1], second));
    let seed: u64 = rand::rng().random();
    let bracket = build_bracket(merged, state.config().fallback_pool(), seed)?;
    let tournament = TournamentState::from_bracket(bracket);

    let now = SystemTime::now();
    room.status = RoomStatus::Active;
    room.started_at = Some(now);
    room.last_activity_at = now;
    if let Some(participant) = room.participant_mut(user_id) {
        participant.last_action_at = now;
    }

    store
        .save_state(code.to_owned(), tournament.clone().into(), 0)
        .await?;
    store.save_room(room.clone().into()).await?;

    info!(
        code,
        pool = tournament.pool.len(),
        rounds = tournament.total_rounds,
        "tournament started"
    );
    sse_events::broadcast_state_changed(state, code, &tournament);

    let view = view_service::personalized_state(&room, Some(&tournament), user_id)?;
    Ok(Applied::Mutated(ActionResponse::ok(view)))
}

/// Record one vote; when it closes the round, advance the bracket.
async fn apply_pick(
    state: &SharedState,
    store: &std::sync::Arc<dyn RoomStore>,
    code: &str,
    mut room: Room,
    tournament: Option<TournamentState>,
    request: &ActionRequest,
) -> Result<Applied, ServiceError> {
    let user_id = request.user_id;

    if room.status != RoomStatus::Active {
        return Err(ServiceError::InvalidState(format!(
            "room `{code}` is not running a tournament"
        )));
    }
    let tournament = tournament.ok_or_else(|| {
        ServiceError::Integrity(format!("active room `{code}` has no tournament state"))
    })?;
    if matches!(tournament.status, TournamentStatus::Completed) {
        return Err(ServiceError::InvalidState(
            "tournament is already completed".into(),
        ));
    }

    let participant = room
        .participant(user_id)
        .ok_or_else(|| ServiceError::NotFound(format!("user `{user_id}` is not in room `{code}`")))?;
    if !participant.active {
        return Err(ServiceError::InvalidState(
            "participant has left the room".into(),
        ));
    }

    let payload = request
        .payload
        .as_ref()
        .ok_or_else(|| ServiceError::InvalidInput("pick requires a payload".into()))?;
    let match_id: MatchId = payload.match_id.parse()?;

    // A retried pick for a match this participant already decided is a
    // no-op, not an error.
    if participant.completed_matches.contains(&match_id) {
        debug!(code, %user_id, %match_id, "duplicate pick ignored");
        let view = view_service::personalized_state(&room, Some(&tournament), user_id)?;
        return Ok(Applied::Ignored(ActionResponse::ok(view)));
    }

    let current = tournament
        .next_match_for(&participant.completed_matches)
        .ok_or_else(|| {
            ServiceError::InvalidState("no pending match; waiting for partner".into())
        })?;
    if current.id != match_id {
        return Err(ServiceError::InvalidInput(format!(
            "match `{match_id}` is not the participant's current match (`{}`)",
            current.id
        )));
    }
    let Some(opponent) = current.opponent_of(payload.selected_candidate_id) else {
        return Err(ServiceError::InvalidInput(format!(
            "candidate {} is not part of match `{match_id}`",
            payload.selected_candidate_id
        )));
    };
    let opponent_id = opponent.id;

    let now = SystemTime::now();
    let pick = Pick {
        match_id,
        participant_id: user_id,
        candidate_id: payload.selected_candidate_id,
        response_time_ms: payload.response_time_ms,
        submitted_at: now,
    };

    // The uniqueness constraint is the arbiter for races and retries. A
    // duplicate row without a matching pick in the snapshot means an earlier
    // attempt died between the insert and the snapshot commit; that attempt
    // is finished here instead of being ignored.
    let insert = store.insert_pick(code.to_owned(), pick.clone().into()).await?;
    let already_in_snapshot = tournament
        .picks_for_match(match_id)
        .any(|p| p.participant_id == user_id);
    if insert == PickInsert::Duplicate && already_in_snapshot {
        debug!(code, %user_id, %match_id, "duplicate pick ignored");
        let view = view_service::personalized_state(&room, Some(&tournament), user_id)?;
        return Ok(Applied::Ignored(ActionResponse::ok(view)));
    }

    if insert == PickInsert::Inserted {
        state.ratings().enqueue(RatingUpdate {
            participant_id: user_id,
            winner_id: pick.candidate_id,
            loser_id: opponent_id,
        });
    }

    let expected_version = tournament.version;
    let mut next = tournament.with_pick(pick);
    if let Some(participant) = room.participant_mut(user_id) {
        participant.completed_matches.push(match_id);
        participant.last_action_at = now;
    }
    room.last_activity_at = now;

    let active = room.active_participants();
    let mut champion: Option<Candidate> = None;
    if next.is_round_complete(&active) {
        match advance_round(&next)? {
            RoundOutcome::NextRound { round, matches } => {
                next = next.advanced_to_round(round, matches);
            }
            RoundOutcome::FinalMatch(final_match) => {
                next = next.advanced_to_final(final_match);
            }
            RoundOutcome::Champion(candidate) => {
                // The winner lands on both watch lists, pending a rating,
                // before the completed snapshot is committed.
                for participant_id in &active {
                    store
                        .add_watchlist_entry(*participant_id, candidate.clone().into(), true)
                        .await?;
                }
                next = next.completed_with(candidate.clone(), true);
                room.status = RoomStatus::Completed;
                room.completed_at = Some(now);
                room.winner = Some(candidate.clone());
                champion = Some(candidate);
            }
        }
    }

    store
        .save_state(code.to_owned(), next.clone().into(), expected_version)
        .await?;
    store.save_room(room.clone().into()).await?;

    sse_events::broadcast_state_changed(state, code, &next);
    if let Some(winner) = champion {
        info!(code, winner = winner.id, title = %winner.title, "tournament completed");
        sse_events::broadcast_tournament_completed(state, code, (&winner).into(), true);
        state.room_sse().remove(code);
    }

    let view = view_service::personalized_state(&room, Some(&next), user_id)?;
    Ok(Applied::Mutated(ActionResponse::ok(view)))
}

/// Deactivate the participant, then rebuild the room status from the stored
/// flags.
async fn apply_leave(
    state: &SharedState,
    store: &std::sync::Arc<dyn RoomStore>,
    code: &str,
    mut room: Room,
    user_id: Uuid,
) -> Result<Applied, ServiceError> {
    if room.status.is_terminal() {
        return Err(ServiceError::InvalidState(format!(
            "room `{code}` is already closed"
        )));
    }

    let now = SystemTime::now();
    let already_left = match room.participant_mut(user_id) {
        Some(participant) if !participant.active => true,
        Some(participant) => {
            participant.active = false;
            participant.last_action_at = now;
            false
        }
        None => {
            return Err(ServiceError::NotFound(format!(
                "user `{user_id}` is not in room `{code}`"
            )));
        }
    };
    if already_left {
        // Leaving twice is a retry, not an error.
        let tournament: Option<TournamentState> =
            store.find_state(code.to_owned()).await?.map(Into::into);
        let view = view_service::personalized_state(&room, tournament.as_ref(), user_id)?;
        return Ok(Applied::Ignored(ActionResponse::ok(view)));
    }

    room.last_activity_at = now;
    store.save_room(room.clone().into()).await?;

    let room = room_service::rebuild_from_participants(store, code).await?;

    sse_events::broadcast_participant_left(state, code, user_id);
    if room.status == RoomStatus::Abandoned {
        info!(code, %user_id, "room abandoned after leave");
        sse_events::broadcast_room_abandoned(state, code);
        state.room_sse().remove(code);
    }

    let tournament: Option<TournamentState> =
        store.find_state(code.to_owned()).await?.map(Into::into);
    let view = view_service::personalized_state(&room, tournament.as_ref(), user_id)?;
    Ok(Applied::Mutated(ActionResponse::ok(view)))
}

/// Refresh the idle/expiry timer. Never touches tournament state.
async fn apply_extend(
    store: &std::sync::Arc<dyn RoomStore>,
    code: &str,
    mut room: Room,
    tournament: Option<TournamentState>,
    user_id: Uuid,
) -> Result<Applied, ServiceError> {
    let now = SystemTime::now();
    room.last_activity_at = now;
    if let Some(participant) = room.participant_mut(user_id) {
        participant.last_action_at = now;
    }
    store.save_room(room.clone().into()).await?;

    let view = view_service::personalized_state(&room, tournament.as_ref(), user_id)?;
    Ok(Applied::Mutated(ActionResponse::ok(view)))
}

#[cfg(test)]
mod tests {
    use std::{collections::HashMap, sync::Arc};

    use futures::future::BoxFuture;

    use super::*;
    use crate::{
        dao::catalog::{CandidateRecord, CandidateSource, CatalogError},
        dto::{
            action::PickPayload,
            personalized::Screen,
            room::{CreateRoomRequest, JoinRoomRequest},
        },
        services::test_support::{test_state, test_state_with_catalog},
    };

    /// Catalog double serving a fixed list per user.
    pub struct StaticCatalog {
        lists: HashMap<Uuid, Vec<CandidateRecord>>,
    }

    impl StaticCatalog {
        pub fn new(lists: HashMap<Uuid, Vec<CandidateRecord>>) -> Self {
            Self { lists }
        }
    }

    impl CandidateSource for StaticCatalog {
        fn unwatched_for(
            &self,
            user_id: Uuid,
        ) -> BoxFuture<'static, Result<Vec<CandidateRecord>, CatalogError>> {
            let list = self.lists.get(&user_id).cloned().unwrap_or_default();
            Box::pin(async move { Ok(list) })
        }
    }

    fn records(ids: &[i64]) -> Vec<CandidateRecord> {
        ids.iter()
            .map(|id| CandidateRecord {
                candidate_id: *id,
                title: format!("movie {id}"),
                poster_ref: None,
            })
            .collect()
    }

    fn action(user: Uuid, kind: ActionKind) -> ActionRequest {
        ActionRequest {
            user_id: user,
            action: kind,
            payload: None,
            idempotency_key: None,
        }
    }

    fn pick_action(user: Uuid, match_id: &str, candidate: i64) -> ActionRequest {
        ActionRequest {
            user_id: user,
            action: ActionKind::Pick,
            payload: Some(PickPayload {
                match_id: match_id.into(),
                selected_candidate_id: candidate,
                response_time_ms: Some(900),
            }),
            idempotency_key: None,
        }
    }

    /// Create, join, and start a room whose participants hold the given lists.
    async fn started_room(
        owner_list: &[i64],
        partner_list: &[i64],
    ) -> (crate::state::SharedState, String, Uuid, Uuid) {
        let owner = Uuid::new_v4();
        let partner = Uuid::new_v4();

        let mut lists = HashMap::new();
        lists.insert(owner, records(owner_list));
        lists.insert(partner, records(partner_list));

        let state = test_state_with_catalog(Arc::new(StaticCatalog::new(lists))).await;

        let summary = room_service::create_room(&state, CreateRoomRequest { user_id: owner })
            .await
            .unwrap();
        room_service::join_room(&state, &summary.code, JoinRoomRequest { user_id: partner })
            .await
            .unwrap();

        let response = process(&state, &summary.code, action(owner, ActionKind::Start))
            .await
            .unwrap();
        assert!(response.success);

        (state, summary.code, owner, partner)
    }

    /// Keep picking the lowest-id candidate of the current match until this
    /// participant has nothing left to vote on.
    async fn drain_picks(
        state: &crate::state::SharedState,
        code: &str,
        user: Uuid,
    ) -> ActionResponse {
        let mut last = None;
        loop {
            let view = view_service::load_personalized_state(state, code, user)
                .await
                .unwrap();
            let Some(current) = view.tournament.as_ref().and_then(|t| t.current_match.clone())
            else {
                break;
            };
            let choice = current.a.candidate_id.min(current.b.candidate_id);
            let response = process(state, code, pick_action(user, &current.match_id, choice))
                .await
                .unwrap();
            assert!(response.success);
            last = Some(response);
        }
        last.expect("participant had at least one match to vote on")
    }

    #[tokio::test]
    async fn start_requires_the_owner() {
        let owner = Uuid::new_v4();
        let partner = Uuid::new_v4();
        let state = test_state().await;

        let summary = room_service::create_room(&state, CreateRoomRequest { user_id: owner })
            .await
            .unwrap();
        room_service::join_room(&state, &summary.code, JoinRoomRequest { user_id: partner })
            .await
            .unwrap();

        let err = process(&state, &summary.code, action(partner, ActionKind::Start))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Unauthorized(_)));
    }

    #[tokio::test]
    async fn start_requires_two_active_participants() {
        let owner = Uuid::new_v4();
        let state = test_state().await;
        let summary = room_service::create_room(&state, CreateRoomRequest { user_id: owner })
            .await
            .unwrap();

        let err = process(&state, &summary.code, action(owner, ActionKind::Start))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidState(_)));
    }

    #[tokio::test]
    async fn four_candidates_build_a_two_match_round() {
        let (state, code, owner, _) = started_room(&[1, 2, 3, 4], &[1, 2, 3, 4]).await;

        let view = view_service::load_personalized_state(&state, &code, owner)
            .await
            .unwrap();
        assert_eq!(view.screen, Screen::Bracket);
        let tournament = view.tournament.unwrap();
        assert_eq!(tournament.progress.total_picks, 2);
        assert_eq!(tournament.progress.total_rounds, 2);
        assert_eq!(view.version, 1);
    }

    #[tokio::test]
    async fn unanimous_picks_crown_the_shared_favorite() {
        // Both participants always prefer the lowest id, so candidate 1 must
        // win the bracket no matter how the seed shuffled it.
        let (state, code, owner, partner) = started_room(&[1, 2, 3, 4], &[3, 4, 5, 6]).await;

        drain_picks(&state, &code, owner).await;
        let owner_view = view_service::load_personalized_state(&state, &code, owner)
            .await
            .unwrap();
        assert_eq!(owner_view.screen, Screen::Waiting);

        // Partner finishes round 1 (advancing the bracket to the final) and
        // votes the final; the owner's final vote decides the tournament.
        drain_picks(&state, &code, partner).await;
        let last = drain_picks(&state, &code, owner).await;
        let final_view = last.state.unwrap();
        assert_eq!(final_view.screen, Screen::Winner);
        let winner = final_view.winner.unwrap();
        assert_eq!(winner.candidate.candidate_id, 1);
        assert!(winner.added_to_both_lists);

        // Scenario D: the winner is on both watch lists, flagged for rating,
        // exactly once.
        let store = state.room_store().await.unwrap();
        for user in [owner, partner] {
            let entries = store.list_watchlist(user).await.unwrap();
            assert_eq!(entries.len(), 1);
            assert_eq!(entries[0].candidate.id, 1);
            assert!(entries[0].pending_rating);
        }
    }

    #[tokio::test]
    async fn tiny_union_falls_back_to_a_power_of_two_bracket() {
        // Scenario B: fewer than 4 merged candidates still yields a 4-slot
        // bracket via the configured fallback pool.
        let (state, code, owner, _) = started_room(&[1], &[2]).await;

        let store = state.room_store().await.unwrap();
        let snapshot = store.find_state(code.clone()).await.unwrap().unwrap();
        assert_eq!(snapshot.pool.len(), 4);
        assert!(snapshot.pool.len().is_power_of_two());

        let view = view_service::load_personalized_state(&state, &code, owner)
            .await
            .unwrap();
        assert_eq!(view.tournament.unwrap().progress.total_picks, 2);
    }

    #[tokio::test]
    async fn duplicate_pick_is_ignored_not_double_counted() {
        let (state, code, owner, _) = started_room(&[1, 2, 3, 4], &[1, 2, 3, 4]).await;

        let view = view_service::load_personalized_state(&state, &code, owner)
            .await
            .unwrap();
        let current = view.tournament.unwrap().current_match.unwrap();
        let choice = current.a.candidate_id;

        let first = process(&state, &code, pick_action(owner, &current.match_id, choice))
            .await
            .unwrap();
        assert!(first.success);

        // Same pick again: success, no error, exactly one row persisted.
        let second = process(&state, &code, pick_action(owner, &current.match_id, choice))
            .await
            .unwrap();
        assert!(second.success);

        let store = state.room_store().await.unwrap();
        let picks = store.list_picks(code.clone()).await.unwrap();
        assert_eq!(picks.len(), 1);
    }

    #[tokio::test]
    async fn idempotency_key_replay_returns_current_state_without_reapplying() {
        let (state, code, owner, _) = started_room(&[1, 2, 3, 4], &[1, 2, 3, 4]).await;

        let view = view_service::load_personalized_state(&state, &code, owner)
            .await
            .unwrap();
        let current = view.tournament.unwrap().current_match.unwrap();

        let mut request = pick_action(owner, &current.match_id, current.a.candidate_id);
        request.idempotency_key = Some("pick-once".into());

        let first = process(&state, &code, request.clone()).await.unwrap();
        let second = process(&state, &code, request).await.unwrap();

        let first_state = first.state.unwrap();
        let second_state = second.state.unwrap();
        assert_eq!(first_state.version, second_state.version);
        assert_eq!(first_state.screen, second_state.screen);

        let store = state.room_store().await.unwrap();
        assert_eq!(store.list_picks(code.clone()).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn racing_picks_from_both_participants_persist_exactly_two_rows() {
        let (state, code, owner, partner) = started_room(&[1, 2, 3, 4], &[1, 2, 3, 4]).await;

        let owner_view = view_service::load_personalized_state(&state, &code, owner)
            .await
            .unwrap();
        let partner_view = view_service::load_personalized_state(&state, &code, partner)
            .await
            .unwrap();
        let owner_match = owner_view.tournament.unwrap().current_match.unwrap();
        let partner_match = partner_view.tournament.unwrap().current_match.unwrap();
        assert_eq!(owner_match.match_id, partner_match.match_id);

        let owner_req = pick_action(owner, &owner_match.match_id, owner_match.a.candidate_id);
        let partner_req =
            pick_action(partner, &partner_match.match_id, partner_match.b.candidate_id);

        let (state_a, state_b) = (state.clone(), state.clone());
        let (code_a, code_b) = (code.clone(), code.clone());
        let (first, second) = tokio::join!(
            tokio::spawn(async move { process(&state_a, &code_a, owner_req).await }),
            tokio::spawn(async move { process(&state_b, &code_b, partner_req).await }),
        );
        assert!(first.unwrap().unwrap().success);
        assert!(second.unwrap().unwrap().success);

        let store = state.room_store().await.unwrap();
        let picks: Vec<_> = store
            .list_picks(code.clone())
            .await
            .unwrap()
            .into_iter()
            .filter(|p| p.match_id.round == 1 && p.match_id.position == 0)
            .collect();
        assert_eq!(picks.len(), 2);
    }

    #[tokio::test]
    async fn pick_for_a_foreign_match_is_rejected() {
        let (state, code, owner, _) = started_room(&[1, 2, 3, 4], &[1, 2, 3, 4]).await;

        let err = process(&state, &code, pick_action(owner, "r1m1", 1))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidInput(_)));

        // A candidate outside the current match is rejected too.
        let view = view_service::load_personalized_state(&state, &code, owner)
            .await
            .unwrap();
        let current = view.tournament.unwrap().current_match.unwrap();
        let err = process(&state, &code, pick_action(owner, &current.match_id, 999))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn leave_abandons_a_started_room_and_blocks_further_picks() {
        // Scenario C.
        let (state, code, owner, partner) = started_room(&[1, 2, 3, 4], &[1, 2, 3, 4]).await;

        let response = process(&state, &code, action(partner, ActionKind::Leave))
            .await
            .unwrap();
        let view = response.state.unwrap();
        assert_eq!(view.screen, Screen::Error);

        let store = state.room_store().await.unwrap();
        let room = store.find_room(code.clone()).await.unwrap().unwrap();
        assert_eq!(
            room.status,
            crate::dao::models::RoomStatusEntity::Abandoned
        );

        let err = process(&state, &code, pick_action(owner, "r1m0", 1))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidState(_)));
    }

    #[tokio::test]
    async fn extend_is_a_no_op_on_tournament_state() {
        let (state, code, owner, _) = started_room(&[1, 2, 3, 4], &[1, 2, 3, 4]).await;

        let before = state
            .room_store()
            .await
            .unwrap()
            .find_state(code.clone())
            .await
            .unwrap()
            .unwrap();

        let response = process(&state, &code, action(owner, ActionKind::Extend))
            .await
            .unwrap();
        assert!(response.success);

        let after = state
            .room_store()
            .await
            .unwrap()
            .find_state(code.clone())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(before, after);
    }

    #[tokio::test]
    async fn versions_are_monotonic_across_a_whole_tournament() {
        let (state, code, owner, partner) = started_room(&[1, 2, 3, 4, 5, 6, 7, 8], &[]).await;

        let mut last_version = 0;
        loop {
            let mut progressed = false;
            for user in [owner, partner] {
                let view = view_service::load_personalized_state(&state, &code, user)
                    .await
                    .unwrap();
                assert!(view.version >= last_version);
                last_version = view.version;

                if let Some(current) = view.tournament.as_ref().and_then(|t| t.current_match.clone())
                {
                    let choice = current.a.candidate_id.min(current.b.candidate_id);
                    process(&state, &code, pick_action(user, &current.match_id, choice))
                        .await
                        .unwrap();
                    progressed = true;
                }
            }
            if !progressed {
                break;
            }
        }

        let final_view = view_service::load_personalized_state(&state, &code, owner)
            .await
            .unwrap();
        assert_eq!(final_view.screen, Screen::Winner);

        let store = state.room_store().await.unwrap();
        let snapshot = store.find_state(code.clone()).await.unwrap().unwrap();
        assert_eq!(snapshot.version, final_view.version);
    }
}
