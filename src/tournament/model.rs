use std::{fmt, str::FromStr, time::SystemTime};

use indexmap::IndexMap;
use thiserror::Error;
use uuid::Uuid;

use crate::dao::models::{
    CandidateEntity, MatchEntity, MatchIdEntity, ParticipantEntity, PickEntity, RoomEntity,
    RoomStatusEntity, TournamentStateEntity, TournamentStatusEntity, WinnerEntity,
};

/// A nominee under consideration in a tournament.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    /// Stable catalog identifier of the movie.
    pub id: i64,
    /// Display title.
    pub title: String,
    /// Poster/image reference, when the catalog provides one.
    pub poster_ref: Option<String>,
    /// Participants whose lists contributed this candidate.
    pub contributed_by: Vec<Uuid>,
}

impl Candidate {
    /// Whether the candidate appeared on both participants' lists.
    pub fn from_both_lists(&self) -> bool {
        self.contributed_by.len() >= 2
    }
}

/// Bracket position of a match, rendered as `r{round}m{position}`.
///
/// Ids are unique per (room, round, position); the round component makes a
/// stale id from an earlier round fail validation instead of aliasing a
/// current match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MatchId {
    /// One-based round number.
    pub round: u32,
    /// Zero-based position within the round.
    pub position: u32,
}

impl fmt::Display for MatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "r{}m{}", self.round, self.position)
    }
}

/// Error returned when a match id string cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("malformed match id `{input}` (expected `r<round>m<position>`)")]
pub struct ParseMatchIdError {
    /// The rejected input.
    pub input: String,
}

impl FromStr for MatchId {
    type Err = ParseMatchIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || ParseMatchIdError {
            input: s.to_owned(),
        };

        let rest = s.strip_prefix('r').ok_or_else(malformed)?;
        let (round, position) = rest.split_once('m').ok_or_else(malformed)?;
        let round: u32 = round.parse().map_err(|_| malformed())?;
        let position: u32 = position.parse().map_err(|_| malformed())?;
        if round == 0 {
            return Err(malformed());
        }
        Ok(MatchId { round, position })
    }
}

/// One bracket comparison between two candidates. Immutable once created;
/// only the winner is derived, from the recorded picks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Match {
    /// Bracket position of this match.
    pub id: MatchId,
    /// First candidate slot.
    pub a: Candidate,
    /// Second candidate slot.
    pub b: Candidate,
}

impl Match {
    /// The slot opposing the given candidate id, when it belongs to the match.
    pub fn opponent_of(&self, candidate_id: i64) -> Option<&Candidate> {
        if self.a.id == candidate_id {
            Some(&self.b)
        } else if self.b.id == candidate_id {
            Some(&self.a)
        } else {
            None
        }
    }
}

/// One participant's vote for one match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pick {
    /// Match the vote applies to.
    pub match_id: MatchId,
    /// Voting participant.
    pub participant_id: Uuid,
    /// Candidate the participant chose.
    pub candidate_id: i64,
    /// Client-reported decision latency in milliseconds.
    pub response_time_ms: Option<u64>,
    /// Server-side submission timestamp.
    pub submitted_at: SystemTime,
}

/// Lifecycle stage of a tournament.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TournamentStatus {
    /// A numbered elimination round is in play.
    Round(u32),
    /// The two-way final match is in play.
    Final,
    /// A winner has been decided.
    Completed,
}

/// Tournament winner together with the watch-list bookkeeping flag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Winner {
    /// Winning candidate.
    pub candidate: Candidate,
    /// Whether the winner was written to both participants' watch lists.
    pub added_to_both_lists: bool,
}

/// Authoritative per-room tournament snapshot.
///
/// Mutated only through the action processor, and only by constructing the
/// next value from the previous one plus a delta; nothing mutates in place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TournamentState {
    /// Lifecycle stage.
    pub status: TournamentStatus,
    /// One-based number of the round currently in play.
    pub current_round: u32,
    /// Total number of rounds for the bracket size.
    pub total_rounds: u32,
    /// Matches of the current round only.
    pub matches: Vec<Match>,
    /// Full accumulated pick history; only ever grows.
    pub picks: Vec<Pick>,
    /// Full candidate pool in bracket order.
    pub pool: Vec<Candidate>,
    /// Per-tournament shuffle and tie-break seed.
    pub shuffle_seed: u64,
    /// Monotonically increasing snapshot version.
    pub version: u64,
    /// Winner fields, present once completed.
    pub winner: Option<Winner>,
}

impl TournamentState {
    /// Picks recorded for the given match.
    pub fn picks_for_match(&self, id: MatchId) -> impl Iterator<Item = &Pick> {
        self.picks.iter().filter(move |pick| pick.match_id == id)
    }

    /// Picks submitted by the given participant in the current round.
    pub fn round_picks_by(&self, participant_id: Uuid) -> usize {
        self.picks
            .iter()
            .filter(|pick| {
                pick.participant_id == participant_id && pick.match_id.round == self.current_round
            })
            .count()
    }

    /// First match of the current round the participant has not voted on,
    /// scanning in bracket order against their completed-match list.
    pub fn next_match_for<'a>(&'a self, completed: &[MatchId]) -> Option<&'a Match> {
        self.matches.iter().find(|m| !completed.contains(&m.id))
    }

    /// A round is complete precisely when every match in it has received
    /// exactly one pick from each of the given participants.
    pub fn is_round_complete(&self, participants: &[Uuid]) -> bool {
        !self.matches.is_empty()
            && self.matches.iter().all(|m| {
                participants.iter().all(|user| {
                    self.picks_for_match(m.id)
                        .any(|pick| pick.participant_id == *user)
                }) && self.picks_for_match(m.id).count() == participants.len()
            })
    }

    /// Next snapshot with one more pick appended.
    pub fn with_pick(&self, pick: Pick) -> Self {
        let mut next = self.clone();
        next.picks.push(pick);
        next.version += 1;
        next
    }

    /// Next snapshot advanced into a later (non-final) round.
    pub fn advanced_to_round(&self, round: u32, matches: Vec<Match>) -> Self {
        let mut next = self.clone();
        next.status = TournamentStatus::Round(round);
        next.current_round = round;
        next.matches = matches;
        next.version += 1;
        next
    }

    /// Next snapshot advanced into the two-way final.
    pub fn advanced_to_final(&self, final_match: Match) -> Self {
        let mut next = self.clone();
        next.status = TournamentStatus::Final;
        next.current_round = final_match.id.round;
        next.matches = vec![final_match];
        next.version += 1;
        next
    }

    /// Next snapshot marked completed with the given winner.
    pub fn completed_with(&self, candidate: Candidate, added_to_both_lists: bool) -> Self {
        let mut next = self.clone();
        next.status = TournamentStatus::Completed;
        next.matches = Vec::new();
        next.winner = Some(Winner {
            candidate,
            added_to_both_lists,
        });
        next.version += 1;
        next
    }
}

/// Room lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoomStatus {
    /// Waiting for the second participant and the start action.
    Waiting,
    /// Tournament in progress.
    Active,
    /// Tournament finished with a winner.
    Completed,
    /// Terminal state after losing a required participant.
    Abandoned,
}

impl RoomStatus {
    /// Whether the room can still change state.
    pub fn is_terminal(self) -> bool {
        matches!(self, RoomStatus::Completed | RoomStatus::Abandoned)
    }
}

/// A user's membership in a room.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Participant {
    /// Identity of the user.
    pub user_id: Uuid,
    /// Whether the participant is still active in the room.
    pub active: bool,
    /// Whether the participant owns the room.
    pub owner: bool,
    /// Ordered list of matches this participant has voted on.
    pub completed_matches: Vec<MatchId>,
    /// Timestamp of the participant's last action.
    pub last_action_at: SystemTime,
}

impl Participant {
    /// Build a fresh membership record.
    pub fn new(user_id: Uuid, owner: bool) -> Self {
        Self {
            user_id,
            active: true,
            owner,
            completed_matches: Vec::new(),
            last_action_at: SystemTime::now(),
        }
    }
}

/// One two-participant decision session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Room {
    /// Unique join code.
    pub code: String,
    /// User id of the room owner.
    pub owner_id: Uuid,
    /// Lifecycle status.
    pub status: RoomStatus,
    /// Members keyed by user id, in join order.
    pub participants: IndexMap<Uuid, Participant>,
    /// Creation timestamp.
    pub created_at: SystemTime,
    /// Timestamp of the waiting → active transition.
    pub started_at: Option<SystemTime>,
    /// Timestamp of tournament completion.
    pub completed_at: Option<SystemTime>,
    /// Last activity timestamp, refreshed by the extend action.
    pub last_activity_at: SystemTime,
    /// Final winner, present once completed.
    pub winner: Option<Candidate>,
}

impl Room {
    /// Build a fresh waiting room owned by the given user.
    pub fn new(code: String, owner_id: Uuid) -> Self {
        let now = SystemTime::now();
        let mut participants = IndexMap::new();
        participants.insert(owner_id, Participant::new(owner_id, true));
        Self {
            code,
            owner_id,
            status: RoomStatus::Waiting,
            participants,
            created_at: now,
            started_at: None,
            completed_at: None,
            last_activity_at: now,
            winner: None,
        }
    }

    /// User ids of the currently active participants, in join order.
    pub fn active_participants(&self) -> Vec<Uuid> {
        self.participants
            .values()
            .filter(|p| p.active)
            .map(|p| p.user_id)
            .collect()
    }

    /// Membership record for the given user.
    pub fn participant(&self, user_id: Uuid) -> Option<&Participant> {
        self.participants.get(&user_id)
    }

    /// Mutable membership record for the given user.
    pub fn participant_mut(&mut self, user_id: Uuid) -> Option<&mut Participant> {
        self.participants.get_mut(&user_id)
    }
}

impl From<CandidateEntity> for Candidate {
    fn from(value: CandidateEntity) -> Self {
        Self {
            id: value.id,
            title: value.title,
            poster_ref: value.poster_ref,
            contributed_by: value.contributed_by,
        }
    }
}

impl From<Candidate> for CandidateEntity {
    fn from(value: Candidate) -> Self {
        Self {
            id: value.id,
            title: value.title,
            poster_ref: value.poster_ref,
            contributed_by: value.contributed_by,
        }
    }
}

impl From<MatchIdEntity> for MatchId {
    fn from(value: MatchIdEntity) -> Self {
        Self {
            round: value.round,
            position: value.position,
        }
    }
}

impl From<MatchId> for MatchIdEntity {
    fn from(value: MatchId) -> Self {
        Self {
            round: value.round,
            position: value.position,
        }
    }
}

impl From<MatchEntity> for Match {
    fn from(value: MatchEntity) -> Self {
        Self {
            id: value.id.into(),
            a: value.a.into(),
            b: value.b.into(),
        }
    }
}

impl From<Match> for MatchEntity {
    fn from(value: Match) -> Self {
        Self {
            id: value.id.into(),
            a: value.a.into(),
            b: value.b.into(),
        }
    }
}

impl From<PickEntity> for Pick {
    fn from(value: PickEntity) -> Self {
        Self {
            match_id: value.match_id.into(),
            participant_id: value.participant_id,
            candidate_id: value.candidate_id,
            response_time_ms: value.response_time_ms,
            submitted_at: value.submitted_at,
        }
    }
}

impl From<Pick> for PickEntity {
    fn from(value: Pick) -> Self {
        Self {
            match_id: value.match_id.into(),
            participant_id: value.participant_id,
            candidate_id: value.candidate_id,
            response_time_ms: value.response_time_ms,
            submitted_at: value.submitted_at,
        }
    }
}

impl From<TournamentStatusEntity> for TournamentStatus {
    fn from(value: TournamentStatusEntity) -> Self {
        match value {
            TournamentStatusEntity::Round { number } => TournamentStatus::Round(number),
            TournamentStatusEntity::Final => TournamentStatus::Final,
            TournamentStatusEntity::Completed => TournamentStatus::Completed,
        }
    }
}

impl From<TournamentStatus> for TournamentStatusEntity {
    fn from(value: TournamentStatus) -> Self {
        match value {
            TournamentStatus::Round(number) => TournamentStatusEntity::Round { number },
            TournamentStatus::Final => TournamentStatusEntity::Final,
            TournamentStatus::Completed => TournamentStatusEntity::Completed,
        }
    }
}

impl From<WinnerEntity> for Winner {
    fn from(value: WinnerEntity) -> Self {
        Self {
            candidate: value.candidate.into(),
            added_to_both_lists: value.added_to_both_lists,
        }
    }
}

impl From<Winner> for WinnerEntity {
    fn from(value: Winner) -> Self {
        Self {
            candidate: value.candidate.into(),
            added_to_both_lists: value.added_to_both_lists,
        }
    }
}

impl From<TournamentStateEntity> for TournamentState {
    fn from(value: TournamentStateEntity) -> Self {
        Self {
            status: value.status.into(),
            current_round: value.current_round,
            total_rounds: value.total_rounds,
            matches: value.matches.into_iter().map(Into::into).collect(),
            picks: value.picks.into_iter().map(Into::into).collect(),
            pool: value.pool.into_iter().map(Into::into).collect(),
            shuffle_seed: value.shuffle_seed,
            version: value.version,
            winner: value.winner.map(Into::into),
        }
    }
}

impl From<TournamentState> for TournamentStateEntity {
    fn from(value: TournamentState) -> Self {
        Self {
            status: value.status.into(),
            current_round: value.current_round,
            total_rounds: value.total_rounds,
            matches: value.matches.into_iter().map(Into::into).collect(),
            picks: value.picks.into_iter().map(Into::into).collect(),
            pool: value.pool.into_iter().map(Into::into).collect(),
            shuffle_seed: value.shuffle_seed,
            version: value.version,
            winner: value.winner.map(Into::into),
        }
    }
}

impl From<RoomStatusEntity> for RoomStatus {
    fn from(value: RoomStatusEntity) -> Self {
        match value {
            RoomStatusEntity::Waiting => RoomStatus::Waiting,
            RoomStatusEntity::Active => RoomStatus::Active,
            RoomStatusEntity::Completed => RoomStatus::Completed,
            RoomStatusEntity::Abandoned => RoomStatus::Abandoned,
        }
    }
}

impl From<RoomStatus> for RoomStatusEntity {
    fn from(value: RoomStatus) -> Self {
        match value {
            RoomStatus::Waiting => RoomStatusEntity::Waiting,
            RoomStatus::Active => RoomStatusEntity::Active,
            RoomStatus::Completed => RoomStatusEntity::Completed,
            RoomStatus::Abandoned => RoomStatusEntity::Abandoned,
        }
    }
}

impl From<ParticipantEntity> for Participant {
    fn from(value: ParticipantEntity) -> Self {
        Self {
            user_id: value.user_id,
            active: value.active,
            owner: value.owner,
            completed_matches: value.completed_matches.into_iter().map(Into::into).collect(),
            last_action_at: value.last_action_at,
        }
    }
}

impl From<Participant> for ParticipantEntity {
    fn from(value: Participant) -> Self {
        Self {
            user_id: value.user_id,
            active: value.active,
            owner: value.owner,
            completed_matches: value.completed_matches.into_iter().map(Into::into).collect(),
            last_action_at: value.last_action_at,
        }
    }
}

impl From<RoomEntity> for Room {
    fn from(value: RoomEntity) -> Self {
        Self {
            code: value.code,
            owner_id: value.owner_id,
            status: value.status.into(),
            participants: value
                .participants
                .into_iter()
                .map(|p| (p.user_id, p.into()))
                .collect(),
            created_at: value.created_at,
            started_at: value.started_at,
            completed_at: value.completed_at,
            last_activity_at: value.last_activity_at,
            winner: value.winner.map(Into::into),
        }
    }
}

impl From<Room> for RoomEntity {
    fn from(value: Room) -> Self {
        Self {
            code: value.code,
            owner_id: value.owner_id,
            status: value.status.into(),
            participants: value
                .participants
                .into_values()
                .map(Into::into)
                .collect(),
            created_at: value.created_at,
            started_at: value.started_at,
            completed_at: value.completed_at,
            last_activity_at: value.last_activity_at,
            winner: value.winner.map(Into::into),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn match_id_round_trips_through_display() {
        let id = MatchId {
            round: 3,
            position: 7,
        };
        assert_eq!(id.to_string(), "r3m7");
        assert_eq!("r3m7".parse::<MatchId>().unwrap(), id);
    }

    #[test]
    fn match_id_rejects_malformed_input() {
        for input in ["", "r1", "m0", "r0m0", "rxm1", "r1m", "1m2", "r-1m2"] {
            assert!(input.parse::<MatchId>().is_err(), "accepted `{input}`");
        }
    }

    fn candidate(id: i64) -> Candidate {
        Candidate {
            id,
            title: format!("movie {id}"),
            poster_ref: None,
            contributed_by: Vec::new(),
        }
    }

    fn pick(round: u32, position: u32, user: Uuid, candidate_id: i64) -> Pick {
        Pick {
            match_id: MatchId { round, position },
            participant_id: user,
            candidate_id,
            response_time_ms: None,
            submitted_at: SystemTime::now(),
        }
    }

    fn two_match_state() -> (TournamentState, Uuid, Uuid) {
        let matches = vec![
            Match {
                id: MatchId {
                    round: 1,
                    position: 0,
                },
                a: candidate(1),
                b: candidate(2),
            },
            Match {
                id: MatchId {
                    round: 1,
                    position: 1,
                },
                a: candidate(3),
                b: candidate(4),
            },
        ];
        let state = TournamentState {
            status: TournamentStatus::Round(1),
            current_round: 1,
            total_rounds: 2,
            pool: vec![candidate(1), candidate(2), candidate(3), candidate(4)],
            matches,
            picks: Vec::new(),
            shuffle_seed: 7,
            version: 1,
            winner: None,
        };
        (state, Uuid::new_v4(), Uuid::new_v4())
    }

    #[test]
    fn with_pick_leaves_previous_snapshot_untouched() {
        let (state, user, _) = two_match_state();
        let next = state.with_pick(pick(1, 0, user, 1));
        assert_eq!(state.picks.len(), 0);
        assert_eq!(state.version, 1);
        assert_eq!(next.picks.len(), 1);
        assert_eq!(next.version, 2);
    }

    #[test]
    fn round_completion_requires_both_participants_on_every_match() {
        let (state, alice, bob) = two_match_state();
        let users = [alice, bob];

        let state = state
            .with_pick(pick(1, 0, alice, 1))
            .with_pick(pick(1, 0, bob, 2))
            .with_pick(pick(1, 1, alice, 3));
        assert!(!state.is_round_complete(&users));

        let state = state.with_pick(pick(1, 1, bob, 4));
        assert!(state.is_round_complete(&users));
    }

    #[test]
    fn next_match_skips_completed_matches() {
        let (state, _, _) = two_match_state();
        let first = MatchId {
            round: 1,
            position: 0,
        };
        let second = MatchId {
            round: 1,
            position: 1,
        };

        assert_eq!(state.next_match_for(&[]).unwrap().id, first);
        assert_eq!(state.next_match_for(&[first]).unwrap().id, second);
        assert!(state.next_match_for(&[first, second]).is_none());
    }

    #[test]
    fn state_round_trips_through_entity() {
        let (state, user, _) = two_match_state();
        let state = state.with_pick(pick(1, 0, user, 1));
        let entity: TournamentStateEntity = state.clone().into();
        let back: TournamentState = entity.into();
        assert_eq!(back, state);
    }
}
