//! Round advancement: vote tallying, the seeded tie-break, and construction
//! of the next round, the final, or the overall winner.

use rand::{Rng, SeedableRng, rngs::StdRng};
use thiserror::Error;

use crate::tournament::{
    bracket::{BracketError, pair_round},
    model::{Candidate, Match, MatchId, Pick, TournamentState},
};

/// Errors raised while advancing a round.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AdvanceError {
    /// A match of the round is still missing picks.
    #[error("round {round} is not complete: match {match_id} has {picks} pick(s)")]
    RoundIncomplete {
        /// Round being advanced.
        round: u32,
        /// First incomplete match found.
        match_id: MatchId,
        /// Picks recorded for that match.
        picks: usize,
    },
    /// The winners field could not be paired.
    #[error(transparent)]
    Pairing(#[from] BracketError),
}

/// What a completed round advances into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoundOutcome {
    /// More than two winners remain; play another elimination round.
    NextRound {
        /// One-based number of the new round.
        round: u32,
        /// Matches of the new round, paired sequentially from the winners.
        matches: Vec<Match>,
    },
    /// Exactly two winners remain; play the final head-to-head.
    FinalMatch(Match),
    /// A single winner remains; the tournament is decided.
    Champion(Candidate),
}

/// Advance a completed round.
///
/// Winners are collected in match-position order so the bracket stays
/// traceable from round 1; winners are paired sequentially without
/// reshuffling. Replaying the same pick history always yields the same
/// outcome.
pub fn advance_round(state: &TournamentState) -> Result<RoundOutcome, AdvanceError> {
    let mut winners = Vec::with_capacity(state.matches.len());
    for m in &state.matches {
        let picks: Vec<&Pick> = state.picks_for_match(m.id).collect();
        if picks.len() != 2 {
            return Err(AdvanceError::RoundIncomplete {
                round: state.current_round,
                match_id: m.id,
                picks: picks.len(),
            });
        }
        winners.push(match_winner(state.shuffle_seed, m, &picks).clone());
    }

    match winners.len() {
        0 => Err(AdvanceError::RoundIncomplete {
            round: state.current_round,
            match_id: MatchId {
                round: state.current_round,
                position: 0,
            },
            picks: 0,
        }),
        1 => Ok(RoundOutcome::Champion(winners.remove(0))),
        2 => {
            let b = winners.swap_remove(1);
            let a = winners.swap_remove(0);
            Ok(RoundOutcome::FinalMatch(Match {
                id: MatchId {
                    round: state.total_rounds,
                    position: 0,
                },
                a,
                b,
            }))
        }
        _ => {
            let round = state.current_round + 1;
            let matches = pair_round(&winners, round)?;
            Ok(RoundOutcome::NextRound { round, matches })
        }
    }
}

/// Decide a match from its exactly-two picks.
///
/// The candidate with strictly more votes wins. A 1–1 split is broken by a
/// draw from `StdRng::seed_from_u64(seed ^ fnv1a(match_id))`: deterministic
/// given the persisted tournament seed (so replays and tests reproduce it),
/// but not predictable by clients, who never see the seed.
pub fn match_winner<'a>(seed: u64, m: &'a Match, picks: &[&Pick]) -> &'a Candidate {
    let votes_a = picks.iter().filter(|p| p.candidate_id == m.a.id).count();
    let votes_b = picks.iter().filter(|p| p.candidate_id == m.b.id).count();

    if votes_a > votes_b {
        &m.a
    } else if votes_b > votes_a {
        &m.b
    } else {
        tie_break(seed, m)
    }
}

fn tie_break(seed: u64, m: &Match) -> &Candidate {
    let mut rng = StdRng::seed_from_u64(seed ^ fnv1a(m.id));
    if rng.random_bool(0.5) { &m.a } else { &m.b }
}

/// FNV-1a over the rendered match id, mixing each match's draw independently.
fn fnv1a(id: MatchId) -> u64 {
    const OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0000_0100_0000_01b3;

    id.to_string()
        .bytes()
        .fold(OFFSET, |hash, byte| (hash ^ u64::from(byte)).wrapping_mul(PRIME))
}
