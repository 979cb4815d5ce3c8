//! Candidate merging and round-1 bracket construction.
//!
//! Two participants' unwatched lists are unioned by candidate id, padded from
//! the configured fallback pool when too small, truncated to a power of two,
//! shuffled with a per-tournament seed, and paired sequentially.

use rand::{SeedableRng, rngs::StdRng, seq::SliceRandom};
use thiserror::Error;
use uuid::Uuid;

use crate::{
    dao::catalog::CandidateRecord,
    tournament::model::{Candidate, Match, MatchId},
};

/// Smallest pool a tournament will run with; unions below this are padded
/// from the fallback pool.
pub const MIN_POOL: usize = 4;
/// Largest pool a tournament will run with; larger unions are truncated.
pub const MAX_POOL: usize = 32;

/// Errors raised while constructing a bracket.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BracketError {
    /// Too few usable candidates even after fallback padding.
    #[error("not enough candidates to seed a bracket (have {have}, need at least 2)")]
    NotEnoughCandidates {
        /// Usable candidate count after padding.
        have: usize,
    },
    /// An odd entrant field cannot be paired; unreachable for power-of-two pools.
    #[error("cannot pair an odd field of {count} entrants")]
    OddField {
        /// Number of entrants offered for pairing.
        count: usize,
    },
}

/// Round-1 bracket produced by [`build_bracket`].
#[derive(Debug, Clone)]
pub struct Bracket {
    /// Shuffled candidate pool, a power of two between 2 and [`MAX_POOL`].
    pub pool: Vec<Candidate>,
    /// Round-1 matches, `pool.len() / 2` of them.
    pub matches: Vec<Match>,
    /// `log2(pool.len())`.
    pub total_rounds: u32,
    /// Seed used for the shuffle; reused for tie-breaks.
    pub shuffle_seed: u64,
}

/// Union two participants' candidate lists by candidate id.
///
/// Order is deterministic: the first list's order, then unseen entries of the
/// second list in their order. Every occurrence records its contributor, so a
/// candidate present on both lists carries both participant ids.
pub fn merge_candidates(
    first: (Uuid, Vec<CandidateRecord>),
    second: (Uuid, Vec<CandidateRecord>),
) -> Vec<Candidate> {
    let mut merged: Vec<Candidate> = Vec::new();

    for (user_id, records) in [first, second] {
        for record in records {
            match merged.iter_mut().find(|c| c.id == record.candidate_id) {
                Some(existing) => {
                    if !existing.contributed_by.contains(&user_id) {
                        existing.contributed_by.push(user_id);
                    }
                }
                None => merged.push(Candidate {
                    id: record.candidate_id,
                    title: record.title,
                    poster_ref: record.poster_ref,
                    contributed_by: vec![user_id],
                }),
            }
        }
    }

    merged
}

/// Build the round-1 bracket from a merged candidate list.
///
/// Pools smaller than [`MIN_POOL`] are padded from `fallback` (skipping ids
/// already present) so a tournament can still run; this is a logged degraded
/// path, not an error. The pool is then truncated to the largest power of two
/// ≤ min([`MAX_POOL`], len) by keeping the merged-order prefix, shuffled with
/// `StdRng::seed_from_u64(seed)`, and paired sequentially:
/// `match[i] = (pool[2i], pool[2i+1])`.
pub fn build_bracket(
    mut pool: Vec<Candidate>,
    fallback: &[CandidateRecord],
    seed: u64,
) -> Result<Bracket, BracketError> {
    if pool.len() < MIN_POOL {
        let missing = MIN_POOL - pool.len();
        for record in fallback {
            if pool.len() >= MIN_POOL {
                break;
            }
            if pool.iter().any(|c| c.id == record.candidate_id) {
                continue;
            }
            pool.push(Candidate {
                id: record.candidate_id,
                title: record.title.clone(),
                poster_ref: record.poster_ref.clone(),
                contributed_by: Vec::new(),
            });
        }
        tracing::info!(
            missing,
            padded_to = pool.len(),
            "candidate union below minimum; padded from fallback pool"
        );
    }

    if pool.len() < 2 {
        return Err(BracketError::NotEnoughCandidates { have: pool.len() });
    }

    let size = prev_power_of_two(pool.len().min(MAX_POOL));
    pool.truncate(size);

    let mut rng = StdRng::seed_from_u64(seed);
    pool.shuffle(&mut rng);

    let matches = pair_round(&pool, 1)?;
    Ok(Bracket {
        total_rounds: size.trailing_zeros(),
        pool,
        matches,
        shuffle_seed: seed,
    })
}

/// Pair an entrant field sequentially into the given round's matches.
pub(crate) fn pair_round(entrants: &[Candidate], round: u32) -> Result<Vec<Match>, BracketError> {
    if entrants.len() % 2 != 0 {
        return Err(BracketError::OddField {
            count: entrants.len(),
        });
    }

    Ok(entrants
        .chunks_exact(2)
        .enumerate()
        .map(|(position, pair)| Match {
            id: MatchId {
                round,
                position: position as u32,
            },
            a: pair[0].clone(),
            b: pair[1].clone(),
        })
        .collect())
}

fn prev_power_of_two(n: usize) -> usize {
    debug_assert!(n >= 1);
    if n.is_power_of_two() {
        n
    } else {
        n.next_power_of_two() / 2
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: i64) -> CandidateRecord {
        CandidateRecord {
            candidate_id: id,
            title: format!("movie {id}"),
            poster_ref: Some(format!("/poster/{id}.jpg")),
        }
    }

    fn records(ids: &[i64]) -> Vec<CandidateRecord> {
        ids.iter().copied().map(record).collect()
    }

    fn fallback() -> Vec<CandidateRecord> {
        records(&[9001, 9002, 9003, 9004, 9005, 9006])
    }

    #[test]
    fn merge_unions_by_id_and_records_contributors() {
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();
        let merged = merge_candidates(
            (alice, records(&[1, 2, 3])),
            (bob, records(&[2, 4])),
        );

        assert_eq!(
            merged.iter().map(|c| c.id).collect::<Vec<_>>(),
            vec![1, 2, 3, 4]
        );
        let shared = merged.iter().find(|c| c.id == 2).unwrap();
        assert_eq!(shared.contributed_by, vec![alice, bob]);
        assert!(shared.from_both_lists());
        assert!(!merged[0].from_both_lists());
    }

    #[test]
    fn merge_ignores_duplicates_within_one_list() {
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();
        let merged = merge_candidates((alice, records(&[1, 1, 1])), (bob, Vec::new()));
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].contributed_by, vec![alice]);
    }

    #[test]
    fn bracket_is_power_of_two_with_half_as_many_matches() {
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();
        for union_size in [4usize, 5, 6, 7, 8, 11, 16, 31] {
            let ids: Vec<i64> = (1..=union_size as i64).collect();
            let merged = merge_candidates((alice, records(&ids)), (bob, Vec::new()));
            let bracket = build_bracket(merged, &fallback(), 42).unwrap();

            assert!(bracket.pool.len().is_power_of_two(), "union {union_size}");
            assert_eq!(bracket.matches.len(), bracket.pool.len() / 2);
            assert_eq!(
                bracket.total_rounds,
                bracket.pool.len().trailing_zeros(),
                "union {union_size}"
            );
        }
    }

    #[test]
    fn oversized_union_is_capped_at_max_pool() {
        let alice = Uuid::new_v4();
        let ids: Vec<i64> = (1..=50).collect();
        let merged = merge_candidates((alice, records(&ids)), (Uuid::new_v4(), Vec::new()));
        let bracket = build_bracket(merged, &fallback(), 1).unwrap();
        assert_eq!(bracket.pool.len(), MAX_POOL);
        assert_eq!(bracket.total_rounds, 5);
    }

    #[test]
    fn truncation_keeps_the_merged_order_prefix() {
        let alice = Uuid::new_v4();
        let merged = merge_candidates(
            (alice, records(&[1, 2, 3, 4, 5, 6])),
            (Uuid::new_v4(), Vec::new()),
        );
        let bracket = build_bracket(merged, &fallback(), 3).unwrap();

        let mut kept: Vec<i64> = bracket.pool.iter().map(|c| c.id).collect();
        kept.sort_unstable();
        assert_eq!(kept, vec![1, 2, 3, 4]);
    }

    #[test]
    fn small_union_is_padded_from_the_fallback_pool() {
        let alice = Uuid::new_v4();
        let merged = merge_candidates((alice, records(&[1])), (Uuid::new_v4(), Vec::new()));
        let bracket = build_bracket(merged, &fallback(), 9).unwrap();

        assert_eq!(bracket.pool.len(), 4);
        assert!(bracket.pool.iter().any(|c| c.id == 1));
        let padded = bracket
            .pool
            .iter()
            .filter(|c| c.contributed_by.is_empty())
            .count();
        assert_eq!(padded, 3);
    }

    #[test]
    fn fallback_padding_skips_ids_already_in_the_union() {
        let alice = Uuid::new_v4();
        let merged = merge_candidates((alice, records(&[9001, 9002])), (Uuid::new_v4(), Vec::new()));
        let bracket = build_bracket(merged, &fallback(), 9).unwrap();

        let mut ids: Vec<i64> = bracket.pool.iter().map(|c| c.id).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), 4, "padding must not duplicate candidates");
    }

    #[test]
    fn empty_union_with_no_fallback_is_a_hard_error() {
        let err = build_bracket(Vec::new(), &[], 0).unwrap_err();
        assert_eq!(err, BracketError::NotEnoughCandidates { have: 0 });
    }

    #[test]
    fn shuffle_is_deterministic_per_seed() {
        let alice = Uuid::new_v4();
        let ids: Vec<i64> = (1..=8).collect();
        let merged = merge_candidates((alice, records(&ids)), (Uuid::new_v4(), Vec::new()));

        let one = build_bracket(merged.clone(), &fallback(), 77).unwrap();
        let two = build_bracket(merged.clone(), &fallback(), 77).unwrap();
        let other = build_bracket(merged, &fallback(), 78).unwrap();

        let order = |b: &Bracket| b.pool.iter().map(|c| c.id).collect::<Vec<_>>();
        assert_eq!(order(&one), order(&two));
        assert_ne!(order(&one), order(&other), "seeds should decouple tournaments");
    }

    #[test]
    fn pairing_is_sequential() {
        let pool: Vec<Candidate> = records(&[10, 20, 30, 40])
            .into_iter()
            .map(|r| Candidate {
                id: r.candidate_id,
                title: r.title,
                poster_ref: r.poster_ref,
                contributed_by: Vec::new(),
            })
            .collect();

        let matches = pair_round(&pool, 2).unwrap();
        assert_eq!(matches.len(), 2);
        assert_eq!((matches[0].a.id, matches[0].b.id), (10, 20));
        assert_eq!((matches[1].a.id, matches[1].b.id), (30, 40));
        assert_eq!(matches[1].id, MatchId { round: 2, position: 1 });
    }

    #[test]
    fn odd_field_is_rejected() {
        let pool: Vec<Candidate> = (1..=3)
            .map(|id| Candidate {
                id,
                title: String::new(),
                poster_ref: None,
                contributed_by: Vec::new(),
            })
            .collect();
        assert_eq!(
            pair_round(&pool, 2).unwrap_err(),
            BracketError::OddField { count: 3 }
        );
    }
}
