//! Tournament domain: the bracket model, round-1 construction, and round
//! advancement. Pure logic with no storage or transport concerns.

pub mod advance;
pub mod bracket;
pub mod model;

use crate::tournament::{
    bracket::Bracket,
    model::{TournamentState, TournamentStatus},
};

impl TournamentState {
    /// Initial snapshot for a freshly built bracket, at version 1.
    ///
    /// A two-candidate pool has a single round which is already the final.
    pub fn from_bracket(bracket: Bracket) -> Self {
        let status = if bracket.total_rounds == 1 {
            TournamentStatus::Final
        } else {
            TournamentStatus::Round(1)
        };

        Self {
            status,
            current_round: 1,
            total_rounds: bracket.total_rounds,
            matches: bracket.matches,
            picks: Vec::new(),
            pool: bracket.pool,
            shuffle_seed: bracket.shuffle_seed,
            version: 1,
            winner: None,
        }
    }
}
