//! Preference-rating updater.
//!
//! Every applied pick is a pairwise preference signal: the chosen candidate
//! beat its opponent for that participant. Updates are queued off the
//! critical path and folded into per-(participant, candidate) scores in
//! small batches on an interval. The queue is fire-and-forget; losing or
//! replaying it never affects tournament correctness.

use std::time::Duration;

use tokio::{
    sync::mpsc::{self, UnboundedReceiver, UnboundedSender},
    time::interval,
};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::state::SharedState;

/// Baseline score for a candidate never rated by a participant.
const DEFAULT_SCORE: f64 = 1000.0;
/// Score sensitivity per recorded outcome.
const K_FACTOR: f64 = 32.0;
/// Maximum updates folded per batch.
const BATCH_SIZE: usize = 32;
/// Interval between batch flushes.
const BATCH_INTERVAL: Duration = Duration::from_secs(2);

/// One pairwise outcome derived from an applied pick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RatingUpdate {
    /// Participant whose preference is being updated.
    pub participant_id: Uuid,
    /// Candidate the participant chose.
    pub winner_id: i64,
    /// Candidate the participant passed over.
    pub loser_id: i64,
}

/// Cloneable handle used by the action processor to enqueue updates.
#[derive(Clone)]
pub struct RatingQueue {
    tx: UnboundedSender<RatingUpdate>,
}

impl RatingQueue {
    /// Build the queue, returning the handle and the worker's receiving end.
    pub fn new() -> (Self, UnboundedReceiver<RatingUpdate>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Enqueue an update; fire-and-forget.
    pub fn enqueue(&self, update: RatingUpdate) {
        if self.tx.send(update).is_err() {
            debug!("rating queue closed; dropping update");
        }
    }
}

/// Run the batch worker until the queue closes.
pub async fn run(state: SharedState, mut rx: UnboundedReceiver<RatingUpdate>) {
    let mut ticker = interval(BATCH_INTERVAL);
    let mut pending: Vec<RatingUpdate> = Vec::new();

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if pending.is_empty() {
                    continue;
                }
                let batch_len = pending.len().min(BATCH_SIZE);
                let batch: Vec<RatingUpdate> = pending.drain(..batch_len).collect();
                apply_batch(&state, batch).await;
            }
            received = rx.recv() => {
                match received {
                    Some(update) => pending.push(update),
                    None => {
                        if !pending.is_empty() {
                            apply_batch(&state, std::mem::take(&mut pending)).await;
                        }
                        break;
                    }
                }
            }
        }
    }
}

/// Fold a batch of outcomes into the stored scores.
///
/// Dropped silently in degraded mode: preference scores are advisory and the
/// queue's contract allows loss.
async fn apply_batch(state: &SharedState, batch: Vec<RatingUpdate>) {
    let Some(store) = state.room_store().await else {
        warn!(dropped = batch.len(), "no storage backend; dropping rating batch");
        return;
    };

    for update in batch {
        let result = async {
            let winner = store
                .load_preference(update.participant_id, update.winner_id)
                .await?
                .unwrap_or(DEFAULT_SCORE);
            let loser = store
                .load_preference(update.participant_id, update.loser_id)
                .await?
                .unwrap_or(DEFAULT_SCORE);

            let (new_winner, new_loser) = elo_pair(winner, loser);

            store
                .save_preference(update.participant_id, update.winner_id, new_winner)
                .await?;
            store
                .save_preference(update.participant_id, update.loser_id, new_loser)
                .await
        }
        .await;

        if let Err(err) = result {
            warn!(
                participant = %update.participant_id,
                winner = update.winner_id,
                loser = update.loser_id,
                error = %err,
                "failed to apply rating update"
            );
        }
    }
}

/// Standard Elo exchange for a decided pairwise comparison.
fn elo_pair(winner: f64, loser: f64) -> (f64, f64) {
    let expected = 1.0 / (1.0 + 10f64.powf((loser - winner) / 400.0));
    let delta = K_FACTOR * (1.0 - expected);
    (winner + delta, loser - delta)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn elo_moves_scores_toward_the_outcome() {
        let (winner, loser) = elo_pair(1000.0, 1000.0);
        assert!(winner > 1000.0);
        assert!(loser < 1000.0);
        // The exchange is zero-sum.
        assert!((winner + loser - 2000.0).abs() < 1e-9);
    }

    #[test]
    fn upsets_move_scores_more_than_expected_results() {
        let (favorite_win, _) = elo_pair(1200.0, 800.0);
        let (underdog_win, _) = elo_pair(800.0, 1200.0);
        assert!(underdog_win - 800.0 > favorite_win - 1200.0);
    }
}
