//! Settlement engine
//!
//! Computes the payout split and applies it as one atomic dual-balance
//! mutation, exactly once per room. Deleting the room record right
//! after the mutation is what enforces exactly-once: a second settle
//! attempt (or a cleanup race) observes the room as gone.

use crate::errors::{Error, Result};
use crate::rooms::RoomRegistry;
use crate::store::AtomicStore;
use serde::Serialize;
use std::sync::Arc;
use tracing::info;

/// Fixed-point payout split for a settled wager.
/// `winner_gain + loser_gain + fee == 2 * bet` exactly; the fee absorbs
/// the rounding remainder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Payout {
    pub winner_gain: i64,
    pub loser_gain: i64,
    pub fee: i64,
}

/// Largest settleable stake. Keeps `2 * bet * 7` inside `i64`, so the
/// split below never overflows.
pub const MAX_BET: u64 = (i64::MAX / 14) as u64;

/// 70% of the pot to the winner, 20% back to the loser, remainder to
/// the fee pool. Integer arithmetic only; stakes above [`MAX_BET`] are
/// rejected rather than allowed to wrap into negative credits.
pub fn payout(bet: u64) -> Result<Payout> {
    if bet == 0 || bet > MAX_BET {
        return Err(Error::validation(format!(
            "bet {} is outside the settleable range 1..={}",
            bet, MAX_BET
        )));
    }
    let total = (bet * 2) as i64;
    let winner_gain = total * 7 / 10;
    let loser_gain = total * 2 / 10;
    let fee = total - winner_gain - loser_gain;
    Ok(Payout {
        winner_gain,
        loser_gain,
        fee,
    })
}

/// Outcome of a settled room
#[derive(Debug, Clone, Serialize)]
pub struct Settlement {
    pub winner_id: String,
    pub loser_id: String,
    pub winner_gain: i64,
    pub loser_gain: i64,
    pub fee: i64,
}

/// Applies wager outcomes against the shared ledger
pub struct SettlementEngine {
    store: Arc<dyn AtomicStore>,
    rooms: Arc<RoomRegistry>,
}

impl SettlementEngine {
    pub fn new(store: Arc<dyn AtomicStore>, rooms: Arc<RoomRegistry>) -> Self {
        Self { store, rooms }
    }

    /// Settle a room in favor of `winner_id`.
    ///
    /// A winner that is not one of the room's two players is a
    /// validation error - guessing a loser here would move funds to an
    /// arbitrary account. Re-invoking on the same room after success
    /// fails with room-not-found and performs no balance mutation.
    pub async fn settle(&self, room_id: &str, winner_id: &str) -> Result<Settlement> {
        let room = self.rooms.get(room_id).await?;

        let loser_id = room
            .opponent_of(winner_id)
            .ok_or_else(|| {
                Error::validation(format!(
                    "winnerId {} is not a participant of room {}",
                    winner_id, room_id
                ))
            })?
            .to_string();

        let split = payout(room.bet)?;
        self.store
            .atomic_dual_credit(
                winner_id,
                &loser_id,
                split.winner_gain,
                split.loser_gain,
                split.fee,
            )
            .await?;

        // The mutation and this delete form one logical unit of work.
        // Deletion is idempotent, so a retry after a failed delete is
        // safe; the funds above are never re-applied because a second
        // settle stops at the room lookup.
        self.rooms.delete(room_id).await?;

        info!(
            room_id,
            winner_id,
            loser_id,
            winner_gain = split.winner_gain,
            loser_gain = split.loser_gain,
            fee = split.fee,
            "wager settled"
        );

        Ok(Settlement {
            winner_id: winner_id.to_string(),
            loser_id,
            winner_gain: split.winner_gain,
            loser_gain: split.loser_gain,
            fee: split.fee,
        })
    }
}
