//! Matchmaking queue
//!
//! Per-bet-tier FIFO pairing on top of the atomic store. Clients with
//! different stakes never compete: the queue key is derived from the
//! exact bet amount. The whole enqueue-inspect-pop sequence is one
//! store operation, which is what rules out double-matching and missed
//! pairings under concurrent joins.

use crate::errors::{Error, Result};
use crate::store::AtomicStore;
use std::sync::Arc;
use tracing::info;

/// Result of a join attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JoinOutcome {
    /// Ticket queued; the caller waits for a later join to pair with it
    Waiting,
    /// Paired with `opponent`; the caller must now materialize a room
    /// before notifying either side
    Matched { opponent: String },
}

/// FIFO pairing over per-bet tier queues
pub struct Matchmaker {
    store: Arc<dyn AtomicStore>,
    queue_prefix: String,
}

impl Matchmaker {
    pub fn new(store: Arc<dyn AtomicStore>, queue_prefix: impl Into<String>) -> Self {
        Self {
            store,
            queue_prefix: queue_prefix.into(),
        }
    }

    fn queue_key(&self, bet: u64) -> String {
        format!("{}{}", self.queue_prefix, bet)
    }

    /// Join the tier for `bet`. Duplicate joins by the same user are not
    /// deduplicated here; callers own that policy.
    pub async fn join(&self, user_id: &str, bet: u64) -> Result<JoinOutcome> {
        validate_ticket(user_id, bet)?;

        let queue_key = self.queue_key(bet);
        match self.store.atomic_pair(&queue_key, user_id).await? {
            Some(opponent) => {
                info!(user_id, bet, opponent, "matched");
                Ok(JoinOutcome::Matched { opponent })
            }
            None => {
                info!(user_id, bet, "queued, waiting for opponent");
                Ok(JoinOutcome::Waiting)
            }
        }
    }

    /// Remove every ticket `user_id` holds in the tier for `bet`.
    /// Idempotent; returns the number of tickets removed (0 when the
    /// user was never queued).
    pub async fn cancel(&self, user_id: &str, bet: u64) -> Result<u64> {
        validate_ticket(user_id, bet)?;

        let removed = self.store.list_remove(&self.queue_key(bet), user_id).await?;
        info!(user_id, bet, removed, "match cancelled");
        Ok(removed)
    }
}

/// Reject malformed tickets before touching shared state.
fn validate_ticket(user_id: &str, bet: u64) -> Result<()> {
    if user_id.is_empty() {
        return Err(Error::validation("userId must not be empty"));
    }
    if bet == 0 {
        return Err(Error::validation("bet must be a positive integer"));
    }
    // anything larger could not be settled later
    if bet > crate::settlement::MAX_BET {
        return Err(Error::validation(format!(
            "bet must not exceed {}",
            crate::settlement::MAX_BET
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn matchmaker() -> Matchmaker {
        Matchmaker::new(Arc::new(MemoryStore::new()), "pending:")
    }

    #[tokio::test]
    async fn test_first_join_waits_second_matches() {
        let mm = matchmaker();
        assert_eq!(mm.join("alice", 100).await.unwrap(), JoinOutcome::Waiting);
        assert_eq!(
            mm.join("bob", 100).await.unwrap(),
            JoinOutcome::Matched {
                opponent: "alice".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_different_bets_never_compete() {
        let mm = matchmaker();
        assert_eq!(mm.join("alice", 100).await.unwrap(), JoinOutcome::Waiting);
        assert_eq!(mm.join("bob", 200).await.unwrap(), JoinOutcome::Waiting);
    }

    #[tokio::test]
    async fn test_invalid_tickets_rejected_before_store() {
        let mm = matchmaker();
        assert!(matches!(
            mm.join("", 100).await,
            Err(Error::Validation(_))
        ));
        assert!(matches!(
            mm.join("alice", 0).await,
            Err(Error::Validation(_))
        ));
        assert!(matches!(
            mm.join("alice", crate::settlement::MAX_BET + 1).await,
            Err(Error::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_cancel_is_idempotent() {
        let mm = matchmaker();
        mm.join("alice", 100).await.unwrap();
        assert_eq!(mm.cancel("alice", 100).await.unwrap(), 1);
        assert_eq!(mm.cancel("alice", 100).await.unwrap(), 0);
        assert_eq!(mm.cancel("ghost", 100).await.unwrap(), 0);
    }
}
