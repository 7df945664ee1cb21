//! Atomic store adapter
//!
//! Wraps the external atomic key/value/list store behind a trait so the
//! matchmaking, room, and settlement layers never read-then-write shared
//! keys themselves. The two compound operations (`atomic_pair`,
//! `atomic_dual_credit`) are each a single indivisible step against the
//! store; everything correctness-critical hangs off that guarantee.

use crate::errors::Result;
use async_trait::async_trait;

pub mod memory;
pub mod redis;

pub use self::memory::MemoryStore;
pub use self::redis::RedisStore;

/// Key prefix for per-user ledger hashes: user:{id}
pub const USER_KEY_PREFIX: &str = "user:";

/// Global fee accumulator key
pub const FEE_POOL_KEY: &str = "server:fees";

/// Key prefix for per-channel live membership counters: presence:{channel}
pub const PRESENCE_KEY_PREFIX: &str = "presence:";

/// Atomic operations against the shared store.
///
/// Implementations must make every method safe to call concurrently from
/// any number of worker processes.
#[async_trait]
pub trait AtomicStore: Send + Sync {
    /// Enqueue-and-pair in one indivisible step: append `user_id` to the
    /// tail of the tier queue, then if the queue holds two or more
    /// tickets pop the two oldest in FIFO order and return the one that
    /// is not the caller. Returns `None` when the caller stays queued.
    async fn atomic_pair(&self, queue_key: &str, user_id: &str) -> Result<Option<String>>;

    /// Settlement mutation in one indivisible step: credit the winner,
    /// credit the loser, and add the fee to the global accumulator.
    /// All-or-nothing; partial application is not a possible outcome.
    async fn atomic_dual_credit(
        &self,
        winner_id: &str,
        loser_id: &str,
        winner_gain: i64,
        loser_gain: i64,
        fee: i64,
    ) -> Result<()>;

    async fn get(&self, key: &str) -> Result<Option<String>>;

    async fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Idempotent delete; returns whether the key existed.
    async fn delete(&self, key: &str) -> Result<bool>;

    /// Remove all occurrences of `value` from the list at `key`,
    /// returning how many were removed. Zero when absent.
    async fn list_remove(&self, key: &str, value: &str) -> Result<u64>;

    /// Current ledger balance for a user (0 when never credited).
    async fn balance(&self, user_id: &str) -> Result<i64>;

    /// Current value of the global fee accumulator.
    async fn fee_pool(&self) -> Result<i64>;
}
