//! In-memory atomic store
//!
//! A single mutex over the whole keyspace makes every operation one
//! critical section, giving the same single-step guarantee the Lua
//! scripts give on Redis. Used by tests and single-instance local runs.

use super::{AtomicStore, FEE_POOL_KEY};
use crate::errors::Result;
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use tokio::sync::Mutex;

#[derive(Default)]
struct Inner {
    kv: HashMap<String, String>,
    lists: HashMap<String, VecDeque<String>>,
    balances: HashMap<String, i64>,
    counters: HashMap<String, i64>,
}

/// Mutex-serialized store with the same semantics as [`super::RedisStore`]
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AtomicStore for MemoryStore {
    async fn atomic_pair(&self, queue_key: &str, user_id: &str) -> Result<Option<String>> {
        let mut inner = self.inner.lock().await;
        let queue = inner.lists.entry(queue_key.to_string()).or_default();
        queue.push_back(user_id.to_string());
        if queue.len() < 2 {
            return Ok(None);
        }
        match (queue.pop_front(), queue.pop_front()) {
            // always hand back the opponent, never the caller
            (Some(a), Some(b)) => Ok(Some(if a == user_id { b } else { a })),
            _ => Ok(None),
        }
    }

    async fn atomic_dual_credit(
        &self,
        winner_id: &str,
        loser_id: &str,
        winner_gain: i64,
        loser_gain: i64,
        fee: i64,
    ) -> Result<()> {
        let mut inner = self.inner.lock().await;
        *inner.balances.entry(winner_id.to_string()).or_default() += winner_gain;
        *inner.balances.entry(loser_id.to_string()).or_default() += loser_gain;
        *inner.counters.entry(FEE_POOL_KEY.to_string()).or_default() += fee;
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        let inner = self.inner.lock().await;
        Ok(inner.kv.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut inner = self.inner.lock().await;
        inner.kv.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        let mut inner = self.inner.lock().await;
        Ok(inner.kv.remove(key).is_some())
    }

    async fn list_remove(&self, key: &str, value: &str) -> Result<u64> {
        let mut inner = self.inner.lock().await;
        let Some(queue) = inner.lists.get_mut(key) else {
            return Ok(0);
        };
        let before = queue.len();
        queue.retain(|entry| entry != value);
        Ok((before - queue.len()) as u64)
    }

    async fn balance(&self, user_id: &str) -> Result<i64> {
        let inner = self.inner.lock().await;
        Ok(inner.balances.get(user_id).copied().unwrap_or(0))
    }

    async fn fee_pool(&self) -> Result<i64> {
        let inner = self.inner.lock().await;
        Ok(inner.counters.get(FEE_POOL_KEY).copied().unwrap_or(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_pair_returns_opponent_in_fifo_order() {
        let store = MemoryStore::new();
        assert_eq!(store.atomic_pair("pending:100", "alice").await.unwrap(), None);
        let opponent = store.atomic_pair("pending:100", "bob").await.unwrap();
        assert_eq!(opponent.as_deref(), Some("alice"));
    }

    #[tokio::test]
    async fn test_list_remove_drops_every_occurrence() {
        let store = MemoryStore::new();
        store.atomic_pair("pending:50", "carol").await.unwrap();
        // second ticket from the same user pairs with the first, so
        // queue two fresh ones to exercise multi-removal
        store.atomic_pair("pending:75", "dave").await.unwrap();
        store.atomic_pair("pending:80", "dave").await.unwrap();
        assert_eq!(store.list_remove("pending:75", "dave").await.unwrap(), 1);
        assert_eq!(store.list_remove("pending:75", "dave").await.unwrap(), 0);
        assert_eq!(store.list_remove("pending:999", "nobody").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_dual_credit_accumulates() {
        let store = MemoryStore::new();
        store.atomic_dual_credit("w", "l", 140, 40, 20).await.unwrap();
        store.atomic_dual_credit("w", "l", 140, 40, 20).await.unwrap();
        assert_eq!(store.balance("w").await.unwrap(), 280);
        assert_eq!(store.balance("l").await.unwrap(), 80);
        assert_eq!(store.fee_pool().await.unwrap(), 40);
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let store = MemoryStore::new();
        store.set("room:x", "{}").await.unwrap();
        assert!(store.delete("room:x").await.unwrap());
        assert!(!store.delete("room:x").await.unwrap());
    }
}
