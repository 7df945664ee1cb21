//! Redis-backed atomic store
//!
//! The compound operations run as Lua scripts, which Redis executes as a
//! single indivisible step. Plain key/list operations go through the
//! multiplexed async connection.

use super::{AtomicStore, FEE_POOL_KEY, USER_KEY_PREFIX};
use crate::errors::Result;
use async_trait::async_trait;
use redis::{AsyncCommands, Script};
use std::sync::Arc;
use tracing::debug;

/// Enqueue-and-pair. Appends the caller, then pops the two oldest
/// tickets when the tier holds a pair. The swap keeps the return value
/// "the opponent" even when the caller itself was popped first.
const PAIR_SCRIPT: &str = r#"
local key = KEYS[1]
local user = ARGV[1]
redis.call('RPUSH', key, user)
local len = tonumber(redis.call('LLEN', key))
if len < 2 then return false end
local a = redis.call('LPOP', key)
local b = redis.call('LPOP', key)
if a == user then a = b end
return a
"#;

/// Winner credit, loser credit, and fee accrual as one step.
const DUAL_CREDIT_SCRIPT: &str = r#"
local wkey = KEYS[1]
local lkey = KEYS[2]
redis.call('HINCRBY', wkey, 'balance', ARGV[1])
redis.call('HINCRBY', lkey, 'balance', ARGV[2])
redis.call('INCRBY', KEYS[3], ARGV[3])
return 1
"#;

/// Atomic store over a shared Redis instance
#[derive(Clone)]
pub struct RedisStore {
    client: Arc<redis::Client>,
    pair_script: Arc<Script>,
    dual_credit_script: Arc<Script>,
}

impl RedisStore {
    pub fn new(redis_url: &str) -> Result<Self> {
        let client = redis::Client::open(redis_url)?;
        Ok(Self {
            client: Arc::new(client),
            pair_script: Arc::new(Script::new(PAIR_SCRIPT)),
            dual_credit_script: Arc::new(Script::new(DUAL_CREDIT_SCRIPT)),
        })
    }

    async fn connection(&self) -> Result<redis::aio::MultiplexedConnection> {
        Ok(self.client.get_multiplexed_async_connection().await?)
    }

    fn user_key(user_id: &str) -> String {
        format!("{}{}", USER_KEY_PREFIX, user_id)
    }
}

#[async_trait]
impl AtomicStore for RedisStore {
    async fn atomic_pair(&self, queue_key: &str, user_id: &str) -> Result<Option<String>> {
        let mut conn = self.connection().await?;
        let opponent: Option<String> = self
            .pair_script
            .key(queue_key)
            .arg(user_id)
            .invoke_async(&mut conn)
            .await?;
        debug!(queue_key, user_id, matched = opponent.is_some(), "atomic pair");
        Ok(opponent)
    }

    async fn atomic_dual_credit(
        &self,
        winner_id: &str,
        loser_id: &str,
        winner_gain: i64,
        loser_gain: i64,
        fee: i64,
    ) -> Result<()> {
        let mut conn = self.connection().await?;
        let _: i64 = self
            .dual_credit_script
            .key(Self::user_key(winner_id))
            .key(Self::user_key(loser_id))
            .key(FEE_POOL_KEY)
            .arg(winner_gain)
            .arg(loser_gain)
            .arg(fee)
            .invoke_async(&mut conn)
            .await?;
        debug!(winner_id, loser_id, winner_gain, loser_gain, fee, "dual credit applied");
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut conn = self.connection().await?;
        Ok(conn.get(key).await?)
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut conn = self.connection().await?;
        conn.set::<_, _, ()>(key, value).await?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        let mut conn = self.connection().await?;
        let removed: u64 = conn.del(key).await?;
        Ok(removed > 0)
    }

    async fn list_remove(&self, key: &str, value: &str) -> Result<u64> {
        let mut conn = self.connection().await?;
        // count 0 removes every occurrence
        Ok(conn.lrem(key, 0, value).await?)
    }

    async fn balance(&self, user_id: &str) -> Result<i64> {
        let mut conn = self.connection().await?;
        let balance: Option<i64> = conn.hget(Self::user_key(user_id), "balance").await?;
        Ok(balance.unwrap_or(0))
    }

    async fn fee_pool(&self) -> Result<i64> {
        let mut conn = self.connection().await?;
        let fees: Option<i64> = conn.get(FEE_POOL_KEY).await?;
        Ok(fees.unwrap_or(0))
    }
}
