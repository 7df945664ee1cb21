//! Room registry
//!
//! Rooms are the persisted record of one matched pair and their stake,
//! keyed by a generated UUID. The record is written as one serialized
//! value so a partially written room (missing bet or one player) is
//! never observable.

use crate::errors::{Error, Result};
use crate::store::AtomicStore;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

/// One active match: two players and their identical stake.
/// Immutable from creation until deletion.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Room {
    pub player1: String,
    pub player2: String,
    pub bet: u64,
}

impl Room {
    /// Whether `user_id` is one of the two participants.
    pub fn has_player(&self, user_id: &str) -> bool {
        self.player1 == user_id || self.player2 == user_id
    }

    /// The participant that is not `user_id`. None when `user_id` is
    /// not in the room.
    pub fn opponent_of(&self, user_id: &str) -> Option<&str> {
        if self.player1 == user_id {
            Some(&self.player2)
        } else if self.player2 == user_id {
            Some(&self.player1)
        } else {
            None
        }
    }
}

/// Creates, reads, and destroys room records in the shared store
pub struct RoomRegistry {
    store: Arc<dyn AtomicStore>,
    room_prefix: String,
}

impl RoomRegistry {
    pub fn new(store: Arc<dyn AtomicStore>, room_prefix: impl Into<String>) -> Self {
        Self {
            store,
            room_prefix: room_prefix.into(),
        }
    }

    fn room_key(&self, room_id: &str) -> String {
        format!("{}{}", self.room_prefix, room_id)
    }

    /// Write a fresh room record under a new globally-unique id.
    pub async fn create(&self, player1: &str, player2: &str, bet: u64) -> Result<String> {
        let room_id = Uuid::new_v4().to_string();
        let room = Room {
            player1: player1.to_string(),
            player2: player2.to_string(),
            bet,
        };
        let record = serde_json::to_string(&room)?;
        self.store.set(&self.room_key(&room_id), &record).await?;
        info!(room_id, player1, player2, bet, "room created");
        Ok(room_id)
    }

    /// Load a room. A missing record means the room was already settled
    /// or expired - terminal, not a transient failure.
    pub async fn get(&self, room_id: &str) -> Result<Room> {
        let record = self
            .store
            .get(&self.room_key(room_id))
            .await?
            .ok_or_else(|| Error::RoomNotFound(room_id.to_string()))?;
        Ok(serde_json::from_str(&record)?)
    }

    /// Idempotent delete; deleting an already-deleted room is a no-op.
    pub async fn delete(&self, room_id: &str) -> Result<()> {
        let existed = self.store.delete(&self.room_key(room_id)).await?;
        if existed {
            info!(room_id, "room deleted");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn registry() -> RoomRegistry {
        RoomRegistry::new(Arc::new(MemoryStore::new()), "room:")
    }

    #[tokio::test]
    async fn test_create_then_get_round_trips() {
        let rooms = registry();
        let room_id = rooms.create("alice", "bob", 100).await.unwrap();
        let room = rooms.get(&room_id).await.unwrap();
        assert_eq!(room.player1, "alice");
        assert_eq!(room.player2, "bob");
        assert_eq!(room.bet, 100);
    }

    #[tokio::test]
    async fn test_get_missing_room_is_not_found() {
        let rooms = registry();
        let err = rooms.get("nope").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_delete_twice_is_noop() {
        let rooms = registry();
        let room_id = rooms.create("alice", "bob", 100).await.unwrap();
        rooms.delete(&room_id).await.unwrap();
        rooms.delete(&room_id).await.unwrap();
        assert!(rooms.get(&room_id).await.unwrap_err().is_not_found());
    }

    #[test]
    fn test_opponent_lookup() {
        let room = Room {
            player1: "alice".into(),
            player2: "bob".into(),
            bet: 10,
        };
        assert_eq!(room.opponent_of("alice"), Some("bob"));
        assert_eq!(room.opponent_of("bob"), Some("alice"));
        assert_eq!(room.opponent_of("mallory"), None);
        assert!(room.has_player("alice"));
        assert!(!room.has_player("mallory"));
    }
}
