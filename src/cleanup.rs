//! Room cleanup supervisor
//!
//! Best-effort reclamation of rooms that never reach settlement. Every
//! time a connection leaves a room channel, a delayed check is
//! scheduled; at expiry the live membership is re-queried across all
//! workers and the room is deleted only if it is still empty. Duplicate
//! timers for one room are harmless because deletion is idempotent, and
//! a race with settlement resolves to whichever deletes first.

use crate::fanout::{Channel, EventBus};
use crate::rooms::RoomRegistry;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Schedules grace-period checks for rooms whose members drop off
#[derive(Clone)]
pub struct CleanupSupervisor {
    bus: Arc<dyn EventBus>,
    rooms: Arc<RoomRegistry>,
    grace_period: Duration,
}

impl CleanupSupervisor {
    pub fn new(bus: Arc<dyn EventBus>, rooms: Arc<RoomRegistry>, grace_period: Duration) -> Self {
        Self {
            bus,
            rooms,
            grace_period,
        }
    }

    /// Schedule a delayed emptiness check for `room_id`. Called once per
    /// departing connection; each timer runs independently.
    pub fn schedule(&self, room_id: &str) {
        let supervisor = self.clone();
        let room_id = room_id.to_string();
        tokio::spawn(async move {
            tokio::time::sleep(supervisor.grace_period).await;
            supervisor.reclaim_if_empty(&room_id).await;
        });
    }

    /// Delete the room unless someone rejoined during the grace period.
    async fn reclaim_if_empty(&self, room_id: &str) {
        let channel = Channel::Room(room_id.to_string());
        match self.bus.member_count(&channel).await {
            Ok(0) => {
                if let Err(e) = self.rooms.delete(room_id).await {
                    warn!(room_id, "cleanup delete failed: {}", e);
                } else {
                    info!(room_id, "cleaned up empty room after grace period");
                }
            }
            Ok(remaining) => {
                info!(room_id, remaining, "room regained members, cleanup skipped");
            }
            Err(e) => {
                warn!(room_id, "cleanup membership query failed: {}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fanout::{Event, EventSender, LocalHub};
    use crate::store::MemoryStore;
    use tokio::sync::mpsc;
    use uuid::Uuid;

    fn sender() -> (EventSender, mpsc::UnboundedReceiver<Event>) {
        mpsc::unbounded_channel()
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_room_reclaimed_after_grace_period() {
        let store = Arc::new(MemoryStore::new());
        let rooms = Arc::new(RoomRegistry::new(store, "room:"));
        let hub = LocalHub::new();
        let supervisor = CleanupSupervisor::new(
            Arc::new(hub.bus()),
            Arc::clone(&rooms),
            Duration::from_secs(30),
        );

        let room_id = rooms.create("alice", "bob", 100).await.unwrap();
        supervisor.schedule(&room_id);

        tokio::time::sleep(Duration::from_secs(31)).await;
        assert!(rooms.get(&room_id).await.unwrap_err().is_not_found());
    }

    #[tokio::test(start_paused = true)]
    async fn test_rejoin_before_expiry_survives() {
        let store = Arc::new(MemoryStore::new());
        let rooms = Arc::new(RoomRegistry::new(store, "room:"));
        let hub = LocalHub::new();
        let bus = hub.bus();
        let supervisor = CleanupSupervisor::new(
            Arc::new(bus.clone()),
            Arc::clone(&rooms),
            Duration::from_secs(30),
        );

        let room_id = rooms.create("alice", "bob", 100).await.unwrap();
        supervisor.schedule(&room_id);

        // someone comes back before the timer fires
        tokio::time::sleep(Duration::from_secs(10)).await;
        let (tx, _rx) = sender();
        crate::fanout::EventBus::subscribe(
            &bus,
            &Channel::Room(room_id.clone()),
            Uuid::new_v4(),
            tx,
        )
        .await
        .unwrap();

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert!(rooms.get(&room_id).await.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_duplicate_timers_are_harmless() {
        let store = Arc::new(MemoryStore::new());
        let rooms = Arc::new(RoomRegistry::new(store, "room:"));
        let hub = LocalHub::new();
        let supervisor = CleanupSupervisor::new(
            Arc::new(hub.bus()),
            Arc::clone(&rooms),
            Duration::from_secs(30),
        );

        let room_id = rooms.create("alice", "bob", 100).await.unwrap();
        supervisor.schedule(&room_id);
        supervisor.schedule(&room_id);
        supervisor.schedule(&room_id);

        tokio::time::sleep(Duration::from_secs(31)).await;
        assert!(rooms.get(&room_id).await.unwrap_err().is_not_found());
    }
}
