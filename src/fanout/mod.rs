//! Realtime fan-out
//!
//! Delivers domain events to the right live connections regardless of
//! which worker process holds them. Two addressing schemes: a personal
//! channel per authenticated user (`user:<id>`) for direct events like
//! `matched`, and a channel per room (`room:<id>`) for room broadcasts.
//!
//! Delivery is at-least-once to currently connected subscribers; events
//! published while nobody is subscribed are dropped, not queued.

use crate::errors::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::mpsc;
use uuid::Uuid;

pub mod local;
pub mod redis;

pub use self::local::{LocalBus, LocalHub};
pub use self::redis::RedisBus;

/// Identifier of one live connection
pub type ConnId = Uuid;

/// Outbound half of a connection's event queue
pub type EventSender = mpsc::UnboundedSender<Event>;

/// Logical fan-out address
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Channel {
    /// Personal channel for direct, user-targeted events
    User(String),
    /// Room channel for broadcasts among a match's participants
    Room(String),
}

impl Channel {
    /// Wire name, also used as the relay topic and the presence key.
    pub fn name(&self) -> String {
        match self {
            Channel::User(id) => format!("user:{}", id),
            Channel::Room(id) => format!("room:{}", id),
        }
    }
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.name())
    }
}

/// Server-to-client domain events
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum Event {
    /// Sent to both paired users' personal channels
    #[serde(rename_all = "camelCase")]
    Matched { opponent: String, room_id: String },

    /// Acknowledgement that the personal channel is live
    #[serde(rename_all = "camelCase")]
    JoinedSignaling { user_id: String },

    /// Reply to a room join
    #[serde(rename_all = "camelCase")]
    RoomJoined { room_id: String },

    /// Position relay; fire-and-forget, sender excluded
    PointerMove { x: f64, y: f64 },

    /// Settlement outcome, broadcast to the whole room channel
    #[serde(rename_all = "camelCase")]
    GameResult {
        winner_id: String,
        loser_id: String,
        winner_gain: i64,
        server_fee: i64,
    },
}

/// Wire envelope carried over the cross-process relay. The excluded
/// connection id travels with the event so the worker holding the
/// sender can skip it.
#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct Envelope {
    pub channel: String,
    pub event: Event,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exclude: Option<ConnId>,
}

/// Process-spanning publish/subscribe relay under the channel
/// addressing scheme.
#[async_trait]
pub trait EventBus: Send + Sync {
    /// Attach a connection's outbound queue to a channel.
    async fn subscribe(&self, channel: &Channel, conn_id: ConnId, sender: EventSender)
        -> Result<()>;

    /// Detach a connection from a channel. Safe to call when not
    /// subscribed.
    async fn unsubscribe(&self, channel: &Channel, conn_id: ConnId) -> Result<()>;

    /// Deliver to every live subscriber of the channel, on every worker.
    async fn publish(&self, channel: &Channel, event: &Event) -> Result<()>;

    /// Like [`EventBus::publish`] but skips the named connection -
    /// pointer relays never echo back to their sender.
    async fn publish_excluding(
        &self,
        channel: &Channel,
        event: &Event,
        exclude: ConnId,
    ) -> Result<()>;

    /// Live membership of a channel across all worker processes.
    async fn member_count(&self, channel: &Channel) -> Result<u64>;
}

/// Deliver an event to a local subscriber table, skipping the excluded
/// connection. Closed receivers are ignored; the disconnect path prunes
/// them.
pub(crate) fn deliver(
    subscribers: &HashMap<ConnId, EventSender>,
    event: &Event,
    exclude: Option<ConnId>,
) {
    for (conn_id, sender) in subscribers {
        if Some(*conn_id) == exclude {
            continue;
        }
        let _ = sender.send(event.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_names() {
        assert_eq!(Channel::User("alice".into()).name(), "user:alice");
        assert_eq!(Channel::Room("r-1".into()).name(), "room:r-1");
    }

    #[test]
    fn test_event_wire_format() {
        let event = Event::Matched {
            opponent: "bob".into(),
            room_id: "r-1".into(),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains(r#""event":"matched""#));
        assert!(json.contains(r#""roomId":"r-1""#));

        let event = Event::GameResult {
            winner_id: "a".into(),
            loser_id: "b".into(),
            winner_gain: 140,
            server_fee: 20,
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains(r#""event":"gameResult""#));
        assert!(json.contains(r#""winnerId":"a""#));
        assert!(json.contains(r#""serverFee":20"#));
    }

    #[test]
    fn test_envelope_round_trips_with_excluded_connection() {
        let exclude = Uuid::new_v4();
        let envelope = Envelope {
            channel: "room:r-1".to_string(),
            event: Event::PointerMove { x: 1.0, y: 2.0 },
            exclude: Some(exclude),
        };
        let json = serde_json::to_string(&envelope).unwrap();
        assert!(json.contains(&exclude.to_string()));

        let parsed: Envelope = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.channel, "room:r-1");
        assert_eq!(parsed.exclude, Some(exclude));

        // no excluded connection -> field absent on the wire
        let json = serde_json::to_string(&Envelope {
            channel: "user:alice".to_string(),
            event: Event::JoinedSignaling {
                user_id: "alice".to_string(),
            },
            exclude: None,
        })
        .unwrap();
        assert!(!json.contains("exclude"));
    }

    #[test]
    fn test_pointer_move_carries_only_coordinates() {
        let json = serde_json::to_string(&Event::PointerMove { x: 3.0, y: 4.5 }).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        let keys: Vec<&String> = value.as_object().unwrap().keys().collect();
        assert_eq!(keys.len(), 3); // event tag + x + y
        assert_eq!(value["x"], 3.0);
        assert_eq!(value["y"], 4.5);
    }
}
