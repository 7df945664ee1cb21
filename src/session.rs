//! Per-connection session state
//!
//! One session per live WebSocket, created after token verification and
//! dropped on disconnect. Holds the verified identity and the explicit
//! set of joined room channels - membership is looked up here, never
//! reflected out of transport-library state.

use crate::fanout::{Channel, ConnId, EventSender};
use std::collections::HashSet;
use uuid::Uuid;

/// Ephemeral state binding a connection to a user identity and the
/// channels it has joined. Owned exclusively by the connection task.
pub struct ConnectionSession {
    pub conn_id: ConnId,
    pub user_id: String,
    /// Whether the personal channel subscription is live
    pub signaling_joined: bool,
    rooms: HashSet<String>,
    pub sender: EventSender,
}

impl ConnectionSession {
    pub fn new(user_id: impl Into<String>, sender: EventSender) -> Self {
        Self {
            conn_id: Uuid::new_v4(),
            user_id: user_id.into(),
            signaling_joined: false,
            rooms: HashSet::new(),
            sender,
        }
    }

    /// Personal channel for direct events
    pub fn user_channel(&self) -> Channel {
        Channel::User(self.user_id.clone())
    }

    /// Track a joined room. Returns false when already joined.
    pub fn join_room(&mut self, room_id: &str) -> bool {
        self.rooms.insert(room_id.to_string())
    }

    pub fn in_room(&self, room_id: &str) -> bool {
        self.rooms.contains(room_id)
    }

    /// Room ids this connection is part of, for disconnect teardown.
    pub fn joined_rooms(&self) -> impl Iterator<Item = &str> {
        self.rooms.iter().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    #[test]
    fn test_session_tracks_room_membership() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut session = ConnectionSession::new("alice", tx);

        assert!(session.join_room("r-1"));
        assert!(!session.join_room("r-1"));
        assert!(session.join_room("r-2"));

        assert!(session.in_room("r-1"));
        assert!(!session.in_room("r-9"));
        assert_eq!(session.joined_rooms().count(), 2);
    }

    #[test]
    fn test_sessions_get_distinct_conn_ids() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let a = ConnectionSession::new("alice", tx.clone());
        let b = ConnectionSession::new("alice", tx);
        assert_ne!(a.conn_id, b.conn_id);
        assert_eq!(a.user_channel(), b.user_channel());
    }
}
