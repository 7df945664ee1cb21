//! In-process fan-out hub
//!
//! Same contract as the Redis relay without the external dependency.
//! A [`LocalHub`] plays the role of the relay; every [`LocalBus`] handle
//! attached to it models one worker process. Used by tests and by
//! single-instance deployments that skip Redis pub/sub.

use super::{deliver, Channel, ConnId, Event, EventBus, EventSender};
use crate::errors::Result;
use async_trait::async_trait;
use dashmap::DashMap;
use std::collections::HashMap;
use std::sync::Arc;

/// Shared relay state: channel name -> live subscriber table
#[derive(Default)]
pub struct LocalHub {
    channels: DashMap<String, HashMap<ConnId, EventSender>>,
}

impl LocalHub {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// A bus handle attached to this hub. Each handle stands in for one
    /// worker process.
    pub fn bus(self: &Arc<Self>) -> LocalBus {
        LocalBus {
            hub: Arc::clone(self),
        }
    }
}

/// One worker's view of the shared hub
#[derive(Clone)]
pub struct LocalBus {
    hub: Arc<LocalHub>,
}

#[async_trait]
impl EventBus for LocalBus {
    async fn subscribe(
        &self,
        channel: &Channel,
        conn_id: ConnId,
        sender: EventSender,
    ) -> Result<()> {
        self.hub
            .channels
            .entry(channel.name())
            .or_default()
            .insert(conn_id, sender);
        Ok(())
    }

    async fn unsubscribe(&self, channel: &Channel, conn_id: ConnId) -> Result<()> {
        let name = channel.name();
        if let Some(mut subscribers) = self.hub.channels.get_mut(&name) {
            subscribers.remove(&conn_id);
            let emptied = subscribers.is_empty();
            drop(subscribers);
            if emptied {
                self.hub.channels.remove_if(&name, |_, subs| subs.is_empty());
            }
        }
        Ok(())
    }

    async fn publish(&self, channel: &Channel, event: &Event) -> Result<()> {
        if let Some(subscribers) = self.hub.channels.get(&channel.name()) {
            deliver(&subscribers, event, None);
        }
        Ok(())
    }

    async fn publish_excluding(
        &self,
        channel: &Channel,
        event: &Event,
        exclude: ConnId,
    ) -> Result<()> {
        if let Some(subscribers) = self.hub.channels.get(&channel.name()) {
            deliver(&subscribers, event, Some(exclude));
        }
        Ok(())
    }

    async fn member_count(&self, channel: &Channel) -> Result<u64> {
        Ok(self
            .hub
            .channels
            .get(&channel.name())
            .map(|subscribers| subscribers.len() as u64)
            .unwrap_or(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;
    use uuid::Uuid;

    #[tokio::test]
    async fn test_publish_reaches_subscriber() {
        let hub = LocalHub::new();
        let bus = hub.bus();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let conn = Uuid::new_v4();
        let channel = Channel::User("alice".into());

        bus.subscribe(&channel, conn, tx).await.unwrap();
        bus.publish(
            &channel,
            &Event::JoinedSignaling {
                user_id: "alice".into(),
            },
        )
        .await
        .unwrap();

        assert!(matches!(
            rx.recv().await,
            Some(Event::JoinedSignaling { .. })
        ));
    }

    #[tokio::test]
    async fn test_publish_without_subscribers_is_dropped() {
        let hub = LocalHub::new();
        let bus = hub.bus();
        let channel = Channel::Room("r-1".into());
        // no error, no queueing
        bus.publish(&channel, &Event::PointerMove { x: 0.0, y: 0.0 })
            .await
            .unwrap();
        assert_eq!(bus.member_count(&channel).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_member_count_tracks_subscriptions() {
        let hub = LocalHub::new();
        let bus = hub.bus();
        let channel = Channel::Room("r-1".into());
        let (tx, _rx) = mpsc::unbounded_channel();
        let conn = Uuid::new_v4();

        bus.subscribe(&channel, conn, tx).await.unwrap();
        assert_eq!(bus.member_count(&channel).await.unwrap(), 1);
        bus.unsubscribe(&channel, conn).await.unwrap();
        assert_eq!(bus.member_count(&channel).await.unwrap(), 0);
        // unsubscribing again is harmless
        bus.unsubscribe(&channel, conn).await.unwrap();
    }
}
