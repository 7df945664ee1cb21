//! Redis pub/sub fan-out relay
//!
//! Every worker process publishes envelopes onto Redis channels and runs
//! one background relay task that forwards incoming envelopes to its
//! local subscribers. Per-channel presence counters in the store make
//! live membership visible across processes, which is what the cleanup
//! supervisor queries.

use super::{deliver, Channel, ConnId, Envelope, Event, EventBus, EventSender};
use crate::errors::Result;
use crate::store::PRESENCE_KEY_PREFIX;
use async_trait::async_trait;
use dashmap::DashMap;
use futures_util::StreamExt;
use redis::AsyncCommands;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Relay topic prefix; one Redis channel per logical channel.
const TOPIC_PREFIX: &str = "fanout:";

/// Pattern the relay task listens on.
const TOPIC_PATTERN: &str = "fanout:*";

type SubscriberTable = DashMap<String, HashMap<ConnId, EventSender>>;

/// Cross-process event bus over Redis pub/sub
#[derive(Clone)]
pub struct RedisBus {
    client: Arc<redis::Client>,
    local: Arc<SubscriberTable>,
}

impl RedisBus {
    /// Connect and start the background relay task for this process.
    pub fn connect(redis_url: &str) -> Result<Self> {
        let client = Arc::new(redis::Client::open(redis_url)?);
        let local: Arc<SubscriberTable> = Arc::new(DashMap::new());

        tokio::spawn(relay_loop(Arc::clone(&client), Arc::clone(&local)));

        Ok(Self { client, local })
    }

    async fn connection(&self) -> Result<redis::aio::MultiplexedConnection> {
        Ok(self.client.get_multiplexed_async_connection().await?)
    }

    fn presence_key(channel: &Channel) -> String {
        format!("{}{}", PRESENCE_KEY_PREFIX, channel.name())
    }

    async fn publish_envelope(&self, channel: &Channel, envelope: &Envelope) -> Result<()> {
        let payload = serde_json::to_string(envelope)?;
        let topic = format!("{}{}", TOPIC_PREFIX, channel.name());
        let mut conn = self.connection().await?;
        // receiver count is informational only; zero means dropped
        let receivers: u64 = conn.publish(&topic, payload).await?;
        debug!(topic, receivers, "published envelope");
        Ok(())
    }
}

#[async_trait]
impl EventBus for RedisBus {
    async fn subscribe(
        &self,
        channel: &Channel,
        conn_id: ConnId,
        sender: EventSender,
    ) -> Result<()> {
        let inserted = self
            .local
            .entry(channel.name())
            .or_default()
            .insert(conn_id, sender)
            .is_none();
        if inserted {
            let mut conn = self.connection().await?;
            let _: i64 = conn.incr(Self::presence_key(channel), 1).await?;
        }
        Ok(())
    }

    async fn unsubscribe(&self, channel: &Channel, conn_id: ConnId) -> Result<()> {
        let name = channel.name();
        let removed = self
            .local
            .get_mut(&name)
            .map(|mut subscribers| subscribers.remove(&conn_id).is_some())
            .unwrap_or(false);
        self.local.remove_if(&name, |_, subs| subs.is_empty());

        // only decrement for subscriptions we actually held, so repeated
        // unsubscribes cannot drive the counter negative
        if removed {
            let mut conn = self.connection().await?;
            let _: i64 = conn.decr(Self::presence_key(channel), 1).await?;
        }
        Ok(())
    }

    async fn publish(&self, channel: &Channel, event: &Event) -> Result<()> {
        self.publish_envelope(
            channel,
            &Envelope {
                channel: channel.name(),
                event: event.clone(),
                exclude: None,
            },
        )
        .await
    }

    async fn publish_excluding(
        &self,
        channel: &Channel,
        event: &Event,
        exclude: ConnId,
    ) -> Result<()> {
        self.publish_envelope(
            channel,
            &Envelope {
                channel: channel.name(),
                event: event.clone(),
                exclude: Some(exclude),
            },
        )
        .await
    }

    async fn member_count(&self, channel: &Channel) -> Result<u64> {
        let mut conn = self.connection().await?;
        let count: Option<i64> = conn.get(Self::presence_key(channel)).await?;
        Ok(count.unwrap_or(0).max(0) as u64)
    }
}

/// Background task: receive envelopes for every fan-out topic and hand
/// them to this process's local subscribers. Reconnects with backoff on
/// relay failure; subscriptions survive because the local table is the
/// source of truth.
async fn relay_loop(client: Arc<redis::Client>, local: Arc<SubscriberTable>) {
    loop {
        match client.get_async_connection().await {
            Ok(conn) => {
                let mut pubsub = conn.into_pubsub();
                if let Err(e) = pubsub.psubscribe(TOPIC_PATTERN).await {
                    warn!("relay psubscribe failed: {}", e);
                } else {
                    let mut stream = pubsub.on_message();
                    while let Some(msg) = stream.next().await {
                        let payload: String = match msg.get_payload() {
                            Ok(payload) => payload,
                            Err(e) => {
                                warn!("relay payload decode failed: {}", e);
                                continue;
                            }
                        };
                        let envelope: Envelope = match serde_json::from_str(&payload) {
                            Ok(envelope) => envelope,
                            Err(e) => {
                                warn!("relay envelope parse failed: {}", e);
                                continue;
                            }
                        };
                        if let Some(subscribers) = local.get(&envelope.channel) {
                            deliver(&subscribers, &envelope.event, envelope.exclude);
                        }
                    }
                }
            }
            Err(e) => {
                warn!("relay connection failed: {}", e);
            }
        }
        tokio::time::sleep(Duration::from_secs(1)).await;
    }
}
