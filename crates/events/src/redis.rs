//! Redis pub/sub [`EventBus`].
//!
//! Publishing goes through a shared `ConnectionManager`. Every subscription
//! opens its own pub/sub connection; dropping the returned stream closes it.

use async_trait::async_trait;
use futures::StreamExt;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use relay_core::retry::{self, Backoff};

use crate::{BusError, BusMessage, EventBus, Subscription};

/// Redis-backed event bus.
#[derive(Clone)]
pub struct RedisEventBus {
    client: redis::Client,
    publisher: ConnectionManager,
}

impl RedisEventBus {
    /// Connect the publishing side to Redis at `url`, retrying with
    /// exponential backoff ([`Backoff::default`]).
    pub async fn connect(url: &str) -> Result<Self, BusError> {
        let client = redis::Client::open(url)?;
        let publisher = retry::with_backoff("redis event bus", Backoff::default(), || {
            ConnectionManager::new(client.clone())
        })
        .await?;
        tracing::info!("Connected to Redis event bus");
        Ok(Self { client, publisher })
    }
}

#[async_trait]
impl EventBus for RedisEventBus {
    async fn publish(&self, channel: &str, payload: &str) -> Result<(), BusError> {
        let mut conn = self.publisher.clone();
        conn.publish::<_, _, ()>(channel, payload).await?;
        Ok(())
    }

    async fn subscribe(&self, channels: &[&str]) -> Result<Subscription, BusError> {
        let mut pubsub = self.client.get_async_pubsub().await?;
        for channel in channels {
            pubsub.subscribe(*channel).await?;
        }

        let stream = pubsub.into_on_message().map(|msg| -> Result<BusMessage, BusError> {
            let channel = msg.get_channel_name().to_string();
            let payload: String = msg.get_payload()?;
            Ok(BusMessage { channel, payload })
        });

        Ok(stream.boxed())
    }
}
