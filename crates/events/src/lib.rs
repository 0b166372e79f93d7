//! Publish/subscribe event bus for notification lifecycle events.
//!
//! This crate provides the building blocks for real-time fan-out:
//!
//! - [`EventBus`] -- the publish/subscribe seam used by the write path and
//!   by every streaming connection.
//! - [`BusMessage`] -- a `{channel, payload}` pair as delivered.
//! - [`MemoryEventBus`] -- in-process hub backed by `tokio::sync::broadcast`.
//! - [`RedisEventBus`] -- Redis pub/sub, one dedicated connection per
//!   subscription.
//!
//! Delivery is at-most-once with no replay: a subscriber only sees messages
//! published while its subscription is open.

use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::BoxStream;

pub mod bus;
pub mod redis;

pub use bus::MemoryEventBus;
pub use self::redis::RedisEventBus;

/// A message received from a subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BusMessage {
    /// Channel the message was published on.
    pub channel: String,
    /// Raw published payload, forwarded untouched.
    pub payload: String,
}

/// Errors raised by a bus backend.
#[derive(Debug, thiserror::Error)]
pub enum BusError {
    #[error("Redis error: {0}")]
    Redis(#[from] ::redis::RedisError),

    #[error("Event bus closed")]
    Closed,
}

/// Stream of messages for one subscription.
///
/// Dropping the stream releases the subscription.
pub type Subscription = BoxStream<'static, Result<BusMessage, BusError>>;

/// Publish/subscribe channel abstraction.
#[async_trait]
pub trait EventBus: Send + Sync {
    /// Publish `payload` on `channel` to every current subscriber.
    ///
    /// Fire-and-forget: having no subscribers is not an error.
    async fn publish(&self, channel: &str, payload: &str) -> Result<(), BusError>;

    /// Open a subscription covering `channels`.
    async fn subscribe(&self, channels: &[&str]) -> Result<Subscription, BusError>;

    /// Number of open subscriptions, when the backend can tell.
    fn subscriber_count(&self) -> Option<usize> {
        None
    }
}

/// Open the bus selected by configuration.
///
/// With a Redis URL the Redis backend is used; otherwise an in-process bus
/// is created.
pub async fn connect(redis_url: Option<&str>) -> Result<Arc<dyn EventBus>, BusError> {
    match redis_url {
        Some(url) => Ok(Arc::new(RedisEventBus::connect(url).await?)),
        None => {
            tracing::warn!("REDIS_URL not set, using in-process event bus");
            Ok(Arc::new(MemoryEventBus::default()))
        }
    }
}
