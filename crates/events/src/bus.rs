//! In-process event bus backed by a `tokio::sync::broadcast` channel.
//!
//! [`MemoryEventBus`] is designed to be shared via `Arc` across the
//! application. Each subscription is its own broadcast receiver filtered
//! down to the requested channels.

use async_trait::async_trait;
use futures::StreamExt;
use tokio::sync::broadcast;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;

use crate::{BusError, BusMessage, EventBus, Subscription};

/// Default buffer capacity for the broadcast channel.
const DEFAULT_CAPACITY: usize = 1024;

/// In-process fan-out event bus.
///
/// Wraps a [`broadcast::Sender`] so that any number of subscribers can
/// independently receive every published [`BusMessage`].
pub struct MemoryEventBus {
    sender: broadcast::Sender<BusMessage>,
}

impl MemoryEventBus {
    /// Create a bus with a specific channel capacity.
    ///
    /// When the buffer is full, the oldest un-consumed messages are dropped
    /// and slow subscribers skip them (logged at `warn`).
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }
}

impl Default for MemoryEventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

#[async_trait]
impl EventBus for MemoryEventBus {
    async fn publish(&self, channel: &str, payload: &str) -> Result<(), BusError> {
        // A SendError only means there are zero subscribers.
        let _ = self.sender.send(BusMessage {
            channel: channel.to_string(),
            payload: payload.to_string(),
        });
        Ok(())
    }

    async fn subscribe(&self, channels: &[&str]) -> Result<Subscription, BusError> {
        let wanted: Vec<String> = channels.iter().map(|c| (*c).to_string()).collect();

        let stream = BroadcastStream::new(self.sender.subscribe()).filter_map(move |item| {
            let out = match item {
                Ok(msg) if wanted.contains(&msg.channel) => Some(Ok(msg)),
                Ok(_) => None,
                Err(BroadcastStreamRecvError::Lagged(n)) => {
                    tracing::warn!(skipped = n, "Bus subscription lagged");
                    None
                }
            };
            futures::future::ready(out)
        });

        Ok(stream.boxed())
    }

    fn subscriber_count(&self) -> Option<usize> {
        Some(self.sender.receiver_count())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
