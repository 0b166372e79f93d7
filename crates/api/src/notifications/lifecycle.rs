//! Create, verify and list notification records.
//!
//! The store is the source of truth. Publishing is best-effort: a bus
//! failure is logged after the store mutation has committed, so the stream
//! can miss an event that the listings already show.

use std::sync::Arc;

use relay_core::channels::{CHANNEL_NEW, CHANNEL_VERIFIED, SEQ_UNVERIFIED, SEQ_VERIFIED};
use relay_core::NotificationRecord;
use relay_events::EventBus;
use relay_store::{ListStore, StoreError};

/// Errors returned by [`NotificationLifecycle`] operations.
#[derive(Debug, thiserror::Error)]
pub enum LifecycleError {
    /// No unverified record carries this id.
    #[error("notification {0} not found")]
    NotFound(String),

    #[error(transparent)]
    Storage(#[from] StoreError),

    #[error("failed to encode notification: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Owns the unverified → verified transition of notification records.
pub struct NotificationLifecycle {
    store: Arc<dyn ListStore>,
    bus: Arc<dyn EventBus>,
}

impl NotificationLifecycle {
    pub fn new(store: Arc<dyn ListStore>, bus: Arc<dyn EventBus>) -> Self {
        Self { store, bus }
    }

    /// Create an unverified record, push it to the head of the unverified
    /// sequence and announce it on the "new" channel.
    pub async fn create(&self, message: String) -> Result<NotificationRecord, LifecycleError> {
        let record = NotificationRecord::new(message);
        let encoded = record.encode()?;

        self.store.push_head(SEQ_UNVERIFIED, &encoded).await?;
        tracing::info!(notification_id = %record.id, "Notification created");

        self.publish(CHANNEL_NEW, &encoded).await;
        Ok(record)
    }

    /// Move the record with `id` from the unverified sequence to the tail of
    /// the verified sequence and announce it on the "verified" channel.
    ///
    /// The move is a single store operation. When two callers verify the
    /// same id concurrently, exactly one succeeds; the other sees
    /// [`LifecycleError::NotFound`].
    pub async fn verify(&self, id: &str) -> Result<(), LifecycleError> {
        let entries = self.store.range_all(SEQ_UNVERIFIED).await?;

        let Some((raw, record)) = entries.into_iter().find_map(|raw| {
            decode_entry(SEQ_UNVERIFIED, &raw)
                .filter(|record| record.id == id)
                .map(|record| (raw, record))
        }) else {
            return Err(LifecycleError::NotFound(id.to_string()));
        };

        let updated = record.into_verified().encode()?;

        let moved = self
            .store
            .move_value(SEQ_UNVERIFIED, SEQ_VERIFIED, &raw, &updated)
            .await?;
        if !moved {
            tracing::debug!(notification_id = %id, "Notification moved by a concurrent verify");
            return Err(LifecycleError::NotFound(id.to_string()));
        }
        tracing::info!(notification_id = %id, "Notification verified");

        self.publish(CHANNEL_VERIFIED, &updated).await;
        Ok(())
    }

    /// Unverified records in store order (newest first).
    pub async fn list_unverified(&self) -> Result<Vec<NotificationRecord>, LifecycleError> {
        self.list(SEQ_UNVERIFIED).await
    }

    /// Verified records in store order (oldest verification first).
    pub async fn list_verified(&self) -> Result<Vec<NotificationRecord>, LifecycleError> {
        self.list(SEQ_VERIFIED).await
    }

    async fn list(&self, sequence: &str) -> Result<Vec<NotificationRecord>, LifecycleError> {
        let entries = self.store.range_all(sequence).await?;
        Ok(entries
            .iter()
            .filter_map(|raw| decode_entry(sequence, raw))
            .collect())
    }

    async fn publish(&self, channel: &str, payload: &str) {
        if let Err(e) = self.bus.publish(channel, payload).await {
            tracing::warn!(channel, error = %e, "Failed to publish notification event");
        }
    }
}

/// Decode a stored entry, logging and skipping anything malformed.
fn decode_entry(sequence: &str, raw: &str) -> Option<NotificationRecord> {
    match NotificationRecord::decode(raw) {
        Ok(record) => Some(record),
        Err(e) => {
            tracing::warn!(sequence, error = %e, "Skipping undecodable store entry");
            None
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
