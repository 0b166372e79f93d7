//! Durable list store backing the notification sequences.
//!
//! [`ListStore`] is the seam the lifecycle manager talks to. Two backends
//! are provided:
//!
//! - [`MemoryListStore`] -- process-local, used for development and tests.
//! - [`RedisListStore`] -- Redis lists via a shared `ConnectionManager`.

use std::sync::Arc;

use async_trait::async_trait;

pub mod memory;
pub mod redis;

pub use memory::MemoryListStore;
pub use self::redis::RedisListStore;

/// Errors raised by a store backend.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The Redis backend rejected or failed a command.
    #[error("Redis error: {0}")]
    Redis(#[from] ::redis::RedisError),

    /// The backend is not reachable or refused the operation.
    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// An ordered, named-list store.
///
/// Every method is atomic on its own. No method spans a transaction with
/// another call, except [`ListStore::move_value`] which is atomic as a whole.
#[async_trait]
pub trait ListStore: Send + Sync {
    /// Insert `value` at the head of `key`.
    async fn push_head(&self, key: &str, value: &str) -> StoreResult<()>;

    /// Append `value` to the tail of `key`.
    async fn push_tail(&self, key: &str, value: &str) -> StoreResult<()>;

    /// Read the whole list, head to tail. A missing list reads as empty.
    async fn range_all(&self, key: &str) -> StoreResult<Vec<String>>;

    /// Remove the first occurrence of `value` from `key`.
    ///
    /// Returns `true` if an element was removed.
    async fn remove_first(&self, key: &str, value: &str) -> StoreResult<bool>;

    /// Remove the first occurrence of `old` from `from` and append `new` to
    /// the tail of `to`, as a single atomic step.
    ///
    /// Returns `false` (and changes nothing) when `old` is not in `from`.
    async fn move_value(&self, from: &str, to: &str, old: &str, new: &str) -> StoreResult<bool>;

    /// Check that the backend is reachable.
    async fn ping(&self) -> StoreResult<()>;
}

/// Open the store selected by configuration.
///
/// With a Redis URL the Redis backend is used; otherwise an in-memory store
/// is created.
pub async fn connect(redis_url: Option<&str>) -> StoreResult<Arc<dyn ListStore>> {
    match redis_url {
        Some(url) => Ok(Arc::new(RedisListStore::connect(url).await?)),
        None => {
            tracing::warn!("REDIS_URL not set, using in-memory store (data is lost on restart)");
            Ok(Arc::new(MemoryListStore::new()))
        }
    }
}

/// Run a trivial round-trip to verify the store is reachable.
pub async fn health_check(store: &dyn ListStore) -> StoreResult<()> {
    store.ping().await
}
