//! Redis-backed [`ListStore`].

use std::time::Duration;

use async_trait::async_trait;
use redis::aio::{ConnectionManager, ConnectionManagerConfig};
use redis::{AsyncCommands, Script};
use relay_core::retry::{self, Backoff};

use crate::{ListStore, StoreError, StoreResult};

/// LREM one occurrence of ARGV[1] from KEYS[1]; only if that removed
/// something, RPUSH ARGV[2] onto KEYS[2].
const MOVE_SCRIPT: &str = r"
if redis.call('LREM', KEYS[1], 1, ARGV[1]) == 1 then
  redis.call('RPUSH', KEYS[2], ARGV[2])
  return 1
end
return 0
";

/// Redis list store.
///
/// Uses a `ConnectionManager` for automatic reconnection; cloning the store
/// shares the underlying connection.
#[derive(Clone)]
pub struct RedisListStore {
    manager: ConnectionManager,
    move_script: Script,
}

impl RedisListStore {
    /// Connect to Redis at `url`, retrying with exponential backoff
    /// ([`Backoff::default`]).
    pub async fn connect(url: &str) -> StoreResult<Self> {
        let client = redis::Client::open(url)?;
        let manager = connect_with_retry(&client).await?;
        tracing::info!("Connected to Redis list store");

        Ok(Self {
            manager,
            move_script: Script::new(MOVE_SCRIPT),
        })
    }
}

/// Establish a `ConnectionManager`, backing off between failed attempts.
async fn connect_with_retry(client: &redis::Client) -> StoreResult<ConnectionManager> {
    let config = ConnectionManagerConfig::new()
        .set_connection_timeout(Duration::from_secs(5))
        .set_response_timeout(Duration::from_secs(5));

    let manager = retry::with_backoff("redis list store", Backoff::default(), || {
        ConnectionManager::new_with_config(client.clone(), config.clone())
    })
    .await?;
    Ok(manager)
}

#[async_trait]
impl ListStore for RedisListStore {
    async fn push_head(&self, key: &str, value: &str) -> StoreResult<()> {
        let mut conn = self.manager.clone();
        conn.lpush::<_, _, ()>(key, value).await?;
        Ok(())
    }

    async fn push_tail(&self, key: &str, value: &str) -> StoreResult<()> {
        let mut conn = self.manager.clone();
        conn.rpush::<_, _, ()>(key, value).await?;
        Ok(())
    }

    async fn range_all(&self, key: &str) -> StoreResult<Vec<String>> {
        let mut conn = self.manager.clone();
        Ok(conn.lrange(key, 0, -1).await?)
    }

    async fn remove_first(&self, key: &str, value: &str) -> StoreResult<bool> {
        let mut conn = self.manager.clone();
        let removed: i64 = conn.lrem(key, 1, value).await?;
        Ok(removed > 0)
    }

    async fn move_value(&self, from: &str, to: &str, old: &str, new: &str) -> StoreResult<bool> {
        let mut conn = self.manager.clone();
        let moved: i64 = self
            .move_script
            .key(from)
            .key(to)
            .arg(old)
            .arg(new)
            .invoke_async(&mut conn)
            .await?;
        Ok(moved == 1)
    }

    async fn ping(&self) -> StoreResult<()> {
        let mut conn = self.manager.clone();
        let response: String = redis::cmd("PING").query_async(&mut conn).await?;
        if response == "PONG" {
            Ok(())
        } else {
            Err(StoreError::Unavailable(format!(
                "unexpected PING response '{response}'"
            )))
        }
    }
}
