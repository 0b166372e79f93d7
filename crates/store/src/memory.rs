//! Process-local [`ListStore`] backed by a map of deques.

use std::collections::{HashMap, VecDeque};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::{ListStore, StoreResult};

/// In-memory list store.
///
/// Thread-safe via interior `RwLock`; designed to be wrapped in `Arc` and
/// shared across the application. Contents do not survive a restart.
#[derive(Default)]
pub struct MemoryListStore {
    lists: RwLock<HashMap<String, VecDeque<String>>>,
}

impl MemoryListStore {
    /// Create a new, empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of elements in `key` (0 for a missing list).
    pub async fn len(&self, key: &str) -> usize {
        self.lists.read().await.get(key).map_or(0, VecDeque::len)
    }
}

/// Remove the first element equal to `value`. Empty lists are dropped, the
/// same way Redis deletes a key whose list becomes empty.
fn remove_one(lists: &mut HashMap<String, VecDeque<String>>, key: &str, value: &str) -> bool {
    let Some(list) = lists.get_mut(key) else {
        return false;
    };
    let Some(pos) = list.iter().position(|v| v == value) else {
        return false;
    };
    list.remove(pos);
    if list.is_empty() {
        lists.remove(key);
    }
    true
}

#[async_trait]
impl ListStore for MemoryListStore {
    async fn push_head(&self, key: &str, value: &str) -> StoreResult<()> {
        self.lists
            .write()
            .await
            .entry(key.to_string())
            .or_default()
            .push_front(value.to_string());
        Ok(())
    }

    async fn push_tail(&self, key: &str, value: &str) -> StoreResult<()> {
        self.lists
            .write()
            .await
            .entry(key.to_string())
            .or_default()
            .push_back(value.to_string());
        Ok(())
    }

    async fn range_all(&self, key: &str) -> StoreResult<Vec<String>> {
        Ok(self
            .lists
            .read()
            .await
            .get(key)
            .map(|list| list.iter().cloned().collect())
            .unwrap_or_default())
    }

    async fn remove_first(&self, key: &str, value: &str) -> StoreResult<bool> {
        Ok(remove_one(&mut *self.lists.write().await, key, value))
    }

    async fn move_value(&self, from: &str, to: &str, old: &str, new: &str) -> StoreResult<bool> {
        let mut lists = self.lists.write().await;
        if !remove_one(&mut lists, from, old) {
            return Ok(false);
        }
        lists
            .entry(to.to_string())
            .or_default()
            .push_back(new.to_string());
        Ok(true)
    }

    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
