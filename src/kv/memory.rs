//! In-memory KV store implementation using `DashMap`.
//!
//! Data is lost on process restart. Workers in different processes need
//! [`FileKvStore`](super::FileKvStore).

use super::KvStore;
use crate::Result;
use dashmap::DashMap;
use std::collections::btree_map::Entry;
use std::collections::BTreeMap;

/// In-memory key-value store using a lock-free concurrent hashmap of tables.
///
/// Each table is an ordered map so that `list` is sorted without extra work.
/// `put_if_absent` holds the table's shard lock for the check and the insert,
/// which makes it atomic across threads.
///
/// # Example
///
/// ```rust
/// use mcmc_chains::kv::{KvStore, MemoryKvStore};
///
/// # async fn example() -> mcmc_chains::Result<()> {
/// let store = MemoryKvStore::new();
/// store.put("models", "model_ab.json", b"{}".to_vec()).await?;
/// assert_eq!(store.list("models").await?, vec!["model_ab.json".to_string()]);
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct MemoryKvStore {
    tables: DashMap<String, BTreeMap<String, Vec<u8>>>,
}

impl MemoryKvStore {
    /// Create a new in-memory KV store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            tables: DashMap::new(),
        }
    }

    /// Get the number of entries across all tables.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tables.iter().map(|table| table.value().len()).sum()
    }

    /// Check if the store is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Clear all entries.
    pub fn clear(&self) {
        self.tables.clear();
    }
}

impl Default for MemoryKvStore {
    fn default() -> Self {
        Self::new()
    }
}

impl KvStore for MemoryKvStore {
    async fn get(&self, table: &str, name: &str) -> Result<Option<Vec<u8>>> {
        Ok(self
            .tables
            .get(table)
            .and_then(|entries| entries.get(name).cloned()))
    }

    async fn put(&self, table: &str, name: &str, value: Vec<u8>) -> Result<()> {
        self.tables
            .entry(table.to_string())
            .or_default()
            .insert(name.to_string(), value);
        Ok(())
    }

    async fn put_if_absent(&self, table: &str, name: &str, value: Vec<u8>) -> Result<bool> {
        let mut entries = self.tables.entry(table.to_string()).or_default();
        match entries.entry(name.to_string()) {
            Entry::Vacant(slot) => {
                slot.insert(value);
                Ok(true)
            }
            Entry::Occupied(_) => Ok(false),
        }
    }

    async fn delete(&self, table: &str, name: &str) -> Result<bool> {
        Ok(self
            .tables
            .get_mut(table)
            .is_some_and(|mut entries| entries.remove(name).is_some()))
    }

    async fn list(&self, table: &str) -> Result<Vec<String>> {
        Ok(self
            .tables
            .get(table)
            .map(|entries| entries.keys().cloned().collect())
            .unwrap_or_default())
    }

    async fn exists(&self, table: &str, name: &str) -> Result<bool> {
        Ok(self
            .tables
            .get(table)
            .is_some_and(|entries| entries.contains_key(name)))
    }
}
