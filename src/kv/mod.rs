//! Key-Value Store Module
//!
//! Byte-level storage underneath the record store. Values are addressed by a
//! `(table, name)` pair; a table maps onto a category directory and a name
//! onto a file inside it.
//!
//! - [`MemoryKvStore`]: `DashMap` backed, lost on process exit, used by tests
//! - [`FileKvStore`]: one directory per table, shared between processes
//!
//! # Example
//!
//! ```rust,no_run
//! use mcmc_chains::kv::{KvStore, MemoryKvStore};
//!
//! # async fn example() -> mcmc_chains::Result<()> {
//! let store = MemoryKvStore::new();
//!
//! store.put("runs", "claim.json", b"{}".to_vec()).await?;
//! assert!(!store.put_if_absent("runs", "claim.json", b"{}".to_vec()).await?);
//!
//! store.delete("runs", "claim.json").await?;
//! assert!(!store.exists("runs", "claim.json").await?);
//! # Ok(())
//! # }
//! ```

mod file;
mod memory;

pub use file::FileKvStore;
pub use memory::MemoryKvStore;

use crate::Result;
use std::future::Future;
use std::sync::Arc;

/// Key-value store trait shared by every backend.
///
/// `put_if_absent` is the only operation that must be atomic with respect to
/// other writers; it is what worker processes use to claim tasks.
pub trait KvStore: Send + Sync {
    /// Get a value.
    ///
    /// Returns `None` if the name doesn't exist in the table.
    fn get(&self, table: &str, name: &str)
        -> impl Future<Output = Result<Option<Vec<u8>>>> + Send;

    /// Set a value, replacing any existing one.
    fn put(&self, table: &str, name: &str, value: Vec<u8>)
        -> impl Future<Output = Result<()>> + Send;

    /// Create a value only if the name is free.
    ///
    /// Returns `false` without touching the stored value when the name is
    /// already taken.
    fn put_if_absent(
        &self,
        table: &str,
        name: &str,
        value: Vec<u8>,
    ) -> impl Future<Output = Result<bool>> + Send;

    /// Delete a value.
    ///
    /// Returns whether something was removed; deleting a missing name is not
    /// an error.
    fn delete(&self, table: &str, name: &str) -> impl Future<Output = Result<bool>> + Send;

    /// List every name in a table, sorted.
    fn list(&self, table: &str) -> impl Future<Output = Result<Vec<String>>> + Send;

    /// Check if a name exists.
    fn exists(&self, table: &str, name: &str) -> impl Future<Output = Result<bool>> + Send {
        async move { Ok(self.get(table, name).await?.is_some()) }
    }
}

impl<S: KvStore> KvStore for Arc<S> {
    async fn get(&self, table: &str, name: &str) -> Result<Option<Vec<u8>>> {
        (**self).get(table, name).await
    }

    async fn put(&self, table: &str, name: &str, value: Vec<u8>) -> Result<()> {
        (**self).put(table, name, value).await
    }

    async fn put_if_absent(&self, table: &str, name: &str, value: Vec<u8>) -> Result<bool> {
        (**self).put_if_absent(table, name, value).await
    }

    async fn delete(&self, table: &str, name: &str) -> Result<bool> {
        (**self).delete(table, name).await
    }

    async fn list(&self, table: &str) -> Result<Vec<String>> {
        (**self).list(table).await
    }

    async fn exists(&self, table: &str, name: &str) -> Result<bool> {
        (**self).exists(table, name).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_kv_put_get() {
        let store = MemoryKvStore::new();

        store.put("t", "key1", b"value1".to_vec()).await.unwrap();
        let value = store.get("t", "key1").await.unwrap();

        assert_eq!(value, Some(b"value1".to_vec()));
    }

    #[tokio::test]
    async fn test_memory_kv_get_nonexistent() {
        let store = MemoryKvStore::new();

        assert_eq!(store.get("t", "nonexistent").await.unwrap(), None);
        assert_eq!(store.get("missing-table", "x").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_memory_kv_overwrite() {
        let store = MemoryKvStore::new();

        store.put("t", "key", b"value1".to_vec()).await.unwrap();
        store.put("t", "key", b"value2".to_vec()).await.unwrap();

        assert_eq!(store.get("t", "key").await.unwrap(), Some(b"value2".to_vec()));
    }

    #[tokio::test]
    async fn test_memory_kv_put_if_absent_keeps_first_value() {
        let store = MemoryKvStore::new();

        assert!(store.put_if_absent("t", "key", b"first".to_vec()).await.unwrap());
        assert!(!store.put_if_absent("t", "key", b"second".to_vec()).await.unwrap());

        assert_eq!(store.get("t", "key").await.unwrap(), Some(b"first".to_vec()));
    }

    #[tokio::test]
    async fn test_memory_kv_delete() {
        let store = MemoryKvStore::new();

        store.put("t", "key", b"value".to_vec()).await.unwrap();
        assert!(store.delete("t", "key").await.unwrap());
        assert!(!store.delete("t", "key").await.unwrap());
        assert_eq!(store.get("t", "key").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_memory_kv_tables_are_isolated() {
        let store = MemoryKvStore::new();

        store.put("a", "key", b"1".to_vec()).await.unwrap();
        store.put("b", "key", b"2".to_vec()).await.unwrap();

        assert_eq!(store.get("a", "key").await.unwrap(), Some(b"1".to_vec()));
        assert_eq!(store.get("b", "key").await.unwrap(), Some(b"2".to_vec()));
        assert_eq!(store.list("a").await.unwrap(), vec!["key".to_string()]);
    }

    #[tokio::test]
    async fn test_memory_kv_list_sorted() {
        let store = MemoryKvStore::new();

        for name in ["c", "a", "b"] {
            store.put("t", name, vec![]).await.unwrap();
        }

        assert_eq!(store.list("t").await.unwrap(), vec!["a", "b", "c"]);
        assert!(store.list("empty").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_memory_kv_exists() {
        let store = MemoryKvStore::new();

        assert!(!store.exists("t", "key").await.unwrap());
        store.put("t", "key", b"value".to_vec()).await.unwrap();
        assert!(store.exists("t", "key").await.unwrap());
    }

    #[tokio::test]
    async fn test_memory_kv_concurrent_put_if_absent_single_winner() {
        let store = Arc::new(MemoryKvStore::new());
        let mut handles = vec![];

        for i in 0..32 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                store
                    .put_if_absent("runs", "claim", format!("worker{i}").into_bytes())
                    .await
                    .unwrap()
            }));
        }

        let mut winners = 0;
        for handle in handles {
            if handle.await.unwrap() {
                winners += 1;
            }
        }

        assert_eq!(winners, 1);
    }

    #[tokio::test]
    async fn test_arc_forwards_to_inner_store() {
        let inner = Arc::new(MemoryKvStore::new());
        let shared = Arc::clone(&inner);

        shared.put("t", "key", b"v".to_vec()).await.unwrap();

        assert_eq!(inner.len(), 1);
        assert!(KvStore::exists(&shared, "t", "key").await.unwrap());
    }
}
