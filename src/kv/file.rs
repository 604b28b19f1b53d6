//! Directory-backed KV store shared between worker processes.
//!
//! Layout: `<root>/<table>/<name>`. Writes land in `<root>/.tmp` first and are
//! moved into place, so readers never see a half-written file.

use super::KvStore;
use crate::{Error, Result};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::trace;

const TMP_DIR: &str = ".tmp";

/// Filesystem key-value store.
///
/// `put` replaces via rename. `put_if_absent` persists with no-clobber
/// semantics, which the filesystem resolves atomically: of two
/// processes racing on one name exactly one succeeds.
#[derive(Debug, Clone)]
pub struct FileKvStore {
    root: PathBuf,
}

impl FileKvStore {
    /// Open (and create if needed) a store rooted at `root`.
    ///
    /// # Errors
    ///
    /// Returns error if the root or its scratch directory cannot be created.
    pub fn open(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        std::fs::create_dir_all(root.join(TMP_DIR))?;
        Ok(Self { root })
    }

    /// Open a store and create the given table directories up front.
    ///
    /// # Errors
    ///
    /// Returns error if any directory cannot be created.
    pub fn with_tables(root: impl AsRef<Path>, tables: &[&str]) -> Result<Self> {
        let store = Self::open(root)?;
        for table in tables {
            std::fs::create_dir_all(store.table_dir(table)?)?;
        }
        Ok(store)
    }

    /// Root directory of the store.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn table_dir(&self, table: &str) -> Result<PathBuf> {
        check_component(table)?;
        Ok(self.root.join(table))
    }

    fn path(&self, table: &str, name: &str) -> Result<PathBuf> {
        check_component(name)?;
        Ok(self.table_dir(table)?.join(name))
    }

    async fn write(&self, table: &str, name: &str, value: Vec<u8>, clobber: bool) -> Result<bool> {
        let dir = self.table_dir(table)?;
        let path = self.path(table, name)?;
        let tmp_dir = self.root.join(TMP_DIR);

        let written = tokio::task::spawn_blocking(move || -> Result<bool> {
            std::fs::create_dir_all(&dir)?;
            std::fs::create_dir_all(&tmp_dir)?;
            let mut tmp = NamedTempFile::new_in(&tmp_dir)?;
            tmp.write_all(&value)?;
            tmp.as_file().sync_all()?;

            if clobber {
                tmp.persist(&path).map_err(|e| e.error)?;
                return Ok(true);
            }
            match tmp.persist_noclobber(&path) {
                Ok(_) => Ok(true),
                Err(e) if e.error.kind() == ErrorKind::AlreadyExists => Ok(false),
                Err(e) => Err(e.error.into()),
            }
        })
        .await
        .map_err(|e| Error::Other(format!("blocking write task failed: {e}")))??;

        trace!(table, name, written, clobber, "file kv write");
        Ok(written)
    }
}

/// Reject names that would escape the table directory.
fn check_component(component: &str) -> Result<()> {
    if component.is_empty()
        || component.starts_with('.')
        || component.contains(['/', '\\'])
    {
        return Err(Error::Configuration(format!(
            "invalid store path component `{component}`"
        )));
    }
    Ok(())
}

impl KvStore for FileKvStore {
    async fn get(&self, table: &str, name: &str) -> Result<Option<Vec<u8>>> {
        match tokio::fs::read(self.path(table, name)?).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn put(&self, table: &str, name: &str, value: Vec<u8>) -> Result<()> {
        self.write(table, name, value, true).await.map(|_| ())
    }

    async fn put_if_absent(&self, table: &str, name: &str, value: Vec<u8>) -> Result<bool> {
        self.write(table, name, value, false).await
    }

    async fn delete(&self, table: &str, name: &str) -> Result<bool> {
        match tokio::fs::remove_file(self.path(table, name)?).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn list(&self, table: &str) -> Result<Vec<String>> {
        let mut entries = match tokio::fs::read_dir(self.table_dir(table)?).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_file() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                if !name.starts_with('.') {
                    names.push(name.to_string());
                }
            }
        }
        names.sort();
        Ok(names)
    }

    async fn exists(&self, table: &str, name: &str) -> Result<bool> {
        Ok(tokio::fs::try_exists(self.path(table, name)?).await?)
    }
}
