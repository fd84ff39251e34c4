//! JSON-file backed state store.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use dashmap::DashMap;

use super::StateStore;

/// A store that mirrors every write to a JSON object on disk.
///
/// Each write rewrites the whole file. The outbox and health counters are
/// small, and a crash between writes loses at most the last update.
#[derive(Debug, Clone)]
pub struct FileStore {
    inner: Arc<DashMap<String, String>>,
    path: PathBuf,
}

impl FileStore {
    /// Open the store at `path`, loading existing entries if the file exists.
    pub fn open(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let store = Self {
            inner: Arc::new(DashMap::new()),
            path,
        };

        if store.path.exists() {
            let file = File::open(&store.path)?;
            let reader = BufReader::new(file);
            let map: BTreeMap<String, String> = serde_json::from_reader(reader)?;
            for (k, v) in map {
                store.inner.insert(k, v);
            }
            tracing::info!(
                path = %store.path.display(),
                entries = store.inner.len(),
                "Loaded persisted state"
            );
        }

        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// All keys currently held, sorted.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.inner.iter().map(|r| r.key().clone()).collect();
        keys.sort();
        keys
    }

    /// Write the current contents to disk.
    pub fn flush(&self) -> std::io::Result<()> {
        let map: BTreeMap<_, _> = self
            .inner
            .iter()
            .map(|r| (r.key().clone(), r.value().clone()))
            .collect();

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let file = File::create(&self.path)?;
        let writer = BufWriter::new(file);
        serde_json::to_writer_pretty(writer, &map)?;
        Ok(())
    }

    fn persist(&self) {
        if let Err(e) = self.flush() {
            tracing::error!(path = %self.path.display(), error = %e, "Failed to persist state");
        }
    }
}

impl StateStore for FileStore {
    fn get(&self, key: &str) -> Option<String> {
        self.inner.get(key).map(|r| r.value().clone())
    }

    fn set(&self, key: &str, value: String) {
        self.inner.insert(key.to_string(), value);
        self.persist();
    }

    fn remove(&self, key: &str) {
        if self.inner.remove(key).is_some() {
            self.persist();
        }
    }
}
