//! Outbox persistence.
//!
//! Each `(domain, method)` pair owns one JSON array under
//! `offline_mutations_{domain}_{method}`. Entries written before ids existed
//! get a fresh id on load.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::storage::StateStore;

/// A write accepted while offline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueuedMutation<I> {
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,
    #[serde(rename = "variables")]
    pub payload: I,
    /// Epoch-ms at which the write was first accepted.
    #[serde(rename = "timestamp")]
    pub enqueued_at: u64,
    /// Failed replays so far.
    #[serde(rename = "retries", default)]
    pub retry_count: u32,
}

impl<I> QueuedMutation<I> {
    pub fn new(payload: I, enqueued_at: u64) -> Self {
        Self {
            id: Uuid::new_v4(),
            payload,
            enqueued_at,
            retry_count: 0,
        }
    }
}

/// Read the persisted outbox. Unreadable data is logged and treated as empty.
pub fn load<I>(store: &dyn StateStore, key: &str) -> Vec<QueuedMutation<I>>
where
    I: DeserializeOwned,
{
    let Some(raw) = store.get(key) else {
        return Vec::new();
    };
    match serde_json::from_str(&raw) {
        Ok(entries) => entries,
        Err(e) => {
            tracing::error!(key, error = %e, "Failed to decode persisted outbox, discarding");
            Vec::new()
        }
    }
}

/// Persist the outbox, removing the key when it is empty.
pub fn save<I>(store: &dyn StateStore, key: &str, entries: &[QueuedMutation<I>])
where
    I: Serialize,
{
    if entries.is_empty() {
        store.remove(key);
        return;
    }
    match serde_json::to_string(entries) {
        Ok(raw) => store.set(key, raw),
        Err(e) => tracing::error!(key, error = %e, "Failed to encode outbox"),
    }
}
