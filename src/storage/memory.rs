//! In-memory state store.

use std::sync::Arc;

use dashmap::DashMap;

use super::StateStore;

/// Process-local store. Clones share the same map.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<DashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

impl StateStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.inner.get(key).map(|r| r.value().clone())
    }

    fn set(&self, key: &str, value: String) {
        self.inner.insert(key.to_string(), value);
    }

    fn remove(&self, key: &str) {
        self.inner.remove(key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_state() {
        let store = MemoryStore::new();
        let other = store.clone();

        store.set("cart_failure_count", "2".into());
        assert_eq!(other.get("cart_failure_count").as_deref(), Some("2"));

        other.remove("cart_failure_count");
        assert!(store.get("cart_failure_count").is_none());
        assert!(store.is_empty());
    }
}
