//! Fallback data resolution.
//!
//! Tries, in order: the last-known-good cache entry, the caller's static
//! substitute, the caller's default. The first hit wins and is tagged as
//! offline-sourced. Resolution never fails; an undecodable cache entry is a
//! miss.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::{json, Value};

use crate::cache::CacheStore;
use crate::clock::Clock;
use crate::envelope::{DataSource, Envelope};

/// Caller-provided substitutes.
#[derive(Debug)]
pub struct FallbackSources<'a, T> {
    pub mock: Option<&'a T>,
    pub default_value: Option<&'a T>,
}

impl<T> Default for FallbackSources<'_, T> {
    fn default() -> Self {
        Self {
            mock: None,
            default_value: None,
        }
    }
}

/// Substitute data and where it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct Fallback<T> {
    pub envelope: Envelope<T>,
    pub source: DataSource,
    /// Epoch-ms of the cache write, for cache hits.
    pub updated_at: Option<u64>,
}

pub struct FallbackResolver {
    domain: String,
    cache: Arc<dyn CacheStore>,
    clock: Arc<dyn Clock>,
}

impl FallbackResolver {
    pub fn new(domain: impl Into<String>, cache: Arc<dyn CacheStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            domain: domain.into(),
            cache,
            clock,
        }
    }

    pub fn resolve<T>(&self, key: &str, sources: FallbackSources<'_, T>) -> Option<Fallback<T>>
    where
        T: DeserializeOwned + Clone,
    {
        tracing::debug!(domain = %self.domain, key, "Getting fallback data");

        if let Some(entry) = self.cache.get(key) {
            match serde_json::from_value::<Envelope<T>>(entry.value) {
                Ok(mut envelope) => {
                    tracing::debug!(domain = %self.domain, key, "Using cached data");
                    envelope.meta = Some(tag(
                        envelope.meta.take(),
                        json!({ "hit": true, "updated_at": entry.updated_at }),
                    ));
                    return Some(Fallback {
                        envelope,
                        source: DataSource::Cache,
                        updated_at: Some(entry.updated_at),
                    });
                }
                Err(e) => {
                    tracing::warn!(
                        domain = %self.domain,
                        key,
                        error = %e,
                        "Cached entry does not decode, skipping"
                    );
                }
            }
        }

        let now = self.clock.now_millis();

        if let Some(mock) = sources.mock {
            tracing::debug!(domain = %self.domain, key, "Using provided mock data");
            return Some(Fallback {
                envelope: Envelope::with_meta(
                    mock.clone(),
                    tag_fresh(now, json!({ "hit": true, "mock": true })),
                ),
                source: DataSource::Mock,
                updated_at: None,
            });
        }

        if let Some(default_value) = sources.default_value {
            tracing::debug!(domain = %self.domain, key, "Using default data");
            return Some(Fallback {
                envelope: Envelope::with_meta(
                    default_value.clone(),
                    tag_fresh(now, json!({ "hit": true, "default": true })),
                ),
                source: DataSource::Default,
                updated_at: None,
            });
        }

        tracing::debug!(domain = %self.domain, key, "No fallback data available");
        None
    }
}

/// Merge offline markers into existing meta.
fn tag(meta: Option<Value>, cache: Value) -> Value {
    let mut object = match meta {
        Some(Value::Object(map)) => map,
        _ => serde_json::Map::new(),
    };
    object.insert("offline".into(), Value::Bool(true));
    object.insert("cache".into(), cache);
    Value::Object(object)
}

fn tag_fresh(now: u64, cache: Value) -> Value {
    json!({ "timestamp": now, "offline": true, "cache": cache })
}
