//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use netaware::config::{HealthConfig, MutationConfig};
use netaware::health::SimulatedNetwork;
use netaware::storage::MemoryStore;
use netaware::{ApiError, ConnectionHealthTracker, Envelope, ManualClock, MemoryCache, QueryExecutor};

/// Epoch-ms the manual clock starts at.
pub const START_MILLIS: u64 = 1_700_000_000_000;

/// One domain wired to in-memory collaborators.
pub struct Stack {
    pub network: SimulatedNetwork,
    pub store: MemoryStore,
    pub cache: MemoryCache,
    pub clock: Arc<ManualClock>,
    pub tracker: Arc<ConnectionHealthTracker>,
}

impl Stack {
    pub fn online(domain: &str) -> Self {
        Self::build(domain, SimulatedNetwork::online(), MemoryStore::new())
    }

    pub fn offline(domain: &str) -> Self {
        Self::build(domain, SimulatedNetwork::offline(), MemoryStore::new())
    }

    pub fn build(domain: &str, network: SimulatedNetwork, store: MemoryStore) -> Self {
        let clock = Arc::new(ManualClock::new(START_MILLIS));
        let cache = MemoryCache::with_clock(clock.clone());
        let tracker = Arc::new(ConnectionHealthTracker::new(
            domain,
            HealthConfig::default(),
            Arc::new(network.clone()),
            Arc::new(store.clone()),
            clock.clone(),
        ));
        Self {
            network,
            store,
            cache,
            clock,
            tracker,
        }
    }

    pub fn executor(&self) -> QueryExecutor {
        QueryExecutor::new(
            self.tracker.clone(),
            Arc::new(self.cache.clone()),
            self.clock.clone(),
        )
    }

    pub fn mutation_config(&self) -> MutationConfig {
        MutationConfig::default()
    }

    /// Seed the cache with a previously fetched envelope.
    pub fn seed_cache<T: serde::Serialize>(&self, key: &str, data: T) {
        use netaware::CacheStore;
        self.cache
            .set(key, serde_json::to_value(Envelope::new(data)).unwrap());
    }
}

/// Counts calls and replays a scripted list of outcomes, repeating the last.
#[derive(Clone)]
pub struct Script<T> {
    calls: Arc<AtomicU32>,
    outcomes: Arc<Mutex<Vec<Result<T, ApiError>>>>,
}

impl<T: Clone> Script<T> {
    pub fn new(outcomes: Vec<Result<T, ApiError>>) -> Self {
        assert!(!outcomes.is_empty());
        Self {
            calls: Arc::new(AtomicU32::new(0)),
            outcomes: Arc::new(Mutex::new(outcomes)),
        }
    }

    pub fn always(outcome: Result<T, ApiError>) -> Self {
        Self::new(vec![outcome])
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    /// Next outcome, wrapped in an envelope.
    pub fn next(&self) -> Result<Envelope<T>, ApiError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) as usize;
        let outcomes = self.outcomes.lock().unwrap();
        let outcome = outcomes.get(n).unwrap_or_else(|| outcomes.last().unwrap());
        outcome.clone().map(Envelope::new)
    }
}

/// Start a programmable JSON backend on an ephemeral port.
pub async fn start_programmable_backend<F, Fut>(f: F) -> SocketAddr
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = (u16, String)> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let f = Arc::new(f);

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((mut socket, _)) => {
                    let f = f.clone();
                    tokio::spawn(async move {
                        let mut buf = [0u8; 4096];
                        let _ = socket.read(&mut buf).await;

                        let (status, body) = f().await;
                        let status_text = match status {
                            200 => "200 OK",
                            400 => "400 Bad Request",
                            401 => "401 Unauthorized",
                            404 => "404 Not Found",
                            500 => "500 Internal Server Error",
                            502 => "502 Bad Gateway",
                            503 => "503 Service Unavailable",
                            _ => "200 OK",
                        };

                        let response_str = format!(
                            "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                            status_text,
                            body.len(),
                            body
                        );
                        let _ = socket.write_all(response_str.as_bytes()).await;
                        let _ = socket.shutdown().await;
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    });
                }
                Err(_) => break,
            }
        }
    });

    addr
}
