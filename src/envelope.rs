//! Normalized response shapes shared by fetch and submit collaborators.

use serde::{Deserialize, Serialize};

/// Response envelope every collaborator returns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope<T> {
    pub data: T,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<serde_json::Value>,
}

impl<T> Envelope<T> {
    pub fn new(data: T) -> Self {
        Self { data, meta: None }
    }

    pub fn with_meta(data: T, meta: serde_json::Value) -> Self {
        Self {
            data,
            meta: Some(meta),
        }
    }
}

/// Where the data in a result came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataSource {
    /// A live round trip.
    Live,
    /// The reactive cache.
    Cache,
    /// A caller-supplied static substitute.
    Mock,
    /// A caller-supplied default value.
    Default,
    /// Nothing; an empty placeholder.
    Empty,
}

impl DataSource {
    pub fn as_str(self) -> &'static str {
        match self {
            DataSource::Live => "live",
            DataSource::Cache => "cache",
            DataSource::Mock => "mock",
            DataSource::Default => "default",
            DataSource::Empty => "empty",
        }
    }
}

/// Result of a resilient read.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryResult<T> {
    /// `None` only for empty results produced in silent mode.
    pub data: Option<T>,
    pub meta: Option<serde_json::Value>,
    /// True when the data did not come from a live round trip.
    pub is_offline_data: bool,
    pub source: DataSource,
    /// Epoch-ms of the last time the domain was seen online.
    pub last_online_update: Option<u64>,
    /// Epoch-ms at which offline data was served.
    pub offline_timestamp: Option<u64>,
}

impl<T> QueryResult<T> {
    /// Unwrap into the payload, if any.
    pub fn into_data(self) -> Option<T> {
        self.data
    }
}

/// Result of a resilient write.
#[derive(Debug, Clone, PartialEq)]
pub enum MutationOutcome<T> {
    /// The submit call completed live.
    Completed(Envelope<T>),
    /// The mutation was accepted into the offline outbox. Non-authoritative.
    Queued { id: uuid::Uuid, position: usize },
}

impl<T> MutationOutcome<T> {
    pub fn is_queued(&self) -> bool {
        matches!(self, MutationOutcome::Queued { .. })
    }

    /// The live payload, when the mutation completed.
    pub fn data(&self) -> Option<&T> {
        match self {
            MutationOutcome::Completed(envelope) => Some(&envelope.data),
            MutationOutcome::Queued { .. } => None,
        }
    }
}
