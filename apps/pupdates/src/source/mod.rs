//! # Snapshot Sources
//!
//! Async adapters the batch runner fetches snapshots through:
//! - `ElasticsearchSource` — Elasticsearch-compatible HTTP store
//! - `LocalSource` — the local redb store from `pupdates-core`

mod elasticsearch;
mod local;

pub use elasticsearch::ElasticsearchSource;
pub use local::LocalSource;

use crate::config::{SourceConfig, SourceKind};
use pupdates_core::{PupdatesError, RawRecord, SnapshotId};
use std::future::Future;
use thiserror::Error;

/// Read-only async view of a snapshot store.
pub trait SnapshotSource: Send + Sync {
    /// Identifiers starting with `prefix`, in no particular order.
    fn list_snapshot_ids(
        &self,
        prefix: &str,
    ) -> impl Future<Output = Result<Vec<String>, SourceError>> + Send;

    /// Every raw record of one logical snapshot.
    fn fetch_records(
        &self,
        snapshot: &SnapshotId,
    ) -> impl Future<Output = Result<Vec<RawRecord>, SourceError>> + Send;
}

/// The configured source, chosen at startup.
#[derive(Debug, Clone)]
pub enum AnySource {
    Elasticsearch(ElasticsearchSource),
    Local(LocalSource),
}

impl AnySource {
    /// Build the source named by the configuration.
    pub fn from_config(config: &SourceConfig) -> Result<Self, SourceError> {
        match config.kind {
            SourceKind::Elasticsearch => {
                tracing::debug!("Using Elasticsearch source at {}", config.endpoint);
                Ok(Self::Elasticsearch(ElasticsearchSource::new(
                    config.endpoint.as_str(),
                    config.page_size,
                )?))
            }
            SourceKind::Local => {
                tracing::debug!("Using local store at {}", config.store_path.display());
                Ok(Self::Local(LocalSource::open(&config.store_path)?))
            }
        }
    }
}

impl SnapshotSource for AnySource {
    async fn list_snapshot_ids(&self, prefix: &str) -> Result<Vec<String>, SourceError> {
        match self {
            Self::Elasticsearch(source) => source.list_snapshot_ids(prefix).await,
            Self::Local(source) => source.list_snapshot_ids(prefix).await,
        }
    }

    async fn fetch_records(&self, snapshot: &SnapshotId) -> Result<Vec<RawRecord>, SourceError> {
        match self {
            Self::Elasticsearch(source) => source.fetch_records(snapshot).await,
            Self::Local(source) => source.fetch_records(snapshot).await,
        }
    }
}

/// Errors from a snapshot source.
#[derive(Debug, Error)]
pub enum SourceError {
    /// Cannot reach the store.
    #[error("Cannot connect to {endpoint}: {reason}")]
    ConnectionFailed { endpoint: String, reason: String },

    /// One request took longer than its timeout.
    #[error("Request timed out after {0}s")]
    Timeout(u64),

    /// 429 Too Many Requests.
    #[error("Rate limited by the store")]
    RateLimited,

    /// The store returned a 5xx error.
    #[error("Server error ({0}): {1}")]
    ServerError(u16, String),

    /// The store rejected the request (4xx other than 404/429).
    #[error("Request rejected ({0}): {1}")]
    Rejected(u16, String),

    /// The snapshot does not exist.
    #[error("Snapshot not found: {0}")]
    NotFound(String),

    /// Fewer documents arrived than the store reported for the snapshot.
    #[error("Snapshot {snapshot} incomplete: received {received} of {expected} documents")]
    Incomplete {
        snapshot: String,
        expected: u64,
        received: u64,
    },

    /// The response body could not be understood.
    #[error("Parse error: {0}")]
    ParseError(String),

    /// A blocking store task failed to complete.
    #[error("Worker failed: {0}")]
    Worker(String),

    /// Error raised by the local store.
    #[error(transparent)]
    Store(#[from] PupdatesError),
}

impl SourceError {
    /// Worth retrying after a short wait.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::ConnectionFailed { .. } | Self::Timeout(_) | Self::RateLimited | Self::ServerError(..)
        )
    }
}

impl From<SourceError> for PupdatesError {
    fn from(e: SourceError) -> Self {
        match e {
            SourceError::Store(inner) => inner,
            other => PupdatesError::StoreUnavailable(other.to_string()),
        }
    }
}
