//! Port traits (hexagonal architecture).
//!
//! These traits define the interfaces between the core domain and external
//! adapters: the status-reporting sink and the advisory cache layer.

use crate::Result;
use crate::ids::CacheEntryId;
use crate::run::RunOutcome;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Output port for surfacing the aggregate run status.
///
/// The orchestrator calls this exactly once per launched run.
#[async_trait]
pub trait StatusReporter: Send + Sync {
    async fn report(&self, outcome: &RunOutcome) -> Result<()>;
}

/// A stored cache entry's metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    pub id: CacheEntryId,
    pub key: String,
    pub size_bytes: u64,
    pub created_at: DateTime<Utc>,
}

/// Cache provider for provisioning artifacts.
///
/// Purely an optimization: readers treat any error as a miss, and concurrent
/// writers to the same key resolve last-write-wins.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Try to restore an entry. `Ok(None)` is a miss.
    async fn restore(&self, key: &str) -> Result<Option<CacheEntry>>;

    /// Save an entry, replacing any previous payload under the key.
    async fn save(&self, key: &str, payload: &[u8]) -> Result<CacheEntry>;

    /// Delete an entry.
    async fn delete(&self, key: &str) -> Result<()>;

    /// List entries, optionally filtered by key prefix.
    async fn list(&self, prefix: Option<&str>) -> Result<Vec<CacheEntry>>;
}
