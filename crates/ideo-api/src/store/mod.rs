//! Boundary to the external record store that holds the usage ledger and the
//! reference feed.

mod memory;
mod postgrest;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ideo_core::{CallerIdentity, ReferenceOrder, ReferenceRecord};
use thiserror::Error;

pub use memory::{MemoryStore, StoreCalls};
pub use postgrest::PostgrestStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("store returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("malformed store response: {0}")]
    Malformed(String),
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// How references are selected for one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceQuery {
    pub limit: usize,
    pub order: ReferenceOrder,
    /// Column rendered as the secondary label, if any.
    pub label_column: Option<String>,
}

#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Usage rows for `caller` stamped at or after `since`.
    async fn count_usage(&self, caller: &CallerIdentity, since: DateTime<Utc>)
        -> Result<u64, StoreError>;

    /// At most `query.limit` references scoped to `caller`.
    async fn fetch_references(
        &self,
        caller: &CallerIdentity,
        query: &ReferenceQuery,
    ) -> Result<Vec<ReferenceRecord>, StoreError>;

    /// Append one usage row. The store assigns the timestamp.
    async fn insert_usage(&self, caller: &CallerIdentity) -> Result<(), StoreError>;
}
