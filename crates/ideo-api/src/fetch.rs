use std::sync::Arc;

use ideo_core::{CallerIdentity, ReferenceRecord};
use thiserror::Error;

use crate::store::{RecordStore, ReferenceQuery};

/// Why no references could be used. Both cases end the request the same way.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FetchFailure {
    #[error("no reference rows for caller")]
    Empty,
    #[error("reference fetch failed: {0}")]
    Unavailable(String),
}

impl FetchFailure {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Empty => "empty",
            Self::Unavailable(_) => "unavailable",
        }
    }
}

#[derive(Clone)]
pub struct ReferenceFetcher {
    store: Arc<dyn RecordStore>,
    query: ReferenceQuery,
}

impl ReferenceFetcher {
    pub fn new(store: Arc<dyn RecordStore>, query: ReferenceQuery) -> Self {
        Self { store, query }
    }

    /// Non-empty, bounded list of references in the configured order.
    pub async fn fetch(
        &self,
        caller: &CallerIdentity,
    ) -> Result<Vec<ReferenceRecord>, FetchFailure> {
        let mut records = self
            .store
            .fetch_references(caller, &self.query)
            .await
            .map_err(|err| FetchFailure::Unavailable(err.to_string()))?;
        records.truncate(self.query.limit);
        if records.is_empty() {
            return Err(FetchFailure::Empty);
        }
        Ok(records)
    }
}
