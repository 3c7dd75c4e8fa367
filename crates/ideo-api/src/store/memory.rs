use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ideo_core::{CallerIdentity, ReferenceOrder, ReferenceRecord, UsageRecord};

use super::{RecordStore, ReferenceQuery, StoreError};

/// Number of calls each store operation received.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreCalls {
    pub count: usize,
    pub fetch: usize,
    pub insert: usize,
}

#[derive(Debug, Default)]
struct Failures {
    count: bool,
    fetch: bool,
    insert: bool,
}

#[derive(Debug, Default)]
struct Inner {
    usage: Vec<UsageRecord>,
    feed: HashMap<CallerIdentity, Vec<(ReferenceRecord, u64)>>,
    failures: Failures,
    calls: StoreCalls,
}

/// In-process record store. Holds the ledger and the feed in memory and can be
/// told to fail any operation.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn seed_usage(&self, caller: &CallerIdentity, occurred_at: DateTime<Utc>) {
        self.lock().usage.push(UsageRecord {
            caller: caller.clone(),
            occurred_at,
        });
    }

    pub fn seed_reference(&self, caller: &CallerIdentity, record: ReferenceRecord, views: u64) {
        self.lock()
            .feed
            .entry(caller.clone())
            .or_default()
            .push((record, views));
    }

    pub fn fail_count(&self, fail: bool) {
        self.lock().failures.count = fail;
    }

    pub fn fail_fetch(&self, fail: bool) {
        self.lock().failures.fetch = fail;
    }

    pub fn fail_insert(&self, fail: bool) {
        self.lock().failures.insert = fail;
    }

    pub fn calls(&self) -> StoreCalls {
        self.lock().calls
    }

    /// Ledger rows for `caller`, oldest first.
    pub fn usage_for(&self, caller: &CallerIdentity) -> Vec<UsageRecord> {
        self.lock()
            .usage
            .iter()
            .filter(|r| &r.caller == caller)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn count_usage(
        &self,
        caller: &CallerIdentity,
        since: DateTime<Utc>,
    ) -> Result<u64, StoreError> {
        let mut inner = self.lock();
        inner.calls.count += 1;
        if inner.failures.count {
            return Err(StoreError::Unavailable("count_usage failure injected".to_string()));
        }
        let count = inner
            .usage
            .iter()
            .filter(|r| &r.caller == caller && r.occurred_at >= since)
            .count();
        Ok(count as u64)
    }

    async fn fetch_references(
        &self,
        caller: &CallerIdentity,
        query: &ReferenceQuery,
    ) -> Result<Vec<ReferenceRecord>, StoreError> {
        let mut inner = self.lock();
        inner.calls.fetch += 1;
        if inner.failures.fetch {
            return Err(StoreError::Unavailable("fetch_references failure injected".to_string()));
        }
        let mut rows = inner.feed.get(caller).cloned().unwrap_or_default();
        if query.order == ReferenceOrder::ViewsDesc {
            // stable: equal view counts keep insertion order
            rows.sort_by(|a, b| b.1.cmp(&a.1));
        }
        Ok(rows
            .into_iter()
            .take(query.limit)
            .map(|(record, _)| record)
            .collect())
    }

    async fn insert_usage(&self, caller: &CallerIdentity) -> Result<(), StoreError> {
        let mut inner = self.lock();
        inner.calls.insert += 1;
        if inner.failures.insert {
            return Err(StoreError::Unavailable("insert_usage failure injected".to_string()));
        }
        inner.usage.push(UsageRecord {
            caller: caller.clone(),
            occurred_at: Utc::now(),
        });
        Ok(())
    }
}
