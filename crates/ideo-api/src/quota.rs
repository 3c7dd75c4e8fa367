use std::sync::Arc;

use ideo_core::{CallerIdentity, QuotaWindow};

use crate::store::RecordStore;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QuotaDecision {
    Allowed { used: u64 },
    Denied { used: u64 },
    /// The count could not be obtained. Callers must treat this as a refusal.
    Unavailable(String),
}

/// Read-only daily quota check against the usage ledger.
///
/// This is a check, not a reservation: two requests from the same caller can
/// both pass before either commits its usage row, so the daily total may
/// overshoot the limit by up to the number of concurrent in-flight requests
/// minus one.
#[derive(Clone)]
pub struct QuotaGuard {
    store: Arc<dyn RecordStore>,
}

impl QuotaGuard {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    pub async fn check(
        &self,
        caller: &CallerIdentity,
        limit: u32,
        window: &QuotaWindow,
    ) -> QuotaDecision {
        match self.store.count_usage(caller, window.start).await {
            Ok(used) if used >= u64::from(limit) => QuotaDecision::Denied { used },
            Ok(used) => QuotaDecision::Allowed { used },
            Err(err) => QuotaDecision::Unavailable(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use chrono::Utc;
    use ideo_core::ReferenceZone;

    fn setup(seeded: usize) -> (Arc<MemoryStore>, QuotaGuard, CallerIdentity) {
        let store = Arc::new(MemoryStore::new());
        let caller = CallerIdentity::parse(Some("user-42")).unwrap();
        let now = Utc::now();
        for _ in 0..seeded {
            store.seed_usage(&caller, now);
        }
        let guard = QuotaGuard::new(store.clone());
        (store, guard, caller)
    }

    fn window() -> QuotaWindow {
        // the end bound is irrelevant for counting; stretch it past the seeds
        let mut window = QuotaWindow::current(ReferenceZone::Utc, Utc::now());
        window.end = window.end + chrono::Duration::minutes(1);
        window
    }

    #[tokio::test]
    async fn below_limit_is_allowed() {
        let (_, guard, caller) = setup(19);
        assert_eq!(
            guard.check(&caller, 20, &window()).await,
            QuotaDecision::Allowed { used: 19 }
        );
    }

    #[tokio::test]
    async fn at_limit_is_denied() {
        let (_, guard, caller) = setup(20);
        assert_eq!(
            guard.check(&caller, 20, &window()).await,
            QuotaDecision::Denied { used: 20 }
        );
    }

    #[tokio::test]
    async fn count_failure_fails_closed() {
        let (store, guard, caller) = setup(0);
        store.fail_count(true);
        assert!(matches!(
            guard.check(&caller, 20, &window()).await,
            QuotaDecision::Unavailable(_)
        ));
    }

    #[tokio::test]
    async fn check_has_no_side_effects() {
        let (store, guard, caller) = setup(3);
        guard.check(&caller, 20, &window()).await;
        assert_eq!(store.usage_for(&caller).len(), 3);
        assert_eq!(store.calls().insert, 0);
    }
}
