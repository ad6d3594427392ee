//! Recording counters

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub(crate) struct Counters {
    created: AtomicU64,
    deduplicated: AtomicU64,
    idempotent_hits: AtomicU64,
    denied: AtomicU64,
    already_performed: AtomicU64,
}

#[derive(Debug, Clone, Copy)]
pub(crate) enum Outcome {
    Created,
    Deduplicated,
    IdempotentHit,
    Denied,
    AlreadyPerformed,
}

impl Counters {
    pub(crate) fn count(&self, outcome: Outcome) {
        let counter = match outcome {
            Outcome::Created => &self.created,
            Outcome::Deduplicated => &self.deduplicated,
            Outcome::IdempotentHit => &self.idempotent_hits,
            Outcome::Denied => &self.denied,
            Outcome::AlreadyPerformed => &self.already_performed,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> EngineStats {
        EngineStats {
            created: self.created.load(Ordering::Relaxed),
            deduplicated: self.deduplicated.load(Ordering::Relaxed),
            idempotent_hits: self.idempotent_hits.load(Ordering::Relaxed),
            denied: self.denied.load(Ordering::Relaxed),
            already_performed: self.already_performed.load(Ordering::Relaxed),
        }
    }
}

/// Statistics about recording outcomes since the engine was built
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineStats {
    pub created: u64,
    pub deduplicated: u64,
    pub idempotent_hits: u64,
    pub denied: u64,
    pub already_performed: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters() {
        let counters = Counters::default();
        counters.count(Outcome::Created);
        counters.count(Outcome::Created);
        counters.count(Outcome::Denied);

        let stats = counters.snapshot();
        assert_eq!(stats.created, 2);
        assert_eq!(stats.denied, 1);
        assert_eq!(stats.deduplicated, 0);
    }
}
