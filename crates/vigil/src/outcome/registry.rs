use std::collections::VecDeque;

use compact_str::CompactString;
use parking_lot::Mutex;
use vigil_types::{Failure, OutcomeId, PTime};

/// An async failure as recorded when it happened.
#[derive(Debug, Clone)]
pub struct UnhandledFailure {
    pub id: OutcomeId,
    pub label: CompactString,
    pub failure: Failure,
    pub at: PTime,
    /// Whether a `catch` or `finally` has been attached to the outcome.
    pub observed: bool,
}

/// Bounded log of failed async outcomes. Oldest entries are evicted first.
pub struct UnhandledRegistry {
    capacity: usize,
    inner: Mutex<RegistryInner>,
}

struct RegistryInner {
    next_id: OutcomeId,
    entries: VecDeque<UnhandledFailure>,
}

impl UnhandledRegistry {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            inner: Mutex::new(RegistryInner {
                next_id: OutcomeId::first(),
                entries: VecDeque::new(),
            }),
        }
    }

    pub fn record(&self, label: &str, failure: Failure, observed: bool) -> OutcomeId {
        let mut inner = self.inner.lock();
        let id = inner.next_id;
        inner.next_id = id.next();
        if self.capacity == 0 {
            return id;
        }
        if inner.entries.len() >= self.capacity {
            inner.entries.pop_front();
        }
        inner.entries.push_back(UnhandledFailure {
            id,
            label: CompactString::from(label),
            failure,
            at: PTime::now(),
            observed,
        });
        id
    }

    pub fn mark_observed(&self, id: OutcomeId) {
        let mut inner = self.inner.lock();
        if let Some(entry) = inner.entries.iter_mut().find(|entry| entry.id == id) {
            entry.observed = true;
        }
    }

    /// Oldest first.
    pub fn entries(&self) -> Vec<UnhandledFailure> {
        self.inner.lock().entries.iter().cloned().collect()
    }

    pub fn unobserved(&self) -> Vec<UnhandledFailure> {
        self.inner
            .lock()
            .entries
            .iter()
            .filter(|entry| !entry.observed)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.inner.lock().entries.clear();
    }
}
