use std::collections::VecDeque;

use compact_str::CompactString;
use parking_lot::Mutex;

/// Bounded breadcrumb trail of recently executed operation names, appended to
/// error-level dispatches so a report says what led up to it.
///
/// Capacity is fixed at construction; when full, the oldest name is evicted
/// before the newest is appended.
pub struct Trail {
    capacity: usize,
    names: Mutex<VecDeque<CompactString>>,
}

impl Trail {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            names: Mutex::new(VecDeque::with_capacity(capacity)),
        }
    }

    pub fn record(&self, name: impl Into<CompactString>) {
        if self.capacity == 0 {
            return;
        }
        let mut names = self.names.lock();
        if names.len() >= self.capacity {
            names.pop_front();
        }
        names.push_back(name.into());
    }

    /// Oldest first.
    pub fn entries(&self) -> Vec<CompactString> {
        self.names.lock().iter().cloned().collect()
    }

    pub fn clear(&self) {
        self.names.lock().clear();
    }

    /// `Trail: a > b > c`, or `None` when nothing has been recorded.
    pub fn render(&self) -> Option<String> {
        let names = self.names.lock();
        if names.is_empty() {
            return None;
        }
        let joined = names
            .iter()
            .map(CompactString::as_str)
            .collect::<Vec<_>>()
            .join(" > ");
        Some(format!("Trail: {joined}"))
    }
}
