//! Numbered snapshots and per-target rolling history.
//!
//! Snapshots are kept for the lifetime of the store. History buffers hold the
//! most recent captures of one target each and evict oldest-first.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::{Arc, Weak};

use compact_str::CompactString;
use parking_lot::Mutex;
use tracing::debug;
use vigil_types::{
    Captured, DiffEntry, External, PTime, SnapshotId, StoreError, TableId, Value, WeakTable,
};

use crate::capture::{CaptureOptions, capture_with, try_capture};
use crate::diff::diff;

/// A frozen capture. Immutable once stored.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub id: SnapshotId,
    pub taken_at: PTime,
    pub value: Captured,
    pub meta: Option<Captured>,
}

#[derive(Debug, Clone)]
pub struct HistoryEntry {
    pub taken_at: PTime,
    pub value: Captured,
    pub note: Option<CompactString>,
}

pub struct SnapshotStore {
    options: CaptureOptions,
    history_capacity: usize,
    inner: Mutex<StoreInner>,
}

struct StoreInner {
    next_id: SnapshotId,
    snapshots: BTreeMap<SnapshotId, Arc<Snapshot>>,
    histories: HashMap<TargetKey, History>,
}

/// Identity of a history target. Tables and externals are keyed by address;
/// the `Anchor` kept next to the buffer tells a live target from a new
/// allocation that reused a freed address.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum TargetKey {
    Table(TableId),
    External(usize),
    Scalar(String),
}

enum Anchor {
    Table(WeakTable),
    External(Weak<dyn External>),
    None,
}

struct History {
    anchor: Anchor,
    entries: VecDeque<HistoryEntry>,
}

impl History {
    /// The target this buffer was recorded for has been freed.
    fn is_orphaned(&self) -> bool {
        match &self.anchor {
            Anchor::Table(weak) => weak.upgrade().is_none(),
            Anchor::External(weak) => weak.strong_count() == 0,
            Anchor::None => false,
        }
    }

    fn still_refers_to(&self, target: &Value) -> bool {
        match (&self.anchor, target) {
            (Anchor::Table(weak), Value::Table(table)) => {
                weak.upgrade().is_some_and(|live| live.ptr_eq(table))
            }
            (Anchor::External(weak), Value::External(object)) => weak
                .upgrade()
                .is_some_and(|live| external_addr(&live) == external_addr(object)),
            (Anchor::None, _) => true,
            _ => false,
        }
    }
}

fn external_addr(object: &Arc<dyn External>) -> usize {
    Arc::as_ptr(object) as *const () as usize
}

fn target_key(target: &Value) -> (TargetKey, Anchor) {
    match target {
        Value::Table(table) => (
            TargetKey::Table(table.identity()),
            Anchor::Table(table.downgrade()),
        ),
        Value::External(object) => (
            TargetKey::External(external_addr(object)),
            Anchor::External(Arc::downgrade(object)),
        ),
        scalar => (
            TargetKey::Scalar(capture_with(scalar, CaptureOptions::default()).render()),
            Anchor::None,
        ),
    }
}

impl SnapshotStore {
    pub fn new(options: CaptureOptions, history_capacity: usize) -> Self {
        Self {
            options,
            history_capacity: history_capacity.max(1),
            inner: Mutex::new(StoreInner {
                next_id: SnapshotId::first(),
                snapshots: BTreeMap::new(),
                histories: HashMap::new(),
            }),
        }
    }

    /// Captures `target` (and `meta`, if any) and stores the result under a
    /// fresh id. Always succeeds; unreadable parts degrade.
    pub fn snapshot(&self, target: &Value, meta: Option<&Value>) -> SnapshotId {
        let value = capture_with(target, self.options);
        let meta = meta.map(|m| capture_with(m, self.options));
        let taken_at = PTime::now();

        let mut inner = self.inner.lock();
        let id = inner.next_id;
        inner.next_id = id.next();
        inner.snapshots.insert(
            id,
            Arc::new(Snapshot {
                id,
                taken_at,
                value,
                meta,
            }),
        );
        debug!(snapshot = %id, "stored snapshot");
        id
    }

    pub fn get(&self, id: SnapshotId) -> Option<Arc<Snapshot>> {
        self.inner.lock().snapshots.get(&id).cloned()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Differences between stored snapshot `id` and the current state of
    /// `live`.
    pub fn diff_snapshots(&self, id: SnapshotId, live: &Value) -> Result<Vec<DiffEntry>, StoreError> {
        let snapshot = self.get(id).ok_or(StoreError::MissingSnapshot(id))?;
        let now = try_capture(live, self.options)?;
        Ok(diff(&snapshot.value, &now))
    }

    /// Appends a capture of `target` to its rolling history and returns the
    /// 1-based position of the new entry.
    pub fn snapshot_history(&self, target: &Value, note: Option<&str>) -> usize {
        let entry = HistoryEntry {
            taken_at: PTime::now(),
            value: capture_with(target, self.options),
            note: note.map(CompactString::from),
        };
        let (key, anchor) = target_key(target);

        let mut inner = self.inner.lock();
        Self::prune_locked(&mut inner);
        let history = inner.histories.entry(key).or_insert_with(|| History {
            anchor: Anchor::None,
            entries: VecDeque::new(),
        });
        if !history.still_refers_to(target) || history.entries.is_empty() {
            history.entries.clear();
            history.anchor = anchor;
        }
        while history.entries.len() >= self.history_capacity {
            history.entries.pop_front();
        }
        history.entries.push_back(entry);
        history.entries.len()
    }

    /// Differences between history entry `index` (1-based, oldest first) and
    /// the current state of `target`. `None` if there is no such entry.
    pub fn diff_history(&self, target: &Value, index: usize) -> Option<Vec<DiffEntry>> {
        let recorded = self.history_entry(target, index)?;
        let now = capture_with(target, self.options);
        Some(diff(&recorded.value, &now))
    }

    pub fn history_entry(&self, target: &Value, index: usize) -> Option<HistoryEntry> {
        let position = index.checked_sub(1)?;
        let (key, _) = target_key(target);
        let inner = self.inner.lock();
        let history = inner.histories.get(&key)?;
        if !history.still_refers_to(target) {
            return None;
        }
        history.entries.get(position).cloned()
    }

    /// Drops the history of every table or external that no longer exists.
    /// Runs on every history insert; returns how many buffers were dropped.
    pub fn prune(&self) -> usize {
        Self::prune_locked(&mut self.inner.lock())
    }

    /// Number of targets with a history buffer.
    pub fn history_targets(&self) -> usize {
        self.inner.lock().histories.len()
    }

    fn prune_locked(inner: &mut StoreInner) -> usize {
        let before = inner.histories.len();
        inner.histories.retain(|_, history| !history.is_orphaned());
        let dropped = before - inner.histories.len();
        if dropped > 0 {
            debug!(dropped, "pruned histories of freed targets");
        }
        dropped
    }

    pub fn history_len(&self, target: &Value) -> usize {
        let (key, _) = target_key(target);
        let inner = self.inner.lock();
        inner
            .histories
            .get(&key)
            .filter(|history| history.still_refers_to(target))
            .map_or(0, |history| history.entries.len())
    }
}
