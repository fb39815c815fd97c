use compact_str::CompactString;
use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::{Arc, Weak};

use crate::PathError;

////////////////////////////////////////////////////////////////////////////////////
// Keys
////////////////////////////////////////////////////////////////////////////////////

/// A table key. Integer keys sort before string keys, so enumeration order is
/// deterministic for any table.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Key {
    Int(i64),
    Str(CompactString),
}

impl Key {
    /// Parses one path segment: numeric segments become integer keys.
    pub fn from_segment(segment: &str) -> Self {
        match segment.parse::<i64>() {
            Ok(n) => Key::Int(n),
            Err(_) => Key::Str(CompactString::from(segment)),
        }
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Int(n) => write!(f, "{n}"),
            Key::Str(s) => f.write_str(s),
        }
    }
}

impl From<&str> for Key {
    fn from(value: &str) -> Self {
        Key::Str(CompactString::from(value))
    }
}

impl From<String> for Key {
    fn from(value: String) -> Self {
        Key::Str(CompactString::from(value))
    }
}

impl From<CompactString> for Key {
    fn from(value: CompactString) -> Self {
        Key::Str(value)
    }
}

impl From<i64> for Key {
    fn from(value: i64) -> Self {
        Key::Int(value)
    }
}

impl From<i32> for Key {
    fn from(value: i32) -> Self {
        Key::Int(i64::from(value))
    }
}

////////////////////////////////////////////////////////////////////////////////////
// External objects
////////////////////////////////////////////////////////////////////////////////////

/// A host object that must never be deep-copied (scene nodes, sockets,
/// handles owned by another runtime). Captures only keep its kind and name.
pub trait External: Send + Sync {
    /// Type tag, e.g. `"Part"` or `"TcpStream"`.
    fn kind(&self) -> &str;

    /// Human-facing display name.
    fn name(&self) -> String;
}

////////////////////////////////////////////////////////////////////////////////////
// Tables
////////////////////////////////////////////////////////////////////////////////////

type Entries = BTreeMap<Key, Value>;

/// Shared, mutable key/value composite. Cloning a `Table` clones the handle,
/// not the contents: two clones are the same table.
#[derive(Clone, Default)]
pub struct Table {
    inner: Arc<RwLock<Entries>>,
}

/// Pointer identity of a table, stable for as long as the table is alive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TableId(usize);

impl Table {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn identity(&self) -> TableId {
        TableId(Arc::as_ptr(&self.inner) as *const () as usize)
    }

    pub fn ptr_eq(&self, other: &Table) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    pub fn get(&self, key: impl Into<Key>) -> Option<Value> {
        self.inner.read().get(&key.into()).cloned()
    }

    /// Inserts `value` under `key`, returning the previous value.
    pub fn set(&self, key: impl Into<Key>, value: impl Into<Value>) -> Option<Value> {
        self.inner.write().insert(key.into(), value.into())
    }

    pub fn remove(&self, key: impl Into<Key>) -> Option<Value> {
        self.inner.write().remove(&key.into())
    }

    pub fn contains_key(&self, key: impl Into<Key>) -> bool {
        self.inner.read().contains_key(&key.into())
    }

    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }

    pub fn keys(&self) -> Vec<Key> {
        self.inner.read().keys().cloned().collect()
    }

    /// Non-blocking read access. Returns `None` while a writer holds the table.
    pub fn try_read(&self) -> Option<RwLockReadGuard<'_, Entries>> {
        self.inner.try_read()
    }

    /// Exclusive access for a batch of updates. Captures taken while the
    /// guard is held see this table as locked.
    pub fn write(&self) -> RwLockWriteGuard<'_, Entries> {
        self.inner.write()
    }

    pub fn downgrade(&self) -> WeakTable {
        WeakTable {
            inner: Arc::downgrade(&self.inner),
        }
    }
}

impl fmt::Debug for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Contents may be cyclic; identity is all we can print safely.
        write!(f, "Table({:#x})", self.identity().0)
    }
}

/// Non-owning table handle, used to tell whether a remembered identity still
/// refers to a live table.
#[derive(Clone)]
pub struct WeakTable {
    inner: Weak<RwLock<Entries>>,
}

impl WeakTable {
    pub fn upgrade(&self) -> Option<Table> {
        self.inner.upgrade().map(|inner| Table { inner })
    }
}

////////////////////////////////////////////////////////////////////////////////////
// Values
////////////////////////////////////////////////////////////////////////////////////

/// A live value. The variant is fixed at construction, so code that inspects
/// values matches on it once instead of probing types ad hoc.
#[derive(Clone, Default)]
pub enum Value {
    #[default]
    Nil,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(CompactString),
    Table(Table),
    External(Arc<dyn External>),
    /// Something with no structural meaning (a callback, a guard, ...).
    Opaque(Arc<dyn fmt::Debug + Send + Sync>),
}

impl Value {
    pub fn table() -> Self {
        Value::Table(Table::new())
    }

    pub fn external(object: impl External + 'static) -> Self {
        Value::External(Arc::new(object))
    }

    pub fn opaque(object: impl fmt::Debug + Send + Sync + 'static) -> Self {
        Value::Opaque(Arc::new(object))
    }

    pub fn as_table(&self) -> Option<&Table> {
        match self {
            Value::Table(table) => Some(table),
            _ => None,
        }
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, Value::Nil)
    }

    /// Walks a dot-separated path (`"a.b.3"`) through nested tables. Fails
    /// with [`PathError::Locked`] instead of blocking on a write-locked table.
    pub fn resolve(&self, path: &str) -> Result<Value, PathError> {
        let segments = split_path(path)?;
        let mut current = self.clone();
        let mut walked = String::new();
        for segment in segments {
            let table = match &current {
                Value::Table(table) => table.clone(),
                _ => {
                    return Err(PathError::NotATable {
                        path: walked_or_root(&walked),
                    });
                }
            };
            push_segment(&mut walked, segment);
            let entries = table.inner.try_read().ok_or_else(|| PathError::Locked {
                path: walked.clone(),
            })?;
            let found = existing_key(&entries, segment).and_then(|key| entries.get(&key).cloned());
            drop(entries);
            current = found.ok_or_else(|| PathError::InvalidPath {
                path: path.to_owned(),
                segment: segment.to_owned(),
            })?;
        }
        Ok(current)
    }

    /// Writes `value` at a dot-separated path. Every segment but the last must
    /// already resolve to a table; the last one is created or replaced.
    /// Returns the value previously stored there.
    pub fn inject(&self, path: &str, value: impl Into<Value>) -> Result<Option<Value>, PathError> {
        let segments = split_path(path)?;
        let (last, parents) = segments
            .split_last()
            .ok_or_else(|| PathError::InvalidPath {
                path: path.to_owned(),
                segment: String::new(),
            })?;

        let parent = if parents.is_empty() {
            self.clone()
        } else {
            self.resolve(&parents.join("."))?
        };
        let Value::Table(table) = parent else {
            return Err(PathError::NotATable {
                path: walked_or_root(&parents.join(".")),
            });
        };

        let mut entries = table.inner.try_write().ok_or_else(|| PathError::Locked {
            path: path.to_owned(),
        })?;
        let key = existing_key(&entries, last).unwrap_or_else(|| Key::from_segment(last));
        Ok(entries.insert(key, value.into()))
    }
}

fn split_path(path: &str) -> Result<Vec<&str>, PathError> {
    let segments: Vec<&str> = path.split('.').collect();
    if let Some(empty) = segments.iter().find(|s| s.is_empty()) {
        return Err(PathError::InvalidPath {
            path: path.to_owned(),
            segment: (*empty).to_owned(),
        });
    }
    Ok(segments)
}

fn push_segment(walked: &mut String, segment: &str) {
    if !walked.is_empty() {
        walked.push('.');
    }
    walked.push_str(segment);
}

fn walked_or_root(walked: &str) -> String {
    if walked.is_empty() {
        "<root>".to_owned()
    } else {
        walked.to_owned()
    }
}

/// A numeric segment may name either an integer key or a string key that
/// happens to look numeric; prefer whichever exists.
fn existing_key(entries: &Entries, segment: &str) -> Option<Key> {
    let parsed = Key::from_segment(segment);
    if entries.contains_key(&parsed) {
        return Some(parsed);
    }
    let as_str = Key::from(segment);
    entries.contains_key(&as_str).then_some(as_str)
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Nil => f.write_str("Nil"),
            Value::Bool(b) => write!(f, "Bool({b})"),
            Value::Int(n) => write!(f, "Int({n})"),
            Value::Float(x) => write!(f, "Float({x})"),
            Value::Str(s) => write!(f, "Str({s:?})"),
            Value::Table(table) => fmt::Debug::fmt(table, f),
            Value::External(object) => write!(f, "External({} {:?})", object.kind(), object.name()),
            Value::Opaque(object) => write!(f, "Opaque({object:?})"),
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Int(i64::from(value))
    }
}

impl From<u32> for Value {
    fn from(value: u32) -> Self {
        Value::Int(i64::from(value))
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Str(CompactString::from(value))
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Str(CompactString::from(value))
    }
}

impl From<CompactString> for Value {
    fn from(value: CompactString) -> Self {
        Value::Str(value)
    }
}

impl From<Table> for Value {
    fn from(value: Table) -> Self {
        Value::Table(value)
    }
}

////////////////////////////////////////////////////////////////////////////////////
// Conversion from ordinary Rust data
////////////////////////////////////////////////////////////////////////////////////

/// Builds a fresh live `Value` from plain Rust data. Sequences become tables
/// keyed `1..=n`.
pub trait ToValue {
    fn to_value(&self) -> Value;
}

impl ToValue for Value {
    fn to_value(&self) -> Value {
        self.clone()
    }
}

impl ToValue for Table {
    fn to_value(&self) -> Value {
        Value::Table(self.clone())
    }
}

impl ToValue for () {
    fn to_value(&self) -> Value {
        Value::Nil
    }
}

macro_rules! to_value_via_from {
    ($($ty:ty),* $(,)?) => {
        $(
            impl ToValue for $ty {
                fn to_value(&self) -> Value {
                    Value::from(self.clone())
                }
            }
        )*
    };
}

to_value_via_from!(bool, i32, i64, u32, f64, String, CompactString);

impl ToValue for &str {
    fn to_value(&self) -> Value {
        Value::from(*self)
    }
}

impl ToValue for u64 {
    fn to_value(&self) -> Value {
        match i64::try_from(*self) {
            Ok(n) => Value::Int(n),
            Err(_) => Value::Float(*self as f64),
        }
    }
}

impl ToValue for usize {
    fn to_value(&self) -> Value {
        (*self as u64).to_value()
    }
}

impl<T: ToValue> ToValue for Option<T> {
    fn to_value(&self) -> Value {
        match self {
            Some(inner) => inner.to_value(),
            None => Value::Nil,
        }
    }
}

impl<T: ToValue> ToValue for Vec<T> {
    fn to_value(&self) -> Value {
        self.as_slice().to_value()
    }
}

impl<T: ToValue> ToValue for [T] {
    fn to_value(&self) -> Value {
        let table = Table::new();
        for (index, item) in self.iter().enumerate() {
            table.set(Key::Int(index as i64 + 1), item.to_value());
        }
        Value::Table(table)
    }
}

impl<K: AsRef<str>, T: ToValue> ToValue for BTreeMap<K, T> {
    fn to_value(&self) -> Value {
        let table = Table::new();
        for (key, item) in self {
            table.set(key.as_ref(), item.to_value());
        }
        Value::Table(table)
    }
}

impl<K: AsRef<str>, T: ToValue, S> ToValue for HashMap<K, T, S> {
    fn to_value(&self) -> Value {
        let table = Table::new();
        for (key, item) in self {
            table.set(key.as_ref(), item.to_value());
        }
        Value::Table(table)
    }
}

impl<A: ToValue, B: ToValue> ToValue for (A, B) {
    fn to_value(&self) -> Value {
        [self.0.to_value(), self.1.to_value()].to_value()
    }
}

impl<A: ToValue, B: ToValue, C: ToValue> ToValue for (A, B, C) {
    fn to_value(&self) -> Value {
        [self.0.to_value(), self.1.to_value(), self.2.to_value()].to_value()
    }
}

/// Builds a table literal from `key => value` pairs.
///
/// ```ignore
/// let player = vigil_types::table! { "name" => "ada", "hp" => 20 };
/// ```
#[macro_export]
macro_rules! table {
    ($($k:expr => $v:expr),* $(,)?) => {{
        let table = $crate::Table::new();
        $(table.set($k, $v);)*
        $crate::Value::Table(table)
    }};
}
