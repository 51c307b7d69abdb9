//! Key/value storage with range queries.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::ops::Bound;
use std::rc::Rc;

use serde::{Deserialize, Serialize};
use tessel_expr::Value;
use tracing::{debug, warn};

use crate::emitter::EventEmitter;
use crate::error::BindError;

/// Emitted with the store name whenever a store is opened.
pub const OPEN_EVENT: &str = "open";

/// Emitted with a message when an operation fails.
pub const ERROR_EVENT: &str = "error";

/// Bounds for a range query over string keys. A missing bound is unbounded.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyRange {
    pub lower: Option<String>,
    pub upper: Option<String>,
    #[serde(default)]
    pub lower_open: bool,
    #[serde(default)]
    pub upper_open: bool,
}

impl KeyRange {
    pub fn contains(&self, key: &str) -> bool {
        let above = match &self.lower {
            Some(lower) if self.lower_open => key > lower.as_str(),
            Some(lower) => key >= lower.as_str(),
            None => true,
        };
        let below = match &self.upper {
            Some(upper) if self.upper_open => key < upper.as_str(),
            Some(upper) => key <= upper.as_str(),
            None => true,
        };
        above && below
    }

    fn bounds(&self) -> (Bound<&str>, Bound<&str>) {
        fn bound(key: &Option<String>, open: bool) -> Bound<&str> {
            match key {
                Some(key) if open => Bound::Excluded(key.as_str()),
                Some(key) => Bound::Included(key.as_str()),
                None => Bound::Unbounded,
            }
        }
        (bound(&self.lower, self.lower_open), bound(&self.upper, self.upper_open))
    }
}

/// One named store handed out by [`Storage::get_store`].
pub trait Store {
    fn name(&self) -> &str;

    fn get(&self, key: &str) -> Option<Value>;

    /// Write `value` at `key`. Failures are reported as `error` events.
    fn put(&self, key: &str, value: Value) -> Result<(), BindError>;

    fn delete(&self, key: &str) -> Result<(), BindError>;

    /// Entries whose keys fall in `range`, in key order.
    fn range(&self, range: &KeyRange) -> Vec<(String, Value)>;
}

/// A storage backend.
pub trait Storage {
    type Store: Store;

    /// Open the store `name` and hand it to `callback`.
    fn get_store(
        &self,
        name: &str,
        read_write: bool,
        callback: &mut dyn FnMut(&Self::Store) -> Result<(), BindError>,
    ) -> Result<(), BindError>;

    fn create_key_range(
        &self,
        lower: Option<&str>,
        upper: Option<&str>,
        lower_open: bool,
        upper_open: bool,
    ) -> KeyRange {
        KeyRange {
            lower: lower.map(str::to_string),
            upper: upper.map(str::to_string),
            lower_open,
            upper_open,
        }
    }

    fn events(&self) -> &EventEmitter;
}

type Table = Rc<RefCell<BTreeMap<String, Value>>>;

/// [`Storage`] over in-memory ordered maps.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    tables: RefCell<BTreeMap<String, Table>>,
    events: Rc<EventEmitter>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn store_names(&self) -> Vec<String> {
        self.tables.borrow().keys().cloned().collect()
    }
}

impl Storage for MemoryStorage {
    type Store = MemoryStore;

    fn get_store(
        &self,
        name: &str,
        read_write: bool,
        callback: &mut dyn FnMut(&MemoryStore) -> Result<(), BindError>,
    ) -> Result<(), BindError> {
        let table = Rc::clone(self.tables.borrow_mut().entry(name.to_string()).or_default());
        let store = MemoryStore {
            name: name.to_string(),
            read_write,
            table,
            events: Rc::clone(&self.events),
        };
        debug!(store = name, read_write, "open store");
        self.events.emit(OPEN_EVENT, &[Value::from(name)])?;
        callback(&store)
    }

    fn events(&self) -> &EventEmitter {
        &self.events
    }
}

/// A store of a [`MemoryStorage`].
#[derive(Debug)]
pub struct MemoryStore {
    name: String,
    read_write: bool,
    table: Table,
    events: Rc<EventEmitter>,
}

impl MemoryStore {
    pub fn is_read_write(&self) -> bool {
        self.read_write
    }

    pub fn len(&self) -> usize {
        self.table.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns false, after emitting `error`, if the store is read-only.
    fn writable(&self, action: &str, key: &str) -> Result<bool, BindError> {
        if self.read_write {
            return Ok(true);
        }
        warn!(store = %self.name, key, action, "write to read-only store");
        let message = format!("cannot {} `{}`: store `{}` is read-only", action, key, self.name);
        self.events.emit(ERROR_EVENT, &[Value::from(message)])?;
        Ok(false)
    }
}

impl Store for MemoryStore {
    fn name(&self) -> &str {
        &self.name
    }

    fn get(&self, key: &str) -> Option<Value> {
        self.table.borrow().get(key).cloned()
    }

    fn put(&self, key: &str, value: Value) -> Result<(), BindError> {
        if self.writable("put", key)? {
            self.table.borrow_mut().insert(key.to_string(), value);
        }
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<(), BindError> {
        if self.writable("delete", key)? {
            self.table.borrow_mut().remove(key);
        }
        Ok(())
    }

    fn range(&self, range: &KeyRange) -> Vec<(String, Value)> {
        let table = self.table.borrow();
        // BTreeMap::range panics on inverted bounds
        if let (Some(lower), Some(upper)) = (&range.lower, &range.upper) {
            if lower > upper || (lower == upper && (range.lower_open || range.upper_open)) {
                return Vec::new();
            }
        }
        table
            .range::<str, _>(range.bounds())
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
}
