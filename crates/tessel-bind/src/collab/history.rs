//! Path-based navigation.

use std::cell::RefCell;
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use tessel_expr::{Object, Value};
use tracing::debug;

use crate::emitter::EventEmitter;
use crate::error::BindError;

/// Emitted with the new [`Location`] (as an object) after every navigation.
pub const LOCATION_EVENT: &str = "location";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub pathname: String,
    #[serde(default)]
    pub params: BTreeMap<String, JsonValue>,
}

impl Location {
    pub fn to_value(&self) -> Result<Value, BindError> {
        let json = serde_json::to_value(self).map_err(|source| BindError::json(LOCATION_EVENT, source))?;
        Ok(Value::from(json))
    }
}

/// A navigation service.
pub trait Navigator {
    /// Move to `pathname` with optional query parameters.
    fn go(&self, pathname: &str, params: Option<&Object>) -> Result<(), BindError>;

    /// A parameter of the current location, `Undefined` when absent.
    fn param(&self, key: &str) -> Value;

    fn events(&self) -> &EventEmitter;
}

/// [`Navigator`] backed by an in-memory history stack.
#[derive(Debug)]
pub struct MemoryHistory {
    stack: RefCell<Vec<Location>>,
    events: EventEmitter,
}

impl MemoryHistory {
    /// A history positioned at `pathname`.
    pub fn new(pathname: &str) -> Self {
        Self {
            stack: RefCell::new(vec![Location {
                pathname: pathname.to_string(),
                params: BTreeMap::new(),
            }]),
            events: EventEmitter::new(),
        }
    }

    pub fn current(&self) -> Location {
        self.stack.borrow().last().cloned().unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.stack.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.stack.borrow().is_empty()
    }

    /// Return to the previous location. Returns false at the first entry.
    pub fn back(&self) -> Result<bool, BindError> {
        let location = {
            let mut stack = self.stack.borrow_mut();
            if stack.len() < 2 {
                return Ok(false);
            }
            stack.pop();
            stack.last().cloned().unwrap_or_default()
        };
        debug!(pathname = %location.pathname, "history back");
        self.events.emit(LOCATION_EVENT, &[location.to_value()?])?;
        Ok(true)
    }
}

impl Navigator for MemoryHistory {
    fn go(&self, pathname: &str, params: Option<&Object>) -> Result<(), BindError> {
        let params: BTreeMap<String, JsonValue> = params
            .map(|object| {
                object
                    .entries()
                    .into_iter()
                    .map(|(key, value)| (key, value.to_json_value()))
                    .collect()
            })
            .unwrap_or_default();
        let location = Location {
            pathname: pathname.to_string(),
            params,
        };
        debug!(pathname, "navigate");
        let value = location.to_value()?;
        self.stack.borrow_mut().push(location);
        self.events.emit(LOCATION_EVENT, &[value])?;
        Ok(())
    }

    fn param(&self, key: &str) -> Value {
        self.stack
            .borrow()
            .last()
            .and_then(|location| location.params.get(key).cloned())
            .map(Value::from)
            .unwrap_or_default()
    }

    fn events(&self) -> &EventEmitter {
        &self.events
    }
}
