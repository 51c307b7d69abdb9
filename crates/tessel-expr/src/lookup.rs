//! First-level name resolution for expressions.

use std::rc::Rc;

use crate::value::{Object, Value};

/// Something an expression can be evaluated against.
///
/// `resolve` reads a first-level name (the `user` in `user.name`), returning
/// `Value::Undefined` when the name is unknown. `assign` writes a first-level
/// name into the target's own frame.
pub trait Lookup {
    fn resolve(&self, key: &str) -> Value;

    fn assign(&self, key: &str, value: Value);
}

impl Lookup for Object {
    fn resolve(&self, key: &str) -> Value {
        self.get(key).unwrap_or_default()
    }

    fn assign(&self, key: &str, value: Value) {
        self.set(key, value);
    }
}

impl<T: Lookup + ?Sized> Lookup for &T {
    fn resolve(&self, key: &str) -> Value {
        (**self).resolve(key)
    }

    fn assign(&self, key: &str, value: Value) {
        (**self).assign(key, value);
    }
}

impl<T: Lookup + ?Sized> Lookup for Rc<T> {
    fn resolve(&self, key: &str) -> Value {
        (**self).resolve(key)
    }

    fn assign(&self, key: &str, value: Value) {
        (**self).assign(key, value);
    }
}
