//! First-in-first-out event emitter shared by scopes and collaborators.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::ops::ControlFlow;
use std::rc::Rc;

use tessel_expr::Value;

use crate::error::BindError;

/// An event listener. Returning `ControlFlow::Break(())` stops the remaining
/// listeners of the current emission.
pub type Listener = Rc<dyn Fn(&[Value]) -> Result<ControlFlow<()>, BindError>>;

/// Handle returned by [`EventEmitter::on`], used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

struct Entry {
    id: ListenerId,
    listener: Listener,
    once: bool,
}

#[derive(Default)]
struct Registry {
    next_id: u64,
    listeners: HashMap<String, Vec<Entry>>,
}

/// A listener table keyed by event type.
#[derive(Default)]
pub struct EventEmitter {
    registry: RefCell<Registry>,
}

impl EventEmitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe `listener` to `event`.
    pub fn on<F>(&self, event: &str, listener: F) -> ListenerId
    where
        F: Fn(&[Value]) -> Result<ControlFlow<()>, BindError> + 'static,
    {
        self.subscribe(event, Rc::new(listener), false)
    }

    /// Subscribe `listener` to the next emission of `event` only.
    pub fn once<F>(&self, event: &str, listener: F) -> ListenerId
    where
        F: Fn(&[Value]) -> Result<ControlFlow<()>, BindError> + 'static,
    {
        self.subscribe(event, Rc::new(listener), true)
    }

    pub fn subscribe(&self, event: &str, listener: Listener, once: bool) -> ListenerId {
        let mut registry = self.registry.borrow_mut();
        let id = ListenerId(registry.next_id);
        registry.next_id += 1;
        registry
            .listeners
            .entry(event.to_string())
            .or_default()
            .push(Entry { id, listener, once });
        id
    }

    /// Unsubscribe one listener. Returns false if it was not subscribed.
    pub fn off(&self, event: &str, id: ListenerId) -> bool {
        let mut registry = self.registry.borrow_mut();
        let Some(entries) = registry.listeners.get_mut(event) else {
            return false;
        };
        let before = entries.len();
        entries.retain(|entry| entry.id != id);
        before != entries.len()
    }

    /// Unsubscribe every listener of `event`.
    pub fn off_all(&self, event: &str) {
        self.registry.borrow_mut().listeners.remove(event);
    }

    pub fn listener_count(&self, event: &str) -> usize {
        self.registry
            .borrow()
            .listeners
            .get(event)
            .map_or(0, Vec::len)
    }

    /// Invoke the listeners of `event` in subscription order.
    ///
    /// One-shot listeners are unsubscribed before any listener runs, and only
    /// the listeners present when emission starts are invoked. Returns
    /// `Ok(false)` when a listener broke out of the emission.
    pub fn emit(&self, event: &str, args: &[Value]) -> Result<bool, BindError> {
        let snapshot: Vec<Listener> = {
            let mut registry = self.registry.borrow_mut();
            let Some(entries) = registry.listeners.get_mut(event) else {
                return Ok(true);
            };
            let snapshot = entries.iter().map(|entry| Rc::clone(&entry.listener)).collect();
            entries.retain(|entry| !entry.once);
            snapshot
        };

        for listener in snapshot {
            if listener(args)?.is_break() {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

impl fmt::Debug for EventEmitter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let registry = self.registry.borrow();
        let mut counts: Vec<(&String, usize)> =
            registry.listeners.iter().map(|(k, v)| (k, v.len())).collect();
        counts.sort();
        f.debug_struct("EventEmitter").field("listeners", &counts).finish()
    }
}
