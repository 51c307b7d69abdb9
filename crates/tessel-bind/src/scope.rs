//! Chained data scopes.
//!
//! A [`Scope`] is bound to one element of the tree. Reads fall back to the
//! parent chain, writes always land in the local frame. Each scope owns the
//! widgets created for its subtree and pushes updates to them on demand.

use std::cell::RefCell;
use std::fmt;
use std::ops::ControlFlow;
use std::rc::{Rc, Weak};

use tessel_dom::Node;
use tessel_expr::{Lookup, Object, Value};
use tracing::{debug, trace, warn};

use crate::emitter::{EventEmitter, ListenerId};
use crate::error::BindError;
use crate::widget::Widget;

/// Handler run by [`Scope::watch`] before the scope updates.
pub type WatchHandler = Rc<dyn Fn(&Scope, &[Value]) -> Result<(), BindError>>;

struct ScopeData {
    element: Node,
    vars: Object,
    parent: Option<WeakScope>,
    widgets: RefCell<Vec<Widget>>,
    events: EventEmitter,
}

/// Shared handle to a scope frame.
#[derive(Clone)]
pub struct Scope(Rc<ScopeData>);

/// Non-owning scope handle, held by listeners and widgets that must not keep
/// their scope alive.
#[derive(Clone)]
pub struct WeakScope(Weak<ScopeData>);

impl Scope {
    /// Create a root scope bound to `element`.
    pub fn new(element: Node) -> Self {
        Self::with_vars(element, Object::new())
    }

    /// Create a root scope whose local frame is `vars`.
    pub fn with_vars(element: Node, vars: Object) -> Self {
        Scope(Rc::new(ScopeData {
            element,
            vars,
            parent: None,
            widgets: RefCell::new(Vec::new()),
            events: EventEmitter::new(),
        }))
    }

    /// Fork a child scope bound to `element`.
    pub fn child(&self, element: Node) -> Self {
        debug!(tag = element.tag().unwrap_or_default(), "fork scope");
        Scope(Rc::new(ScopeData {
            element,
            vars: Object::new(),
            parent: Some(self.downgrade()),
            widgets: RefCell::new(Vec::new()),
            events: EventEmitter::new(),
        }))
    }

    pub fn element(&self) -> &Node {
        &self.0.element
    }

    pub fn parent(&self) -> Option<Scope> {
        self.0.parent.as_ref().and_then(WeakScope::upgrade)
    }

    /// The topmost live ancestor.
    pub fn root(&self) -> Scope {
        let mut current = self.clone();
        while let Some(parent) = current.parent() {
            current = parent;
        }
        current
    }

    /// Read `key`, walking up the parent chain.
    pub fn get(&self, key: &str) -> Value {
        let mut current = Some(self.clone());
        while let Some(scope) = current {
            if let Some(value) = scope.0.vars.get(key) {
                return value;
            }
            current = scope.parent();
        }
        Value::Undefined
    }

    /// Write `key` in this scope's own frame, shadowing any ancestor.
    pub fn set(&self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.vars.set(key, value);
    }

    pub fn has_own(&self, key: &str) -> bool {
        self.0.vars.contains_key(key)
    }

    /// The local frame.
    pub fn vars(&self) -> &Object {
        &self.0.vars
    }

    /// Append a widget. Duplicates are allowed and each copy is updated.
    pub fn add_widget(&self, widget: Widget) {
        self.0.widgets.borrow_mut().push(widget);
    }

    pub fn widget_count(&self) -> usize {
        self.0.widgets.borrow().len()
    }

    /// Update every owned widget in registration order.
    ///
    /// Child scopes are not visited; widgets that manage them propagate the
    /// update themselves. The first failing widget aborts the pass.
    pub fn update(&self) -> Result<(), BindError> {
        let widgets = self.0.widgets.borrow().clone();
        trace!(widgets = widgets.len(), "update scope");
        for widget in &widgets {
            widget.update()?;
        }
        Ok(())
    }

    pub fn events(&self) -> &EventEmitter {
        &self.0.events
    }

    pub fn emit(&self, event: &str, args: &[Value]) -> Result<bool, BindError> {
        self.0.events.emit(event, args)
    }

    /// Subscribe to `event` on `source`.
    ///
    /// Each emission runs `handler` (if any) with this scope, then updates
    /// the scope whatever the handler did. The subscription holds the scope
    /// weakly and becomes inert once the scope is dropped.
    pub fn watch(
        &self,
        source: &EventEmitter,
        event: &str,
        handler: Option<WatchHandler>,
        once: bool,
    ) -> ListenerId {
        let weak = self.downgrade();
        let listener = move |args: &[Value]| -> Result<ControlFlow<()>, BindError> {
            let Some(scope) = weak.upgrade() else {
                return Ok(ControlFlow::Continue(()));
            };
            if let Some(handler) = &handler {
                handler(&scope, args)?;
            }
            scope.update()?;
            Ok(ControlFlow::Continue(()))
        };
        source.subscribe(event, Rc::new(listener), once)
    }

    pub fn downgrade(&self) -> WeakScope {
        WeakScope(Rc::downgrade(&self.0))
    }

    pub fn ptr_eq(&self, other: &Scope) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl WeakScope {
    pub fn upgrade(&self) -> Option<Scope> {
        self.0.upgrade().map(Scope)
    }
}

impl Lookup for Scope {
    fn resolve(&self, key: &str) -> Value {
        self.get(key)
    }

    fn assign(&self, key: &str, value: Value) {
        self.set(key, value);
    }
}

impl Lookup for WeakScope {
    fn resolve(&self, key: &str) -> Value {
        self.upgrade().map(|scope| scope.get(key)).unwrap_or_default()
    }

    fn assign(&self, key: &str, value: Value) {
        match self.upgrade() {
            Some(scope) => scope.set(key, value),
            None => warn!(key, "write to dropped scope ignored"),
        }
    }
}

impl fmt::Debug for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scope")
            .field("element", &self.0.element.tag())
            .field("vars", &self.0.vars)
            .field("widgets", &self.widget_count())
            .field("has_parent", &self.0.parent.is_some())
            .finish()
    }
}

impl fmt::Debug for WeakScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "WeakScope")
    }
}
