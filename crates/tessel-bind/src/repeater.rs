//! List repeater: `t-repeat="item in items"`.
//!
//! The container's first element child is the template. It stays in place,
//! marked with [`TEMPLATE_ATTR`], and every item gets a deep clone bound to
//! its own child scope. Reconciliation is positional: slot `i` is compared
//! against item `i` by identity, never by content and never across indices.

use std::cell::RefCell;
use std::mem;

use tessel_dom::Node;
use tessel_expr::{parse_key_loop_expression, Getter, Object, Path, Segment, Value};
use tracing::debug;

use crate::error::BindError;
use crate::registry::{Binding, Registry};
use crate::scope::{Scope, WeakScope};
use crate::widget::{Update, Widget};

/// Marks the retained template element inside a repeater container.
pub const TEMPLATE_ATTR: &str = "t-template";

/// DOM event dispatched on the container after a structural change.
pub const CHANGE_EVENT: &str = "change";

/// Scope variable holding the item index.
pub const INDEX_KEY: &str = "$i";

fn shallow_copy(value: &Value) -> Object {
    match value {
        Value::Object(object) => object.entries().into_iter().collect(),
        _ => Object::new(),
    }
}

#[derive(Default)]
enum Slot {
    /// Never populated.
    #[default]
    Empty,
    /// Its item went away.
    Removed,
    Live {
        item: Value,
        scope: Scope,
        element: Node,
    },
}

#[derive(Default)]
struct State {
    source: Value,
    slots: Vec<Slot>,
}

pub struct Repeater {
    container: Node,
    template: Node,
    source: Getter,
    target: Path,
    scope: WeakScope,
    registry: Registry,
    state: RefCell<State>,
}

/// Container factory for `@t-repeat`.
pub fn factory(binding: &Binding<'_>) -> Result<Widget, BindError> {
    let repeater = Repeater::new(binding)?;
    Ok(Widget::updatable(repeater))
}

impl Repeater {
    /// Capture the template and render the initial list.
    pub fn new(binding: &Binding<'_>) -> Result<Self, BindError> {
        let key_loop = parse_key_loop_expression(binding.data())?;
        let container = binding.element.clone();
        let template = container.first_element_child().ok_or_else(|| {
            BindError::Template(format!(
                "repeater `{}` has no template element",
                binding.data()
            ))
        })?;
        template.set_attribute(TEMPLATE_ATTR, "");

        let repeater = Repeater {
            container,
            template,
            source: Getter::parse(&key_loop.source)?,
            target: Path::parse(&key_loop.target)?,
            scope: binding.scope.downgrade(),
            registry: binding.registry.clone(),
            state: RefCell::new(State::default()),
        };
        let source = repeater.source.evaluate(binding.scope);
        repeater.rebuild(binding.scope, source)?;
        Ok(repeater)
    }

    /// Number of live item elements.
    pub fn len(&self) -> usize {
        self.state
            .borrow()
            .slots
            .iter()
            .filter(|slot| matches!(slot, Slot::Live { .. }))
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Tear down every item and render `source` from scratch.
    fn rebuild(&self, scope: &Scope, source: Value) -> Result<(), BindError> {
        for child in self.container.children() {
            if !child.ptr_eq(&self.template) {
                self.container.remove_child(&child);
            }
        }
        let mut slots = Vec::new();
        if let Some(items) = source.as_array() {
            debug!(source = %self.source, items = items.len(), "repeater rebuild");
            for (index, item) in items.to_vec().into_iter().enumerate() {
                if item.is_nullish() {
                    slots.push(Slot::Empty);
                    continue;
                }
                let (child, element) = self.instantiate(scope, &item, index)?;
                self.container.append_child(&element);
                slots.push(Slot::Live {
                    item,
                    scope: child,
                    element,
                });
            }
        }
        *self.state.borrow_mut() = State { source, slots };
        Ok(())
    }

    fn instantiate(&self, parent: &Scope, item: &Value, index: usize) -> Result<(Scope, Node), BindError> {
        let element = self.template.clone_node(true);
        element.remove_attribute(TEMPLATE_ATTR);
        let child = parent.child(element.clone());
        self.own_target(&child);
        self.target.assign(item.clone(), &child);
        child.set(INDEX_KEY, index);
        self.registry.compile(&element, true).apply(&child)?;
        Ok((child, element))
    }

    /// Give `child` its own copies of the objects along a dotted target so
    /// that assigning the item never writes into an ancestor's data.
    fn own_target(&self, child: &Scope) {
        let Some((_, init)) = self.target.segments.split_last() else {
            return;
        };
        if child.has_own(&self.target.root) {
            return;
        }
        let mut level = shallow_copy(&child.get(&self.target.root));
        child.set(self.target.root.clone(), level.clone());
        for segment in init {
            let Segment::Name(name) = segment else {
                break;
            };
            let copy = shallow_copy(&level.get(name).unwrap_or_default());
            level.set(name.clone(), copy.clone());
            level = copy;
        }
    }

    /// Create the element for `item` and place it after `anchor`.
    fn insert(&self, scope: &Scope, item: Value, index: usize, anchor: &Node) -> Result<Slot, BindError> {
        let (child, element) = self.instantiate(scope, &item, index)?;
        self.container.insert_after(&element, anchor);
        Ok(Slot::Live {
            item,
            scope: child,
            element,
        })
    }

    /// Element of the nearest live slot before `index`, else the template.
    fn anchor(&self, slots: &[Slot]) -> Node {
        slots
            .iter()
            .rev()
            .find_map(|slot| match slot {
                Slot::Live { element, .. } => Some(element.clone()),
                _ => None,
            })
            .unwrap_or_else(|| self.template.clone())
    }

    fn reconcile(&self, scope: &Scope, items: &[Value], slots: &mut Vec<Slot>) -> Result<bool, BindError> {
        let len = items.len().max(slots.len());
        slots.resize_with(len, Slot::default);
        let mut changed = false;

        for index in 0..len {
            let item = items.get(index).cloned().unwrap_or_default();
            let absent = item.is_nullish();
            let anchor = self.anchor(&slots[..index]);

            match mem::take(&mut slots[index]) {
                Slot::Live { item: old, scope: child, element } if !absent && old.same(&item) => {
                    let result = child.update();
                    slots[index] = Slot::Live {
                        item: old,
                        scope: child,
                        element,
                    };
                    result?;
                }
                Slot::Live { element, .. } => {
                    debug!(index, "repeater slot removed");
                    self.container.remove_child(&element);
                    changed = true;
                    slots[index] = if absent {
                        Slot::Removed
                    } else {
                        self.insert(scope, item, index, &anchor)?
                    };
                }
                vacant if absent => slots[index] = vacant,
                _ => {
                    debug!(index, "repeater slot inserted");
                    slots[index] = self.insert(scope, item, index, &anchor)?;
                    changed = true;
                }
            }
        }

        slots.truncate(items.len());
        Ok(changed)
    }
}

impl Update for Repeater {
    fn update(&self) -> Result<(), BindError> {
        let Some(scope) = self.scope.upgrade() else {
            return Ok(());
        };
        let source = self.source.evaluate(&scope);

        let previous = self.state.borrow().source.clone();
        if !source.same(&previous) {
            self.rebuild(&scope, source)?;
            self.container.dispatch_event(CHANGE_EVENT);
            return Ok(());
        }

        let Some(items) = source.as_array().map(|array| array.to_vec()) else {
            return Ok(());
        };

        let mut slots = mem::take(&mut self.state.borrow_mut().slots);
        let result = self.reconcile(&scope, &items, &mut slots);
        self.state.borrow_mut().slots = slots;
        if result? {
            debug!(source = %self.source, "repeater changed");
            self.container.dispatch_event(CHANGE_EVENT);
        }
        Ok(())
    }
}
