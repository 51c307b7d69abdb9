//! Template traversal and bootstrap.

use tessel_dom::{normalize, Node};
use tessel_expr::Object;
use tracing::{debug, info};

use crate::error::BindError;
use crate::registry::{Binding, Registry};
use crate::scope::Scope;

/// Event emitted on a scope once its subtree is fully bound.
pub const READY_EVENT: &str = "ready";

/// A compiled subtree, applied to one scope at a time.
#[derive(Debug, Clone)]
pub struct Template {
    registry: Registry,
    root: Node,
    include_root: bool,
}

impl Template {
    pub(crate) fn new(registry: Registry, root: Node, include_root: bool) -> Self {
        Self {
            registry,
            root,
            include_root,
        }
    }

    pub fn root(&self) -> &Node {
        &self.root
    }

    /// Bind the subtree to `scope`, then emit `ready` on it.
    ///
    /// Every element is matched against the registry in priority order and
    /// the first match creates its widget. Children of container directives
    /// are left to the directive.
    pub fn apply(&self, scope: &Scope) -> Result<(), BindError> {
        if self.include_root {
            self.visit(&self.root, scope)?;
        } else {
            for child in self.root.element_children() {
                self.visit(&child, scope)?;
            }
        }
        scope.emit(READY_EVENT, &[])?;
        Ok(())
    }

    fn visit(&self, element: &Node, scope: &Scope) -> Result<(), BindError> {
        if let Some(matched) = self.registry.match_element(element) {
            debug!(
                directive = %matched.name,
                tag = element.tag().unwrap_or_default(),
                "directive matched"
            );
            let binding = Binding {
                element,
                data: matched.data,
                scope,
                registry: &self.registry,
            };
            let widget = (matched.factory)(&binding)?;
            if !widget.is_noop() {
                scope.add_widget(widget);
            }
            if matched.container {
                return Ok(());
            }
        }

        for child in element.element_children() {
            self.visit(&child, scope)?;
        }
        Ok(())
    }
}

/// Normalize `root` and bind it to a fresh root scope.
pub fn bootstrap(root: &Node, registry: &Registry) -> Result<Scope, BindError> {
    bootstrap_with(root, registry, Object::new())
}

/// Like [`bootstrap`], with `data` as the root scope's initial variables.
pub fn bootstrap_with(root: &Node, registry: &Registry, data: Object) -> Result<Scope, BindError> {
    normalize(root)?;
    let scope = Scope::with_vars(root.clone(), data);
    registry.compile(root, true).apply(&scope)?;
    info!(widgets = scope.widget_count(), "bootstrap complete");
    Ok(scope)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::widget::Widget;
    use pretty_assertions::assert_eq;
    use std::cell::{Cell, RefCell};
    use std::ops::ControlFlow;
    use std::rc::Rc;
    use tessel_dom::parse_element;

    fn recording_registry(log: &Rc<RefCell<Vec<String>>>) -> Registry {
        let registry = Registry::new();
        let seen = log.clone();
        registry
            .register("@mark", move |b| {
                seen.borrow_mut().push(b.data().to_string());
                Ok(Widget::NoOp)
            })
            .unwrap();
        let seen = log.clone();
        registry
            .register_container("@own", move |b| {
                seen.borrow_mut().push(format!("own:{}", b.data()));
                Ok(Widget::from_fn(|| Ok(())))
            })
            .unwrap();
        registry
    }

    #[test]
    fn test_depth_first_order_and_container_skip() {
        let root = parse_element(
            r#"<div mark="root"><p mark="a"><b mark="b"></b></p><ul own="x"><li mark="hidden"></li></ul><i mark="c"></i></div>"#,
        )
        .unwrap();
        let log = Rc::new(RefCell::new(Vec::new()));
        let registry = recording_registry(&log);
        let scope = Scope::new(root.clone());

        registry.compile(&root, true).apply(&scope).unwrap();
        assert_eq!(*log.borrow(), vec!["root", "a", "b", "own:x", "c"]);
        assert_eq!(scope.widget_count(), 1);

        log.borrow_mut().clear();
        registry.compile(&root, false).apply(&scope).unwrap();
        assert_eq!(*log.borrow(), vec!["a", "b", "own:x", "c"]);
    }

    #[test]
    fn test_one_directive_per_element() {
        let root = parse_element(r#"<div><p own="1" mark="2"><b mark="3"></b></p></div>"#).unwrap();
        let log = Rc::new(RefCell::new(Vec::new()));
        let registry = recording_registry(&log);
        registry.compile(&root, false).apply(&Scope::new(root.clone())).unwrap();
        assert_eq!(*log.borrow(), vec!["2", "3"]);
    }

    #[test]
    fn test_ready_fires_after_traversal() {
        let root = parse_element(r#"<div><p mark="a"></p></div>"#).unwrap();
        let log = Rc::new(RefCell::new(Vec::new()));
        let registry = recording_registry(&log);
        let scope = Scope::new(root.clone());
        let ready = Rc::new(Cell::new(0));
        let seen = log.clone();
        let count = ready.clone();
        scope.events().on(READY_EVENT, move |_| {
            assert_eq!(seen.borrow().len(), 1);
            count.set(count.get() + 1);
            Ok(ControlFlow::Continue(()))
        });
        registry.compile(&root, true).apply(&scope).unwrap();
        assert_eq!(ready.get(), 1);
    }

    #[test]
    fn test_factory_errors_propagate() {
        let root = parse_element(r#"<div><p bad=""></p></div>"#).unwrap();
        let registry = Registry::new();
        registry
            .register("@bad", |_| Err(BindError::reference("nope")))
            .unwrap();
        let result = bootstrap(&root, &registry);
        assert!(matches!(result, Err(BindError::Reference(_))));
    }

    #[test]
    fn test_bootstrap_normalizes_and_seeds_data() {
        let root = parse_element("<p>Hello {{name}}!</p>").unwrap();
        let data = Object::new();
        data.set("name", "Ann");
        let registry = Registry::with_defaults().unwrap();
        let scope = bootstrap_with(&root, &registry, data).unwrap();
        assert_eq!(root.text_content(), "Hello Ann!");
        scope.set("name", "Bob");
        scope.update().unwrap();
        assert_eq!(root.text_content(), "Hello Bob!");
    }
}
