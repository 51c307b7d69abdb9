//! Directive registry.
//!
//! Definitions are kept in registration order, which is also match priority:
//! the first definition whose selector matches an element wins.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use tessel_dom::Node;
use tessel_expr::Value;
use tracing::debug;

use crate::error::BindError;
use crate::scope::Scope;
use crate::template::Template;
use crate::widget::Widget;

/// Creates the widget for one matched element.
pub type Factory = Rc<dyn Fn(&Binding<'_>) -> Result<Widget, BindError>>;

/// A named value transform used by text bindings (`{{ name | upper }}`).
pub type Filter = Rc<dyn Fn(Value) -> Value>;

/// Initializes a freshly forked controller scope.
pub type Controller = Rc<dyn Fn(&Scope) -> Result<(), BindError>>;

/// Everything a factory gets to see about the element it was matched on.
pub struct Binding<'a> {
    pub element: &'a Node,
    /// Attribute value for attribute directives; `None` for element ones.
    pub data: Option<String>,
    pub scope: &'a Scope,
    pub registry: &'a Registry,
}

impl Binding<'_> {
    pub fn data(&self) -> &str {
        self.data.as_deref().unwrap_or_default()
    }
}

/// What makes a definition match an element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Trigger {
    /// Tag name.
    Element(String),
    /// Attribute presence, or an exact value with `@name=value`.
    Attribute { name: String, value: Option<String> },
}

impl Trigger {
    /// Parse a registration name: `@attr`, `@attr=value` or a tag name.
    pub fn parse(selector: &str) -> Result<Trigger, BindError> {
        let invalid = || BindError::InvalidSelector(selector.to_string());
        match selector.strip_prefix('@') {
            Some(rest) => {
                let (name, value) = match rest.split_once('=') {
                    Some((name, value)) => (name, Some(value.to_string())),
                    None => (rest, None),
                };
                if !is_selector_name(name) {
                    return Err(invalid());
                }
                Ok(Trigger::Attribute {
                    name: name.to_ascii_lowercase(),
                    value,
                })
            }
            None if is_selector_name(selector) => Ok(Trigger::Element(selector.to_ascii_lowercase())),
            None => Err(invalid()),
        }
    }

    /// Directive data when `element` matches, `None` otherwise.
    fn matches(&self, element: &Node) -> Option<Option<String>> {
        match self {
            Trigger::Element(tag) => (element.tag() == Some(tag.as_str())).then_some(None),
            Trigger::Attribute { name, value } => {
                let found = element.attribute(name)?;
                match value {
                    Some(expected) if *expected != found => None,
                    _ => Some(Some(found)),
                }
            }
        }
    }
}

fn is_selector_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | ':' | '.'))
}

/// One registered directive.
#[derive(Clone)]
pub struct Definition {
    pub name: String,
    pub trigger: Trigger,
    pub factory: Factory,
    /// Container directives bind their own subtree.
    pub container: bool,
}

impl fmt::Debug for Definition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Definition")
            .field("name", &self.name)
            .field("trigger", &self.trigger)
            .field("container", &self.container)
            .finish()
    }
}

/// A definition matched against an element.
pub(crate) struct Matched {
    pub name: String,
    pub factory: Factory,
    pub data: Option<String>,
    pub container: bool,
}

#[derive(Default)]
struct RegistryData {
    definitions: RefCell<Vec<Definition>>,
    filters: RefCell<HashMap<String, Filter>>,
    controllers: RefCell<HashMap<String, Controller>>,
}

/// Shared handle to the directive, filter and controller tables.
#[derive(Clone, Default)]
pub struct Registry(Rc<RegistryData>);

impl Registry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with the stock directives and filters installed.
    pub fn with_defaults() -> Result<Self, BindError> {
        let registry = Self::new();
        crate::directives::install(&registry)?;
        Ok(registry)
    }

    /// Register a non-container directive.
    pub fn register<F>(&self, name: &str, factory: F) -> Result<(), BindError>
    where
        F: Fn(&Binding<'_>) -> Result<Widget, BindError> + 'static,
    {
        self.define(name, Rc::new(factory), false)
    }

    /// Register a directive that binds its own subtree.
    pub fn register_container<F>(&self, name: &str, factory: F) -> Result<(), BindError>
    where
        F: Fn(&Binding<'_>) -> Result<Widget, BindError> + 'static,
    {
        self.define(name, Rc::new(factory), true)
    }

    /// Add a definition at the lowest priority.
    ///
    /// Fails if a definition with the same trigger is already registered.
    pub fn define(&self, name: &str, factory: Factory, container: bool) -> Result<(), BindError> {
        let trigger = Trigger::parse(name)?;
        let mut definitions = self.0.definitions.borrow_mut();
        if definitions.iter().any(|d| d.trigger == trigger) {
            return Err(BindError::DuplicateDirective(name.to_string()));
        }
        debug!(directive = name, container, "register directive");
        definitions.push(Definition {
            name: name.to_string(),
            trigger,
            factory,
            container,
        });
        Ok(())
    }

    /// Factory registered under exactly `name`.
    pub fn lookup(&self, name: &str) -> Option<Factory> {
        let trigger = Trigger::parse(name).ok()?;
        self.0
            .definitions
            .borrow()
            .iter()
            .find(|d| d.trigger == trigger)
            .map(|d| Rc::clone(&d.factory))
    }

    pub fn definitions(&self) -> Vec<Definition> {
        self.0.definitions.borrow().clone()
    }

    pub(crate) fn match_element(&self, element: &Node) -> Option<Matched> {
        if !element.is_element() {
            return None;
        }
        self.0.definitions.borrow().iter().find_map(|d| {
            d.trigger.matches(element).map(|data| Matched {
                name: d.name.clone(),
                factory: Rc::clone(&d.factory),
                data,
                container: d.container,
            })
        })
    }

    pub fn register_filter<F>(&self, name: &str, filter: F)
    where
        F: Fn(Value) -> Value + 'static,
    {
        self.0
            .filters
            .borrow_mut()
            .insert(name.to_string(), Rc::new(filter));
    }

    pub fn filter(&self, name: &str) -> Result<Filter, BindError> {
        self.0
            .filters
            .borrow()
            .get(name)
            .cloned()
            .ok_or_else(|| BindError::reference(format!("filter `{}` is not defined", name)))
    }

    pub fn register_controller<F>(&self, name: &str, controller: F)
    where
        F: Fn(&Scope) -> Result<(), BindError> + 'static,
    {
        self.0
            .controllers
            .borrow_mut()
            .insert(name.to_string(), Rc::new(controller));
    }

    /// Resolve a controller by name.
    ///
    /// Registered controllers come first. Otherwise `name` is read from
    /// `scope`: a function is called with the new scope as its context, any
    /// other defined value is a type error and a missing one a reference
    /// error.
    pub fn controller(&self, name: &str, scope: &Scope) -> Result<Controller, BindError> {
        if let Some(controller) = self.0.controllers.borrow().get(name) {
            return Ok(Rc::clone(controller));
        }
        match scope.get(name) {
            Value::Function(function) => Ok(Rc::new(move |scope: &Scope| -> Result<(), BindError> {
                function.call(scope, &[])?;
                Ok(())
            })),
            Value::Undefined => Err(BindError::reference(format!("controller `{}` is not defined", name))),
            other => Err(BindError::type_error(format!(
                "controller `{}` is a {}, not a function",
                name,
                other.type_name()
            ))),
        }
    }

    /// Compile the subtree at `root` into a reusable [`Template`].
    pub fn compile(&self, root: &Node, include_root: bool) -> Template {
        Template::new(self.clone(), root.clone(), include_root)
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("definitions", &*self.0.definitions.borrow())
            .field("filters", &self.0.filters.borrow().len())
            .field("controllers", &self.0.controllers.borrow().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop(_: &Binding<'_>) -> Result<Widget, BindError> {
        Ok(Widget::NoOp)
    }

    #[test]
    fn test_trigger_parse() {
        assert_eq!(Trigger::parse("Tabs").unwrap(), Trigger::Element("tabs".to_string()));
        assert_eq!(
            Trigger::parse("@t-bind").unwrap(),
            Trigger::Attribute { name: "t-bind".to_string(), value: None }
        );
        assert_eq!(
            Trigger::parse("@type=checkbox").unwrap(),
            Trigger::Attribute { name: "type".to_string(), value: Some("checkbox".to_string()) }
        );
        assert!(matches!(Trigger::parse("@"), Err(BindError::InvalidSelector(_))));
        assert!(matches!(Trigger::parse("a b"), Err(BindError::InvalidSelector(_))));
    }

    #[test]
    fn test_duplicate_registration_is_rejected() {
        let registry = Registry::new();
        registry.register("@t-x", noop).unwrap();
        registry.register("t-x", noop).unwrap();
        assert!(matches!(registry.register("@t-x", noop), Err(BindError::DuplicateDirective(name)) if name == "@t-x"));
        assert_eq!(registry.definitions().len(), 2);
    }

    #[test]
    fn test_lookup_by_kind_and_name() {
        let registry = Registry::new();
        registry.register("@t-x", noop).unwrap();
        assert!(registry.lookup("@t-x").is_some());
        assert!(registry.lookup("t-x").is_none());
        assert!(registry.lookup("@t-y").is_none());
    }

    #[test]
    fn test_first_registered_match_wins() {
        let registry = Registry::new();
        registry.register("@a", noop).unwrap();
        registry.register_container("@b", noop).unwrap();
        registry.register("@type=checkbox", noop).unwrap();

        let element = Node::element("input");
        element.set_attribute("b", "1");
        element.set_attribute("a", "2");
        let matched = registry.match_element(&element).unwrap();
        assert_eq!(matched.name, "@a");
        assert_eq!(matched.data.as_deref(), Some("2"));
        assert!(!matched.container);

        element.remove_attribute("a");
        assert!(registry.match_element(&element).unwrap().container);

        let checkbox = Node::element("input");
        checkbox.set_attribute("type", "text");
        assert!(registry.match_element(&checkbox).is_none());
        checkbox.set_attribute("type", "checkbox");
        assert_eq!(registry.match_element(&checkbox).unwrap().name, "@type=checkbox");
    }

    #[test]
    fn test_controller_resolution() {
        let registry = Registry::new();
        registry.register_controller("Registered", |scope| {
            scope.set("from", "registry");
            Ok(())
        });
        let scope = Scope::new(Node::element("div"));
        scope.set(
            "InScope",
            Value::function(|context, _| {
                context.assign("from", Value::from("scope"));
                Ok(Value::Undefined)
            }),
        );
        scope.set("NotCallable", 3);

        registry.controller("Registered", &scope).unwrap()(&scope).unwrap();
        assert_eq!(scope.get("from"), Value::from("registry"));
        registry.controller("InScope", &scope).unwrap()(&scope).unwrap();
        assert_eq!(scope.get("from"), Value::from("scope"));

        assert!(matches!(registry.controller("Missing", &scope), Err(BindError::Reference(_))));
        assert!(matches!(registry.controller("NotCallable", &scope), Err(BindError::Type(_))));
    }

    #[test]
    fn test_unknown_filter() {
        let registry = Registry::new();
        registry.register_filter("shout", |v| Value::from(v.to_display_string().to_uppercase()));
        assert_eq!(registry.filter("shout").unwrap()(Value::from("hi")), Value::from("HI"));
        assert!(matches!(registry.filter("nope"), Err(BindError::Reference(_))));
    }
}
