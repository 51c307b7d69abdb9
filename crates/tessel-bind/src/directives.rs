//! Stock directives installed by [`Registry::with_defaults`].

use std::collections::BTreeMap;
use std::rc::Rc;

use tessel_dom::{Event, Node, BIND_ATTR, FILTERS_ATTR, PATTERN_ATTR};
use tessel_expr::{fill_pattern, parse_attr_conditions, Expression, Getter, Value};
use tracing::{trace, warn};

use crate::error::BindError;
use crate::registry::{Binding, Filter, Registry};
use crate::repeater;
use crate::scope::WeakScope;
use crate::widget::Widget;

pub const CONTROLLER_ATTR: &str = "t-controller";
pub const REPEAT_ATTR: &str = "t-repeat";
pub const ATTRS_ATTR: &str = "t-attrs";
pub const VALUE_ATTR: &str = "t-value";
pub const CLICK_ATTR: &str = "t-click";

/// Register the stock directives, in priority order, and filters.
pub fn install(registry: &Registry) -> Result<(), BindError> {
    registry.register_container(&format!("@{CONTROLLER_ATTR}"), controller)?;
    registry.register_container(&format!("@{REPEAT_ATTR}"), repeater::factory)?;
    registry.register(&format!("@{BIND_ATTR}"), bind_text)?;
    registry.register(&format!("@{PATTERN_ATTR}"), bind_patterns)?;
    registry.register(&format!("@{ATTRS_ATTR}"), bind_conditions)?;
    registry.register(&format!("@{VALUE_ATTR}"), bind_value)?;
    registry.register(&format!("@{CLICK_ATTR}"), on_click)?;

    registry.register_filter("upper", |v| Value::from(v.to_display_string().to_uppercase()));
    registry.register_filter("lower", |v| Value::from(v.to_display_string().to_lowercase()));
    registry.register_filter("trim", |v| Value::from(v.to_display_string().trim().to_string()));
    registry.register_filter("json", |v| Value::from(v.to_json_value().to_string()));
    Ok(())
}

/// `t-controller="Name"`: fork a scope, run the controller on it and bind
/// the element's children to it.
fn controller(binding: &Binding<'_>) -> Result<Widget, BindError> {
    let name = binding.data().trim();
    let controller = binding.registry.controller(name, binding.scope)?;
    let child = binding.scope.child(binding.element.clone());
    controller(&child)?;
    binding.registry.compile(binding.element, false).apply(&child)?;
    Ok(Widget::from_fn(move || child.update()))
}

/// `t-bind="expr"`: element text follows the getter, piped through
/// `t-filters`.
fn bind_text(binding: &Binding<'_>) -> Result<Widget, BindError> {
    let getter = Getter::parse(binding.data())?;
    let filters: Vec<Filter> = binding
        .element
        .attribute(FILTERS_ATTR)
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(|name| binding.registry.filter(name))
        .collect::<Result<_, _>>()?;

    let element = binding.element.clone();
    let scope = binding.scope.downgrade();
    let render = move || -> Result<(), BindError> {
        let value = filters
            .iter()
            .fold(getter.evaluate(&scope), |value, filter| filter(value));
        let text = value.to_display_string();
        if element.text_content() != text {
            trace!(getter = %getter, text = %text, "text binding");
            element.set_text_content(text);
        }
        Ok(())
    };
    render()?;
    Ok(Widget::from_fn(render))
}

/// `t-attr='{"href": "/u/{{id}}"}'`: attributes follow their patterns.
fn bind_patterns(binding: &Binding<'_>) -> Result<Widget, BindError> {
    let patterns: BTreeMap<String, String> =
        serde_json::from_str(binding.data()).map_err(|source| BindError::json(PATTERN_ATTR, source))?;

    let element = binding.element.clone();
    let scope = binding.scope.downgrade();
    let render = move || -> Result<(), BindError> {
        for (name, pattern) in &patterns {
            let value = fill_pattern(pattern, &scope)?;
            if element.attribute(name).as_deref() != Some(value.as_str()) {
                element.set_attribute(name, value);
            }
        }
        Ok(())
    };
    render()?;
    Ok(Widget::from_fn(render))
}

/// `t-attrs="done: class='done'; !done: class='open'"`.
///
/// Attributes named by failing conditions are removed first, then passing
/// conditions write their values, so a passing clause wins over a failing
/// one that names the same attribute.
fn bind_conditions(binding: &Binding<'_>) -> Result<Widget, BindError> {
    let conditions = parse_attr_conditions(binding.data(), binding.scope.downgrade())?;
    let element = binding.element.clone();
    let render = move || -> Result<(), BindError> {
        let mut passed = Vec::new();
        for condition in &conditions {
            if condition.check() {
                passed.push(condition.attributes());
            } else {
                for name in condition.names() {
                    element.remove_attribute(name);
                }
            }
        }
        for attributes in passed {
            for (name, value) in attributes {
                write_attribute(&element, &name, &value);
            }
        }
        Ok(())
    };
    render()?;
    Ok(Widget::from_fn(render))
}

/// `false`, `null` and `undefined` remove the attribute; `true` sets it
/// empty, as a boolean attribute.
fn write_attribute(element: &Node, name: &str, value: &Value) {
    match value {
        Value::Undefined | Value::Null | Value::Bool(false) => {
            element.remove_attribute(name);
        }
        Value::Bool(true) => element.set_attribute(name, ""),
        other => element.set_attribute(name, other.to_display_string()),
    }
}

/// `t-value="path"`: two-way binding on the `value` attribute.
///
/// `input` and `change` events write the field value back to the path and
/// update the scope.
fn bind_value(binding: &Binding<'_>) -> Result<Widget, BindError> {
    let getter = Getter::parse(binding.data())?;
    let path = getter
        .as_path()
        .cloned()
        .ok_or_else(|| BindError::type_error(format!("`{}` cannot be assigned", binding.data())))?;

    let scope = binding.scope.downgrade();
    for event in ["input", "change"] {
        let scope = scope.clone();
        let path = path.clone();
        binding.element.add_event_listener(
            event,
            Rc::new(move |e: &Event| {
                let value = e.target().attribute("value").unwrap_or_default();
                path.assign(Value::from(value), &scope);
                refresh(&scope, e.event_type());
            }),
        );
    }

    let element = binding.element.clone();
    let render = move || -> Result<(), BindError> {
        let text = getter.evaluate(&scope).to_display_string();
        if element.attribute("value").as_deref() != Some(text.as_str()) {
            element.set_attribute("value", text);
        }
        Ok(())
    };
    render()?;
    Ok(Widget::from_fn(render))
}

/// `t-click="expr"`: evaluate the expression on click, then update the scope.
fn on_click(binding: &Binding<'_>) -> Result<Widget, BindError> {
    let expression = Expression::parse(binding.data())?;
    let scope = binding.scope.downgrade();
    binding.element.add_event_listener(
        "click",
        Rc::new(move |e: &Event| {
            if let Err(error) = expression.evaluate(&scope) {
                warn!(expr = expression.source(), %error, "click handler failed");
                return;
            }
            refresh(&scope, e.event_type());
        }),
    );
    Ok(Widget::NoOp)
}

/// DOM listeners cannot return errors, so failures are logged.
fn refresh(scope: &WeakScope, event: &str) {
    if let Some(scope) = scope.upgrade() {
        if let Err(error) = scope.update() {
            warn!(event, %error, "update after DOM event failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scope::Scope;
    use crate::template::bootstrap_with;
    use pretty_assertions::assert_eq;
    use tessel_dom::parse_element;
    use tessel_expr::{Array, Object};

    fn render(html: &str, data: Object) -> (Node, Scope) {
        let root = parse_element(html).unwrap();
        let registry = Registry::with_defaults().unwrap();
        let scope = bootstrap_with(&root, &registry, data).unwrap();
        (root, scope)
    }

    #[test]
    fn test_text_binding_with_filters() {
        let data = Object::new();
        data.set("title", "  hello ");
        let (root, scope) = render("<h1>{{ title | trim | upper }}!</h1>", data);
        assert_eq!(root.text_content(), "HELLO!");
        scope.set("title", Value::Undefined);
        scope.update().unwrap();
        assert_eq!(root.text_content(), "!");
    }

    #[test]
    fn test_unknown_filter_is_a_reference_error() {
        let root = parse_element("<p>{{ x | nope }}</p>").unwrap();
        let registry = Registry::with_defaults().unwrap();
        assert!(matches!(
            bootstrap_with(&root, &registry, Object::new()),
            Err(BindError::Reference(_))
        ));
    }

    #[test]
    fn test_attribute_patterns() {
        let data = Object::new();
        data.set("id", 7);
        let (root, scope) = render(r#"<a href="/u/{{id}}" title="user {{id}}">x</a>"#, data);
        assert_eq!(root.attribute("href").as_deref(), Some("/u/7"));
        assert_eq!(root.attribute("title").as_deref(), Some("user 7"));
        scope.set("id", 8);
        scope.update().unwrap();
        assert_eq!(root.attribute("href").as_deref(), Some("/u/8"));
    }

    #[test]
    fn test_attribute_conditions() {
        let data = Object::new();
        data.set("done", false);
        let (root, scope) = render(r#"<li t-attrs="done: class='done', data-x=1; !done: class='open'">x</li>"#, data);
        assert_eq!(root.attribute("class").as_deref(), Some("open"));
        assert_eq!(root.attribute("data-x"), None);

        scope.set("done", true);
        scope.update().unwrap();
        assert_eq!(root.attribute("class").as_deref(), Some("done"));
        assert_eq!(root.attribute("data-x").as_deref(), Some("1"));
    }

    #[test]
    fn test_value_binding_round_trip() {
        let data = Object::new();
        let form = Object::new();
        form.set("name", "Ann");
        data.set("form", form.clone());
        let (root, _scope) = render(
            r#"<div><input t-value="form.name"><span t-bind="form.name"></span></div>"#,
            data,
        );
        let input = root.first_element_child().unwrap();
        assert_eq!(input.attribute("value").as_deref(), Some("Ann"));

        input.set_attribute("value", "Bea");
        input.dispatch_event("input");
        assert_eq!(form.get("name"), Some(Value::from("Bea")));
        assert_eq!(root.text_content(), "Bea");
    }

    #[test]
    fn test_click_invokes_expression_and_updates() {
        let data = Object::new();
        data.set("count", 0);
        data.set(
            "bump",
            Value::function(|context, _| {
                let next = match context.resolve("count") {
                    Value::Number(n) => n + 1.0,
                    _ => 1.0,
                };
                context.assign("count", Value::from(next));
                Ok(Value::Undefined)
            }),
        );
        let (root, _scope) = render(r#"<div><button t-click="bump()">+</button><b>{{count}}</b></div>"#, data.clone());
        let button = root.first_element_child().unwrap();
        button.dispatch_event("click");
        button.dispatch_event("click");
        assert_eq!(data.get("count"), Some(Value::from(2)));
        assert_eq!(root.element_children()[1].text_content(), "2");
    }

    #[test]
    fn test_controller_forks_and_binds_children() {
        let root = parse_element(r#"<main><section t-controller="Todo"><p>{{heading}}</p></section><p>{{heading}}</p></main>"#).unwrap();
        let registry = Registry::with_defaults().unwrap();
        registry.register_controller("Todo", |scope| {
            scope.set("heading", "inner");
            Ok(())
        });
        let data = Object::new();
        data.set("heading", "outer");
        let scope = bootstrap_with(&root, &registry, data).unwrap();
        assert_eq!(root.text_content(), "innerouter");
        assert_eq!(scope.get("heading"), Value::from("outer"));
    }

    #[test]
    fn test_missing_controller() {
        let root = parse_element(r#"<main t-controller="Nope"></main>"#).unwrap();
        let registry = Registry::with_defaults().unwrap();
        assert!(matches!(
            bootstrap_with(&root, &registry, Object::new()),
            Err(BindError::Reference(_))
        ));
    }

    #[test]
    fn test_repeat_with_click_removal() {
        let data = Object::new();
        let todos = Array::new(vec![Value::from("a"), Value::from("b"), Value::from("c")]);
        data.set("todos", todos.clone());
        let list = todos.clone();
        data.set(
            "remove",
            Value::function(move |_, args| {
                if let Some(index) = args.first().and_then(|item| list.position(item)) {
                    list.remove(index);
                }
                Ok(Value::Undefined)
            }),
        );
        let (root, scope) = render(
            r#"<ul t-repeat="todo in todos"><li t-click="remove(todo)">{{todo}}</li></ul>"#,
            data,
        );
        let items: Vec<Node> = root.element_children();
        assert_eq!(items.len(), 4);

        items[2].dispatch_event("click");
        // the item scope updated, the repeater did not
        assert_eq!(todos.len(), 2);
        scope.update().unwrap();
        let texts: Vec<String> = root
            .element_children()
            .iter()
            .skip(1)
            .map(|li| li.text_content())
            .collect();
        assert_eq!(texts, vec!["a", "c"]);
    }
}
