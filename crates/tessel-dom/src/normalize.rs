//! Template normalization.
//!
//! Runs once over a static subtree before binding:
//!
//! 1. Every `{{expr | filter}}` in a text node becomes a `<span t-bind="expr"
//!    t-filters="filter">` placeholder, splitting the surrounding text.
//! 2. Every attribute whose value contains `{{...}}` is recorded in one
//!    consolidated `t-attr` JSON map on its element.
//!
//! Both rewrites are idempotent: normalizing normalized output changes nothing.

use serde_json::{Map, Value as JsonValue};
use tessel_expr::{contains_interpolation, find_interpolation};
use tracing::trace;

use crate::error::MarkupError;
use crate::node::Node;

/// Text binding directive carried by interpolation placeholders.
pub const BIND_ATTR: &str = "t-bind";

/// Comma-joined filter names applied by the text binding.
pub const FILTERS_ATTR: &str = "t-filters";

/// Consolidated `{attribute: pattern}` map for attribute interpolation.
pub const PATTERN_ATTR: &str = "t-attr";

/// Normalize the subtree rooted at `root`.
pub fn normalize(root: &Node) -> Result<(), MarkupError> {
    for text in root.text_nodes() {
        split_text_node(&text);
    }

    let mut result = Ok(());
    root.walk_elements(&mut |element| {
        if result.is_ok() {
            result = consolidate_attributes(element);
        }
    });
    result
}

fn split_text_node(node: &Node) {
    let Some(parent) = node.parent() else {
        return;
    };
    if parent
        .tag()
        .is_some_and(|tag| tag == "script" || tag == "style")
    {
        return;
    }

    loop {
        let text = node.text_content();
        let Some(found) = find_interpolation(&text) else {
            break;
        };
        let prefix = &text[..found.range.start];
        let suffix = &text[found.range.end..];

        let placeholder = Node::element("span");
        placeholder.set_attribute(BIND_ATTR, found.expr.as_str());
        if !found.filters.is_empty() {
            placeholder.set_attribute(FILTERS_ATTR, found.filters.join(","));
        }
        trace!(expr = %found.expr, filters = ?found.filters, "text interpolation");

        parent.insert_before(&placeholder, Some(node));
        if !prefix.is_empty() {
            parent.insert_before(&Node::text(prefix), Some(&placeholder));
        }

        if suffix.is_empty() {
            parent.remove_child(node);
            break;
        }
        node.set_text_content(suffix.to_string());
    }
}

fn consolidate_attributes(element: &Node) -> Result<(), MarkupError> {
    let found: Vec<(String, String)> = element
        .attributes()
        .into_iter()
        .filter(|(name, value)| name != PATTERN_ATTR && contains_interpolation(value))
        .collect();
    if found.is_empty() {
        return Ok(());
    }

    let tag = element.tag().unwrap_or_default().to_string();
    let mut map: Map<String, JsonValue> = match element.attribute(PATTERN_ATTR) {
        Some(existing) if !existing.trim().is_empty() => serde_json::from_str(&existing)
            .map_err(|source| MarkupError::PatternMap { tag: tag.clone(), source })?,
        _ => Map::new(),
    };
    for (name, pattern) in found {
        map.insert(name, JsonValue::String(pattern));
    }

    let encoded = serde_json::to_string(&map).map_err(|source| MarkupError::PatternMap { tag, source })?;
    element.set_attribute(PATTERN_ATTR, encoded);
    Ok(())
}
