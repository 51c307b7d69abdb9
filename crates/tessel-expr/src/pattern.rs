//! `{{expr}}` interpolation and the `item in items` loop grammar.

use std::ops::Range;
use std::sync::LazyLock;

use regex::Regex;

use crate::error::Error;
use crate::lookup::Lookup;
use crate::path::{Getter, Path};
use crate::Result;

/// `{{ getter }}` inside free-form text.
static INTERPOLATION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{\s*(.+?)\s*\}\}").expect("valid interpolation regex"));

/// `{{ getter | filter | filter }}` inside text nodes.
static FILTERED_INTERPOLATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{\{\s*([^|}]+?)\s*((?:\|\s*[A-Za-z$_][\w$]*\s*)*)\}\}")
        .expect("valid filtered interpolation regex")
});

static FILTER_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[A-Za-z$_][\w$]*").expect("valid filter name regex"));

/// Fast path: `ident in ident`.
static KEY_LOOP_SIMPLE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*([A-Za-z$_:][\w$:]*)\s+in\s+([A-Za-z$_:][\w$:]*)\s*$")
        .expect("valid key loop regex")
});

/// Fallback: `path in path`.
static KEY_LOOP_FULL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*(\S.*?)\s+in\s+(\S.*?)\s*$").expect("valid key loop regex"));

/// One `{{ ... }}` occurrence found in a text node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Interpolation {
    /// Byte range of the whole `{{ ... }}` markup.
    pub range: Range<usize>,
    /// The getter expression, trimmed.
    pub expr: String,
    /// Filter names in application order.
    pub filters: Vec<String>,
}

/// Find the first interpolation (with optional `| filter` chain) in `text`.
pub fn find_interpolation(text: &str) -> Option<Interpolation> {
    let caps = FILTERED_INTERPOLATION.captures(text)?;
    let whole = caps.get(0)?;
    let filters = caps
        .get(2)
        .map(|m| {
            FILTER_NAME
                .find_iter(m.as_str())
                .map(|f| f.as_str().to_string())
                .collect()
        })
        .unwrap_or_default();
    Some(Interpolation {
        range: whole.range(),
        expr: caps[1].trim().to_string(),
        filters,
    })
}

/// Whether `text` contains any `{{ ... }}` markup.
pub fn contains_interpolation(text: &str) -> bool {
    INTERPOLATION.is_match(text)
}

/// Replace every `{{getter}}` in `pattern` with its evaluated value.
///
/// Undefined and null values render as the empty string. Only getters are
/// supported: no filters, setters or calls.
pub fn fill_pattern(pattern: &str, scope: &dyn Lookup) -> Result<String> {
    let mut out = String::with_capacity(pattern.len());
    let mut last = 0;
    for caps in INTERPOLATION.captures_iter(pattern) {
        let whole = caps.get(0).expect("group 0 always matches");
        out.push_str(&pattern[last..whole.start()]);
        let value = Getter::parse(&caps[1])?.evaluate(scope);
        out.push_str(&value.to_display_string());
        last = whole.end();
    }
    out.push_str(&pattern[last..]);
    Ok(out)
}

/// The two sides of `item in items`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyLoop {
    /// Getter for the sequence (`items`).
    pub source: String,
    /// Name each item is bound to (`item`).
    pub target: String,
}

/// Parse `"item in items"`.
///
/// Both sides may also be full paths (`row.cells in table[$i].rows`).
pub fn parse_key_loop_expression(expr: &str) -> Result<KeyLoop> {
    if let Some(caps) = KEY_LOOP_SIMPLE.captures(expr) {
        return Ok(KeyLoop {
            source: caps[2].to_string(),
            target: caps[1].to_string(),
        });
    }

    let caps = KEY_LOOP_FULL
        .captures(expr)
        .ok_or_else(|| Error::parse(expr, "expected `item in items`"))?;
    let target = Path::parse(&caps[1])?;
    let source = Path::parse(&caps[2])?;
    Ok(KeyLoop {
        source: source.to_string(),
        target: target.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::{Object, Value};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_fill_pattern() {
        let scope = Object::new();
        scope.set("name", "Ann");
        assert_eq!(fill_pattern("Hello {{name}}!", &scope).unwrap(), "Hello Ann!");
        assert_eq!(fill_pattern("Hello {{ nobody }}!", &scope).unwrap(), "Hello !");
        assert_eq!(fill_pattern("no markup", &scope).unwrap(), "no markup");
    }

    #[test]
    fn test_fill_pattern_multiple_and_nested() {
        let scope = Object::new();
        scope.set("user", Value::from_json(r#"{"first": "A", "n": 3}"#).unwrap());
        assert_eq!(
            fill_pattern("item-{{user.first}}-{{user.n}}", &scope).unwrap(),
            "item-A-3"
        );
    }

    #[test]
    fn test_fill_pattern_rejects_calls() {
        let scope = Object::new();
        assert!(matches!(fill_pattern("{{ f() }}", &scope), Err(Error::Parse { .. })));
    }

    #[test]
    fn test_find_interpolation_with_filters() {
        let found = find_interpolation("A {{ title | upper | trim }} B").unwrap();
        assert_eq!(found.expr, "title");
        assert_eq!(found.filters, vec!["upper".to_string(), "trim".to_string()]);
        assert_eq!(&"A {{ title | upper | trim }} B"[found.range.clone()], "{{ title | upper | trim }}");

        let plain = find_interpolation("{{x}}").unwrap();
        assert_eq!(plain.expr, "x");
        assert!(plain.filters.is_empty());
        assert_eq!(find_interpolation("none here"), None);
    }

    #[test]
    fn test_key_loop_simple() {
        assert_eq!(
            parse_key_loop_expression("todo in todos").unwrap(),
            KeyLoop {
                source: "todos".to_string(),
                target: "todo".to_string()
            }
        );
    }

    #[test]
    fn test_key_loop_paths() {
        let parsed = parse_key_loop_expression("  cell in table.rows[$i] ").unwrap();
        assert_eq!(parsed.source, "table.rows[$i]");
        assert_eq!(parsed.target, "cell");
    }

    #[test]
    fn test_key_loop_errors() {
        assert!(matches!(parse_key_loop_expression("todos"), Err(Error::Parse { .. })));
        assert!(matches!(parse_key_loop_expression("'x' in todos"), Err(Error::Parse { .. })));
    }
}
