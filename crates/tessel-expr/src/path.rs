//! Getter paths: parsing, evaluation and assignment.
//!
//! A getter is either a literal (`'text'`, `"text"`, `42`) or a path: a
//! first-level identifier followed by `.name` and `[subexpr]` segments.
//! Bracketed segments are getters themselves and are evaluated against the
//! top-level scope, not against the value being traversed.

use std::fmt;

use tracing::warn;

use crate::cursor::Cursor;
use crate::error::Error;
use crate::lookup::Lookup;
use crate::value::{Object, Value};
use crate::Result;

/// A parsed getter expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Getter {
    /// A string or integer literal.
    Literal(Value),
    /// A property path.
    Path(Path),
}

/// A property path such as `todos[$i].title`.
#[derive(Debug, Clone, PartialEq)]
pub struct Path {
    pub root: String,
    pub segments: Vec<Segment>,
}

/// One level below the root of a [`Path`].
#[derive(Debug, Clone, PartialEq)]
pub enum Segment {
    /// `.name`
    Name(String),
    /// `[getter]`
    Computed(Box<Getter>),
}

pub(crate) fn is_ident_start(ch: char) -> bool {
    ch.is_ascii_alphabetic() || matches!(ch, '$' | '_' | ':')
}

pub(crate) fn is_ident_char(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || matches!(ch, '$' | '_' | ':')
}

impl Getter {
    /// Parse a complete getter expression.
    pub fn parse(src: &str) -> Result<Getter> {
        let mut cursor = Cursor::new(src);
        let getter = parse_getter(&mut cursor).map_err(|msg| Error::parse(src, msg))?;
        cursor.skip_whitespace();
        if !cursor.is_eof() {
            return Err(Error::parse(src, format!("unexpected `{}`", cursor.rest())));
        }
        Ok(getter)
    }

    /// Evaluate against `scope`. Never fails: unresolvable paths yield
    /// `Value::Undefined`.
    pub fn evaluate(&self, scope: &dyn Lookup) -> Value {
        match self {
            Getter::Literal(value) => value.clone(),
            Getter::Path(path) => path.evaluate(scope),
        }
    }

    pub fn as_path(&self) -> Option<&Path> {
        match self {
            Getter::Path(path) => Some(path),
            Getter::Literal(_) => None,
        }
    }
}

impl Path {
    /// Parse a complete path; literals are rejected.
    pub fn parse(src: &str) -> Result<Path> {
        match Getter::parse(src)? {
            Getter::Path(path) => Ok(path),
            Getter::Literal(_) => Err(Error::parse(src, "expected a property path, found a literal")),
        }
    }

    pub fn evaluate(&self, scope: &dyn Lookup) -> Value {
        let mut current = scope.resolve(&self.root);
        for segment in &self.segments {
            let Some(key) = segment.key(scope) else {
                return Value::Undefined;
            };
            match current.member(&key) {
                Some(next) => current = next,
                None => return Value::Undefined,
            }
        }
        current
    }

    /// Write `value` at this path, creating empty objects for missing
    /// intermediate levels.
    ///
    /// Silently does nothing when a computed key resolves to nothing or an
    /// intermediate level is a primitive.
    pub fn assign(&self, value: Value, scope: &dyn Lookup) {
        let Some((last, init)) = self.segments.split_last() else {
            scope.assign(&self.root, value);
            return;
        };

        let mut current = scope.resolve(&self.root);
        if current.is_nullish() {
            current = Value::from(Object::new());
            scope.assign(&self.root, current.clone());
        }

        for segment in init {
            let Some(key) = segment.key(scope) else {
                warn!(path = %self, "assignment skipped: computed key is undefined");
                return;
            };
            current = match current.member(&key) {
                Some(next) if !next.is_nullish() => next,
                _ => {
                    let fresh = Value::from(Object::new());
                    if !current.set_member(&key, fresh.clone()) {
                        warn!(path = %self, key = %key, "assignment skipped: level cannot hold members");
                        return;
                    }
                    fresh
                }
            };
        }

        match last.key(scope) {
            Some(key) => {
                if !current.set_member(&key, value) {
                    warn!(path = %self, key = %key, "assignment skipped: target cannot hold members");
                }
            }
            None => warn!(path = %self, "assignment skipped: computed key is undefined"),
        }
    }
}

impl Segment {
    fn key(&self, scope: &dyn Lookup) -> Option<String> {
        match self {
            Segment::Name(name) => Some(name.clone()),
            Segment::Computed(getter) => getter.evaluate(scope).to_key(),
        }
    }
}

impl fmt::Display for Getter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Getter::Literal(Value::String(s)) => write!(f, "'{}'", s),
            Getter::Literal(value) => write!(f, "{}", value),
            Getter::Path(path) => write!(f, "{}", path),
        }
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.root)?;
        for segment in &self.segments {
            match segment {
                Segment::Name(name) => write!(f, ".{}", name)?,
                Segment::Computed(getter) => write!(f, "[{}]", getter)?,
            }
        }
        Ok(())
    }
}

/// Parse one getter at the cursor. Leading whitespace is skipped; trailing
/// input is left for the caller.
pub(crate) fn parse_getter(cursor: &mut Cursor<'_>) -> std::result::Result<Getter, String> {
    cursor.skip_whitespace();
    match cursor.peek() {
        Some(quote @ ('\'' | '"')) => {
            cursor.bump();
            parse_string(cursor, quote).map(|s| Getter::Literal(Value::String(s)))
        }
        Some(ch) if ch.is_ascii_digit() => parse_integer(cursor, false),
        Some('-') if cursor.peek_second().is_some_and(|c| c.is_ascii_digit()) => {
            cursor.bump();
            parse_integer(cursor, true)
        }
        Some(ch) if is_ident_start(ch) => parse_path(cursor).map(Getter::Path),
        Some(ch) => Err(format!("expected a getter, found `{}`", ch)),
        None => Err("expected a getter, found end of input".to_string()),
    }
}

fn parse_string(cursor: &mut Cursor<'_>, quote: char) -> std::result::Result<String, String> {
    let mut text = String::new();
    loop {
        match cursor.bump() {
            Some('\\') => match cursor.bump() {
                Some(escaped) => text.push(escaped),
                None => return Err("unterminated string literal".to_string()),
            },
            Some(ch) if ch == quote => return Ok(text),
            Some(ch) => text.push(ch),
            None => return Err("unterminated string literal".to_string()),
        }
    }
}

fn parse_integer(cursor: &mut Cursor<'_>, negative: bool) -> std::result::Result<Getter, String> {
    let digits = cursor.take_while(|c| c.is_ascii_digit());
    if cursor.peek().is_some_and(is_ident_char) {
        return Err(format!("invalid number literal `{}{}`", digits, cursor.rest()));
    }
    let n: f64 = digits
        .parse()
        .map_err(|_| format!("invalid number literal `{}`", digits))?;
    Ok(Getter::Literal(Value::Number(if negative { -n } else { n })))
}

fn parse_path(cursor: &mut Cursor<'_>) -> std::result::Result<Path, String> {
    let first = cursor.bump().unwrap_or_default();
    let mut root = String::from(first);
    root.push_str(cursor.take_while(is_ident_char));

    let mut segments = Vec::new();
    loop {
        if cursor.eat('.') {
            let name = cursor.take_while(is_ident_char);
            if name.is_empty() {
                return Err("expected a property name after `.`".to_string());
            }
            segments.push(Segment::Name(name.to_string()));
        } else if cursor.eat('[') {
            let inner = parse_getter(cursor)?;
            cursor.skip_whitespace();
            if !cursor.eat(']') {
                return Err("expected `]`".to_string());
            }
            segments.push(Segment::Computed(Box::new(inner)));
        } else {
            break;
        }
    }
    Ok(Path { root, segments })
}

/// Evaluate a getter expression against `scope`.
///
/// Fails only when `expr` is malformed; missing properties yield
/// `Value::Undefined`.
pub fn evaluate_getter(expr: &str, scope: &dyn Lookup) -> Result<Value> {
    Ok(Getter::parse(expr)?.evaluate(scope))
}

/// Assign `value` at the path `expr`, creating missing intermediate objects.
pub fn assign(expr: &str, value: Value, scope: &dyn Lookup) -> Result<()> {
    Path::parse(expr)?.assign(value, scope);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn scope_from(json: &str) -> Object {
        Value::from_json(json).unwrap().as_object().unwrap().clone()
    }

    #[test]
    fn test_parse_path_segments() {
        let path = Path::parse("todos[$i].title").unwrap();
        assert_eq!(path.root, "todos");
        assert_eq!(
            path.segments,
            vec![
                Segment::Computed(Box::new(Getter::Path(Path {
                    root: "$i".to_string(),
                    segments: vec![],
                }))),
                Segment::Name("title".to_string()),
            ]
        );
        assert_eq!(path.to_string(), "todos[$i].title");
    }

    #[test]
    fn test_literals_short_circuit() {
        let scope = Object::new();
        assert_eq!(evaluate_getter("'hi there'", &scope).unwrap(), Value::from("hi there"));
        assert_eq!(evaluate_getter("\"q\"", &scope).unwrap(), Value::from("q"));
        assert_eq!(evaluate_getter("42", &scope).unwrap(), Value::from(42));
        assert_eq!(evaluate_getter("-3", &scope).unwrap(), Value::from(-3));
    }

    #[test]
    fn test_nested_value() {
        let scope = scope_from(r#"{"user": {"address": {"city": "Oslo"}}, "rows": [10, 20]}"#);
        assert_eq!(evaluate_getter("user.address.city", &scope).unwrap(), Value::from("Oslo"));
        assert_eq!(evaluate_getter("rows.1", &scope).unwrap(), Value::from(20));
        assert_eq!(evaluate_getter("rows.length", &scope).unwrap(), Value::from(2));
    }

    #[test]
    fn test_missing_segments_are_undefined() {
        let scope = scope_from(r#"{"user": {"name": null}}"#);
        assert_eq!(evaluate_getter("nobody.name", &scope).unwrap(), Value::Undefined);
        assert_eq!(evaluate_getter("user.address.city", &scope).unwrap(), Value::Undefined);
        assert_eq!(evaluate_getter("user.name.first", &scope).unwrap(), Value::Undefined);
        assert_eq!(evaluate_getter("user.name", &scope).unwrap(), Value::Null);
    }

    #[test]
    fn test_computed_segments_use_top_level_scope() {
        let scope = scope_from(r#"{"key": "b", "map": {"b": 2, "key": "wrong"}, "idx": {"n": 1}, "list": ["x", "y"]}"#);
        assert_eq!(evaluate_getter("map[key]", &scope).unwrap(), Value::from(2));
        assert_eq!(evaluate_getter("list[idx.n]", &scope).unwrap(), Value::from("y"));
        assert_eq!(evaluate_getter("map['b']", &scope).unwrap(), Value::from(2));
        assert_eq!(evaluate_getter("map[missing]", &scope).unwrap(), Value::Undefined);
    }

    #[test]
    fn test_malformed_getters() {
        let scope = Object::new();
        assert!(matches!(evaluate_getter("a.", &scope), Err(Error::Parse { .. })));
        assert!(matches!(evaluate_getter("a[b", &scope), Err(Error::Parse { .. })));
        assert!(matches!(evaluate_getter("'open", &scope), Err(Error::Parse { .. })));
        assert!(matches!(evaluate_getter("a b", &scope), Err(Error::Parse { .. })));
        assert!(matches!(evaluate_getter("", &scope), Err(Error::Parse { .. })));
    }

    #[test]
    fn test_assign_then_read_back() {
        let scope = Object::new();
        assign("a.b.c", Value::from(5), &scope).unwrap();
        assert_eq!(evaluate_getter("a.b.c", &scope).unwrap(), Value::from(5));

        assign("top", Value::from("t"), &scope).unwrap();
        assert_eq!(scope.get("top"), Some(Value::from("t")));
    }

    #[test]
    fn test_assign_with_computed_key() {
        let scope = scope_from(r#"{"field": "title", "item": {}}"#);
        assign("item[field]", Value::from("Done"), &scope).unwrap();
        assert_eq!(evaluate_getter("item.title", &scope).unwrap(), Value::from("Done"));
    }

    #[test]
    fn test_assign_is_silent_on_unresolved_key() {
        let scope = scope_from(r#"{"item": {}}"#);
        assign("item[nothing].x", Value::from(1), &scope).unwrap();
        assign("item[nothing]", Value::from(1), &scope).unwrap();
        assert_eq!(scope.get("item"), Some(Value::from(Object::new())));
    }

    #[test]
    fn test_assign_through_primitive_is_ignored() {
        let scope = scope_from(r#"{"count": 3}"#);
        assign("count.x.y", Value::from(1), &scope).unwrap();
        assert_eq!(scope.get("count"), Some(Value::from(3)));
    }

    #[test]
    fn test_assign_to_huge_index_is_ignored() {
        let scope = scope_from(r#"{"items": ["a"]}"#);
        assign("items.99999999999999999", Value::from(1), &scope).unwrap();
        assign("items[2]", Value::from(1), &scope).unwrap();
        assign("items.1", Value::from("b"), &scope).unwrap();
        assert_eq!(evaluate_getter("items.length", &scope).unwrap(), Value::from(2));
        assert_eq!(evaluate_getter("items.1", &scope).unwrap(), Value::from("b"));
    }

    #[test]
    fn test_assign_rejects_literal_target() {
        let scope = Object::new();
        assert!(matches!(assign("'x'", Value::Null, &scope), Err(Error::Parse { .. })));
    }
}
