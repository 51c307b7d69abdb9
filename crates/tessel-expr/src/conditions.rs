//! Attribute conditions: `cond: attr=value, attr=value; !cond2: attr=value`.

use std::cell::RefCell;
use std::collections::BTreeMap;

use crate::cursor::split_top_level;
use crate::error::Error;
use crate::lookup::Lookup;
use crate::path::Getter;
use crate::value::Value;
use crate::Result;

/// One `cond: attr=value, ...` clause, bound to its scope.
#[derive(Debug)]
pub struct AttrCondition<L> {
    negated: bool,
    condition: Getter,
    attributes: Vec<(String, Getter)>,
    cached: RefCell<BTreeMap<String, Value>>,
    scope: L,
}

impl<L: Lookup> AttrCondition<L> {
    /// Evaluate the condition.
    ///
    /// When it passes, the attribute values are re-evaluated and cached as a
    /// side effect; a failing check leaves the cache untouched.
    pub fn check(&self) -> bool {
        let passed = self.condition.evaluate(&self.scope).to_bool() != self.negated;
        if passed {
            let values = self
                .attributes
                .iter()
                .map(|(name, getter)| (name.clone(), getter.evaluate(&self.scope)))
                .collect();
            *self.cached.borrow_mut() = values;
        }
        passed
    }

    /// Attribute values cached by the last passing [`check`](Self::check).
    pub fn attributes(&self) -> BTreeMap<String, Value> {
        self.cached.borrow().clone()
    }

    /// Names of the attributes this clause controls.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.attributes.iter().map(|(name, _)| name.as_str())
    }

    pub fn is_negated(&self) -> bool {
        self.negated
    }
}

/// Parse an attribute condition list bound to `scope`.
pub fn parse_attr_conditions<L: Lookup + Clone>(expr: &str, scope: L) -> Result<Vec<AttrCondition<L>>> {
    let mut conditions = Vec::new();
    for clause in split_top_level(expr, ';') {
        if clause.trim().is_empty() {
            continue;
        }
        let (head, body) = split_clause(clause).ok_or_else(|| Error::parse(expr, "expected `condition: attr=value`"))?;

        let head = head.trim();
        let (negated, cond_src) = match head.strip_prefix('!') {
            Some(rest) => (true, rest.trim_start()),
            None => (false, head),
        };
        let condition = Getter::parse(cond_src)?;

        let mut attributes = Vec::new();
        for assignment in split_top_level(body, ',') {
            if assignment.trim().is_empty() {
                continue;
            }
            let (name, value) = assignment
                .split_once('=')
                .ok_or_else(|| Error::parse(expr, format!("expected `attr=value`, found `{}`", assignment.trim())))?;
            let name = name.trim();
            if !is_attribute_name(name) {
                return Err(Error::parse(expr, format!("invalid attribute name `{}`", name)));
            }
            attributes.push((name.to_string(), Getter::parse(value.trim())?));
        }

        conditions.push(AttrCondition {
            negated,
            condition,
            attributes,
            cached: RefCell::new(BTreeMap::new()),
            scope: scope.clone(),
        });
    }
    Ok(conditions)
}

/// Split `cond: body` at the first top-level `:` that is followed by
/// whitespace (identifiers may themselves contain `:`), falling back to the
/// first top-level `:`.
fn split_clause(clause: &str) -> Option<(&str, &str)> {
    let parts = split_top_level(clause, ':');
    if parts.len() < 2 {
        return None;
    }
    let mut offset = 0;
    for part in &parts[..parts.len() - 1] {
        offset += part.len();
        let rest = &clause[offset + 1..];
        if rest.is_empty() || rest.starts_with(char::is_whitespace) {
            return Some((&clause[..offset], rest));
        }
        offset += 1;
    }
    let first = parts[0].len();
    Some((&clause[..first], &clause[first + 1..]))
}

fn is_attribute_name(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_' || c == ':')
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | ':' | '.' | '-'))
}
