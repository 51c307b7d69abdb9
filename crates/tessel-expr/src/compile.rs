//! Full expressions: `[setter =] getter [(args)]`.

use crate::cursor::Cursor;
use crate::error::Error;
use crate::lookup::Lookup;
use crate::path::{parse_getter, Getter, Path};
use crate::value::Value;
use crate::Result;

/// A parsed expression, reusable against any lookup target.
#[derive(Debug, Clone, PartialEq)]
pub struct Expression {
    source: String,
    setter: Option<Path>,
    getter: Getter,
    args: Option<Vec<Getter>>,
}

impl Expression {
    /// Parse `source`.
    ///
    /// Fails with [`Error::Parse`] when the text does not follow the grammar or
    /// when the left-hand side of `=` is not a property path.
    pub fn parse(source: &str) -> Result<Expression> {
        let mut cursor = Cursor::new(source);
        let first = parse_getter(&mut cursor).map_err(|msg| Error::parse(source, msg))?;
        cursor.skip_whitespace();

        let (setter, getter) = if cursor.eat('=') {
            let Getter::Path(target) = first else {
                return Err(Error::parse(source, "left-hand side of `=` is not a property path"));
            };
            let body = parse_getter(&mut cursor).map_err(|msg| Error::parse(source, msg))?;
            cursor.skip_whitespace();
            (Some(target), body)
        } else {
            (None, first)
        };

        let args = if cursor.eat('(') {
            let args = parse_args(&mut cursor).map_err(|msg| Error::parse(source, msg))?;
            cursor.skip_whitespace();
            Some(args)
        } else {
            None
        };

        if !cursor.is_eof() {
            return Err(Error::parse(source, format!("unexpected `{}`", cursor.rest())));
        }

        Ok(Expression {
            source: source.to_string(),
            setter,
            getter,
            args,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn setter(&self) -> Option<&Path> {
        self.setter.as_ref()
    }

    pub fn getter(&self) -> &Getter {
        &self.getter
    }

    /// Whether the expression ends in a call suffix.
    pub fn is_call(&self) -> bool {
        self.args.is_some()
    }

    /// Evaluate the getter, invoke it if there is a call suffix, then write
    /// the result through the setter if there is one.
    pub fn evaluate(&self, scope: &dyn Lookup) -> Result<Value> {
        let mut result = self.getter.evaluate(scope);

        if let Some(args) = &self.args {
            let values: Vec<Value> = args.iter().map(|arg| arg.evaluate(scope)).collect();
            result = match &result {
                Value::Function(func) => func.call(scope, &values)?,
                other => {
                    return Err(Error::type_error(format!(
                        "`{}` is not a function ({})",
                        self.getter,
                        other.type_name()
                    )))
                }
            };
        }

        if let Some(setter) = &self.setter {
            setter.assign(result.clone(), scope);
        }

        Ok(result)
    }
}

fn parse_args(cursor: &mut Cursor<'_>) -> std::result::Result<Vec<Getter>, String> {
    let mut args = Vec::new();
    cursor.skip_whitespace();
    if cursor.eat(')') {
        return Ok(args);
    }
    loop {
        args.push(parse_getter(cursor)?);
        cursor.skip_whitespace();
        if cursor.eat(',') {
            continue;
        }
        if cursor.eat(')') {
            return Ok(args);
        }
        return Err("expected `,` or `)` in argument list".to_string());
    }
}

/// An expression bound to the lookup target it was compiled against.
#[derive(Debug, Clone)]
pub struct Evaluator<L> {
    expression: Expression,
    scope: L,
}

impl<L: Lookup> Evaluator<L> {
    /// Run the expression once.
    pub fn call(&self) -> Result<Value> {
        self.expression.evaluate(&self.scope)
    }

    pub fn expression(&self) -> &Expression {
        &self.expression
    }

    pub fn scope(&self) -> &L {
        &self.scope
    }
}

/// Compile `source` into an evaluator bound to `scope`.
pub fn compile<L: Lookup>(source: &str, scope: L) -> Result<Evaluator<L>> {
    Ok(Evaluator {
        expression: Expression::parse(source)?,
        scope,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::path::evaluate_getter;
    use crate::value::{Array, Object};

    #[test]
    fn test_setter_round_trip() {
        let scope = Object::new();
        scope.set("c", 5);
        let eval = compile("a.b = c", &scope).unwrap();
        assert_eq!(eval.call().unwrap(), Value::from(5));
        assert_eq!(evaluate_getter("a.b", &scope).unwrap(), Value::from(5));
    }

    #[test]
    fn test_plain_getter_returns_value() {
        let scope = Object::new();
        scope.set("name", "Ann");
        assert_eq!(compile("name", &scope).unwrap().call().unwrap(), Value::from("Ann"));
        assert_eq!(compile("  missing ", &scope).unwrap().call().unwrap(), Value::Undefined);
    }

    #[test]
    fn test_call_with_arguments_and_context() {
        let scope = Object::new();
        scope.set("base", 10);
        scope.set(
            "add",
            Value::function(|ctx, args| {
                let base = match ctx.resolve("base") {
                    Value::Number(n) => n,
                    _ => 0.0,
                };
                let sum: f64 = args
                    .iter()
                    .map(|a| if let Value::Number(n) = a { *n } else { 0.0 })
                    .sum();
                Ok(Value::Number(base + sum))
            }),
        );
        scope.set("x", 2);
        let eval = compile("total = add(x, 3, 'ignored')", &scope).unwrap();
        assert_eq!(eval.call().unwrap(), Value::from(15));
        assert_eq!(scope.get("total"), Some(Value::from(15)));
    }

    #[test]
    fn test_call_argument_with_nested_commas() {
        let scope = Object::new();
        scope.set("pair", Value::from(vec![Value::from("l"), Value::from("r")]));
        scope.set("count", Value::function(|_, args| Ok(Value::from(args.len()))));
        let eval = compile("count(pair[1], 'a,b')", &scope).unwrap();
        assert_eq!(eval.call().unwrap(), Value::from(2));
        assert_eq!(compile("count()", &scope).unwrap().call().unwrap(), Value::from(0));
    }

    #[test]
    fn test_call_mutating_shared_list() {
        let list = Array::new(vec![Value::from("a"), Value::from("b")]);
        let scope = Object::new();
        scope.set("items", list.clone());
        scope.set(
            "remove",
            Value::function(|ctx, args| {
                if let (Value::Array(items), Some(item)) = (ctx.resolve("items"), args.first()) {
                    if let Some(i) = items.position(item) {
                        items.remove(i);
                    }
                }
                Ok(Value::Undefined)
            }),
        );
        compile("remove('a')", &scope).unwrap().call().unwrap();
        assert_eq!(list.to_vec(), vec![Value::from("b")]);
    }

    #[test]
    fn test_calling_non_function_is_type_error() {
        let scope = Object::new();
        scope.set("n", 1);
        assert!(matches!(compile("n()", &scope).unwrap().call(), Err(Error::Type(_))));
        assert!(matches!(compile("nothing()", &scope).unwrap().call(), Err(Error::Type(_))));
    }

    #[test]
    fn test_thrown_errors_propagate() {
        let scope = Object::new();
        scope.set("fail", Value::function(|_, _| Err(Error::thrown("boom"))));
        assert_eq!(compile("fail()", &scope).unwrap().call(), Err(Error::thrown("boom")));
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(Expression::parse("'x' = y"), Err(Error::Parse { .. })));
        assert!(matches!(Expression::parse("a = "), Err(Error::Parse { .. })));
        assert!(matches!(Expression::parse("f(a"), Err(Error::Parse { .. })));
        assert!(matches!(Expression::parse("a = b = c"), Err(Error::Parse { .. })));
        assert!(matches!(Expression::parse("f(a) b"), Err(Error::Parse { .. })));
    }

    #[test]
    fn test_expression_is_reusable_across_scopes() {
        let expr = Expression::parse("greeting").unwrap();
        let first = Object::new();
        first.set("greeting", "hi");
        let second = Object::new();
        second.set("greeting", "yo");
        assert_eq!(expr.evaluate(&first).unwrap(), Value::from("hi"));
        assert_eq!(expr.evaluate(&second).unwrap(), Value::from("yo"));
        assert!(!expr.is_call());
        assert_eq!(expr.source(), "greeting");
    }
}
