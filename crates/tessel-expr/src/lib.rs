//! Expression language for tessel templates.
//!
//! Expressions are small: a getter path (`user.name`, `rows[$i].id`), an
//! optional `setter =` prefix and an optional `(args)` call suffix. They are
//! evaluated against anything implementing [`Lookup`], which is how scopes
//! expose their variables. Missing properties never raise errors; they
//! resolve to [`Value::Undefined`].

mod compile;
mod conditions;
mod cursor;
mod error;
mod lookup;
mod path;
mod pattern;
mod value;

pub use compile::{compile, Evaluator, Expression};
pub use conditions::{parse_attr_conditions, AttrCondition};
pub use error::Error;
pub use lookup::Lookup;
pub use path::{assign, evaluate_getter, Getter, Path, Segment};
pub use pattern::{
    contains_interpolation, fill_pattern, find_interpolation, parse_key_loop_expression,
    Interpolation, KeyLoop,
};
pub use value::{Array, Function, Object, Value};

/// Result type for expression operations.
pub type Result<T> = std::result::Result<T, Error>;
