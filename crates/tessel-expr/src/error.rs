//! Error types for expression parsing and evaluation.

use thiserror::Error;

/// Errors raised while parsing or invoking an expression.
///
/// Missing properties are not errors; only malformed grammar and invalid
/// invocations are.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error("Parse error in `{expr}`: {message}")]
    Parse { expr: String, message: String },

    #[error("Type error: {0}")]
    Type(String),

    #[error("Reference error: {0}")]
    Reference(String),

    /// Raised by native functions invoked from an expression.
    #[error("{0}")]
    Thrown(String),
}

impl Error {
    pub fn parse(expr: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Parse {
            expr: expr.into(),
            message: message.into(),
        }
    }

    pub fn type_error(message: impl Into<String>) -> Self {
        Error::Type(message.into())
    }

    pub fn reference(message: impl Into<String>) -> Self {
        Error::Reference(message.into())
    }

    pub fn thrown(message: impl Into<String>) -> Self {
        Error::Thrown(message.into())
    }
}
