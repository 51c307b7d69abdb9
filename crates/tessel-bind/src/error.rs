//! Error types for binding templates to scopes.

use tessel_dom::MarkupError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BindError {
    #[error(transparent)]
    Expr(#[from] tessel_expr::Error),

    #[error(transparent)]
    Markup(#[from] MarkupError),

    #[error("Invalid JSON in `{attribute}`: {source}")]
    Json {
        attribute: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Reference error: {0}")]
    Reference(String),

    #[error("Type error: {0}")]
    Type(String),

    #[error("Directive `{0}` is already registered")]
    DuplicateDirective(String),

    #[error("Invalid directive selector `{0}`")]
    InvalidSelector(String),

    #[error("Invalid template: {0}")]
    Template(String),
}

impl BindError {
    pub fn reference(message: impl Into<String>) -> Self {
        BindError::Reference(message.into())
    }

    pub fn type_error(message: impl Into<String>) -> Self {
        BindError::Type(message.into())
    }

    pub fn json(attribute: impl Into<String>, source: serde_json::Error) -> Self {
        BindError::Json {
            attribute: attribute.into(),
            source,
        }
    }
}
