/// Error types for the tessel renderer

use std::path::PathBuf;
use tessel_bind::BindError;
use tessel_dom::MarkupError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, RenderError>;

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("Cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Markup error in {file}: {source}")]
    Markup {
        file: PathBuf,
        #[source]
        source: MarkupError,
    },

    #[error("Invalid data in {file}: {source}")]
    Data {
        file: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Data file {0} must contain a JSON object")]
    DataNotObject(PathBuf),

    #[error("Invalid --set `{0}`: expected KEY=VALUE")]
    InvalidSet(String),

    #[error(transparent)]
    Expr(#[from] tessel_expr::Error),

    #[error(transparent)]
    Bind(#[from] BindError),
}

impl RenderError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        RenderError::Io {
            path: path.into(),
            source,
        }
    }
}
