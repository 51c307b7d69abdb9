//! Error types for markup reading and normalization.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum MarkupError {
    #[error("Unterminated {what} at byte {offset}")]
    Unterminated { what: &'static str, offset: usize },

    #[error("Expected exactly one root element, found {0} top-level nodes")]
    RootCount(usize),

    #[error("Invalid pattern map on <{tag}>: {source}")]
    PatternMap {
        tag: String,
        #[source]
        source: serde_json::Error,
    },
}
