//! Element tree for tessel templates.
//!
//! Provides shared [`Node`] handles with DOM-style mutation and events, a
//! lenient markup reader/writer, and [`normalize`], the single pre-pass that
//! rewrites `{{expr}}` markup into explicit bind directives.

mod error;
pub mod markup;
mod node;
mod normalize;

pub use error::MarkupError;
pub use markup::{parse_element, parse_fragment};
pub use node::{Event, EventListener, Node};
pub use normalize::{normalize, BIND_ATTR, FILTERS_ATTR, PATTERN_ATTR};
