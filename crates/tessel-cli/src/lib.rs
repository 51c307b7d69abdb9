/// tessel renderer
///
/// Reads a template file, seeds a root scope from JSON data and prints the
/// bound markup.

pub mod driver;
pub mod error;

pub use driver::{parse_override, RenderOptions, RenderOutput, Renderer};
pub use error::{RenderError, Result};
