//! Live binding of normalized templates to data.
//!
//! [`bootstrap`] normalizes an element tree, creates the root [`Scope`] and
//! walks the tree once, asking the [`Registry`] for the first directive that
//! matches each element. Directives return [`Widget`]s that the scope keeps
//! and re-runs on every [`Scope::update`]. Nothing re-renders on its own:
//! updates are pushed by whoever changed the data.

pub mod collab;
pub mod directives;
mod emitter;
mod error;
pub mod repeater;
mod registry;
mod scope;
mod template;
mod widget;

pub use emitter::{EventEmitter, Listener, ListenerId};
pub use error::BindError;
pub use registry::{Binding, Controller, Definition, Factory, Filter, Registry, Trigger};
pub use repeater::Repeater;
pub use scope::{Scope, WatchHandler, WeakScope};
pub use template::{bootstrap, bootstrap_with, Template, READY_EVENT};
pub use widget::{Update, Widget};
