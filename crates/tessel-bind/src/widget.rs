//! Widgets returned by directive factories.

use std::fmt;
use std::rc::Rc;

use crate::error::BindError;

/// Something that re-renders when its scope updates.
pub trait Update {
    fn update(&self) -> Result<(), BindError>;
}

impl<F> Update for F
where
    F: Fn() -> Result<(), BindError>,
{
    fn update(&self) -> Result<(), BindError> {
        self()
    }
}

/// What a directive factory hands back.
#[derive(Clone)]
pub enum Widget {
    /// Fire-and-forget directive; nothing to register on the scope.
    NoOp,
    Updatable(Rc<dyn Update>),
}

impl Widget {
    pub fn updatable<U: Update + 'static>(update: U) -> Self {
        Widget::Updatable(Rc::new(update))
    }

    pub fn from_fn<F>(update: F) -> Self
    where
        F: Fn() -> Result<(), BindError> + 'static,
    {
        Widget::Updatable(Rc::new(update))
    }

    pub fn update(&self) -> Result<(), BindError> {
        match self {
            Widget::NoOp => Ok(()),
            Widget::Updatable(widget) => widget.update(),
        }
    }

    pub fn is_noop(&self) -> bool {
        matches!(self, Widget::NoOp)
    }
}

impl fmt::Debug for Widget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Widget::NoOp => write!(f, "Widget::NoOp"),
            Widget::Updatable(_) => write!(f, "Widget::Updatable"),
        }
    }
}
