use thiserror::Error;
use weft_signals::ListError;

#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("markup error at byte {offset}: {message}")]
    Markup { offset: usize, message: String },
    #[error("template has {expected} holes but {found} values were given")]
    ArityMismatch { expected: usize, found: usize },
    #[error("unknown control key `weft:{0}`")]
    UnknownControl(String),
    #[error("`weft:ref` expects a NodeRef")]
    InvalidRef,
    #[error("`{name}` cannot be bound to {found}")]
    InvalidBinding { name: String, found: &'static str },
    #[error("value #{0} in tag position is not a component")]
    NotAComponent(usize),
    #[error("component `{0}` is not registered with this renderer")]
    UnregisteredComponent(String),
    #[error("interpolation inside attribute name `{0}`")]
    MarkerInAttributeName(String),
    #[error("node is not tracked by this slot")]
    NotTracked,
    #[error("renderer was dropped")]
    RendererGone,
    #[error(transparent)]
    List(#[from] ListError),
}

/// Failure reported by an exit task. The node is detached anyway.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("exit task failed: {0}")]
pub struct ExitError(pub String);
