//! Template rendering for the Weft engine.
//!
//! Templates are string literals with `{}` holes, built with [`xml!`] or
//! [`html!`]. A [`Renderer`] compiles each literal once, instantiates it into
//! its [`dom::DomTree`] and binds every hole: plain values are written once,
//! cells and lists from `weft-signals` keep their region of the tree live
//! through [`slot::Slot`]s, and prefixed attributes (`on:`, `prop:`, `call:`,
//! `weft:`) are routed through a [`NamespaceTable`].

pub mod component;
pub mod content;
pub mod dom;
pub mod error;
pub mod mutations;
pub mod namespace;
pub mod renderer;
mod scope;
pub mod slot;
pub mod template;

pub use component::{Component, ComponentTag, Host, element_name};
pub use content::{
    Bindable, Content, DynCell, DynList, ExitFn, ExitFuture, Interp, NodeRef, View, handler,
    handler_with, on_created, on_exit, pending,
};
pub use dom::{Dom, DomTree, Event, ListenerOptions, NodeId, dispatch};
pub use error::{ExitError, TemplateError};
pub use mutations::Mutation;
pub use namespace::{BindContext, NamespaceHandler, NamespaceTable};
pub use renderer::{Profiling, Renderer, WeakRenderer};
pub use slot::{Slot, SlotList, SlotState};
pub use template::{Mode, Template};
