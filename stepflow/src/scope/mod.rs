//! Hierarchical variable scope and reference resolution.
//!
//! A [`Scope`] is a chain of frames searched child-to-root. Loop iterations
//! push a frame and pop it when the iteration ends, so inner bindings shadow
//! outer ones only while the iteration runs.

mod expr;
mod frame;

pub use expr::{escape, Expr, Reference, Segment, TemplatePart};
pub use frame::{Frame, Scope};
