//! Drag-and-drop support.
//!
//! # Responsibility
//! - Resolve pointer coordinates into drop targets without touching the tree.
//! - Track the single in-flight drag gesture.
//!
//! # Invariants
//! - Resolution is pure over a layout snapshot supplied by the caller.
//! - Ending a gesture always clears drag state, whether or not a drop happened.

pub mod drag_state;
pub mod resolver;
