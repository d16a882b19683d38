//! Core use-case services.
//!
//! # Responsibility
//! - Apply board mutations on top of the domain model.
//! - Keep session and UI layers free of tree-walking details.
//!
//! # See also
//! - `crate::session` for the persistence-aware wrapper.

pub mod board_service;
pub mod reorder;
pub mod selection;
