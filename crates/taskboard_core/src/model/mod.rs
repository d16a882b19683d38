//! Board domain model.
//!
//! # Responsibility
//! - Define canonical in-memory structures used by core business logic.
//! - Keep read accessors pure; mutation lives in `service`.
//!
//! # Invariants
//! - Every project lives in exactly one container.
//! - History entries are immutable once appended.

pub mod board;
pub mod history;
