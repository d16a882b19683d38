//! Repository layer: concrete storage collaborators.
//!
//! # Responsibility
//! - Keep SQL details out of the bridge and session layers.
//!
//! # Invariants
//! - Repositories refuse connections whose schema is not fully migrated.

pub mod board_store;
