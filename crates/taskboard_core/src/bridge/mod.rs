//! Persistence bridge between the board tree and storage.
//!
//! # Responsibility
//! - Own the only path across the storage boundary.
//! - Normalize and validate stored data on the way in.
//!
//! # Invariants
//! - Nothing outside this module sees wire DTOs or collaborator errors.
//!
//! # See also
//! - `crate::repo::board_store` for the SQLite collaborator.

pub mod collaborator;
pub mod persistence;
pub mod wire;

pub use collaborator::{CollaboratorError, Credential, StorageCollaborator};
pub use persistence::{default_board, PersistenceBridge, PersistenceError};
pub use wire::{BoardDto, HistoryDocument, HistoryEntryDto, SchemaError};
