//! Storage collaborator contract.
//!
//! # Responsibility
//! - Describe the load/save/history calls the board needs from storage.
//! - Carry the bearer credential on every call.
//!
//! # Invariants
//! - `replace_board` is a full replace of the caller's structural data.
//! - History is append-only on the collaborator side as well.
//! - An invalid or expired credential always yields `Unauthorized`.

use crate::bridge::wire::{BoardDto, HistoryDocument, HistoryEntryDto};
use std::error::Error;
use std::fmt::{Debug, Display, Formatter};

/// Bearer credential resolved to a user by the collaborator.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn token(&self) -> &str {
        &self.0
    }
}

impl Debug for Credential {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str("Credential(<redacted>)")
    }
}

/// Failures reported by a storage collaborator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CollaboratorError {
    /// Credential missing, unknown or expired.
    Unauthorized,
    /// Storage could not be reached.
    Unavailable(String),
    /// Storage reached but the call failed.
    Server(String),
    /// Stored payload could not be decoded.
    Malformed(String),
}

impl Display for CollaboratorError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unauthorized => write!(f, "unauthorized"),
            Self::Unavailable(message) => write!(f, "storage unavailable: {message}"),
            Self::Server(message) => write!(f, "storage error: {message}"),
            Self::Malformed(message) => write!(f, "malformed stored payload: {message}"),
        }
    }
}

impl Error for CollaboratorError {}

/// Per-user board storage.
pub trait StorageCollaborator {
    /// Stored board, or `None` when the user has never saved one.
    fn fetch_board(&self, credential: &Credential) -> Result<Option<BoardDto>, CollaboratorError>;

    /// Replaces the user's whole board.
    fn replace_board(
        &self,
        credential: &Credential,
        board: &BoardDto,
    ) -> Result<(), CollaboratorError>;

    fn append_history(
        &self,
        credential: &Credential,
        project_id: &str,
        entry: &HistoryEntryDto,
    ) -> Result<(), CollaboratorError>;

    fn fetch_history(&self, credential: &Credential) -> Result<HistoryDocument, CollaboratorError>;
}

impl<T: StorageCollaborator + ?Sized> StorageCollaborator for &T {
    fn fetch_board(&self, credential: &Credential) -> Result<Option<BoardDto>, CollaboratorError> {
        (**self).fetch_board(credential)
    }

    fn replace_board(
        &self,
        credential: &Credential,
        board: &BoardDto,
    ) -> Result<(), CollaboratorError> {
        (**self).replace_board(credential, board)
    }

    fn append_history(
        &self,
        credential: &Credential,
        project_id: &str,
        entry: &HistoryEntryDto,
    ) -> Result<(), CollaboratorError> {
        (**self).append_history(credential, project_id, entry)
    }

    fn fetch_history(&self, credential: &Credential) -> Result<HistoryDocument, CollaboratorError> {
        (**self).fetch_history(credential)
    }
}
