//! Load/save of boards and history through a storage collaborator.
//!
//! # Invariants
//! - Loading nothing (or a tree without projects) yields the seeded default
//!   tree, never an empty one.
//! - Save is a full replace; there is no diffing, merging or retry.
//! - Log lines carry counts only; task text and credentials never appear.

use crate::bridge::collaborator::{CollaboratorError, Credential, StorageCollaborator};
use crate::bridge::wire::{self, SchemaError};
use crate::model::board::{Board, Folder, Project};
use crate::model::history::{HistoryEntry, HistoryLog};
use crate::service::board_service::default_columns;
use log::{error, info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub const DEFAULT_FOLDER_ID: &str = "business";
pub const DEFAULT_PROJECT_ID: &str = "default-project";

/// Failures at the storage boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PersistenceError {
    /// Credential rejected. The caller must re-authenticate.
    Unauthorized,
    /// Storage unreachable or failed.
    Storage(String),
    /// Stored data is well-formed JSON but breaks the board schema.
    Schema(SchemaError),
    /// Stored data could not be decoded at all.
    Encoding(String),
}

impl PersistenceError {
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Unauthorized)
    }
}

impl Display for PersistenceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unauthorized => write!(f, "not authenticated"),
            Self::Storage(message) => write!(f, "storage failure: {message}"),
            Self::Schema(err) => write!(f, "{err}"),
            Self::Encoding(message) => write!(f, "encoding failure: {message}"),
        }
    }
}

impl Error for PersistenceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Schema(err) => Some(err),
            _ => None,
        }
    }
}

impl From<CollaboratorError> for PersistenceError {
    fn from(value: CollaboratorError) -> Self {
        match value {
            CollaboratorError::Unauthorized => Self::Unauthorized,
            CollaboratorError::Unavailable(message) | CollaboratorError::Server(message) => {
                Self::Storage(message)
            }
            CollaboratorError::Malformed(message) => Self::Encoding(message),
        }
    }
}

impl From<SchemaError> for PersistenceError {
    fn from(value: SchemaError) -> Self {
        Self::Schema(value)
    }
}

/// First-run tree: one expanded folder holding one project with the
/// default TODO / IN PROGRESS / DONE columns.
pub fn default_board() -> Board {
    let mut folder = Folder::new(DEFAULT_FOLDER_ID, "Business");
    folder
        .projects
        .push(Project::new(DEFAULT_PROJECT_ID, "My Project", default_columns()));
    Board {
        folders: vec![folder],
        uncategorized: Vec::new(),
    }
}

/// Storage boundary for one collaborator.
pub struct PersistenceBridge<C: StorageCollaborator> {
    collaborator: C,
}

impl<C: StorageCollaborator> PersistenceBridge<C> {
    pub fn new(collaborator: C) -> Self {
        Self { collaborator }
    }

    pub fn collaborator(&self) -> &C {
        &self.collaborator
    }

    /// Loads the caller's board, falling back to [`default_board`].
    pub fn load(&self, credential: &Credential, now_ms: i64) -> Result<Board, PersistenceError> {
        let stored = self
            .collaborator
            .fetch_board(credential)
            .inspect_err(|err| {
                warn!("event=board_load module=bridge status=error error={err}");
            })?;

        let Some(dto) = stored else {
            info!("event=board_load module=bridge status=ok source=default reason=missing");
            return Ok(default_board());
        };
        let has_projects = dto
            .folders
            .iter()
            .any(|folder| !folder.projects.is_empty())
            || !dto.uncategorized.is_empty();
        if !has_projects {
            info!("event=board_load module=bridge status=ok source=default reason=no_projects");
            return Ok(default_board());
        }

        let board = wire::to_board(dto, now_ms).map_err(|err| {
            error!("event=board_load module=bridge status=error error={err}");
            PersistenceError::from(err)
        })?;
        info!(
            "event=board_load module=bridge status=ok source=stored folders={} projects={}",
            board.folders.len(),
            board.project_count()
        );
        Ok(board)
    }

    /// Replaces the caller's stored board with `board`.
    pub fn save(&self, credential: &Credential, board: &Board) -> Result<(), PersistenceError> {
        let dto = wire::from_board(board);
        self.collaborator
            .replace_board(credential, &dto)
            .inspect_err(|err| {
                warn!("event=board_save module=bridge status=error error={err}");
            })?;
        info!(
            "event=board_save module=bridge status=ok projects={}",
            board.project_count()
        );
        Ok(())
    }

    pub fn load_history(&self, credential: &Credential) -> Result<HistoryLog, PersistenceError> {
        let document = self.collaborator.fetch_history(credential)?;
        let log = wire::history_from_document(document)?;
        info!(
            "event=board_load module=bridge status=ok kind=history entries={}",
            log.len()
        );
        Ok(log)
    }

    pub fn append_history(
        &self,
        credential: &Credential,
        project_id: &str,
        entry: &HistoryEntry,
    ) -> Result<(), PersistenceError> {
        let dto = wire::history_entry_to_dto(entry);
        self.collaborator
            .append_history(credential, project_id, &dto)
            .inspect_err(|err| {
                warn!(
                    "event=history_append module=bridge status=error project_id={} error={err}",
                    project_id
                );
            })?;
        info!(
            "event=history_append module=bridge status=ok project_id={project_id} task_id={}",
            entry.id
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::wire::{BoardDto, HistoryDocument, HistoryEntryDto};
    use std::cell::RefCell;

    #[derive(Default)]
    struct MemoryCollaborator {
        board: RefCell<Option<BoardDto>>,
        history: RefCell<HistoryDocument>,
        unauthorized: bool,
    }

    impl StorageCollaborator for MemoryCollaborator {
        fn fetch_board(
            &self,
            _credential: &Credential,
        ) -> Result<Option<BoardDto>, CollaboratorError> {
            if self.unauthorized {
                return Err(CollaboratorError::Unauthorized);
            }
            Ok(self.board.borrow().clone())
        }

        fn replace_board(
            &self,
            _credential: &Credential,
            board: &BoardDto,
        ) -> Result<(), CollaboratorError> {
            if self.unauthorized {
                return Err(CollaboratorError::Unauthorized);
            }
            *self.board.borrow_mut() = Some(board.clone());
            Ok(())
        }

        fn append_history(
            &self,
            _credential: &Credential,
            project_id: &str,
            entry: &HistoryEntryDto,
        ) -> Result<(), CollaboratorError> {
            self.history
                .borrow_mut()
                .entry(project_id.to_string())
                .or_default()
                .push(entry.clone());
            Ok(())
        }

        fn fetch_history(
            &self,
            _credential: &Credential,
        ) -> Result<HistoryDocument, CollaboratorError> {
            Ok(self.history.borrow().clone())
        }
    }

    fn credential() -> Credential {
        Credential::new("token")
    }

    #[test]
    fn missing_or_empty_data_loads_default_tree() {
        let bridge = PersistenceBridge::new(MemoryCollaborator::default());
        assert_eq!(bridge.load(&credential(), 0).unwrap(), default_board());

        *bridge.collaborator().board.borrow_mut() = Some(BoardDto::default());
        assert_eq!(bridge.load(&credential(), 0).unwrap(), default_board());
    }

    #[test]
    fn save_then_load_round_trips() {
        let bridge = PersistenceBridge::new(MemoryCollaborator::default());
        let mut board = default_board();
        board.folders[0].expanded = false;
        bridge.save(&credential(), &board).unwrap();
        assert_eq!(bridge.load(&credential(), 0).unwrap(), board);
    }

    #[test]
    fn unauthorized_maps_to_persistence_unauthorized() {
        let bridge = PersistenceBridge::new(MemoryCollaborator {
            unauthorized: true,
            ..MemoryCollaborator::default()
        });
        let err = bridge.load(&credential(), 0).unwrap_err();
        assert!(err.is_unauthorized());
    }

    #[test]
    fn credential_debug_is_redacted() {
        assert_eq!(format!("{:?}", credential()), "Credential(<redacted>)");
    }
}
