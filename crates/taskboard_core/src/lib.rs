//! Core logic for the task board.
//! This crate is the single source of truth for board invariants.

pub mod bridge;
pub mod clock;
pub mod config;
pub mod db;
pub mod dnd;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;
pub mod session;
pub mod sweep;
pub mod view;

pub use bridge::{
    default_board, CollaboratorError, Credential, PersistenceBridge, PersistenceError,
    SchemaError, StorageCollaborator,
};
pub use clock::{Clock, FixedClock, SystemClock};
pub use config::{BoardConfig, ConfigError};
pub use logging::{default_log_level, init_from_config, init_logging, logging_status, LoggingError};
pub use model::board::{
    Board, Column, ContainerRef, EntityId, Folder, Priority, Project, Task, TreeInvariantError,
};
pub use model::history::{HistoryEntry, HistoryLog};
pub use repo::board_store::{SqliteBoardStore, StoreError, StoreResult, DEFAULT_SESSION_TTL_MS};
pub use service::board_service::{
    BoardService, Change, EntityRef, MutationError, TaskDraft, TaskPatch,
};
pub use service::reorder::{InsertPosition, InsertionAnchor, ReorderError};
pub use service::selection::ProjectSelection;
pub use session::{BoardSession, ClickModifier, Notice};
pub use sweep::{RetentionSweeper, SweepError, SweepReport};

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
