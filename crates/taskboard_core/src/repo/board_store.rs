//! SQLite-backed storage collaborator.
//!
//! # Responsibility
//! - Resolve bearer tokens to users, honoring session expiry.
//! - Store one JSON board document per user, replaced wholesale on save.
//! - Append history rows per user and project.
//!
//! # Invariants
//! - Every collaborator call resolves the credential first; unknown or
//!   expired tokens yield `Unauthorized` and touch nothing.
//! - History rows are insert-only (an update trigger aborts).
//! - History is read back in insertion order.

use crate::bridge::collaborator::{CollaboratorError, Credential, StorageCollaborator};
use crate::bridge::wire::{BoardDto, HistoryDocument, HistoryEntryDto};
use crate::clock::{Clock, SystemClock};
use crate::db::migrations::latest_version;
use crate::db::DbError;
use log::{info, warn};
use rusqlite::{params, Connection, OptionalExtension};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Default bearer session lifetime: 7 days.
pub const DEFAULT_SESSION_TTL_MS: i64 = 7 * 24 * 60 * 60 * 1000;

const REQUIRED_TABLES: &[&str] = &["users", "sessions", "board_documents", "history_entries"];

pub type StoreResult<T> = Result<T, StoreError>;

/// Errors from local store administration calls.
#[derive(Debug)]
pub enum StoreError {
    /// Underlying SQLite/bootstrap error.
    Db(DbError),
    /// Connection schema is not at the expected migrated version.
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    /// Required table is missing.
    MissingRequiredTable(&'static str),
    /// Username is blank.
    BlankUsername,
    DuplicateUsername(String),
    UnknownUser(String),
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "board store requires schema version {expected_version}, got {actual_version}"
            ),
            Self::MissingRequiredTable(table) => {
                write!(f, "board store requires table `{table}`")
            }
            Self::BlankUsername => write!(f, "username must not be blank"),
            Self::DuplicateUsername(name) => write!(f, "username already taken: {name}"),
            Self::UnknownUser(id) => write!(f, "user not found: {id}"),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DbError> for StoreError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

fn server_error(err: rusqlite::Error) -> CollaboratorError {
    CollaboratorError::Server(err.to_string())
}

/// Local collaborator over a migrated SQLite connection.
pub struct SqliteBoardStore<'conn, K: Clock = SystemClock> {
    conn: &'conn Connection,
    clock: K,
}

impl<'conn> SqliteBoardStore<'conn> {
    /// Creates a store on the system clock after validating the schema.
    pub fn try_new(conn: &'conn Connection) -> StoreResult<Self> {
        Self::with_clock(conn, SystemClock)
    }
}

impl<'conn, K: Clock> SqliteBoardStore<'conn, K> {
    pub fn with_clock(conn: &'conn Connection, clock: K) -> StoreResult<Self> {
        ensure_store_connection_ready(conn)?;
        Ok(Self { conn, clock })
    }

    /// Registers a local account and returns its id.
    pub fn register_user(&self, username: &str) -> StoreResult<String> {
        let username = username.trim();
        if username.is_empty() {
            return Err(StoreError::BlankUsername);
        }
        let taken: i64 = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM users WHERE username = ?1);",
            [username],
            |row| row.get(0),
        )?;
        if taken == 1 {
            return Err(StoreError::DuplicateUsername(username.to_string()));
        }

        let user_id = Uuid::new_v4().to_string();
        self.conn.execute(
            "INSERT INTO users (id, username, created_at) VALUES (?1, ?2, ?3);",
            params![user_id, username, self.clock.now_ms()],
        )?;
        info!("event=user_register module=repo status=ok user_id={user_id}");
        Ok(user_id)
    }

    /// Id of an existing account by username.
    pub fn find_user(&self, username: &str) -> StoreResult<Option<String>> {
        let user_id = self
            .conn
            .query_row(
                "SELECT id FROM users WHERE username = ?1;",
                [username.trim()],
                |row| row.get(0),
            )
            .optional()?;
        Ok(user_id)
    }

    /// Issues a bearer token for `user_id` valid for `ttl_ms`.
    pub fn create_session(&self, user_id: &str, ttl_ms: i64) -> StoreResult<Credential> {
        let exists: i64 = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM users WHERE id = ?1);",
            [user_id],
            |row| row.get(0),
        )?;
        if exists == 0 {
            return Err(StoreError::UnknownUser(user_id.to_string()));
        }

        let now = self.clock.now_ms();
        let token = Uuid::new_v4().simple().to_string();
        self.conn.execute(
            "INSERT INTO sessions (token, user_id, created_at, expires_at)
             VALUES (?1, ?2, ?3, ?4);",
            params![token, user_id, now, now.saturating_add(ttl_ms)],
        )?;
        info!("event=session_create module=repo status=ok user_id={user_id}");
        Ok(Credential::new(token))
    }

    /// Deletes a session. Returns whether it existed.
    pub fn revoke_session(&self, credential: &Credential) -> StoreResult<bool> {
        let removed = self
            .conn
            .execute("DELETE FROM sessions WHERE token = ?1;", [credential.token()])?;
        Ok(removed > 0)
    }

    /// Resolves a live session token to its user id.
    pub fn resolve_user(&self, credential: &Credential) -> Result<String, CollaboratorError> {
        let user_id: Option<String> = self
            .conn
            .query_row(
                "SELECT user_id FROM sessions WHERE token = ?1 AND expires_at > ?2;",
                params![credential.token(), self.clock.now_ms()],
                |row| row.get(0),
            )
            .optional()
            .map_err(server_error)?;
        user_id.ok_or_else(|| {
            warn!("event=session_resolve module=repo status=error error_code=unauthorized");
            CollaboratorError::Unauthorized
        })
    }
}

impl<K: Clock> StorageCollaborator for SqliteBoardStore<'_, K> {
    fn fetch_board(&self, credential: &Credential) -> Result<Option<BoardDto>, CollaboratorError> {
        let user_id = self.resolve_user(credential)?;
        let payload: Option<String> = self
            .conn
            .query_row(
                "SELECT payload FROM board_documents WHERE user_id = ?1;",
                [&user_id],
                |row| row.get(0),
            )
            .optional()
            .map_err(server_error)?;

        payload
            .map(|payload| {
                serde_json::from_str(&payload)
                    .map_err(|err| CollaboratorError::Malformed(err.to_string()))
            })
            .transpose()
    }

    fn replace_board(
        &self,
        credential: &Credential,
        board: &BoardDto,
    ) -> Result<(), CollaboratorError> {
        let user_id = self.resolve_user(credential)?;
        let payload = serde_json::to_string(board)
            .map_err(|err| CollaboratorError::Malformed(err.to_string()))?;
        self.conn
            .execute(
                "INSERT INTO board_documents (user_id, payload, updated_at)
                 VALUES (?1, ?2, ?3)
                 ON CONFLICT(user_id) DO UPDATE SET
                    payload = excluded.payload,
                    updated_at = excluded.updated_at;",
                params![user_id, payload, self.clock.now_ms()],
            )
            .map_err(server_error)?;
        Ok(())
    }

    fn append_history(
        &self,
        credential: &Credential,
        project_id: &str,
        entry: &HistoryEntryDto,
    ) -> Result<(), CollaboratorError> {
        let user_id = self.resolve_user(credential)?;
        let payload = serde_json::to_string(entry)
            .map_err(|err| CollaboratorError::Malformed(err.to_string()))?;
        self.conn
            .execute(
                "INSERT INTO history_entries (user_id, project_id, payload, appended_at)
                 VALUES (?1, ?2, ?3, ?4);",
                params![user_id, project_id, payload, self.clock.now_ms()],
            )
            .map_err(server_error)?;
        Ok(())
    }

    fn fetch_history(&self, credential: &Credential) -> Result<HistoryDocument, CollaboratorError> {
        let user_id = self.resolve_user(credential)?;
        let mut stmt = self
            .conn
            .prepare(
                "SELECT project_id, payload
                 FROM history_entries
                 WHERE user_id = ?1
                 ORDER BY seq ASC;",
            )
            .map_err(server_error)?;
        let mut rows = stmt.query([&user_id]).map_err(server_error)?;

        let mut document = HistoryDocument::new();
        while let Some(row) = rows.next().map_err(server_error)? {
            let project_id: String = row.get(0).map_err(server_error)?;
            let payload: String = row.get(1).map_err(server_error)?;
            let entry: HistoryEntryDto = serde_json::from_str(&payload)
                .map_err(|err| CollaboratorError::Malformed(err.to_string()))?;
            document.entry(project_id).or_default().push(entry);
        }
        Ok(document)
    }
}

fn ensure_store_connection_ready(conn: &Connection) -> StoreResult<()> {
    let expected_version = latest_version();
    let actual_version: u32 = conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;
    if actual_version != expected_version {
        return Err(StoreError::UninitializedConnection {
            expected_version,
            actual_version,
        });
    }

    for table in REQUIRED_TABLES {
        if !table_exists(conn, table)? {
            return Err(StoreError::MissingRequiredTable(*table));
        }
    }
    Ok(())
}

fn table_exists(conn: &Connection, table: &str) -> StoreResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1
            FROM sqlite_master
            WHERE type = 'table' AND name = ?1
        );",
        [table],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}
