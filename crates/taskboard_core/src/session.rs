//! Board session controller.
//!
//! # Responsibility
//! - Own one user's tree, history, selection and drag state.
//! - Apply mutations in memory first, then persist (optimistic write-through).
//! - Turn storage failures into notices instead of errors.
//!
//! # Invariants
//! - A rejected mutation changes nothing and triggers no save.
//! - A failed save never rolls back the in-memory change; the tree stays
//!   dirty until a later save succeeds.
//! - An unauthorized response signs the session out and keeps the tree dirty.
//! - A failed load other than unauthorized opens on the default tree with a
//!   notice and writes nothing until the next mutation.
//! - History entries are persisted before the board save that drops their task.
//! - Drag state is cleared by every drop or cancel, resolved or not.

use crate::bridge::{
    default_board, Credential, PersistenceBridge, PersistenceError, StorageCollaborator,
};
use crate::clock::Clock;
use crate::config::BoardConfig;
use crate::dnd::drag_state::{DragPayload, DragSession};
use crate::dnd::resolver::{
    resolve_column_drop, resolve_project_drop, resolve_task_drop, ColumnLayout, ColumnSlot,
    DropZone, Point,
};
use crate::model::board::{Board, ContainerRef, EntityId, Folder};
use crate::model::history::{HistoryEntry, HistoryLog};
use crate::service::board_service::{
    BoardService, Change, EntityRef, MutationError, TaskDraft, TaskPatch,
};
use crate::service::reorder::InsertionAnchor;
use crate::service::selection::ProjectSelection;
use crate::sweep::{RetentionSweeper, SweepReport};
use crate::view::{self, BoardView, HistoryEntryView};
use log::{info, warn};

/// Non-fatal condition the UI should surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    /// A save or history append failed; the change is kept in memory.
    PersistenceFailed {
        operation: &'static str,
        message: String,
    },
    /// The credential was rejected; the user must sign in again.
    ReauthRequired,
}

/// Modifier held during a sidebar project click.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClickModifier {
    /// Select the project as current and clear multi-selection.
    None,
    /// Toggle the project's membership in the multi-selection.
    Toggle,
    /// Extend the multi-selection from the last-selected project.
    Range,
}

pub struct BoardSession<C: StorageCollaborator, K: Clock> {
    bridge: PersistenceBridge<C>,
    clock: K,
    credential: Option<Credential>,
    board: Board,
    history: HistoryLog,
    pending_history: Vec<(EntityId, HistoryEntry)>,
    current_project_id: Option<EntityId>,
    selection: ProjectSelection,
    drag: DragSession,
    sweeper: RetentionSweeper,
    task_end_offset: f64,
    dirty: bool,
    notices: Vec<Notice>,
}

impl<C: StorageCollaborator, K: Clock> BoardSession<C, K> {
    /// Loads the board and history, then runs the startup sweep.
    ///
    /// Only an unauthorized credential fails the open. Any other load
    /// failure falls back to the default tree (or an empty history) and is
    /// reported as a `PersistenceFailed` notice.
    pub fn open(
        collaborator: C,
        credential: Credential,
        clock: K,
        config: &BoardConfig,
    ) -> Result<Self, PersistenceError> {
        let bridge = PersistenceBridge::new(collaborator);
        let mut notices = Vec::new();

        let (board, history) = match bridge.load(&credential, clock.now_ms()) {
            Ok(board) => {
                let history = match bridge.load_history(&credential) {
                    Ok(history) => history,
                    Err(err) => fallback_notice(&mut notices, "history_load", err)?,
                };
                (board, history)
            }
            Err(err) => {
                fallback_notice::<()>(&mut notices, "board_load", err)?;
                (default_board(), HistoryLog::new())
            }
        };

        let mut session = Self {
            current_project_id: board.first_project_id(),
            bridge,
            clock,
            credential: Some(credential),
            board,
            history,
            pending_history: Vec::new(),
            selection: ProjectSelection::new(),
            drag: DragSession::new(),
            sweeper: RetentionSweeper::new(config.retention_ms(), config.sweep_interval_ms()),
            task_end_offset: config.task_end_offset_px,
            dirty: false,
            notices,
        };
        session.tick();
        Ok(session)
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn history(&self) -> &HistoryLog {
        &self.history
    }

    pub fn selection(&self) -> &ProjectSelection {
        &self.selection
    }

    pub fn current_project_id(&self) -> Option<&str> {
        self.current_project_id.as_deref()
    }

    pub fn is_signed_in(&self) -> bool {
        self.credential.is_some()
    }

    /// Whether in-memory changes have not reached storage yet.
    pub fn is_dirty(&self) -> bool {
        self.dirty || !self.pending_history.is_empty()
    }

    pub fn is_dragging(&self) -> bool {
        self.drag.is_dragging()
    }

    /// Drains notices accumulated since the last call.
    pub fn take_notices(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.notices)
    }

    pub fn render(&self) -> BoardView {
        view::render(
            &self.board,
            self.current_project_id.as_deref(),
            &self.selection,
        )
    }

    pub fn history_view(&self, project_id: &str) -> Vec<HistoryEntryView> {
        view::render_history(&self.history, project_id)
    }

    pub fn add_folder(&mut self, name: &str) -> Result<EntityId, MutationError> {
        let id = self.apply("add_folder", |service, _| service.add_folder(name))?;
        self.commit();
        Ok(id)
    }

    /// Adds a project and makes it current.
    pub fn add_project(
        &mut self,
        name: &str,
        container: &ContainerRef,
    ) -> Result<EntityId, MutationError> {
        let id = self.apply("add_project", |service, _| {
            service.add_project(name, container)
        })?;
        self.current_project_id = Some(id.clone());
        self.commit();
        Ok(id)
    }

    pub fn add_column(
        &mut self,
        project_id: &str,
        title: &str,
        tag: Option<String>,
    ) -> Result<EntityId, MutationError> {
        let id = self.apply("add_column", |service, _| {
            service.add_column(project_id, title, tag)
        })?;
        self.commit();
        Ok(id)
    }

    pub fn edit_column(
        &mut self,
        project_id: &str,
        column_id: &str,
        title: &str,
        tag: Option<String>,
    ) -> Result<Change, MutationError> {
        let change = self.apply("edit_column", |service, _| {
            service.edit_column(project_id, column_id, title, tag)
        })?;
        self.commit_if(change)
    }

    pub fn add_task(
        &mut self,
        project_id: &str,
        column_id: &str,
        draft: TaskDraft,
    ) -> Result<EntityId, MutationError> {
        let id = self.apply("add_task", |service, now| {
            service.add_task(project_id, column_id, draft, now)
        })?;
        self.commit();
        Ok(id)
    }

    pub fn edit_task(
        &mut self,
        project_id: &str,
        task_id: &str,
        patch: TaskPatch,
    ) -> Result<Change, MutationError> {
        let change = self.apply("edit_task", |service, _| {
            service.edit_task(project_id, task_id, patch)
        })?;
        self.commit_if(change)
    }

    /// Returns the new completion state.
    pub fn toggle_task(&mut self, project_id: &str, task_id: &str) -> Result<bool, MutationError> {
        let completed = self.apply("toggle_task", |service, now| {
            service.toggle_task_completion(project_id, task_id, now)
        })?;
        self.commit();
        Ok(completed)
    }

    /// Deletes a task, archiving it first when completed.
    pub fn delete_task(&mut self, project_id: &str, task_id: &str) -> Result<(), MutationError> {
        let now = self.clock.now_ms();
        let archived = BoardService::new(&mut self.board)
            .delete_task(project_id, task_id, &mut self.history, now)
            .inspect_err(|err| log_rejected("delete_task", err))?;
        if let Some(entry) = archived {
            self.pending_history.push((project_id.to_string(), entry));
        }
        self.commit();
        Ok(())
    }

    pub fn move_task(
        &mut self,
        project_id: &str,
        task_id: &str,
        source_column_id: &str,
        dest_column_id: &str,
        anchor: Option<&InsertionAnchor>,
    ) -> Result<Change, MutationError> {
        let change = self.apply("move_task", |service, _| {
            service.move_task(project_id, task_id, source_column_id, dest_column_id, anchor)
        })?;
        self.commit_if(change)
    }

    pub fn move_column(
        &mut self,
        project_id: &str,
        column_id: &str,
        anchor: &InsertionAnchor,
    ) -> Result<Change, MutationError> {
        let change = self.apply("move_column", |service, _| {
            service.move_column(project_id, column_id, anchor)
        })?;
        self.commit_if(change)
    }

    /// Moves `project_id` to `target`. When it is part of the multi-selection
    /// the whole selection moves and the selection is cleared afterwards.
    /// Returns how many projects changed container.
    pub fn move_project(
        &mut self,
        project_id: &str,
        target: &ContainerRef,
    ) -> Result<usize, MutationError> {
        let ids = if self.selection.contains(project_id) {
            self.selection.ordered_ids(&self.board)
        } else {
            vec![project_id.to_string()]
        };
        self.move_projects(&ids, target)
    }

    pub fn delete_column(
        &mut self,
        project_id: &str,
        column_id: &str,
    ) -> Result<(), MutationError> {
        self.apply("delete_column", |service, _| {
            service.delete_column(project_id, column_id)
        })?;
        self.commit();
        Ok(())
    }

    /// Deletes a project; the current project falls back to the first one left.
    pub fn delete_project(&mut self, project_id: &str) -> Result<(), MutationError> {
        self.apply("delete_project", |service, _| service.delete_project(project_id))?;
        self.after_projects_removed();
        self.commit();
        Ok(())
    }

    /// Deletes every selected project and clears the selection.
    pub fn delete_selected_projects(&mut self) -> Result<usize, MutationError> {
        let ids = self.selection.ordered_ids(&self.board);
        let removed = self.apply("delete_projects", |service, _| service.delete_projects(&ids))?;
        self.selection.clear();
        self.after_projects_removed();
        self.commit();
        Ok(removed)
    }

    /// Deletes a folder, asking `confirm` first when it still holds projects.
    pub fn delete_folder<F>(&mut self, folder_id: &str, confirm: F) -> Result<Change, MutationError>
    where
        F: FnOnce(&Folder) -> bool,
    {
        let change = self.apply("delete_folder", |service, _| {
            service.delete_folder(folder_id, confirm)
        })?;
        self.commit_if(change)
    }

    pub fn toggle_folder(&mut self, folder_id: &str) -> Result<bool, MutationError> {
        let expanded = self.apply("toggle_folder", |service, _| service.toggle_folder(folder_id))?;
        self.commit();
        Ok(expanded)
    }

    pub fn rename(&mut self, entity: &EntityRef, new_name: &str) -> Result<Change, MutationError> {
        let change = self.apply("rename", |service, _| service.rename(entity, new_name))?;
        self.commit_if(change)
    }

    /// Sidebar click on a project.
    pub fn click_project(&mut self, project_id: &str, modifier: ClickModifier) {
        if modifier == ClickModifier::Toggle {
            if self.board.project(project_id).is_some() {
                self.selection.toggle(project_id);
            }
            return;
        }
        // Range without a usable anchor degrades to a plain click.
        if modifier == ClickModifier::Range && self.selection.select_range(&self.board, project_id)
        {
            return;
        }
        if self.board.project(project_id).is_some() {
            self.selection.anchor_on(project_id);
            self.current_project_id = Some(project_id.to_string());
        }
    }

    pub fn begin_task_drag(&mut self, project_id: &str, column_id: &str, task_id: &str) {
        self.drag.begin(DragPayload::Task {
            project_id: project_id.to_string(),
            column_id: column_id.to_string(),
            task_id: task_id.to_string(),
        });
    }

    pub fn begin_column_drag(&mut self, project_id: &str, column_id: &str) {
        self.drag.begin(DragPayload::Column {
            project_id: project_id.to_string(),
            column_id: column_id.to_string(),
        });
    }

    /// Starts a project drag; a selected project carries the whole selection.
    pub fn begin_project_drag(&mut self, project_id: &str) {
        let ids = if self.selection.contains(project_id) {
            self.selection.ordered_ids(&self.board)
        } else {
            vec![project_id.to_string()]
        };
        self.drag.begin(DragPayload::Projects(ids));
    }

    /// Aborts the current gesture without touching the tree.
    pub fn cancel_drag(&mut self) {
        self.drag.end();
    }

    /// Drops a dragged task at `pointer_y`. No candidate means no change.
    pub fn drop_task(
        &mut self,
        layout: &[ColumnLayout],
        pointer_y: f64,
    ) -> Result<Change, MutationError> {
        let Some(DragPayload::Task {
            project_id,
            column_id,
            task_id,
        }) = self.drag.end()
        else {
            return Ok(Change::Unchanged);
        };
        let Some(target) = resolve_task_drop(layout, &task_id, pointer_y, self.task_end_offset)
        else {
            return Ok(Change::Unchanged);
        };
        self.move_task(
            &project_id,
            &task_id,
            &column_id,
            &target.column_id,
            target.anchor.as_ref(),
        )
    }

    /// Drops a dragged column at `pointer_x`.
    pub fn drop_column(
        &mut self,
        slots: &[ColumnSlot],
        pointer_x: f64,
    ) -> Result<Change, MutationError> {
        let Some(DragPayload::Column {
            project_id,
            column_id,
        }) = self.drag.end()
        else {
            return Ok(Change::Unchanged);
        };
        let Some(anchor) = resolve_column_drop(slots, &column_id, pointer_x) else {
            return Ok(Change::Unchanged);
        };
        self.move_column(&project_id, &column_id, &anchor)
    }

    /// Drops dragged projects on whichever zone contains `point`.
    pub fn drop_projects(
        &mut self,
        zones: &[DropZone],
        point: Point,
    ) -> Result<usize, MutationError> {
        let Some(DragPayload::Projects(ids)) = self.drag.end() else {
            return Ok(0);
        };
        let Some(target) = resolve_project_drop(zones, point) else {
            return Ok(0);
        };
        self.move_projects(&ids, &target)
    }

    /// Timer callback: runs the retention sweep when due and persists archives.
    pub fn tick(&mut self) -> Option<SweepReport> {
        let now = self.clock.now_ms();
        let report = match self.sweeper.tick(&mut self.board, &mut self.history, now) {
            Ok(Some(report)) => report,
            Ok(None) | Err(_) => return None,
        };
        if !report.is_empty() {
            self.pending_history.extend(report.archived.iter().cloned());
            self.commit();
        }
        Some(report)
    }

    /// Installs a fresh credential and flushes anything left unsaved.
    pub fn reauthenticate(&mut self, credential: Credential) {
        self.credential = Some(credential);
        if self.is_dirty() {
            self.commit();
        }
    }

    /// Drops the credential; later changes stay in memory until re-auth.
    pub fn sign_out(&mut self) {
        if self.credential.take().is_some() {
            info!("event=session_signed_out module=session status=ok reason=requested");
        }
    }

    fn move_projects(
        &mut self,
        ids: &[EntityId],
        target: &ContainerRef,
    ) -> Result<usize, MutationError> {
        let moved = self.apply("move_projects", |service, _| service.move_projects(ids, target))?;
        self.selection.clear();
        if moved > 0 {
            self.commit();
        }
        Ok(moved)
    }

    fn apply<T, F>(&mut self, operation: &'static str, op: F) -> Result<T, MutationError>
    where
        F: FnOnce(&mut BoardService<'_>, i64) -> Result<T, MutationError>,
    {
        let now = self.clock.now_ms();
        let mut service = BoardService::new(&mut self.board);
        op(&mut service, now).inspect_err(|err| log_rejected(operation, err))
    }

    fn after_projects_removed(&mut self) {
        let current_exists = self
            .current_project_id
            .as_deref()
            .is_some_and(|id| self.board.project(id).is_some());
        if !current_exists {
            self.current_project_id = self.board.first_project_id();
        }
    }

    fn commit_if(&mut self, change: Change) -> Result<Change, MutationError> {
        if change.is_applied() {
            self.commit();
        }
        Ok(change)
    }

    /// Marks the tree dirty and pushes pending history and the board to storage.
    fn commit(&mut self) {
        self.dirty = true;
        let Some(credential) = self.credential.clone() else {
            return;
        };

        while let Some((project_id, entry)) = self.pending_history.first() {
            match self.bridge.append_history(&credential, project_id, entry) {
                Ok(()) => {
                    self.pending_history.remove(0);
                }
                Err(err) => {
                    self.handle_persistence_error("history_append", err);
                    return;
                }
            }
        }

        match self.bridge.save(&credential, &self.board) {
            Ok(()) => self.dirty = false,
            Err(err) => self.handle_persistence_error("board_save", err),
        }
    }

    fn handle_persistence_error(&mut self, operation: &'static str, err: PersistenceError) {
        if err.is_unauthorized() {
            self.credential = None;
            warn!(
                "event=session_signed_out module=session status=ok reason=unauthorized op={operation}"
            );
            self.notices.push(Notice::ReauthRequired);
            return;
        }
        self.notices.push(Notice::PersistenceFailed {
            operation,
            message: err.to_string(),
        });
    }
}

/// Passes `Unauthorized` through; turns anything else into a notice and a
/// default value.
fn fallback_notice<T: Default>(
    notices: &mut Vec<Notice>,
    operation: &'static str,
    err: PersistenceError,
) -> Result<T, PersistenceError> {
    if err.is_unauthorized() {
        return Err(err);
    }
    warn!("event={operation} module=session status=error fallback=default error={err}");
    notices.push(Notice::PersistenceFailed {
        operation,
        message: err.to_string(),
    });
    Ok(T::default())
}

fn log_rejected(operation: &str, err: &MutationError) {
    warn!(
        "event=mutation_rejected module=session status=error operation={operation} error={err}"
    );
}
