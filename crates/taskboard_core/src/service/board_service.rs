//! Board mutation use-case service.
//!
//! # Responsibility
//! - Apply structural edits (add, edit, move, reorder, delete) to a board tree.
//! - Maintain column-derived task tags and completion timestamps.
//!
//! # Invariants
//! - Every operation validates before touching the tree: a rejected call
//!   leaves the board exactly as it was.
//! - A project keeps at least one column; the board keeps at least one project.
//! - Moving a task strips the source column tag and adds the destination tag.
//! - Cached `position` fields are renumbered after every structural change.

use crate::model::board::{
    new_entity_id, normalize_tag, normalize_tags, Board, Column, ContainerRef, EntityId, Folder,
    Priority, Project, Task,
};
use crate::model::history::{HistoryEntry, HistoryLog};
use crate::service::reorder::{
    index_of, insertion_index, reorder_within_list, InsertionAnchor, ReorderError,
};
use chrono::NaiveDate;
use std::collections::BTreeSet;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Whether a call changed the tree (and therefore needs a save).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Change {
    Applied,
    Unchanged,
}

impl Change {
    pub fn is_applied(self) -> bool {
        self == Self::Applied
    }
}

/// Addressable entity for rename operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntityRef {
    Folder(EntityId),
    Project(EntityId),
    Column {
        project_id: EntityId,
        column_id: EntityId,
    },
    Task {
        project_id: EntityId,
        task_id: EntityId,
    },
}

/// Input for a new task.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskDraft {
    pub text: String,
    pub description: String,
    pub priority: Priority,
    pub due_date: Option<NaiveDate>,
    pub tags: Vec<String>,
}

impl TaskDraft {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }
}

/// Partial update for an existing task. `None` fields are left as-is.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskPatch {
    pub text: Option<String>,
    pub description: Option<String>,
    pub priority: Option<Priority>,
    pub due_date: Option<Option<NaiveDate>>,
    pub tags: Option<Vec<String>>,
}

/// Rejections from board mutations. None of them leave partial state behind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MutationError {
    /// Name or text is blank after trim.
    BlankName,
    FolderNotFound(EntityId),
    ProjectNotFound(EntityId),
    ColumnNotFound {
        project_id: EntityId,
        column_id: EntityId,
    },
    TaskNotFound {
        project_id: EntityId,
        task_id: EntityId,
    },
    /// Task exists but not in the stated source column.
    TaskNotInColumn {
        column_id: EntityId,
        task_id: EntityId,
    },
    /// Deleting would leave the board without projects.
    LastProject,
    /// Deleting would leave the project without columns.
    LastColumn(EntityId),
    /// Batch operation received no known project ids.
    EmptySelection,
    /// Anchor or item lookup failed.
    Reorder(ReorderError),
}

impl Display for MutationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BlankName => write!(f, "name must not be blank"),
            Self::FolderNotFound(id) => write!(f, "folder not found: {id}"),
            Self::ProjectNotFound(id) => write!(f, "project not found: {id}"),
            Self::ColumnNotFound {
                project_id,
                column_id,
            } => write!(f, "column {column_id} not found in project {project_id}"),
            Self::TaskNotFound {
                project_id,
                task_id,
            } => write!(f, "task {task_id} not found in project {project_id}"),
            Self::TaskNotInColumn { column_id, task_id } => {
                write!(f, "task {task_id} is not in column {column_id}")
            }
            Self::LastProject => write!(f, "you must have at least one project"),
            Self::LastColumn(project_id) => {
                write!(f, "project {project_id} must keep at least one column")
            }
            Self::EmptySelection => write!(f, "no projects selected"),
            Self::Reorder(err) => write!(f, "{err}"),
        }
    }
}

impl Error for MutationError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Reorder(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ReorderError> for MutationError {
    fn from(value: ReorderError) -> Self {
        Self::Reorder(value)
    }
}

/// Default lanes seeded into every new project.
pub fn default_columns() -> Vec<Column> {
    vec![
        Column::new("todo", "TODO", Some("todo".to_string())),
        Column::new("in-progress", "IN PROGRESS", Some("in-progress".to_string())),
        Column::new("done", "DONE", Some("done".to_string())),
    ]
}

/// Mutation facade over one board tree.
pub struct BoardService<'b> {
    board: &'b mut Board,
}

impl<'b> BoardService<'b> {
    pub fn new(board: &'b mut Board) -> Self {
        Self { board }
    }

    /// Appends a new, expanded folder.
    pub fn add_folder(&mut self, name: &str) -> Result<EntityId, MutationError> {
        let name = normalize_name(name)?;
        let folder = Folder::new(new_entity_id(), name);
        let id = folder.id.clone();
        self.board.folders.push(folder);
        Ok(id)
    }

    /// Appends a project with the default TODO / IN PROGRESS / DONE lanes.
    pub fn add_project(
        &mut self,
        name: &str,
        container: &ContainerRef,
    ) -> Result<EntityId, MutationError> {
        let name = normalize_name(name)?;
        let project = Project::new(new_entity_id(), name, default_columns());
        let id = project.id.clone();
        self.append_to_container(container, project)?;
        Ok(id)
    }

    /// Appends a column to a project.
    pub fn add_column(
        &mut self,
        project_id: &str,
        title: &str,
        tag: Option<String>,
    ) -> Result<EntityId, MutationError> {
        let title = normalize_name(title)?;
        let project = self.project_mut(project_id)?;
        let column = Column::new(new_entity_id(), title, tag);
        let id = column.id.clone();
        project.columns.push(column);
        project.renumber();
        Ok(id)
    }

    /// Retitles a column and re-derives its tag on every task it holds.
    pub fn edit_column(
        &mut self,
        project_id: &str,
        column_id: &str,
        title: &str,
        tag: Option<String>,
    ) -> Result<Change, MutationError> {
        let title = normalize_name(title)?;
        let tag = normalize_tag(tag);
        let column = self.column_mut(project_id, column_id)?;
        if column.title == title && column.tag == tag {
            return Ok(Change::Unchanged);
        }

        if column.tag != tag {
            let old_tag = column.derived_tag().map(str::to_string);
            for task in &mut column.items {
                if let Some(old_tag) = old_tag.as_deref() {
                    task.remove_tag(old_tag);
                }
                if let Some(new_tag) = tag.as_deref() {
                    task.add_tag(new_tag);
                }
            }
        }
        column.title = title;
        column.tag = tag;
        Ok(Change::Applied)
    }

    /// Appends a task to a column. The column tag is not applied on creation.
    pub fn add_task(
        &mut self,
        project_id: &str,
        column_id: &str,
        draft: TaskDraft,
        now_ms: i64,
    ) -> Result<EntityId, MutationError> {
        let text = normalize_name(&draft.text)?;
        let column = self.column_mut(project_id, column_id)?;

        let mut task = Task::new(new_entity_id(), text, now_ms);
        task.description = draft.description.trim().to_string();
        task.priority = draft.priority;
        task.due_date = draft.due_date;
        task.tags = normalize_tags(draft.tags);
        let id = task.id.clone();

        column.items.push(task);
        column.renumber();
        Ok(id)
    }

    /// Applies a partial edit. Membership of the owning column's derived tag
    /// is preserved whatever the new free tag list says.
    pub fn edit_task(
        &mut self,
        project_id: &str,
        task_id: &str,
        patch: TaskPatch,
    ) -> Result<Change, MutationError> {
        let text = patch.text.as_deref().map(normalize_name).transpose()?;
        let project = self.project_mut(project_id)?;
        let derived_tag = project
            .column_of_task(task_id)
            .and_then(|column| column.derived_tag().map(str::to_string));
        let task = project
            .task_mut(task_id)
            .ok_or_else(|| task_not_found(project_id, task_id))?;

        let before = task.clone();
        if let Some(text) = text {
            task.text = text;
        }
        if let Some(description) = patch.description {
            task.description = description.trim().to_string();
        }
        if let Some(priority) = patch.priority {
            task.priority = priority;
        }
        if let Some(due_date) = patch.due_date {
            task.due_date = due_date;
        }
        if let Some(tags) = patch.tags {
            let had_derived = derived_tag
                .as_deref()
                .is_some_and(|derived| task.has_tag(derived));
            task.tags = normalize_tags(tags);
            if let Some(derived) = derived_tag.as_deref() {
                if had_derived {
                    task.add_tag(derived);
                } else {
                    task.remove_tag(derived);
                }
            }
        }

        Ok(if *task == before {
            Change::Unchanged
        } else {
            Change::Applied
        })
    }

    /// Flips completion and sets or clears `completed_at`. Returns the new state.
    pub fn toggle_task_completion(
        &mut self,
        project_id: &str,
        task_id: &str,
        now_ms: i64,
    ) -> Result<bool, MutationError> {
        let task = self
            .project_mut(project_id)?
            .task_mut(task_id)
            .ok_or_else(|| task_not_found(project_id, task_id))?;
        task.completed = !task.completed;
        task.completed_at = task.completed.then_some(now_ms);
        Ok(task.completed)
    }

    /// Removes a task; completed tasks are archived to `history` first.
    pub fn delete_task(
        &mut self,
        project_id: &str,
        task_id: &str,
        history: &mut HistoryLog,
        now_ms: i64,
    ) -> Result<Option<HistoryEntry>, MutationError> {
        let project = self.project_mut(project_id)?;
        let column = project
            .columns
            .iter_mut()
            .find(|column| column.task_index(task_id).is_some())
            .ok_or_else(|| task_not_found(project_id, task_id))?;
        let index = column
            .task_index(task_id)
            .ok_or_else(|| task_not_found(project_id, task_id))?;

        let task = column.items.remove(index);
        column.renumber();

        if !task.completed {
            return Ok(None);
        }
        let entry = HistoryEntry::from_task(&task, now_ms);
        history.append(project_id, entry.clone());
        Ok(Some(entry))
    }

    /// Moves a task within or across columns of one project.
    pub fn move_task(
        &mut self,
        project_id: &str,
        task_id: &str,
        source_column_id: &str,
        dest_column_id: &str,
        anchor: Option<&InsertionAnchor>,
    ) -> Result<Change, MutationError> {
        let project = self.project_mut(project_id)?;
        let source_index = project
            .column_index(source_column_id)
            .ok_or_else(|| column_not_found(project_id, source_column_id))?;
        let dest_index = project
            .column_index(dest_column_id)
            .ok_or_else(|| column_not_found(project_id, dest_column_id))?;
        let task_index = project.columns[source_index]
            .task_index(task_id)
            .ok_or_else(|| MutationError::TaskNotInColumn {
                column_id: source_column_id.to_string(),
                task_id: task_id.to_string(),
            })?;

        if source_index == dest_index {
            let column = &mut project.columns[source_index];
            let final_index = reorder_within_list(&mut column.items, task_id, anchor)?;
            column.renumber();
            return Ok(if final_index == task_index {
                Change::Unchanged
            } else {
                Change::Applied
            });
        }

        let insert_index = insertion_index(&project.columns[dest_index].items, anchor)?;
        let source_tag = project.columns[source_index]
            .derived_tag()
            .map(str::to_string);
        let dest_tag = project.columns[dest_index]
            .derived_tag()
            .map(str::to_string);

        let mut task = project.columns[source_index].items.remove(task_index);
        if let Some(tag) = source_tag.as_deref() {
            task.remove_tag(tag);
        }
        if let Some(tag) = dest_tag.as_deref() {
            task.add_tag(tag);
        }
        project.columns[dest_index].items.insert(insert_index, task);

        project.columns[source_index].renumber();
        project.columns[dest_index].renumber();
        Ok(Change::Applied)
    }

    /// Reorders a column among its project's columns. No tag side effects.
    pub fn move_column(
        &mut self,
        project_id: &str,
        column_id: &str,
        anchor: &InsertionAnchor,
    ) -> Result<Change, MutationError> {
        let project = self.project_mut(project_id)?;
        let source_index = project
            .column_index(column_id)
            .ok_or_else(|| column_not_found(project_id, column_id))?;
        if index_of(&project.columns, &anchor.target_id).is_none() {
            return Err(column_not_found(project_id, &anchor.target_id));
        }

        let final_index = reorder_within_list(&mut project.columns, column_id, Some(anchor))?;
        project.renumber();
        Ok(if final_index == source_index {
            Change::Unchanged
        } else {
            Change::Applied
        })
    }

    /// Moves one project to the end of `target`. No-op when already there.
    pub fn move_project(
        &mut self,
        project_id: &str,
        target: &ContainerRef,
    ) -> Result<Change, MutationError> {
        self.ensure_container_exists(target)?;
        let current = self
            .board
            .locate(project_id)
            .ok_or_else(|| MutationError::ProjectNotFound(project_id.to_string()))?;
        if current == *target {
            return Ok(Change::Unchanged);
        }

        let project = self
            .board
            .take_project(project_id)
            .ok_or_else(|| MutationError::ProjectNotFound(project_id.to_string()))?;
        self.append_to_container(target, project)?;
        Ok(Change::Applied)
    }

    /// Moves every listed project to `target`, each checked against its own
    /// current container. Unknown ids are skipped. Returns how many moved.
    pub fn move_projects(
        &mut self,
        project_ids: &[EntityId],
        target: &ContainerRef,
    ) -> Result<usize, MutationError> {
        self.ensure_container_exists(target)?;
        let mut moved = 0;
        for project_id in project_ids {
            match self.board.locate(project_id) {
                None => continue,
                Some(current) if current == *target => continue,
                Some(_) => {
                    if self.move_project(project_id, target)?.is_applied() {
                        moved += 1;
                    }
                }
            }
        }
        Ok(moved)
    }

    /// Deletes a column and its tasks unless it is the project's last one.
    pub fn delete_column(
        &mut self,
        project_id: &str,
        column_id: &str,
    ) -> Result<(), MutationError> {
        let project = self.project_mut(project_id)?;
        let index = project
            .column_index(column_id)
            .ok_or_else(|| column_not_found(project_id, column_id))?;
        if project.columns.len() <= 1 {
            return Err(MutationError::LastColumn(project_id.to_string()));
        }
        project.columns.remove(index);
        project.renumber();
        Ok(())
    }

    /// Deletes a project unless it is the last one on the board.
    pub fn delete_project(&mut self, project_id: &str) -> Result<(), MutationError> {
        if self.board.locate(project_id).is_none() {
            return Err(MutationError::ProjectNotFound(project_id.to_string()));
        }
        if self.board.project_count() <= 1 {
            return Err(MutationError::LastProject);
        }
        self.board.take_project(project_id);
        Ok(())
    }

    /// Deletes several projects at once. Rejected when nothing known is
    /// listed or when every project would go. Returns how many were removed.
    pub fn delete_projects(&mut self, project_ids: &[EntityId]) -> Result<usize, MutationError> {
        let existing: BTreeSet<&str> = project_ids
            .iter()
            .map(String::as_str)
            .filter(|id| self.board.locate(id).is_some())
            .collect();
        if existing.is_empty() {
            return Err(MutationError::EmptySelection);
        }
        if existing.len() >= self.board.project_count() {
            return Err(MutationError::LastProject);
        }

        let mut removed = 0;
        for project_id in existing {
            if self.board.take_project(project_id).is_some() {
                removed += 1;
            }
        }
        Ok(removed)
    }

    /// Deletes a folder. A non-empty folder needs `confirm` to agree; its
    /// projects are then appended to the uncategorized list.
    pub fn delete_folder<F>(&mut self, folder_id: &str, confirm: F) -> Result<Change, MutationError>
    where
        F: FnOnce(&Folder) -> bool,
    {
        let index = self
            .board
            .folders
            .iter()
            .position(|folder| folder.id == folder_id)
            .ok_or_else(|| MutationError::FolderNotFound(folder_id.to_string()))?;

        let folder = &self.board.folders[index];
        if !folder.projects.is_empty() && !confirm(folder) {
            return Ok(Change::Unchanged);
        }

        let folder = self.board.folders.remove(index);
        self.board.uncategorized.extend(folder.projects);
        Ok(Change::Applied)
    }

    /// Flips a folder's expanded flag. Returns the new value.
    pub fn toggle_folder(&mut self, folder_id: &str) -> Result<bool, MutationError> {
        let folder = self
            .board
            .folder_mut(folder_id)
            .ok_or_else(|| MutationError::FolderNotFound(folder_id.to_string()))?;
        folder.expanded = !folder.expanded;
        Ok(folder.expanded)
    }

    /// In-place text update of a folder, project, column or task.
    pub fn rename(&mut self, entity: &EntityRef, new_name: &str) -> Result<Change, MutationError> {
        let new_name = normalize_name(new_name)?;
        let slot = match entity {
            EntityRef::Folder(folder_id) => {
                &mut self
                    .board
                    .folder_mut(folder_id)
                    .ok_or_else(|| MutationError::FolderNotFound(folder_id.clone()))?
                    .name
            }
            EntityRef::Project(project_id) => &mut self.project_mut(project_id)?.name,
            EntityRef::Column {
                project_id,
                column_id,
            } => &mut self.column_mut(project_id, column_id)?.title,
            EntityRef::Task {
                project_id,
                task_id,
            } => {
                &mut self
                    .project_mut(project_id)?
                    .task_mut(task_id)
                    .ok_or_else(|| task_not_found(project_id, task_id))?
                    .text
            }
        };

        if *slot == new_name {
            return Ok(Change::Unchanged);
        }
        *slot = new_name;
        Ok(Change::Applied)
    }

    fn project_mut(&mut self, project_id: &str) -> Result<&mut Project, MutationError> {
        self.board
            .project_mut(project_id)
            .ok_or_else(|| MutationError::ProjectNotFound(project_id.to_string()))
    }

    fn column_mut(
        &mut self,
        project_id: &str,
        column_id: &str,
    ) -> Result<&mut Column, MutationError> {
        self.project_mut(project_id)?
            .column_mut(column_id)
            .ok_or_else(|| column_not_found(project_id, column_id))
    }

    fn ensure_container_exists(&self, container: &ContainerRef) -> Result<(), MutationError> {
        match container {
            ContainerRef::Folder(folder_id) if self.board.folder(folder_id).is_none() => {
                Err(MutationError::FolderNotFound(folder_id.clone()))
            }
            _ => Ok(()),
        }
    }

    fn append_to_container(
        &mut self,
        container: &ContainerRef,
        project: Project,
    ) -> Result<(), MutationError> {
        match container {
            ContainerRef::Folder(folder_id) => {
                let folder = self
                    .board
                    .folder_mut(folder_id)
                    .ok_or_else(|| MutationError::FolderNotFound(folder_id.clone()))?;
                folder.projects.push(project);
                folder.expanded = true;
            }
            ContainerRef::Uncategorized => self.board.uncategorized.push(project),
        }
        Ok(())
    }
}

fn normalize_name(value: &str) -> Result<String, MutationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(MutationError::BlankName);
    }
    Ok(trimmed.to_string())
}

fn column_not_found(project_id: &str, column_id: &str) -> MutationError {
    MutationError::ColumnNotFound {
        project_id: project_id.to_string(),
        column_id: column_id.to_string(),
    }
}

fn task_not_found(project_id: &str, task_id: &str) -> MutationError {
    MutationError::TaskNotFound {
        project_id: project_id.to_string(),
        task_id: task_id.to_string(),
    }
}
