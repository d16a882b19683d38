//! Board tree domain model.
//!
//! # Responsibility
//! - Define the canonical folder -> project -> column -> task tree.
//! - Provide pure read accessors used by mutation, resolver and view code.
//!
//! # Invariants
//! - A project id is unique across every folder and the uncategorized list.
//! - Column ids and task ids are unique within their owning project.
//! - Array order is the source of truth; `position` is a cached hint that is
//!   renumbered `0..n-1` after every structural change.
//! - Every project has at least one column.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Stable identifier for folders, projects, columns and tasks.
///
/// Ids coming from storage are opaque strings; ids minted locally are v4 UUIDs.
pub type EntityId = String;

/// Generates a fresh entity id.
pub fn new_entity_id() -> EntityId {
    Uuid::new_v4().to_string()
}

/// Task urgency.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
}

impl Priority {
    /// Parses the lowercase wire label.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "low" => Some(Self::Low),
            "medium" => Some(Self::Medium),
            "high" => Some(Self::High),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

/// Atomic work item owned by exactly one column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Task {
    pub id: EntityId,
    pub text: String,
    pub description: String,
    pub priority: Priority,
    pub due_date: Option<NaiveDate>,
    /// Ordered, duplicate-free tag list (set semantics).
    pub tags: Vec<String>,
    pub completed: bool,
    /// Epoch ms. Set exactly when `completed` flips to true.
    pub completed_at: Option<i64>,
    /// Epoch ms creation timestamp.
    pub created_at: i64,
    pub position: usize,
}

impl Task {
    /// Creates an open task with default priority and no tags.
    pub fn new(id: impl Into<EntityId>, text: impl Into<String>, created_at: i64) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            description: String::new(),
            priority: Priority::default(),
            due_date: None,
            tags: Vec::new(),
            completed: false,
            completed_at: None,
            created_at,
            position: 0,
        }
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|current| current == tag)
    }

    /// Adds `tag` unless blank or already present. Returns whether it was added.
    pub fn add_tag(&mut self, tag: &str) -> bool {
        if tag.is_empty() || self.has_tag(tag) {
            return false;
        }
        self.tags.push(tag.to_string());
        true
    }

    /// Removes every occurrence of `tag`. Returns whether anything was removed.
    pub fn remove_tag(&mut self, tag: &str) -> bool {
        let before = self.tags.len();
        self.tags.retain(|current| current != tag);
        before != self.tags.len()
    }
}

/// Ordered lane of tasks inside one project.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    pub id: EntityId,
    pub title: String,
    /// Derived label applied to tasks moved into this column.
    pub tag: Option<String>,
    pub position: usize,
    pub items: Vec<Task>,
}

impl Column {
    pub fn new(id: impl Into<EntityId>, title: impl Into<String>, tag: Option<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            tag: normalize_tag(tag),
            position: 0,
            items: Vec::new(),
        }
    }

    /// Non-empty derived tag, if any.
    pub fn derived_tag(&self) -> Option<&str> {
        self.tag.as_deref().filter(|tag| !tag.is_empty())
    }

    pub fn task(&self, task_id: &str) -> Option<&Task> {
        self.items.iter().find(|task| task.id == task_id)
    }

    pub fn task_index(&self, task_id: &str) -> Option<usize> {
        self.items.iter().position(|task| task.id == task_id)
    }

    /// Rewrites cached task positions from array order.
    pub fn renumber(&mut self) {
        for (index, task) in self.items.iter_mut().enumerate() {
            task.position = index;
        }
    }
}

/// Board of columns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Project {
    pub id: EntityId,
    pub name: String,
    pub description: String,
    pub columns: Vec<Column>,
}

impl Project {
    pub fn new(id: impl Into<EntityId>, name: impl Into<String>, columns: Vec<Column>) -> Self {
        let mut project = Self {
            id: id.into(),
            name: name.into(),
            description: String::new(),
            columns,
        };
        project.renumber();
        project
    }

    pub fn column(&self, column_id: &str) -> Option<&Column> {
        self.columns.iter().find(|column| column.id == column_id)
    }

    pub fn column_mut(&mut self, column_id: &str) -> Option<&mut Column> {
        self.columns.iter_mut().find(|column| column.id == column_id)
    }

    pub fn column_index(&self, column_id: &str) -> Option<usize> {
        self.columns.iter().position(|column| column.id == column_id)
    }

    /// Finds the column currently holding `task_id`.
    pub fn column_of_task(&self, task_id: &str) -> Option<&Column> {
        self.columns
            .iter()
            .find(|column| column.task_index(task_id).is_some())
    }

    pub fn task(&self, task_id: &str) -> Option<&Task> {
        self.columns.iter().find_map(|column| column.task(task_id))
    }

    pub fn task_mut(&mut self, task_id: &str) -> Option<&mut Task> {
        self.columns
            .iter_mut()
            .find_map(|column| column.items.iter_mut().find(|task| task.id == task_id))
    }

    /// Count of tasks with `completed == false` across all columns.
    pub fn outstanding_task_count(&self) -> usize {
        self.columns
            .iter()
            .flat_map(|column| column.items.iter())
            .filter(|task| !task.completed)
            .count()
    }

    /// Rewrites cached column and task positions from array order.
    pub fn renumber(&mut self) {
        for (index, column) in self.columns.iter_mut().enumerate() {
            column.position = index;
            column.renumber();
        }
    }
}

/// Named, collapsible grouping of projects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Folder {
    pub id: EntityId,
    pub name: String,
    pub expanded: bool,
    pub projects: Vec<Project>,
}

impl Folder {
    pub fn new(id: impl Into<EntityId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            expanded: true,
            projects: Vec::new(),
        }
    }
}

/// Container currently holding a project.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ContainerRef {
    Folder(EntityId),
    Uncategorized,
}

impl Display for ContainerRef {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Folder(id) => write!(f, "folder:{id}"),
            Self::Uncategorized => write!(f, "uncategorized"),
        }
    }
}

/// Structural invariant violations detected by [`Board::validate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TreeInvariantError {
    /// The same project id appears more than once across containers.
    DuplicateProject(EntityId),
    /// Two folders share an id.
    DuplicateFolder(EntityId),
    /// Two columns of one project share an id.
    DuplicateColumn {
        project_id: EntityId,
        column_id: EntityId,
    },
    /// Two tasks of one project share an id.
    DuplicateTask {
        project_id: EntityId,
        task_id: EntityId,
    },
    /// A project has no columns.
    ProjectWithoutColumns(EntityId),
    /// The tree holds no project at all.
    NoProjects,
}

impl Display for TreeInvariantError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DuplicateProject(id) => write!(f, "duplicate project id: {id}"),
            Self::DuplicateFolder(id) => write!(f, "duplicate folder id: {id}"),
            Self::DuplicateColumn {
                project_id,
                column_id,
            } => write!(f, "duplicate column id {column_id} in project {project_id}"),
            Self::DuplicateTask {
                project_id,
                task_id,
            } => write!(f, "duplicate task id {task_id} in project {project_id}"),
            Self::ProjectWithoutColumns(id) => write!(f, "project has no columns: {id}"),
            Self::NoProjects => write!(f, "board must contain at least one project"),
        }
    }
}

impl Error for TreeInvariantError {}

/// The whole per-user tree: folders followed by uncategorized projects.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Board {
    pub folders: Vec<Folder>,
    pub uncategorized: Vec<Project>,
}

impl Board {
    /// Every project, folders first (folder order, then project order), then
    /// the uncategorized list.
    pub fn all_projects(&self) -> Vec<&Project> {
        self.folders
            .iter()
            .flat_map(|folder| folder.projects.iter())
            .chain(self.uncategorized.iter())
            .collect()
    }

    /// Ids in [`Board::all_projects`] order.
    pub fn all_project_ids(&self) -> Vec<EntityId> {
        self.all_projects()
            .into_iter()
            .map(|project| project.id.clone())
            .collect()
    }

    pub fn project_count(&self) -> usize {
        self.folders
            .iter()
            .map(|folder| folder.projects.len())
            .sum::<usize>()
            + self.uncategorized.len()
    }

    /// Container currently holding `project_id`.
    pub fn locate(&self, project_id: &str) -> Option<ContainerRef> {
        for folder in &self.folders {
            if folder.projects.iter().any(|project| project.id == project_id) {
                return Some(ContainerRef::Folder(folder.id.clone()));
            }
        }
        if self
            .uncategorized
            .iter()
            .any(|project| project.id == project_id)
        {
            return Some(ContainerRef::Uncategorized);
        }
        None
    }

    /// Outstanding task count for one project; `0` when the project is unknown.
    pub fn outstanding_task_count(&self, project_id: &str) -> usize {
        self.project(project_id)
            .map_or(0, Project::outstanding_task_count)
    }

    pub fn project(&self, project_id: &str) -> Option<&Project> {
        self.all_projects()
            .into_iter()
            .find(|project| project.id == project_id)
    }

    pub fn project_mut(&mut self, project_id: &str) -> Option<&mut Project> {
        self.folders
            .iter_mut()
            .flat_map(|folder| folder.projects.iter_mut())
            .chain(self.uncategorized.iter_mut())
            .find(|project| project.id == project_id)
    }

    pub fn folder(&self, folder_id: &str) -> Option<&Folder> {
        self.folders.iter().find(|folder| folder.id == folder_id)
    }

    pub fn folder_mut(&mut self, folder_id: &str) -> Option<&mut Folder> {
        self.folders.iter_mut().find(|folder| folder.id == folder_id)
    }

    /// Mutable project list of one container, if the container exists.
    pub fn container_mut(&mut self, container: &ContainerRef) -> Option<&mut Vec<Project>> {
        match container {
            ContainerRef::Folder(folder_id) => self
                .folder_mut(folder_id)
                .map(|folder| &mut folder.projects),
            ContainerRef::Uncategorized => Some(&mut self.uncategorized),
        }
    }

    /// Detaches `project_id` from whichever container holds it.
    pub fn take_project(&mut self, project_id: &str) -> Option<Project> {
        for folder in &mut self.folders {
            if let Some(index) = folder
                .projects
                .iter()
                .position(|project| project.id == project_id)
            {
                return Some(folder.projects.remove(index));
            }
        }
        let index = self
            .uncategorized
            .iter()
            .position(|project| project.id == project_id)?;
        Some(self.uncategorized.remove(index))
    }

    /// First project id in [`Board::all_projects`] order.
    pub fn first_project_id(&self) -> Option<EntityId> {
        self.all_projects()
            .first()
            .map(|project| project.id.clone())
    }

    /// Rewrites cached positions for every column and task.
    pub fn renumber(&mut self) {
        for folder in &mut self.folders {
            for project in &mut folder.projects {
                project.renumber();
            }
        }
        for project in &mut self.uncategorized {
            project.renumber();
        }
    }

    /// Checks uniqueness and containment invariants.
    pub fn validate(&self) -> Result<(), TreeInvariantError> {
        let mut folder_ids = HashSet::new();
        for folder in &self.folders {
            if !folder_ids.insert(folder.id.as_str()) {
                return Err(TreeInvariantError::DuplicateFolder(folder.id.clone()));
            }
        }

        let projects = self.all_projects();
        if projects.is_empty() {
            return Err(TreeInvariantError::NoProjects);
        }

        let mut project_ids = HashSet::new();
        for project in projects {
            if !project_ids.insert(project.id.as_str()) {
                return Err(TreeInvariantError::DuplicateProject(project.id.clone()));
            }
            if project.columns.is_empty() {
                return Err(TreeInvariantError::ProjectWithoutColumns(
                    project.id.clone(),
                ));
            }

            let mut column_ids = HashSet::new();
            let mut task_ids = HashSet::new();
            for column in &project.columns {
                if !column_ids.insert(column.id.as_str()) {
                    return Err(TreeInvariantError::DuplicateColumn {
                        project_id: project.id.clone(),
                        column_id: column.id.clone(),
                    });
                }
                for task in &column.items {
                    if !task_ids.insert(task.id.as_str()) {
                        return Err(TreeInvariantError::DuplicateTask {
                            project_id: project.id.clone(),
                            task_id: task.id.clone(),
                        });
                    }
                }
            }
        }
        Ok(())
    }
}

/// Trims a column tag and drops it when blank.
pub fn normalize_tag(tag: Option<String>) -> Option<String> {
    tag.map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// Trims tags, drops blanks and removes duplicates while keeping first-seen order.
pub fn normalize_tags<I, S>(tags: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut normalized: Vec<String> = Vec::new();
    for tag in tags {
        let trimmed = tag.as_ref().trim();
        if trimmed.is_empty() || normalized.iter().any(|current| current == trimmed) {
            continue;
        }
        normalized.push(trimmed.to_string());
    }
    normalized
}

#[cfg(test)]
mod tests {
    use super::*;

    fn project(id: &str) -> Project {
        Project::new(id, id, vec![Column::new("todo", "TODO", Some("todo".into()))])
    }

    fn board() -> Board {
        let mut work = Folder::new("work", "Work");
        work.projects = vec![project("a"), project("b")];
        let mut home = Folder::new("home", "Home");
        home.projects = vec![project("c")];
        Board {
            folders: vec![work, home],
            uncategorized: vec![project("d")],
        }
    }

    #[test]
    fn all_projects_orders_folders_then_uncategorized() {
        let ids = board().all_project_ids();
        assert_eq!(ids, vec!["a", "b", "c", "d"]);
    }

    #[test]
    fn locate_reports_container() {
        let board = board();
        assert_eq!(
            board.locate("c"),
            Some(ContainerRef::Folder("home".to_string()))
        );
        assert_eq!(board.locate("d"), Some(ContainerRef::Uncategorized));
        assert_eq!(board.locate("missing"), None);
    }

    #[test]
    fn outstanding_count_skips_completed_tasks() {
        let mut board = board();
        let project = board.project_mut("a").unwrap();
        let column = &mut project.columns[0];
        column.items.push(Task::new("t1", "one", 0));
        let mut done = Task::new("t2", "two", 0);
        done.completed = true;
        column.items.push(done);
        column.items.push(Task::new("t3", "three", 0));

        assert_eq!(board.outstanding_task_count("a"), 2);
        assert_eq!(board.outstanding_task_count("missing"), 0);
    }

    #[test]
    fn validate_rejects_duplicate_project_across_containers() {
        let mut board = board();
        board.uncategorized.push(project("a"));
        assert_eq!(
            board.validate(),
            Err(TreeInvariantError::DuplicateProject("a".to_string()))
        );
    }

    #[test]
    fn task_tags_behave_as_a_set() {
        let mut task = Task::new("t", "text", 0);
        assert!(task.add_tag("ui"));
        assert!(!task.add_tag("ui"));
        assert!(!task.add_tag(""));
        assert!(task.remove_tag("ui"));
        assert!(task.tags.is_empty());
    }
}
