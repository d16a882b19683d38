//! Wire schema for the stored board document.
//!
//! # Responsibility
//! - Define the nested `{folders, uncategorized}` JSON shape.
//! - Normalize loosely typed stored fields into the domain model.
//! - Reject malformed data instead of coercing it.
//!
//! # Invariants
//! - Output is canonical: tags are lists, timestamps are RFC 3339 strings,
//!   priorities are lowercase labels.
//! - Input tags may be a list or a comma-separated string.
//! - Input dates are `YYYY-MM-DD`, an empty string or null.
//! - Input timestamps are RFC 3339 strings or epoch milliseconds.
//! - A missing priority means `medium`; an unknown one is an error.
//! - Array order wins over any stored `position` value.

use crate::model::board::{
    normalize_tags, Board, Column, EntityId, Folder, Priority, Project, Task, TreeInvariantError,
};
use crate::model::history::{HistoryEntry, HistoryLog};
use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Malformed stored data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaError {
    /// An entity id is blank.
    BlankId(&'static str),
    UnknownPriority {
        task_id: EntityId,
        value: String,
    },
    InvalidDate {
        task_id: EntityId,
        value: String,
    },
    InvalidTimestamp {
        task_id: EntityId,
        field: &'static str,
        value: String,
    },
    /// Decoded tree breaks a structural invariant.
    InvalidTree(TreeInvariantError),
}

impl Display for SchemaError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BlankId(kind) => write!(f, "{kind} id must not be blank"),
            Self::UnknownPriority { task_id, value } => {
                write!(f, "task {task_id} has unknown priority `{value}`")
            }
            Self::InvalidDate { task_id, value } => {
                write!(f, "task {task_id} has invalid due date `{value}`")
            }
            Self::InvalidTimestamp {
                task_id,
                field,
                value,
            } => write!(f, "task {task_id} has invalid {field} `{value}`"),
            Self::InvalidTree(err) => write!(f, "invalid board tree: {err}"),
        }
    }
}

impl Error for SchemaError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::InvalidTree(err) => Some(err),
            _ => None,
        }
    }
}

impl From<TreeInvariantError> for SchemaError {
    fn from(value: TreeInvariantError) -> Self {
        Self::InvalidTree(value)
    }
}

/// Tags as stored: canonical list or legacy comma-joined string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TagsDto {
    List(Vec<String>),
    Joined(String),
}

impl TagsDto {
    fn into_tags(self) -> Vec<String> {
        match self {
            Self::List(tags) => normalize_tags(tags),
            Self::Joined(joined) => normalize_tags(joined.split(',')),
        }
    }
}

/// Timestamp as stored: epoch milliseconds or RFC 3339 text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TimestampDto {
    Millis(i64),
    Text(String),
}

impl TimestampDto {
    /// Canonical form: RFC 3339 with millisecond precision, epoch ms when
    /// the value is outside chrono's range.
    pub fn from_millis(millis: i64) -> Self {
        match DateTime::<Utc>::from_timestamp_millis(millis) {
            Some(at) => Self::Text(at.to_rfc3339_opts(SecondsFormat::Millis, true)),
            None => Self::Millis(millis),
        }
    }

    fn to_millis(&self, task_id: &str, field: &'static str) -> Result<i64, SchemaError> {
        match self {
            Self::Millis(millis) => Ok(*millis),
            Self::Text(text) => DateTime::parse_from_rfc3339(text.trim())
                .map(|at| at.timestamp_millis())
                .map_err(|_| SchemaError::InvalidTimestamp {
                    task_id: task_id.to_string(),
                    field,
                    value: text.clone(),
                }),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoardDto {
    #[serde(default)]
    pub folders: Vec<FolderDto>,
    #[serde(default)]
    pub uncategorized: Vec<ProjectDto>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FolderDto {
    pub id: String,
    pub name: String,
    #[serde(default = "default_expanded")]
    pub expanded: bool,
    #[serde(default)]
    pub projects: Vec<ProjectDto>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectDto {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub columns: Vec<ColumnDto>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnDto {
    pub id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<i64>,
    #[serde(default)]
    pub items: Vec<TaskDto>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskDto {
    pub id: String,
    pub text: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub priority: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<String>,
    #[serde(default)]
    pub tags: Option<TagsDto>,
    #[serde(default)]
    pub completed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<TimestampDto>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<TimestampDto>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<i64>,
}

/// History entry as stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntryDto {
    pub id: String,
    pub text: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<String>,
    #[serde(default)]
    pub priority: Option<String>,
    #[serde(default)]
    pub tags: Option<TagsDto>,
    pub completed_at: TimestampDto,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<TimestampDto>,
}

/// Stored history document: project id to entries in append order.
pub type HistoryDocument = BTreeMap<EntityId, Vec<HistoryEntryDto>>;

fn default_expanded() -> bool {
    true
}

/// Decodes and validates a stored board. `now_ms` stands in for missing
/// creation timestamps.
pub fn to_board(dto: BoardDto, now_ms: i64) -> Result<Board, SchemaError> {
    let folders = dto
        .folders
        .into_iter()
        .map(|folder| folder_from_dto(folder, now_ms))
        .collect::<Result<Vec<_>, _>>()?;
    let uncategorized = dto
        .uncategorized
        .into_iter()
        .map(|project| project_from_dto(project, now_ms))
        .collect::<Result<Vec<_>, _>>()?;

    let board = Board {
        folders,
        uncategorized,
    };
    board.validate()?;
    Ok(board)
}

/// Encodes a board in canonical form.
pub fn from_board(board: &Board) -> BoardDto {
    BoardDto {
        folders: board
            .folders
            .iter()
            .map(|folder| FolderDto {
                id: folder.id.clone(),
                name: folder.name.clone(),
                expanded: folder.expanded,
                projects: folder.projects.iter().map(project_to_dto).collect(),
            })
            .collect(),
        uncategorized: board.uncategorized.iter().map(project_to_dto).collect(),
    }
}

pub fn history_entry_to_dto(entry: &HistoryEntry) -> HistoryEntryDto {
    HistoryEntryDto {
        id: entry.id.clone(),
        text: entry.text.clone(),
        description: Some(entry.description.clone()),
        due_date: entry.due_date.map(format_date),
        priority: Some(entry.priority.as_str().to_string()),
        tags: Some(TagsDto::List(entry.tags.clone())),
        completed_at: TimestampDto::from_millis(entry.completed_at),
        created_at: Some(TimestampDto::from_millis(entry.created_at)),
    }
}

pub fn history_entry_from_dto(dto: HistoryEntryDto) -> Result<HistoryEntry, SchemaError> {
    let completed_at = dto.completed_at.to_millis(&dto.id, "completedAt")?;
    let created_at = match &dto.created_at {
        Some(created_at) => created_at.to_millis(&dto.id, "createdAt")?,
        None => completed_at,
    };
    Ok(HistoryEntry {
        priority: parse_priority(&dto.id, dto.priority.as_deref())?,
        due_date: parse_due_date(&dto.id, dto.due_date.as_deref())?,
        tags: dto.tags.map(TagsDto::into_tags).unwrap_or_default(),
        description: dto.description.unwrap_or_default(),
        completed_at,
        created_at,
        id: dto.id,
        text: dto.text,
    })
}

/// Decodes a stored history document into a log.
pub fn history_from_document(document: HistoryDocument) -> Result<HistoryLog, SchemaError> {
    let mut log = HistoryLog::new();
    for (project_id, entries) in document {
        for entry in entries {
            log.append(&project_id, history_entry_from_dto(entry)?);
        }
    }
    Ok(log)
}

pub fn history_to_document(log: &HistoryLog) -> HistoryDocument {
    let mut document = HistoryDocument::new();
    for (project_id, entry) in log.iter() {
        document
            .entry(project_id.to_string())
            .or_default()
            .push(history_entry_to_dto(entry));
    }
    document
}

fn folder_from_dto(dto: FolderDto, now_ms: i64) -> Result<Folder, SchemaError> {
    require_id("folder", &dto.id)?;
    let projects = dto
        .projects
        .into_iter()
        .map(|project| project_from_dto(project, now_ms))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Folder {
        id: dto.id,
        name: dto.name,
        expanded: dto.expanded,
        projects,
    })
}

fn project_from_dto(dto: ProjectDto, now_ms: i64) -> Result<Project, SchemaError> {
    require_id("project", &dto.id)?;
    let columns = dto
        .columns
        .into_iter()
        .map(|column| column_from_dto(column, now_ms))
        .collect::<Result<Vec<_>, _>>()?;
    let mut project = Project::new(dto.id, dto.name, columns);
    project.description = dto.description.unwrap_or_default();
    Ok(project)
}

fn column_from_dto(dto: ColumnDto, now_ms: i64) -> Result<Column, SchemaError> {
    require_id("column", &dto.id)?;
    let mut column = Column::new(dto.id, dto.title, dto.tag);
    column.items = dto
        .items
        .into_iter()
        .map(|task| task_from_dto(task, now_ms))
        .collect::<Result<Vec<_>, _>>()?;
    column.renumber();
    Ok(column)
}

fn task_from_dto(dto: TaskDto, now_ms: i64) -> Result<Task, SchemaError> {
    require_id("task", &dto.id)?;
    let priority = parse_priority(&dto.id, dto.priority.as_deref())?;
    let due_date = parse_due_date(&dto.id, dto.due_date.as_deref())?;
    let completed_at = match &dto.completed_at {
        Some(completed_at) if dto.completed => {
            Some(completed_at.to_millis(&dto.id, "completedAt")?)
        }
        _ => None,
    };
    let created_at = match &dto.created_at {
        Some(created_at) => created_at.to_millis(&dto.id, "createdAt")?,
        None => now_ms,
    };

    let mut task = Task::new(dto.id, dto.text, created_at);
    task.description = dto.description.unwrap_or_default();
    task.priority = priority;
    task.due_date = due_date;
    task.tags = dto.tags.map(TagsDto::into_tags).unwrap_or_default();
    task.completed = dto.completed;
    task.completed_at = completed_at;
    Ok(task)
}

fn project_to_dto(project: &Project) -> ProjectDto {
    ProjectDto {
        id: project.id.clone(),
        name: project.name.clone(),
        description: Some(project.description.clone()),
        columns: project
            .columns
            .iter()
            .enumerate()
            .map(|(index, column)| ColumnDto {
                id: column.id.clone(),
                title: column.title.clone(),
                tag: column.tag.clone(),
                position: Some(index as i64),
                items: column
                    .items
                    .iter()
                    .enumerate()
                    .map(|(index, task)| task_to_dto(task, index))
                    .collect(),
            })
            .collect(),
    }
}

fn task_to_dto(task: &Task, index: usize) -> TaskDto {
    TaskDto {
        id: task.id.clone(),
        text: task.text.clone(),
        description: Some(task.description.clone()),
        priority: Some(task.priority.as_str().to_string()),
        due_date: task.due_date.map(format_date),
        tags: Some(TagsDto::List(task.tags.clone())),
        completed: task.completed,
        completed_at: task.completed_at.map(TimestampDto::from_millis),
        created_at: Some(TimestampDto::from_millis(task.created_at)),
        position: Some(index as i64),
    }
}

fn require_id(kind: &'static str, id: &str) -> Result<(), SchemaError> {
    if id.trim().is_empty() {
        return Err(SchemaError::BlankId(kind));
    }
    Ok(())
}

fn parse_priority(task_id: &str, value: Option<&str>) -> Result<Priority, SchemaError> {
    match value.map(str::trim) {
        None | Some("") => Ok(Priority::default()),
        Some(label) => Priority::parse(label).ok_or_else(|| SchemaError::UnknownPriority {
            task_id: task_id.to_string(),
            value: label.to_string(),
        }),
    }
}

fn parse_due_date(task_id: &str, value: Option<&str>) -> Result<Option<NaiveDate>, SchemaError> {
    match value.map(str::trim) {
        None | Some("") => Ok(None),
        Some(text) => NaiveDate::parse_from_str(text, DATE_FORMAT)
            .map(Some)
            .map_err(|_| SchemaError::InvalidDate {
                task_id: task_id.to_string(),
                value: text.to_string(),
            }),
    }
}

fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}
