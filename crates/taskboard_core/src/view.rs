//! Pure projection of the board tree into a render-ready view-model.
//!
//! Nothing here mutates state; the same inputs always produce the same view.

use crate::model::board::{Board, EntityId, Project};
use crate::model::history::{HistoryEntry, HistoryLog};
use crate::service::selection::ProjectSelection;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BoardView {
    pub folders: Vec<FolderView>,
    pub uncategorized: Vec<ProjectSummaryView>,
    /// Board of the current project, if one is selected and still exists.
    pub current: Option<ProjectView>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FolderView {
    pub id: EntityId,
    pub name: String,
    pub expanded: bool,
    pub project_count: usize,
    /// Empty while the folder is collapsed.
    pub projects: Vec<ProjectSummaryView>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectSummaryView {
    pub id: EntityId,
    pub name: String,
    pub outstanding_tasks: usize,
    pub is_current: bool,
    pub is_selected: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectView {
    pub id: EntityId,
    pub name: String,
    pub description: String,
    pub columns: Vec<ColumnView>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnView {
    pub id: EntityId,
    pub title: String,
    pub tag: Option<String>,
    pub tasks: Vec<TaskView>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskView {
    pub id: EntityId,
    pub text: String,
    pub description: String,
    pub priority: &'static str,
    pub due_date: Option<String>,
    pub tags: Vec<String>,
    pub completed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntryView {
    pub id: EntityId,
    pub text: String,
    pub description: String,
    pub priority: &'static str,
    pub due_date: Option<String>,
    pub tags: Vec<String>,
    pub completed_at: i64,
    pub created_at: i64,
}

/// Projects `board` for display.
pub fn render(
    board: &Board,
    current_project_id: Option<&str>,
    selection: &ProjectSelection,
) -> BoardView {
    let summary = |project: &Project| ProjectSummaryView {
        id: project.id.clone(),
        name: project.name.clone(),
        outstanding_tasks: project.outstanding_task_count(),
        is_current: current_project_id == Some(project.id.as_str()),
        is_selected: selection.contains(&project.id),
    };

    BoardView {
        folders: board
            .folders
            .iter()
            .map(|folder| FolderView {
                id: folder.id.clone(),
                name: folder.name.clone(),
                expanded: folder.expanded,
                project_count: folder.projects.len(),
                projects: if folder.expanded {
                    folder.projects.iter().map(summary).collect()
                } else {
                    Vec::new()
                },
            })
            .collect(),
        uncategorized: board.uncategorized.iter().map(summary).collect(),
        current: current_project_id
            .and_then(|project_id| board.project(project_id))
            .map(project_view),
    }
}

/// History of one project, newest completion first.
pub fn render_history(history: &HistoryLog, project_id: &str) -> Vec<HistoryEntryView> {
    history
        .newest_first(project_id)
        .into_iter()
        .map(history_entry_view)
        .collect()
}

fn project_view(project: &Project) -> ProjectView {
    ProjectView {
        id: project.id.clone(),
        name: project.name.clone(),
        description: project.description.clone(),
        columns: project
            .columns
            .iter()
            .map(|column| ColumnView {
                id: column.id.clone(),
                title: column.title.clone(),
                tag: column.tag.clone(),
                tasks: column
                    .items
                    .iter()
                    .map(|task| TaskView {
                        id: task.id.clone(),
                        text: task.text.clone(),
                        description: task.description.clone(),
                        priority: task.priority.as_str(),
                        due_date: task.due_date.map(|date| date.to_string()),
                        tags: task.tags.clone(),
                        completed: task.completed,
                    })
                    .collect(),
            })
            .collect(),
    }
}

fn history_entry_view(entry: &HistoryEntry) -> HistoryEntryView {
    HistoryEntryView {
        id: entry.id.clone(),
        text: entry.text.clone(),
        description: entry.description.clone(),
        priority: entry.priority.as_str(),
        due_date: entry.due_date.map(|date| date.to_string()),
        tags: entry.tags.clone(),
        completed_at: entry.completed_at,
        created_at: entry.created_at,
    }
}
