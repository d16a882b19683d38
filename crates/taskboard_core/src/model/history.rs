//! Completed-task history model.
//!
//! # Responsibility
//! - Snapshot archived tasks into immutable history entries.
//! - Group entries by originating project id.
//!
//! # Invariants
//! - The log is append-only: entries are never rewritten, removed or deduplicated.

use crate::model::board::{EntityId, Priority, Task};
use chrono::NaiveDate;
use std::collections::BTreeMap;

/// Immutable snapshot of an archived task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryEntry {
    pub id: EntityId,
    pub text: String,
    pub description: String,
    pub due_date: Option<NaiveDate>,
    pub priority: Priority,
    pub tags: Vec<String>,
    /// Epoch ms.
    pub completed_at: i64,
    /// Epoch ms.
    pub created_at: i64,
}

impl HistoryEntry {
    /// Snapshots `task`, using `archived_at` when the task carries no
    /// completion timestamp.
    pub fn from_task(task: &Task, archived_at: i64) -> Self {
        Self {
            id: task.id.clone(),
            text: task.text.clone(),
            description: task.description.clone(),
            due_date: task.due_date,
            priority: task.priority,
            tags: task.tags.clone(),
            completed_at: task.completed_at.unwrap_or(archived_at),
            created_at: task.created_at,
        }
    }
}

/// Per-project append-only history.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HistoryLog {
    entries: BTreeMap<EntityId, Vec<HistoryEntry>>,
}

impl HistoryLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, project_id: &str, entry: HistoryEntry) {
        self.entries
            .entry(project_id.to_string())
            .or_default()
            .push(entry);
    }

    /// Entries for one project in append order.
    pub fn entries_for(&self, project_id: &str) -> &[HistoryEntry] {
        self.entries
            .get(project_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Entries for one project, newest completion first.
    pub fn newest_first(&self, project_id: &str) -> Vec<&HistoryEntry> {
        let mut entries: Vec<&HistoryEntry> = self.entries_for(project_id).iter().collect();
        entries.sort_by(|left, right| right.completed_at.cmp(&left.completed_at));
        entries
    }

    pub fn len(&self) -> usize {
        self.entries.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Iterates `(project_id, entry)` pairs grouped by project.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &HistoryEntry)> {
        self.entries.iter().flat_map(|(project_id, entries)| {
            entries
                .iter()
                .map(move |entry| (project_id.as_str(), entry))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_keeps_duplicates_and_groups_by_project() {
        let task = Task::new("t1", "write docs", 10);
        let mut log = HistoryLog::new();
        log.append("p1", HistoryEntry::from_task(&task, 100));
        log.append("p1", HistoryEntry::from_task(&task, 200));
        log.append("p2", HistoryEntry::from_task(&task, 300));

        assert_eq!(log.entries_for("p1").len(), 2);
        assert_eq!(log.entries_for("p2").len(), 1);
        assert!(log.entries_for("p3").is_empty());
        assert_eq!(log.len(), 3);
    }

    #[test]
    fn newest_first_sorts_by_completion() {
        let mut log = HistoryLog::new();
        let mut older = Task::new("old", "old", 0);
        older.completed_at = Some(1_000);
        let mut newer = Task::new("new", "new", 0);
        newer.completed_at = Some(2_000);
        log.append("p", HistoryEntry::from_task(&older, 0));
        log.append("p", HistoryEntry::from_task(&newer, 0));

        let ids: Vec<&str> = log
            .newest_first("p")
            .into_iter()
            .map(|entry| entry.id.as_str())
            .collect();
        assert_eq!(ids, vec!["new", "old"]);
    }
}
