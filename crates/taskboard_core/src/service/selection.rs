//! Sidebar multi-selection of projects.
//!
//! # Invariants
//! - Selection is a set of project ids plus a last-selected anchor.
//! - Range selection walks `Board::all_projects()` order, inclusive on both ends.
//! - Batch operations visit selected ids in `Board::all_projects()` order.

use crate::model::board::{Board, EntityId};
use std::collections::BTreeSet;

/// Selected project ids with a last-selected anchor.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProjectSelection {
    selected: BTreeSet<EntityId>,
    last_selected: Option<EntityId>,
}

impl ProjectSelection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or removes one id and makes it the anchor.
    pub fn toggle(&mut self, project_id: &str) {
        if !self.selected.remove(project_id) {
            self.selected.insert(project_id.to_string());
        }
        self.last_selected = Some(project_id.to_string());
    }

    /// Adds every project between the anchor and `project_id`.
    ///
    /// Returns `false` and changes nothing when there is no anchor or either
    /// end is not on the board.
    pub fn select_range(&mut self, board: &Board, project_id: &str) -> bool {
        let Some(anchor) = self.last_selected.clone() else {
            return false;
        };
        let ids = board.all_project_ids();
        let start = ids.iter().position(|id| *id == anchor);
        let end = ids.iter().position(|id| id == project_id);
        let (Some(start), Some(end)) = (start, end) else {
            return false;
        };

        let (low, high) = (start.min(end), start.max(end));
        self.selected.extend(ids[low..=high].iter().cloned());
        self.last_selected = Some(project_id.to_string());
        true
    }

    /// Records a plain click: clears the set and anchors on `project_id`.
    pub fn anchor_on(&mut self, project_id: &str) {
        self.selected.clear();
        self.last_selected = Some(project_id.to_string());
    }

    pub fn clear(&mut self) {
        self.selected.clear();
        self.last_selected = None;
    }

    pub fn contains(&self, project_id: &str) -> bool {
        self.selected.contains(project_id)
    }

    pub fn is_empty(&self) -> bool {
        self.selected.is_empty()
    }

    pub fn len(&self) -> usize {
        self.selected.len()
    }

    pub fn last_selected(&self) -> Option<&str> {
        self.last_selected.as_deref()
    }

    /// Selected ids that still exist, in board order.
    pub fn ordered_ids(&self, board: &Board) -> Vec<EntityId> {
        board
            .all_project_ids()
            .into_iter()
            .filter(|id| self.selected.contains(id))
            .collect()
    }
}
