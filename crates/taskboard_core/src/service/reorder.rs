//! Anchor-based list reordering shared by task and column moves.
//!
//! # Invariants
//! - A before/after anchor is resolved against the list as it was before the
//!   moved item was removed; the resulting index is shifted by one when the
//!   item originally sat ahead of the anchor.
//! - No anchor means "append".
//! - Failed lookups leave the list untouched.

use crate::model::board::{Column, EntityId, Project, Task};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Side of the anchor sibling where the moved item lands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertPosition {
    Before,
    After,
}

/// Insert relative to a specific sibling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InsertionAnchor {
    pub target_id: EntityId,
    pub position: InsertPosition,
}

impl InsertionAnchor {
    pub fn before(target_id: impl Into<EntityId>) -> Self {
        Self {
            target_id: target_id.into(),
            position: InsertPosition::Before,
        }
    }

    pub fn after(target_id: impl Into<EntityId>) -> Self {
        Self {
            target_id: target_id.into(),
            position: InsertPosition::After,
        }
    }
}

/// Errors from reorder lookups.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReorderError {
    /// The item to move is not in the list.
    ItemNotFound(EntityId),
    /// The anchor sibling is not in the list.
    AnchorNotFound(EntityId),
}

impl Display for ReorderError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ItemNotFound(id) => write!(f, "item not found in list: {id}"),
            Self::AnchorNotFound(id) => write!(f, "anchor not found in list: {id}"),
        }
    }
}

impl Error for ReorderError {}

/// List element with a stable id.
pub trait Identified {
    fn id(&self) -> &str;
}

impl Identified for Task {
    fn id(&self) -> &str {
        &self.id
    }
}

impl Identified for Column {
    fn id(&self) -> &str {
        &self.id
    }
}

impl Identified for Project {
    fn id(&self) -> &str {
        &self.id
    }
}

pub fn index_of<T: Identified>(list: &[T], id: &str) -> Option<usize> {
    list.iter().position(|item| item.id() == id)
}

/// Index where a new item would be inserted for `anchor`.
pub fn insertion_index<T: Identified>(
    list: &[T],
    anchor: Option<&InsertionAnchor>,
) -> Result<usize, ReorderError> {
    let Some(anchor) = anchor else {
        return Ok(list.len());
    };
    let anchor_index = index_of(list, &anchor.target_id)
        .ok_or_else(|| ReorderError::AnchorNotFound(anchor.target_id.clone()))?;
    Ok(match anchor.position {
        InsertPosition::Before => anchor_index,
        InsertPosition::After => anchor_index + 1,
    })
}

/// Inserts `item` into `list` at the anchor. Returns the final index.
pub fn insert_at_anchor<T: Identified>(
    list: &mut Vec<T>,
    item: T,
    anchor: Option<&InsertionAnchor>,
) -> Result<usize, ReorderError> {
    let index = insertion_index(list, anchor)?;
    list.insert(index, item);
    Ok(index)
}

/// Moves `item_id` inside `list` to the anchor. Returns the final index.
///
/// Anchoring an item to itself is a no-op.
pub fn reorder_within_list<T: Identified>(
    list: &mut Vec<T>,
    item_id: &str,
    anchor: Option<&InsertionAnchor>,
) -> Result<usize, ReorderError> {
    let source_index =
        index_of(list, item_id).ok_or_else(|| ReorderError::ItemNotFound(item_id.to_string()))?;
    if anchor.is_some_and(|anchor| anchor.target_id == item_id) {
        return Ok(source_index);
    }

    let mut target_index = insertion_index(list, anchor)?;
    let item = list.remove(source_index);
    if source_index < target_index {
        target_index -= 1;
    }
    list.insert(target_index, item);
    Ok(target_index)
}
