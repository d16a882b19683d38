//! Nearest-candidate drop-target resolution.
//!
//! # Responsibility
//! - Pick a destination column and insertion anchor for a dragged task.
//! - Pick an insertion anchor for a dragged column.
//! - Hit-test project drop zones (folders and the uncategorized list).
//!
//! # Invariants
//! - Task and column resolution is nearest-neighbor on one axis, not containment.
//!   A pointer may therefore resolve to a column it is not visually inside.
//! - Candidates are evaluated in layout order and a later candidate must be
//!   strictly closer to win, so ties go to the earlier candidate.
//! - The dragged entity is never a candidate.

use crate::model::board::{ContainerRef, EntityId};
use crate::service::reorder::InsertionAnchor;

/// Distance below the last task used for the synthetic "after last" candidate.
pub const DEFAULT_TASK_END_OFFSET_PX: f64 = 20.0;

/// Axis-aligned bounding box in screen coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(left: f64, top: f64, width: f64, height: f64) -> Self {
        Self {
            left,
            top,
            width,
            height,
        }
    }

    pub fn center_x(&self) -> f64 {
        self.left + self.width / 2.0
    }

    pub fn center_y(&self) -> f64 {
        self.top + self.height / 2.0
    }

    pub fn bottom(&self) -> f64 {
        self.top + self.height
    }

    pub fn right(&self) -> f64 {
        self.left + self.width
    }

    /// Inclusive containment test.
    pub fn contains(&self, point: Point) -> bool {
        point.x >= self.left
            && point.x <= self.right()
            && point.y >= self.top
            && point.y <= self.bottom()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Rendered task element.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskSlot {
    pub task_id: EntityId,
    pub rect: Rect,
}

/// Rendered column with its task elements in display order.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnLayout {
    pub column_id: EntityId,
    pub rect: Rect,
    pub tasks: Vec<TaskSlot>,
}

/// Resolved destination for a task drop. `anchor == None` means "append".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskDropTarget {
    pub column_id: EntityId,
    pub anchor: Option<InsertionAnchor>,
}

/// Rendered column header used for column reordering.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnSlot {
    pub column_id: EntityId,
    pub rect: Rect,
}

/// Continuous drop area for project drags.
#[derive(Debug, Clone, PartialEq)]
pub struct DropZone {
    pub target: ContainerRef,
    pub rect: Rect,
}

struct Nearest<T> {
    best: Option<(f64, T)>,
}

impl<T> Nearest<T> {
    fn new() -> Self {
        Self { best: None }
    }

    fn offer(&mut self, distance: f64, candidate: impl FnOnce() -> T) {
        let closer = match &self.best {
            Some((best, _)) => distance < *best,
            None => distance.is_finite(),
        };
        if closer {
            self.best = Some((distance, candidate()));
        }
    }

    fn finish(self) -> Option<T> {
        self.best.map(|(_, candidate)| candidate)
    }
}

/// Resolves where a dragged task would land for a pointer at `pointer_y`.
///
/// Per column, in order: an empty column offers its own center (append); a
/// populated column offers every task center (before when the pointer is
/// above it, after otherwise) and then `last.bottom + end_offset` as "after
/// the last task". A column whose only task is the dragged one counts as empty.
pub fn resolve_task_drop(
    columns: &[ColumnLayout],
    dragged_task_id: &str,
    pointer_y: f64,
    end_offset: f64,
) -> Option<TaskDropTarget> {
    let mut nearest = Nearest::new();

    for column in columns {
        let tasks: Vec<&TaskSlot> = column
            .tasks
            .iter()
            .filter(|slot| slot.task_id != dragged_task_id)
            .collect();

        let Some(last) = tasks.last() else {
            nearest.offer((pointer_y - column.rect.center_y()).abs(), || TaskDropTarget {
                column_id: column.column_id.clone(),
                anchor: None,
            });
            continue;
        };

        for slot in &tasks {
            let center = slot.rect.center_y();
            nearest.offer((pointer_y - center).abs(), || TaskDropTarget {
                column_id: column.column_id.clone(),
                anchor: Some(if pointer_y < center {
                    InsertionAnchor::before(slot.task_id.clone())
                } else {
                    InsertionAnchor::after(slot.task_id.clone())
                }),
            });
        }

        let end = last.rect.bottom() + end_offset;
        nearest.offer((pointer_y - end).abs(), || TaskDropTarget {
            column_id: column.column_id.clone(),
            anchor: Some(InsertionAnchor::after(last.task_id.clone())),
        });
    }

    nearest.finish()
}

/// Resolves where a dragged column would land for a pointer at `pointer_x`.
pub fn resolve_column_drop(
    columns: &[ColumnSlot],
    dragged_column_id: &str,
    pointer_x: f64,
) -> Option<InsertionAnchor> {
    let mut nearest = Nearest::new();
    for slot in columns
        .iter()
        .filter(|slot| slot.column_id != dragged_column_id)
    {
        let center = slot.rect.center_x();
        nearest.offer((pointer_x - center).abs(), || {
            if pointer_x < center {
                InsertionAnchor::before(slot.column_id.clone())
            } else {
                InsertionAnchor::after(slot.column_id.clone())
            }
        });
    }
    nearest.finish()
}

/// First zone containing `point`, if any.
pub fn resolve_project_drop(zones: &[DropZone], point: Point) -> Option<ContainerRef> {
    zones
        .iter()
        .find(|zone| zone.rect.contains(point))
        .map(|zone| zone.target.clone())
}
