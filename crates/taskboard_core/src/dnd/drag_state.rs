//! Single-slot drag gesture state.
//!
//! # Invariants
//! - At most one gesture is tracked. Beginning a new one replaces any stale one.
//! - `end` clears the slot unconditionally and hands back whatever was tracked.

use crate::model::board::EntityId;
use log::debug;

/// What is currently being dragged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DragPayload {
    Task {
        project_id: EntityId,
        column_id: EntityId,
        task_id: EntityId,
    },
    Column {
        project_id: EntityId,
        column_id: EntityId,
    },
    /// One or more projects, in board order.
    Projects(Vec<EntityId>),
}

impl DragPayload {
    fn kind(&self) -> &'static str {
        match self {
            Self::Task { .. } => "task",
            Self::Column { .. } => "column",
            Self::Projects(_) => "projects",
        }
    }

    /// Id excluded from drop candidate search.
    pub fn dragged_id(&self) -> Option<&str> {
        match self {
            Self::Task { task_id, .. } => Some(task_id),
            Self::Column { column_id, .. } => Some(column_id),
            Self::Projects(ids) => ids.first().map(String::as_str),
        }
    }
}

#[derive(Debug, Default)]
pub struct DragSession {
    current: Option<DragPayload>,
}

impl DragSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts a gesture, overwriting any stale one.
    pub fn begin(&mut self, payload: DragPayload) {
        if let Some(stale) = self.current.as_ref() {
            debug!(
                "event=drag_begin module=dnd status=skipped replaced_kind={}",
                stale.kind()
            );
        }
        debug!("event=drag_begin module=dnd status=ok kind={}", payload.kind());
        self.current = Some(payload);
    }

    pub fn current(&self) -> Option<&DragPayload> {
        self.current.as_ref()
    }

    pub fn is_dragging(&self) -> bool {
        self.current.is_some()
    }

    /// Ends the gesture (drop or abort) and returns what was being dragged.
    pub fn end(&mut self) -> Option<DragPayload> {
        let payload = self.current.take();
        debug!(
            "event=drag_end module=dnd status=ok had_payload={}",
            payload.is_some()
        );
        payload
    }
}
