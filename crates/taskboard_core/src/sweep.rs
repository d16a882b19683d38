//! Retention sweep for completed tasks.
//!
//! # Responsibility
//! - Archive completed tasks older than the retention threshold into history.
//! - Remove archived tasks from their columns.
//! - Refuse overlapping runs.
//!
//! # Invariants
//! - A task qualifies only when `completed == true`, `completed_at` is set and
//!   `now - completed_at` is strictly greater than the threshold.
//! - Every removed task produces exactly one history entry, appended before
//!   the removal becomes visible.
//! - A second run with nothing newly eligible changes nothing.

use crate::model::board::{Board, Column, EntityId, Project, Task};
use crate::model::history::{HistoryEntry, HistoryLog};
use log::{info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};

/// Default retention threshold: 24 hours in milliseconds.
pub const DEFAULT_RETENTION_MS: i64 = 24 * 60 * 60 * 1000;
/// Default sweep timer period: 1 hour in milliseconds.
pub const DEFAULT_SWEEP_INTERVAL_MS: i64 = 60 * 60 * 1000;

const NEVER_RAN: i64 = i64::MIN;

/// Outcome of one sweep run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// `(project_id, entry)` for every archived task, in board order.
    pub archived: Vec<(EntityId, HistoryEntry)>,
}

impl SweepReport {
    pub fn archived_count(&self) -> usize {
        self.archived.len()
    }

    pub fn is_empty(&self) -> bool {
        self.archived.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SweepError {
    /// Another run is still in flight.
    AlreadyRunning,
}

impl Display for SweepError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AlreadyRunning => write!(f, "retention sweep already running"),
        }
    }
}

impl Error for SweepError {}

/// Archives and removes every qualifying task in `board`.
pub fn sweep_completed_tasks(
    board: &mut Board,
    history: &mut HistoryLog,
    now_ms: i64,
    retention_ms: i64,
) -> SweepReport {
    let mut report = SweepReport::default();
    let projects = board
        .folders
        .iter_mut()
        .flat_map(|folder| folder.projects.iter_mut())
        .chain(board.uncategorized.iter_mut());

    for project in projects {
        sweep_project(project, history, now_ms, retention_ms, &mut report);
    }
    report
}

fn sweep_project(
    project: &mut Project,
    history: &mut HistoryLog,
    now_ms: i64,
    retention_ms: i64,
    report: &mut SweepReport,
) {
    for column in &mut project.columns {
        if !column
            .items
            .iter()
            .any(|task| is_expired(task, now_ms, retention_ms))
        {
            continue;
        }
        for task in drain_expired(column, now_ms, retention_ms) {
            let entry = HistoryEntry::from_task(&task, now_ms);
            history.append(&project.id, entry.clone());
            report.archived.push((project.id.clone(), entry));
        }
        column.renumber();
    }
}

fn drain_expired(column: &mut Column, now_ms: i64, retention_ms: i64) -> Vec<Task> {
    let (expired, kept): (Vec<Task>, Vec<Task>) = std::mem::take(&mut column.items)
        .into_iter()
        .partition(|task| is_expired(task, now_ms, retention_ms));
    column.items = kept;
    expired
}

fn is_expired(task: &Task, now_ms: i64, retention_ms: i64) -> bool {
    task.completed
        && task
            .completed_at
            .is_some_and(|completed_at| now_ms.saturating_sub(completed_at) > retention_ms)
}

/// Timer-driven sweep runner with a non-reentrant guard.
#[derive(Debug)]
pub struct RetentionSweeper {
    retention_ms: i64,
    interval_ms: i64,
    in_flight: AtomicBool,
    last_run_ms: AtomicI64,
}

impl Default for RetentionSweeper {
    fn default() -> Self {
        Self::new(DEFAULT_RETENTION_MS, DEFAULT_SWEEP_INTERVAL_MS)
    }
}

impl RetentionSweeper {
    pub fn new(retention_ms: i64, interval_ms: i64) -> Self {
        Self {
            retention_ms,
            interval_ms,
            in_flight: AtomicBool::new(false),
            last_run_ms: AtomicI64::new(NEVER_RAN),
        }
    }

    pub fn retention_ms(&self) -> i64 {
        self.retention_ms
    }

    pub fn interval_ms(&self) -> i64 {
        self.interval_ms
    }

    /// Epoch ms of the last completed run, if any.
    pub fn last_run_ms(&self) -> Option<i64> {
        let value = self.last_run_ms.load(Ordering::Acquire);
        (value != NEVER_RAN).then_some(value)
    }

    /// Holds the in-flight flag until dropped.
    pub fn try_acquire(&self) -> Result<SweepPermit<'_>, SweepError> {
        self.in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| SweepError::AlreadyRunning)?;
        Ok(SweepPermit { sweeper: self })
    }

    /// Runs one sweep now.
    pub fn run(
        &self,
        board: &mut Board,
        history: &mut HistoryLog,
        now_ms: i64,
    ) -> Result<SweepReport, SweepError> {
        let _permit = self.try_acquire().inspect_err(|_| {
            warn!("event=retention_sweep module=sweep status=skipped reason=already_running");
        })?;

        info!("event=retention_sweep module=sweep status=start");
        let report = sweep_completed_tasks(board, history, now_ms, self.retention_ms);
        self.last_run_ms.store(now_ms, Ordering::Release);
        info!(
            "event=retention_sweep module=sweep status=ok archived={}",
            report.archived_count()
        );
        Ok(report)
    }

    /// Whether the timer period has elapsed since the last run.
    pub fn is_due(&self, now_ms: i64) -> bool {
        self.last_run_ms()
            .map_or(true, |last| now_ms.saturating_sub(last) >= self.interval_ms)
    }

    /// Timer callback: runs only when due. `Ok(None)` means not due yet.
    pub fn tick(
        &self,
        board: &mut Board,
        history: &mut HistoryLog,
        now_ms: i64,
    ) -> Result<Option<SweepReport>, SweepError> {
        if !self.is_due(now_ms) {
            return Ok(None);
        }
        self.run(board, history, now_ms).map(Some)
    }
}

/// Guard for one sweep run. Clears the in-flight flag on drop.
#[derive(Debug)]
pub struct SweepPermit<'a> {
    sweeper: &'a RetentionSweeper,
}

impl Drop for SweepPermit<'_> {
    fn drop(&mut self) {
        self.sweeper.in_flight.store(false, Ordering::Release);
    }
}
