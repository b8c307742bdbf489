//! Output of the auto-scheduler: new dates, conflicts and touched tasks.

use chrono::NaiveDate;
use rustc_hash::FxHashMap;
use std::fmt;

use crate::models::{Link, TaskId};

/// Saved plan to compare a schedule against: task id -> (start, end).
pub type Baseline = FxHashMap<TaskId, (NaiveDate, NaiveDate)>;

/// Dates computed for one task.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TaskSchedule {
    pub start: NaiveDate,
    pub end: NaiveDate,
    /// Whether the dates differ from the snapshot the caller passed in.
    pub changed: bool,
}

/// Machine-readable conflict category.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ConflictKind {
    /// Computed end falls after the project end. Dates are kept, not clamped.
    ExceedsProjectEnd,
    /// Task sits on a dependency cycle and was not scheduled.
    CircularDependency,
    /// Reschedule was requested for an id missing from the snapshot.
    UnknownTask,
    /// A pinned task breaks one of its predecessor constraints.
    DependencyViolation,
}

impl ConflictKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ConflictKind::ExceedsProjectEnd => "exceeds-project-end",
            ConflictKind::CircularDependency => "circular-dependency",
            ConflictKind::UnknownTask => "unknown-task",
            ConflictKind::DependencyViolation => "dependency-violation",
        }
    }
}

impl fmt::Display for ConflictKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A scheduling problem reported in-band.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Conflict {
    pub task_id: TaskId,
    pub kind: ConflictKind,
    pub message: String,
}

impl Conflict {
    pub fn new(task_id: TaskId, kind: ConflictKind, message: impl Into<String>) -> Self {
        Self {
            task_id,
            kind,
            message: message.into(),
        }
    }
}

/// Result of `schedule_tasks` or `reschedule_from_task`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ScheduleResult {
    /// Every task whose dates the pass computed, changed or not.
    pub tasks: FxHashMap<TaskId, TaskSchedule>,
    pub conflicts: Vec<Conflict>,
    /// Tasks whose dates changed, in scheduling order.
    pub affected_task_ids: Vec<TaskId>,
    /// Links dropped for referencing unknown tasks.
    pub removed_links: Vec<Link>,
    /// End-date slip against the baseline in calendar days (positive = late).
    pub baseline_variance: FxHashMap<TaskId, i64>,
}

impl ScheduleResult {
    pub fn has_conflicts(&self) -> bool {
        !self.conflicts.is_empty()
    }

    pub fn conflicts_of(&self, kind: ConflictKind) -> impl Iterator<Item = &Conflict> {
        self.conflicts.iter().filter(move |c| c.kind == kind)
    }

    pub fn schedule_of(&self, task_id: &TaskId) -> Option<&TaskSchedule> {
        self.tasks.get(task_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conflict_kind_names() {
        assert_eq!(ConflictKind::ExceedsProjectEnd.as_str(), "exceeds-project-end");
        assert_eq!(ConflictKind::CircularDependency.to_string(), "circular-dependency");
        assert_eq!(ConflictKind::UnknownTask.as_str(), "unknown-task");
        assert_eq!(ConflictKind::DependencyViolation.as_str(), "dependency-violation");
    }

    #[test]
    fn test_conflicts_of_filters_by_kind() {
        let result = ScheduleResult {
            conflicts: vec![
                Conflict::new(TaskId::from("a"), ConflictKind::UnknownTask, "missing"),
                Conflict::new(TaskId::from("b"), ConflictKind::ExceedsProjectEnd, "late"),
            ],
            ..Default::default()
        };
        assert!(result.has_conflicts());
        let late: Vec<_> = result.conflicts_of(ConflictKind::ExceedsProjectEnd).collect();
        assert_eq!(late.len(), 1);
        assert_eq!(late[0].task_id, TaskId::from("b"));
    }
}
