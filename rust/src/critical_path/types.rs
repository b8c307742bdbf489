//! Result types for critical path calculation.

use chrono::NaiveDate;

use crate::models::{Link, TaskId};

/// Early/late dates and slack for one task.
///
/// Finish dates are inclusive: a task of one unit starts and finishes on the
/// same day.
#[derive(Clone, Debug, PartialEq)]
pub struct CriticalPathEntry {
    pub task_id: TaskId,
    pub early_start: NaiveDate,
    pub early_finish: NaiveDate,
    pub late_start: NaiveDate,
    pub late_finish: NaiveDate,
    /// Duration in the pass unit.
    pub duration: u32,
    /// `late_start - early_start` in the pass unit; never negative.
    pub slack: i64,
    pub is_critical: bool,
    /// Predecessor that set `early_start`, if any. Among equal candidates the
    /// first link wins; the dates do not depend on the choice.
    pub driving_predecessor: Option<TaskId>,
}

/// Output of `calculate_critical_path`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CriticalPathResult {
    /// One entry per scheduled task, in topological order.
    pub entries: Vec<CriticalPathEntry>,
    pub critical_task_ids: Vec<TaskId>,
    /// Cycles found in the graph; their members have no entry.
    pub excluded_cycles: Vec<Vec<TaskId>>,
    pub excluded_task_ids: Vec<TaskId>,
    /// Links dropped for referencing unknown tasks.
    pub removed_links: Vec<Link>,
    /// Latest early finish over all entries.
    pub project_finish: Option<NaiveDate>,
    /// Units by which `project_finish` overshoots a requested project end.
    pub project_end_overrun: Option<i64>,
}

impl CriticalPathResult {
    pub fn entry(&self, task_id: &TaskId) -> Option<&CriticalPathEntry> {
        self.entries.iter().find(|e| &e.task_id == task_id)
    }
}

/// Ids of the entries with zero slack, in entry order.
pub fn get_critical_task_ids(entries: &[CriticalPathEntry]) -> Vec<TaskId> {
    entries
        .iter()
        .filter(|e| e.is_critical)
        .map(|e| e.task_id.clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(id: &str, slack: i64) -> CriticalPathEntry {
        let d = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        CriticalPathEntry {
            task_id: TaskId::from(id),
            early_start: d,
            early_finish: d,
            late_start: d,
            late_finish: d,
            duration: 1,
            slack,
            is_critical: slack == 0,
            driving_predecessor: None,
        }
    }

    #[test]
    fn test_critical_ids_filter_zero_slack() {
        let entries = vec![entry("a", 0), entry("b", 3), entry("c", 0)];
        assert_eq!(
            get_critical_task_ids(&entries),
            vec![TaskId::from("a"), TaskId::from("c")]
        );
        assert!(get_critical_task_ids(&[]).is_empty());
    }
}
