//! Dependency-driven auto-scheduling over a working-time calendar.

use chrono::NaiveDate;

use crate::calendar::{Calendar, TimeAxis};
use crate::config::ScheduleConfig;
use crate::graph::{Edge, TaskIdx, ValidatedGraph};
use crate::models::{Anchor, Link, Task, TaskId};
use crate::{log_changes, log_checks, log_debug};

use super::result::{Baseline, Conflict, ConflictKind, ScheduleResult, TaskSchedule};

/// Callback invoked for every task whose dates change, before the pass returns.
pub type OnScheduled<'a> = &'a mut dyn FnMut(&TaskId, NaiveDate, NaiveDate);

/// Auto-scheduler over one task/link snapshot.
///
/// Holds the cleaned graph so a whole-project pass and an incremental pass
/// share the same setup.
pub struct AutoScheduler<'a> {
    slots: Vec<&'a Task>,
    validated: ValidatedGraph,
    axis: TimeAxis<'a>,
    config: &'a ScheduleConfig,
}

impl<'a> AutoScheduler<'a> {
    pub fn new(
        tasks: &'a [Task],
        links: &[Link],
        calendar: &'a Calendar,
        config: &'a ScheduleConfig,
    ) -> Self {
        let validated = ValidatedGraph::build(tasks, links, config.verbosity);
        let slots = validated.graph.index.slots(tasks);
        Self {
            slots,
            validated,
            axis: TimeAxis::new(calendar, config.time_unit()),
            config,
        }
    }

    pub fn graph(&self) -> &ValidatedGraph {
        &self.validated
    }

    /// Scope covering `task_id` and everything downstream of it.
    pub fn downstream_scope(&self, task_id: &TaskId) -> Option<Vec<bool>> {
        let graph = &self.validated.graph;
        let root = graph.index.get(task_id)?;
        let mut scope = vec![false; graph.len()];
        scope[root as usize] = true;
        for idx in graph.descendants(root) {
            scope[idx as usize] = true;
        }
        Some(scope)
    }

    /// Run the pass over the tasks flagged in `scope` (all tasks when `None`).
    ///
    /// Tasks outside the scope, pinned tasks and tasks on cycles keep their
    /// snapshot dates and act as fixed anchors for their successors.
    pub fn run(
        &self,
        scope: Option<&[bool]>,
        baseline: Option<&Baseline>,
        mut on_scheduled: Option<OnScheduled<'_>>,
    ) -> ScheduleResult {
        let verbosity = self.config.verbosity;
        let graph = &self.validated.graph;
        let in_scope = |idx: TaskIdx| scope.map_or(true, |s| s[idx as usize]);

        let mut result = ScheduleResult {
            removed_links: self.validated.removed_links.clone(),
            ..Default::default()
        };
        for link in &result.removed_links {
            log_debug!(verbosity, "Dropped link {}: {} -> {}", link.id, link.source, link.target);
        }

        // Current dates, updated as tasks are placed so successors see new values
        let mut dates: Vec<(NaiveDate, NaiveDate)> =
            self.slots.iter().map(|t| (t.start, t.end)).collect();

        for (i, &on_cycle) in self.validated.cyclic.iter().enumerate() {
            let idx = i as TaskIdx;
            if !on_cycle || !in_scope(idx) {
                continue;
            }
            let task_id = graph.index.resolve(idx);
            let message = match self.validated.cycle_of(idx) {
                Some(cycle) => format!(
                    "Task {} is part of circular dependency {}",
                    task_id,
                    self.validated.describe_cycle(cycle)
                ),
                None => format!("Task {} depends on itself through a cycle", task_id),
            };
            log_changes!(verbosity, "  Skipping {}: {}", task_id, message);
            result.conflicts.push(Conflict::new(
                task_id.clone(),
                ConflictKind::CircularDependency,
                message,
            ));
        }

        let project_start = self.config.project_start.map(|d| self.axis.snap_forward(d));

        for &idx in &self.validated.order {
            if !in_scope(idx) {
                continue;
            }
            let i = idx as usize;
            let task = self.slots[i];

            if task.is_manual() {
                self.check_pinned(idx, &dates, &mut result);
                continue;
            }

            let duration = self.axis.duration_of(task);
            let span = duration.saturating_sub(1) as i64;

            let mut start: Option<NaiveDate> = None;
            for edge in &graph.predecessors[i] {
                let bound = self.successor_bound(edge, &dates);
                let candidate = match edge.kind.successor_anchor() {
                    Anchor::Start => bound,
                    Anchor::Finish => self.axis.shift(bound, -span),
                };
                log_checks!(
                    verbosity,
                    "  {} {} {} allows start {}",
                    graph.index.resolve(edge.task),
                    edge.kind.code(),
                    task.id,
                    candidate
                );
                start = Some(start.map_or(candidate, |s| s.max(candidate)));
            }

            let mut start = start.unwrap_or_else(|| self.axis.snap_forward(task.start));
            if let Some(floor) = project_start {
                start = start.max(floor);
            }
            let end = self.axis.span_end(start, duration);

            let changed = (start, end) != (task.start, task.end);
            dates[i] = (start, end);
            result
                .tasks
                .insert(task.id.clone(), TaskSchedule { start, end, changed });

            if changed {
                log_changes!(
                    verbosity,
                    "  Moved {} from {}..{} to {}..{}",
                    task.id,
                    task.start,
                    task.end,
                    start,
                    end
                );
                result.affected_task_ids.push(task.id.clone());
                if let Some(callback) = on_scheduled.as_deref_mut() {
                    callback(&task.id, start, end);
                }
            }

            if let Some(project_end) = self.config.project_end {
                if end > project_end {
                    let message = format!(
                        "Task {} ends {} after project end {}",
                        task.id, end, project_end
                    );
                    log_changes!(verbosity, "  Conflict: {}", message);
                    result.conflicts.push(Conflict::new(
                        task.id.clone(),
                        ConflictKind::ExceedsProjectEnd,
                        message,
                    ));
                }
            }

            if let Some(&(_, planned_end)) = baseline.and_then(|b| b.get(&task.id)) {
                result
                    .baseline_variance
                    .insert(task.id.clone(), (end - planned_end).num_days());
            }
        }

        result
    }

    /// Earliest date the successor anchor of `edge` may take, given the
    /// predecessor's current dates.
    fn successor_bound(&self, edge: &Edge, dates: &[(NaiveDate, NaiveDate)]) -> NaiveDate {
        let (pred_start, pred_end) = dates[edge.task as usize];
        let from = match edge.kind.predecessor_anchor() {
            Anchor::Start => pred_start,
            Anchor::Finish => pred_end,
        };
        self.axis.snap_forward(self.axis.shift(from, edge.offset))
    }

    /// Report every predecessor constraint a pinned task breaks.
    fn check_pinned(
        &self,
        idx: TaskIdx,
        dates: &[(NaiveDate, NaiveDate)],
        result: &mut ScheduleResult,
    ) {
        let graph = &self.validated.graph;
        let task = self.slots[idx as usize];
        for edge in &graph.predecessors[idx as usize] {
            let bound = self.successor_bound(edge, dates);
            let (label, actual) = match edge.kind.successor_anchor() {
                Anchor::Start => ("starts", task.start),
                Anchor::Finish => ("ends", task.end),
            };
            if actual < bound {
                let message = format!(
                    "Pinned task {} {} {} but {} link from {} requires {} or later",
                    task.id,
                    label,
                    actual,
                    edge.kind.code(),
                    graph.index.resolve(edge.task),
                    bound
                );
                log_changes!(self.config.verbosity, "  Conflict: {}", message);
                result.conflicts.push(Conflict::new(
                    task.id.clone(),
                    ConflictKind::DependencyViolation,
                    message,
                ));
            }
        }
    }
}

/// Recompute dates for every non-pinned task.
///
/// # Arguments
/// * `tasks` - Task snapshot
/// * `links` - Dependency links; dangling ones are dropped and reported
/// * `calendar` - Working-time calendar
/// * `baseline` - Optional saved plan; enables `baseline_variance`
/// * `config` - Project boundaries, calendar mode and verbosity
/// * `on_scheduled` - Called with `(task_id, start, end)` for each changed task
pub fn schedule_tasks(
    tasks: &[Task],
    links: &[Link],
    calendar: &Calendar,
    baseline: Option<&Baseline>,
    config: &ScheduleConfig,
    on_scheduled: Option<OnScheduled<'_>>,
) -> ScheduleResult {
    AutoScheduler::new(tasks, links, calendar, config).run(None, baseline, on_scheduled)
}

/// Recompute dates for `task_id` and the tasks downstream of it only.
///
/// An id missing from the snapshot yields a single `unknown-task` conflict.
pub fn reschedule_from_task(
    task_id: &TaskId,
    tasks: &[Task],
    links: &[Link],
    calendar: &Calendar,
    config: &ScheduleConfig,
    on_scheduled: Option<OnScheduled<'_>>,
) -> ScheduleResult {
    let scheduler = AutoScheduler::new(tasks, links, calendar, config);
    match scheduler.downstream_scope(task_id) {
        Some(scope) => scheduler.run(Some(&scope), None, on_scheduled),
        None => {
            log_changes!(config.verbosity, "Reschedule requested for unknown task {}", task_id);
            ScheduleResult {
                conflicts: vec![Conflict::new(
                    task_id.clone(),
                    ConflictKind::UnknownTask,
                    format!("Task {} is not in the snapshot", task_id),
                )],
                removed_links: scheduler.graph().removed_links.clone(),
                ..Default::default()
            }
        }
    }
}
