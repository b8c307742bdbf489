//! Critical path calculation using forward and backward passes.

use chrono::NaiveDate;

use crate::calendar::{Calendar, TimeAxis};
use crate::config::CriticalPathOptions;
use crate::graph::{TaskIdx, ValidatedGraph};
use crate::models::{Anchor, Link, Task};
use crate::{log_changes, log_checks, log_debug};

use super::types::{get_critical_task_ids, CriticalPathEntry, CriticalPathResult};

/// Per-task values computed by the passes, indexed by task index.
#[derive(Clone, Copy, Debug)]
struct Timing {
    early_start: NaiveDate,
    early_finish: NaiveDate,
    late_start: NaiveDate,
    late_finish: NaiveDate,
    duration: u32,
    driver: Option<TaskIdx>,
}

impl Timing {
    fn unset() -> Self {
        Self {
            early_start: NaiveDate::MIN,
            early_finish: NaiveDate::MIN,
            late_start: NaiveDate::MAX,
            late_finish: NaiveDate::MAX,
            duration: 0,
            driver: None,
        }
    }

    #[inline]
    fn early(&self, anchor: Anchor) -> NaiveDate {
        match anchor {
            Anchor::Start => self.early_start,
            Anchor::Finish => self.early_finish,
        }
    }

    #[inline]
    fn late(&self, anchor: Anchor) -> NaiveDate {
        match anchor {
            Anchor::Start => self.late_start,
            Anchor::Finish => self.late_finish,
        }
    }
}

/// Calculate early/late dates and slack for every task.
///
/// Tasks on a dependency cycle are left out and reported; links touching them
/// are ignored by everyone else. Dangling links are dropped and reported.
///
/// # Arguments
/// * `tasks` - Task snapshot
/// * `links` - Dependency links between the tasks
/// * `calendar` - Working-time calendar (ignored for `TimeUnit::CalendarDays`)
/// * `options` - Project boundaries, unit and verbosity
pub fn calculate_critical_path(
    tasks: &[Task],
    links: &[Link],
    calendar: &Calendar,
    options: &CriticalPathOptions,
) -> CriticalPathResult {
    let verbosity = options.verbosity;
    let validated = ValidatedGraph::build(tasks, links, verbosity);
    let graph = &validated.graph;
    let axis = TimeAxis::new(calendar, options.unit);
    let slots = graph.index.slots(tasks);

    let excluded_cycles = validated
        .cycles
        .iter()
        .map(|cycle| {
            log_changes!(
                verbosity,
                "Excluding cycle from critical path: {}",
                validated.describe_cycle(cycle)
            );
            cycle
                .iter()
                .map(|&idx| graph.index.resolve(idx).clone())
                .collect()
        })
        .collect();
    let excluded_task_ids = validated
        .cyclic
        .iter()
        .enumerate()
        .filter(|(_, &c)| c)
        .map(|(idx, _)| graph.index.resolve(idx as TaskIdx).clone())
        .collect();

    let mut result = CriticalPathResult {
        excluded_cycles,
        excluded_task_ids,
        removed_links: validated.removed_links.clone(),
        ..Default::default()
    };

    if validated.order.is_empty() {
        return result;
    }

    let project_start = options.project_start.map(|d| axis.snap_forward(d));
    let mut timings = vec![Timing::unset(); graph.len()];

    // Forward pass: earliest dates in topological order
    for &idx in &validated.order {
        let i = idx as usize;
        let task = slots[i];
        let duration = axis.duration_of(task);
        let span = duration.saturating_sub(1) as i64;

        let mut early_start: Option<NaiveDate> = None;
        let mut driver: Option<TaskIdx> = None;
        for edge in &graph.predecessors[i] {
            if validated.cyclic[edge.task as usize] {
                continue;
            }
            let pred = &timings[edge.task as usize];
            let bound = axis.snap_forward(axis.shift(pred.early(edge.kind.predecessor_anchor()), edge.offset));
            let candidate = match edge.kind.successor_anchor() {
                Anchor::Start => bound,
                Anchor::Finish => axis.shift(bound, -span),
            };
            if early_start.map_or(true, |current| candidate > current) {
                early_start = Some(candidate);
                driver = Some(edge.task);
            }
        }

        let mut early_start = match early_start {
            Some(date) => date,
            None => project_start.unwrap_or_else(|| axis.snap_forward(task.start)),
        };
        if let Some(floor) = project_start {
            if early_start < floor {
                early_start = floor;
                driver = None;
            }
        }

        let timing = &mut timings[i];
        timing.early_start = early_start;
        timing.early_finish = axis.shift(early_start, span);
        timing.duration = duration;
        timing.driver = driver;

        log_checks!(
            verbosity,
            "  {} early {}..{} ({} units)",
            task.id,
            timing.early_start,
            timing.early_finish,
            duration
        );
    }

    let project_finish = validated
        .order
        .iter()
        .map(|&idx| timings[idx as usize].early_finish)
        .max()
        .unwrap_or(NaiveDate::MIN);

    // The backward pass anchors on the later of the requested end and the
    // computed finish so slack stays non-negative; an overrun is reported.
    let end_anchor = match options.project_end.map(|d| axis.snap_backward(d)) {
        Some(requested) if requested < project_finish => {
            let overrun = axis.distance(requested, project_finish);
            log_changes!(
                verbosity,
                "Project finish {} overruns requested end {} by {} units",
                project_finish,
                requested,
                overrun
            );
            result.project_end_overrun = Some(overrun);
            project_finish
        }
        Some(requested) => requested,
        None => project_finish,
    };
    log_debug!(verbosity, "Backward pass anchored on {}", end_anchor);

    // Backward pass: latest dates in reverse topological order
    for &idx in validated.order.iter().rev() {
        let i = idx as usize;
        let span = timings[i].duration.saturating_sub(1) as i64;

        let mut late_finish = end_anchor;
        for edge in &graph.successors[i] {
            if validated.cyclic[edge.task as usize] {
                continue;
            }
            let succ = &timings[edge.task as usize];
            let bound = axis.snap_backward(axis.shift(succ.late(edge.kind.successor_anchor()), -edge.offset));
            let candidate = match edge.kind.predecessor_anchor() {
                Anchor::Finish => bound,
                Anchor::Start => axis.shift(bound, span),
            };
            late_finish = late_finish.min(candidate);
        }

        let timing = &mut timings[i];
        timing.late_finish = late_finish;
        timing.late_start = axis.shift(late_finish, -span);
    }

    result.entries = validated
        .order
        .iter()
        .map(|&idx| {
            let timing = &timings[idx as usize];
            let slack = axis.distance(timing.early_start, timing.late_start).max(0);
            CriticalPathEntry {
                task_id: graph.index.resolve(idx).clone(),
                early_start: timing.early_start,
                early_finish: timing.early_finish,
                late_start: timing.late_start,
                late_finish: timing.late_finish,
                duration: timing.duration,
                slack,
                is_critical: slack == 0,
                driving_predecessor: timing.driver.map(|d| graph.index.resolve(d).clone()),
            }
        })
        .collect();
    result.critical_task_ids = get_critical_task_ids(&result.entries);
    result.project_finish = Some(project_finish);

    log_changes!(
        verbosity,
        "Critical path: {} of {} tasks, finish {}",
        result.critical_task_ids.len(),
        result.entries.len(),
        project_finish
    );

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calendar::TimeUnit;
    use crate::models::{LinkType, TaskId};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn make_task(id: &str, start: NaiveDate, duration: u32) -> Task {
        Task::new(id, start, start).with_duration(duration)
    }

    fn fs(id: i64, source: &str, target: &str) -> Link {
        Link::new(id, source, target)
    }

    fn calendar_days() -> CriticalPathOptions {
        CriticalPathOptions::default().with_unit(TimeUnit::CalendarDays)
    }

    fn id(name: &str) -> TaskId {
        TaskId::from(name)
    }

    #[test]
    fn test_chain_is_fully_critical() {
        // a Mon-Wed, b two workdays after it
        let tasks = vec![
            Task::new("a", date(2024, 1, 1), date(2024, 1, 3)),
            make_task("b", date(2024, 1, 1), 2),
        ];
        let links = vec![fs(1, "a", "b")];

        let result = calculate_critical_path(
            &tasks,
            &links,
            &Calendar::default(),
            &CriticalPathOptions::default(),
        );

        let b = result.entry(&id("b")).unwrap();
        assert_eq!(b.early_start, date(2024, 1, 4));
        assert_eq!(b.early_finish, date(2024, 1, 5));
        assert_eq!(b.driving_predecessor, Some(id("a")));
        assert_eq!(result.critical_task_ids, vec![id("a"), id("b")]);
        assert_eq!(result.project_finish, Some(date(2024, 1, 5)));
    }

    #[test]
    fn test_parallel_paths_with_slack() {
        let start = date(2024, 1, 1);
        let tasks = vec![
            make_task("a", start, 5),
            make_task("b", start, 2),
            make_task("c", start, 1),
        ];
        let links = vec![fs(1, "a", "c"), fs(2, "b", "c")];

        let result =
            calculate_critical_path(&tasks, &links, &Calendar::default(), &calendar_days());

        let a = result.entry(&id("a")).unwrap();
        let b = result.entry(&id("b")).unwrap();
        let c = result.entry(&id("c")).unwrap();
        assert_eq!(c.early_start, date(2024, 1, 6));
        assert_eq!(c.driving_predecessor, Some(id("a")));
        assert_eq!(a.slack, 0);
        assert_eq!(b.slack, 3);
        assert_eq!(b.late_finish, date(2024, 1, 5));
        assert!(!b.is_critical);
        assert_eq!(result.critical_task_ids, vec![id("a"), id("c")]);
    }

    #[test]
    fn test_finish_to_start_skips_weekend() {
        let tasks = vec![
            Task::new("a", date(2024, 1, 1), date(2024, 1, 5)),
            make_task("b", date(2024, 1, 1), 2),
        ];
        let result = calculate_critical_path(
            &tasks,
            &[fs(1, "a", "b")],
            &Calendar::default(),
            &CriticalPathOptions::default(),
        );

        let b = result.entry(&id("b")).unwrap();
        assert_eq!(b.early_start, date(2024, 1, 8));
        assert_eq!(b.early_finish, date(2024, 1, 9));
    }

    #[test]
    fn test_general_link_types() {
        let p_start = date(2024, 1, 10);
        let tasks = vec![
            make_task("p", p_start, 3),
            make_task("ss", p_start, 2),
            make_task("ff", p_start, 2),
            make_task("sf", p_start, 2),
            make_task("lag", p_start, 1),
        ];
        let links = vec![
            fs(1, "p", "ss").with_kind(LinkType::StartToStart),
            fs(2, "p", "ff").with_kind(LinkType::FinishToFinish),
            fs(3, "p", "sf").with_kind(LinkType::StartToFinish),
            fs(4, "p", "lag").with_lag(2),
        ];

        let result =
            calculate_critical_path(&tasks, &links, &Calendar::default(), &calendar_days());

        let ss = result.entry(&id("ss")).unwrap();
        assert_eq!(ss.early_start, date(2024, 1, 10));
        let ff = result.entry(&id("ff")).unwrap();
        assert_eq!(ff.early_start, date(2024, 1, 11));
        assert_eq!(ff.early_finish, date(2024, 1, 12));
        let sf = result.entry(&id("sf")).unwrap();
        assert_eq!(sf.early_finish, date(2024, 1, 9));
        assert_eq!(sf.early_start, date(2024, 1, 8));
        let lag = result.entry(&id("lag")).unwrap();
        assert_eq!(lag.early_start, date(2024, 1, 15));
    }

    #[test]
    fn test_project_start_floors_sources() {
        let tasks = vec![make_task("a", date(2024, 1, 1), 2)];
        let options = calendar_days().with_project_start(date(2024, 2, 1));

        let result = calculate_critical_path(&tasks, &[], &Calendar::default(), &options);

        let a = result.entry(&id("a")).unwrap();
        assert_eq!(a.early_start, date(2024, 2, 1));
        assert_eq!(a.early_finish, date(2024, 2, 2));
    }

    #[test]
    fn test_later_project_end_adds_slack() {
        let tasks = vec![
            Task::new("a", date(2024, 1, 1), date(2024, 1, 3)),
            make_task("b", date(2024, 1, 1), 2),
        ];
        let options = CriticalPathOptions::default().with_project_end(date(2024, 1, 9));

        let result = calculate_critical_path(
            &tasks,
            &[fs(1, "a", "b")],
            &Calendar::default(),
            &options,
        );

        let a = result.entry(&id("a")).unwrap();
        let b = result.entry(&id("b")).unwrap();
        assert_eq!(b.late_finish, date(2024, 1, 9));
        assert_eq!(b.late_start, date(2024, 1, 8));
        assert_eq!(b.slack, 2);
        assert_eq!(a.late_finish, date(2024, 1, 5));
        assert_eq!(a.slack, 2);
        assert!(result.critical_task_ids.is_empty());
        assert_eq!(result.project_end_overrun, None);
    }

    #[test]
    fn test_earlier_project_end_reports_overrun() {
        let tasks = vec![
            Task::new("a", date(2024, 1, 1), date(2024, 1, 3)),
            make_task("b", date(2024, 1, 1), 2),
        ];
        let options = CriticalPathOptions::default().with_project_end(date(2024, 1, 3));

        let result = calculate_critical_path(
            &tasks,
            &[fs(1, "a", "b")],
            &Calendar::default(),
            &options,
        );

        assert_eq!(result.project_end_overrun, Some(2));
        assert!(result.entries.iter().all(|e| e.slack == 0));
    }

    #[test]
    fn test_cycle_members_excluded() {
        let start = date(2024, 1, 1);
        let tasks = vec![
            make_task("a", start, 2),
            make_task("b", start, 2),
            make_task("c", start, 4),
            make_task("d", date(2024, 1, 3), 1),
        ];
        let links = vec![
            fs(1, "a", "b"),
            fs(2, "b", "a"),
            fs(3, "b", "d"),
            fs(4, "c", "ghost"),
        ];

        let result =
            calculate_critical_path(&tasks, &links, &Calendar::default(), &calendar_days());

        assert_eq!(result.excluded_cycles, vec![vec![id("a"), id("b")]]);
        assert_eq!(result.excluded_task_ids, vec![id("a"), id("b")]);
        assert_eq!(result.removed_links.len(), 1);
        assert!(result.entry(&id("a")).is_none());
        let d = result.entry(&id("d")).unwrap();
        assert_eq!(d.early_start, date(2024, 1, 3));
        assert_eq!(d.driving_predecessor, None);
        assert_eq!(result.entries.len(), 2);
    }

    #[test]
    fn test_empty_snapshot() {
        let result = calculate_critical_path(
            &[],
            &[],
            &Calendar::default(),
            &CriticalPathOptions::default(),
        );
        assert!(result.entries.is_empty());
        assert_eq!(result.project_finish, None);
    }

    #[test]
    fn test_invariants_on_generated_graph() {
        // Deterministic pseudo-random DAG: links only go from lower to higher index
        let mut seed: u64 = 0x2545_F491_4F6C_DD1D;
        let mut next = move |bound: u64| {
            seed ^= seed << 13;
            seed ^= seed >> 7;
            seed ^= seed << 17;
            seed % bound
        };

        let base = date(2024, 3, 4);
        let kinds = [
            LinkType::FinishToStart,
            LinkType::StartToStart,
            LinkType::FinishToFinish,
            LinkType::StartToFinish,
        ];
        let tasks: Vec<Task> = (0..40)
            .map(|i| make_task(&format!("t{}", i), base, next(6) as u32))
            .collect();
        let mut links = Vec::new();
        for target in 1..40 {
            for _ in 0..next(3) {
                let source = next(target);
                let kind = kinds[next(4) as usize];
                links.push(
                    Link::new(links.len() as i64, format!("t{}", source), format!("t{}", target))
                        .with_kind(kind),
                );
            }
        }

        let calendar = Calendar::default().with_holiday(date(2024, 3, 13));
        let options = CriticalPathOptions::default();
        let result = calculate_critical_path(&tasks, &links, &calendar, &options);
        let axis = TimeAxis::new(&calendar, options.unit);

        assert_eq!(result.entries.len(), 40);
        for entry in &result.entries {
            assert!(entry.early_finish >= entry.early_start, "{:?}", entry);
            assert!(entry.late_finish >= entry.late_start, "{:?}", entry);
            assert!(entry.slack >= 0);
            assert_eq!(entry.is_critical, entry.slack == 0);
        }
        for link in &links {
            let p = result.entry(&link.source).unwrap();
            let s = result.entry(&link.target).unwrap();
            let (from, to) = match link.kind {
                LinkType::FinishToStart => (p.early_finish, s.early_start),
                LinkType::StartToStart => (p.early_start, s.early_start),
                LinkType::FinishToFinish => (p.early_finish, s.early_finish),
                LinkType::StartToFinish => (p.early_start, s.early_finish),
            };
            assert!(to >= axis.shift(from, link.offset()), "{:?}", link);
        }

        let finish = result.project_finish.unwrap();
        assert!(result
            .entries
            .iter()
            .any(|e| e.early_finish == finish && e.is_critical));
    }
}
