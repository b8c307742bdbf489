//! PyO3 bindings for the scheduling engine.

use chrono::NaiveDate;
use pyo3::exceptions::PyValueError;
use pyo3::prelude::*;
use std::collections::HashMap;

use crate::calendar::{Calendar, CalendarError, TimeUnit};
use crate::config::{CriticalPathOptions, ScheduleConfig};
use crate::critical_path::{self, CriticalPathEntry, CriticalPathResult};
use crate::graph;
use crate::logging::Verbosity;
use crate::models::{EntityId, Link, LinkType, ScheduleMode, Task, TaskId};
use crate::scheduler::{self, Baseline, OnScheduled, ScheduleResult};

impl From<CalendarError> for PyErr {
    fn from(err: CalendarError) -> PyErr {
        PyValueError::new_err(err.to_string())
    }
}

impl<'py> FromPyObject<'py> for EntityId {
    fn extract_bound(ob: &Bound<'py, PyAny>) -> PyResult<Self> {
        if let Ok(n) = ob.extract::<i64>() {
            return Ok(EntityId::Num(n));
        }
        match ob.extract::<String>() {
            Ok(s) => Ok(EntityId::Name(s)),
            Err(_) => Err(PyValueError::new_err(format!(
                "id must be int or str, got {}",
                ob.get_type().name()?
            ))),
        }
    }
}

impl ToPyObject for EntityId {
    fn to_object(&self, py: Python<'_>) -> PyObject {
        match self {
            EntityId::Num(n) => n.to_object(py),
            EntityId::Name(s) => s.to_object(py),
        }
    }
}

impl IntoPy<PyObject> for EntityId {
    fn into_py(self, py: Python<'_>) -> PyObject {
        self.to_object(py)
    }
}

/// Task snapshot handed in from Python.
#[pyclass(name = "Task")]
#[derive(Clone, Debug)]
pub struct PyTask {
    #[pyo3(get, set)]
    pub id: EntityId,
    #[pyo3(get, set)]
    pub start: NaiveDate,
    #[pyo3(get, set)]
    pub end: NaiveDate,
    #[pyo3(get, set)]
    pub duration: Option<u32>,
    #[pyo3(get, set)]
    pub manual: bool,
    #[pyo3(get, set)]
    pub progress: Option<f64>,
}

#[pymethods]
impl PyTask {
    #[new]
    #[pyo3(signature = (id, start, end, duration=None, manual=false, progress=None))]
    fn new(
        id: EntityId,
        start: NaiveDate,
        end: NaiveDate,
        duration: Option<u32>,
        manual: bool,
        progress: Option<f64>,
    ) -> Self {
        Self {
            id,
            start,
            end,
            duration,
            manual,
            progress,
        }
    }

    fn __repr__(&self) -> String {
        format!(
            "Task(id={}, start={}, end={}, duration={:?}, manual={})",
            self.id, self.start, self.end, self.duration, self.manual
        )
    }
}

impl From<&PyTask> for Task {
    fn from(t: &PyTask) -> Self {
        Task {
            id: t.id.clone(),
            start: t.start,
            end: t.end,
            duration: t.duration,
            mode: if t.manual {
                ScheduleMode::Manual
            } else {
                ScheduleMode::Auto
            },
            progress: t.progress,
        }
    }
}

/// Dependency link; `link_type` is one of FS, SS, FF, SF.
#[pyclass(name = "Link")]
#[derive(Clone, Debug)]
pub struct PyLink {
    #[pyo3(get, set)]
    pub id: EntityId,
    #[pyo3(get, set)]
    pub source: EntityId,
    #[pyo3(get, set)]
    pub target: EntityId,
    #[pyo3(get, set)]
    pub link_type: String,
    #[pyo3(get, set)]
    pub lag: i32,
}

#[pymethods]
impl PyLink {
    #[new]
    #[pyo3(signature = (id, source, target, link_type="FS".to_string(), lag=0))]
    fn new(
        id: EntityId,
        source: EntityId,
        target: EntityId,
        link_type: String,
        lag: i32,
    ) -> PyResult<Self> {
        if LinkType::from_code(&link_type).is_none() {
            return Err(PyValueError::new_err(format!(
                "Unknown link type: {}",
                link_type
            )));
        }
        Ok(Self {
            id,
            source,
            target,
            link_type,
            lag,
        })
    }

    fn __repr__(&self) -> String {
        format!(
            "Link(id={}, {} -{}-> {}, lag={})",
            self.id, self.source, self.link_type, self.target, self.lag
        )
    }
}

impl PyLink {
    fn to_link(&self) -> PyResult<Link> {
        let kind = LinkType::from_code(&self.link_type)
            .ok_or_else(|| PyValueError::new_err(format!("Unknown link type: {}", self.link_type)))?;
        Ok(Link {
            id: self.id.clone(),
            source: self.source.clone(),
            target: self.target.clone(),
            kind,
            lag: self.lag,
        })
    }
}

impl From<Link> for PyLink {
    fn from(link: Link) -> Self {
        Self {
            id: link.id,
            source: link.source,
            target: link.target,
            link_type: link.kind.code().to_string(),
            lag: link.lag,
        }
    }
}

/// Working-time calendar.
#[pyclass(name = "Calendar")]
#[derive(Clone, Debug)]
pub struct PyCalendar {
    inner: Calendar,
}

#[pymethods]
impl PyCalendar {
    /// `weekday_hours` lists hours for Monday through Sunday.
    #[new]
    #[pyo3(signature = (weekday_hours=None, holidays=Vec::new(), workday_exceptions=Vec::new(), exception_hours=None))]
    fn new(
        weekday_hours: Option<Vec<f32>>,
        holidays: Vec<NaiveDate>,
        workday_exceptions: Vec<NaiveDate>,
        exception_hours: Option<f32>,
    ) -> PyResult<Self> {
        let mut calendar = match weekday_hours {
            Some(hours) => {
                let hours: [f32; 7] = hours.try_into().map_err(|v: Vec<f32>| {
                    PyValueError::new_err(format!(
                        "weekday_hours needs 7 entries, got {}",
                        v.len()
                    ))
                })?;
                Calendar::new(hours)?
            }
            None => Calendar::default(),
        };
        calendar = calendar
            .with_holidays(holidays)
            .with_workday_exceptions(workday_exceptions);
        if let Some(hours) = exception_hours {
            calendar = calendar.with_exception_hours(hours)?;
        }
        Ok(Self { inner: calendar })
    }

    fn is_workday(&self, date: NaiveDate) -> bool {
        self.inner.is_workday(date)
    }

    fn is_non_workday(&self, date: NaiveDate) -> bool {
        self.inner.is_non_workday(date)
    }

    fn working_hours(&self, date: NaiveDate) -> f32 {
        self.inner.working_hours(date)
    }

    fn count_workdays(&self, start: NaiveDate, end: NaiveDate) -> u32 {
        self.inner.count_workdays(start, end)
    }

    fn count_working_hours(&self, start: NaiveDate, end: NaiveDate) -> f32 {
        self.inner.count_working_hours(start, end)
    }

    fn next_workday(&self, date: NaiveDate) -> NaiveDate {
        self.inner.next_workday(date)
    }

    fn previous_workday(&self, date: NaiveDate) -> NaiveDate {
        self.inner.previous_workday(date)
    }

    fn calculate_end_date_by_workdays(&self, start: NaiveDate, n: u32) -> NaiveDate {
        self.inner.calculate_end_date_by_workdays(start, n)
    }

    fn calculate_start_date_by_workdays(&self, end: NaiveDate, n: u32) -> NaiveDate {
        self.inner.calculate_start_date_by_workdays(end, n)
    }

    fn add_workdays(&self, date: NaiveDate, n: i64) -> NaiveDate {
        self.inner.add_workdays(date, n)
    }

    fn __repr__(&self) -> String {
        format!(
            "Calendar(holidays={}, workday_exceptions={})",
            self.inner.holidays().len(),
            self.inner.workday_exceptions().len()
        )
    }
}

#[pyclass(name = "ScheduleConfig")]
#[derive(Clone, Debug)]
pub struct PyScheduleConfig {
    #[pyo3(get, set)]
    pub project_start: Option<NaiveDate>,
    #[pyo3(get, set)]
    pub project_end: Option<NaiveDate>,
    #[pyo3(get, set)]
    pub respect_calendar: bool,
    /// 0 silent, 1 changes, 2 checks, 3 debug.
    #[pyo3(get, set)]
    pub verbosity: u8,
}

#[pymethods]
impl PyScheduleConfig {
    #[new]
    #[pyo3(signature = (project_start=None, project_end=None, respect_calendar=true, verbosity=0))]
    fn new(
        project_start: Option<NaiveDate>,
        project_end: Option<NaiveDate>,
        respect_calendar: bool,
        verbosity: u8,
    ) -> Self {
        Self {
            project_start,
            project_end,
            respect_calendar,
            verbosity,
        }
    }
}

impl From<&PyScheduleConfig> for ScheduleConfig {
    fn from(c: &PyScheduleConfig) -> Self {
        ScheduleConfig {
            project_start: c.project_start,
            project_end: c.project_end,
            respect_calendar: c.respect_calendar,
            verbosity: Verbosity::from_level(c.verbosity),
        }
    }
}

/// `unit` is "workdays" or "calendar_days".
#[pyclass(name = "CriticalPathOptions")]
#[derive(Clone, Debug)]
pub struct PyCriticalPathOptions {
    #[pyo3(get, set)]
    pub project_start: Option<NaiveDate>,
    #[pyo3(get, set)]
    pub project_end: Option<NaiveDate>,
    #[pyo3(get, set)]
    pub unit: String,
    #[pyo3(get, set)]
    pub verbosity: u8,
}

#[pymethods]
impl PyCriticalPathOptions {
    #[new]
    #[pyo3(signature = (project_start=None, project_end=None, unit="workdays".to_string(), verbosity=0))]
    fn new(
        project_start: Option<NaiveDate>,
        project_end: Option<NaiveDate>,
        unit: String,
        verbosity: u8,
    ) -> PyResult<Self> {
        parse_unit(&unit)?;
        Ok(Self {
            project_start,
            project_end,
            unit,
            verbosity,
        })
    }
}

fn parse_unit(unit: &str) -> PyResult<TimeUnit> {
    match unit {
        "workdays" => Ok(TimeUnit::Workdays),
        "calendar_days" => Ok(TimeUnit::CalendarDays),
        other => Err(PyValueError::new_err(format!("Unknown unit: {}", other))),
    }
}

impl PyCriticalPathOptions {
    fn to_options(&self) -> PyResult<CriticalPathOptions> {
        Ok(CriticalPathOptions {
            project_start: self.project_start,
            project_end: self.project_end,
            unit: parse_unit(&self.unit)?,
            verbosity: Verbosity::from_level(self.verbosity),
        })
    }
}

#[pyclass(name = "CriticalPathEntry")]
#[derive(Clone, Debug)]
pub struct PyCriticalPathEntry {
    #[pyo3(get)]
    pub task_id: EntityId,
    #[pyo3(get)]
    pub early_start: NaiveDate,
    #[pyo3(get)]
    pub early_finish: NaiveDate,
    #[pyo3(get)]
    pub late_start: NaiveDate,
    #[pyo3(get)]
    pub late_finish: NaiveDate,
    #[pyo3(get)]
    pub duration: u32,
    #[pyo3(get)]
    pub slack: i64,
    #[pyo3(get)]
    pub is_critical: bool,
    #[pyo3(get)]
    pub driving_predecessor: Option<EntityId>,
}

#[pymethods]
impl PyCriticalPathEntry {
    fn __repr__(&self) -> String {
        format!(
            "CriticalPathEntry(task_id={}, es={}, ls={}, slack={}, critical={})",
            self.task_id, self.early_start, self.late_start, self.slack, self.is_critical
        )
    }
}

impl From<CriticalPathEntry> for PyCriticalPathEntry {
    fn from(e: CriticalPathEntry) -> Self {
        Self {
            task_id: e.task_id,
            early_start: e.early_start,
            early_finish: e.early_finish,
            late_start: e.late_start,
            late_finish: e.late_finish,
            duration: e.duration,
            slack: e.slack,
            is_critical: e.is_critical,
            driving_predecessor: e.driving_predecessor,
        }
    }
}

impl From<&PyCriticalPathEntry> for CriticalPathEntry {
    fn from(e: &PyCriticalPathEntry) -> Self {
        Self {
            task_id: e.task_id.clone(),
            early_start: e.early_start,
            early_finish: e.early_finish,
            late_start: e.late_start,
            late_finish: e.late_finish,
            duration: e.duration,
            slack: e.slack,
            is_critical: e.is_critical,
            driving_predecessor: e.driving_predecessor.clone(),
        }
    }
}

#[pyclass(name = "CriticalPathResult")]
#[derive(Clone, Debug)]
pub struct PyCriticalPathResult {
    #[pyo3(get)]
    pub entries: Vec<PyCriticalPathEntry>,
    #[pyo3(get)]
    pub critical_task_ids: Vec<EntityId>,
    #[pyo3(get)]
    pub excluded_cycles: Vec<Vec<EntityId>>,
    #[pyo3(get)]
    pub excluded_task_ids: Vec<EntityId>,
    #[pyo3(get)]
    pub removed_links: Vec<PyLink>,
    #[pyo3(get)]
    pub project_finish: Option<NaiveDate>,
    #[pyo3(get)]
    pub project_end_overrun: Option<i64>,
}

impl From<CriticalPathResult> for PyCriticalPathResult {
    fn from(r: CriticalPathResult) -> Self {
        Self {
            entries: r.entries.into_iter().map(Into::into).collect(),
            critical_task_ids: r.critical_task_ids,
            excluded_cycles: r.excluded_cycles,
            excluded_task_ids: r.excluded_task_ids,
            removed_links: r.removed_links.into_iter().map(Into::into).collect(),
            project_finish: r.project_finish,
            project_end_overrun: r.project_end_overrun,
        }
    }
}

#[pyclass(name = "TaskSchedule")]
#[derive(Clone, Debug)]
pub struct PyTaskSchedule {
    #[pyo3(get)]
    pub start: NaiveDate,
    #[pyo3(get)]
    pub end: NaiveDate,
    #[pyo3(get)]
    pub changed: bool,
}

#[pyclass(name = "Conflict")]
#[derive(Clone, Debug)]
pub struct PyConflict {
    #[pyo3(get)]
    pub task_id: EntityId,
    /// Kebab-case kind, e.g. "exceeds-project-end".
    #[pyo3(get)]
    pub kind: String,
    #[pyo3(get)]
    pub message: String,
}

#[pymethods]
impl PyConflict {
    fn __repr__(&self) -> String {
        format!("Conflict({}, {}: {})", self.task_id, self.kind, self.message)
    }
}

#[pyclass(name = "ScheduleResult")]
#[derive(Clone, Debug)]
pub struct PyScheduleResult {
    #[pyo3(get)]
    pub tasks: HashMap<EntityId, PyTaskSchedule>,
    #[pyo3(get)]
    pub conflicts: Vec<PyConflict>,
    #[pyo3(get)]
    pub affected_task_ids: Vec<EntityId>,
    #[pyo3(get)]
    pub removed_links: Vec<PyLink>,
    #[pyo3(get)]
    pub baseline_variance: HashMap<EntityId, i64>,
}

impl From<ScheduleResult> for PyScheduleResult {
    fn from(r: ScheduleResult) -> Self {
        Self {
            tasks: r
                .tasks
                .into_iter()
                .map(|(id, s)| {
                    (
                        id,
                        PyTaskSchedule {
                            start: s.start,
                            end: s.end,
                            changed: s.changed,
                        },
                    )
                })
                .collect(),
            conflicts: r
                .conflicts
                .into_iter()
                .map(|c| PyConflict {
                    task_id: c.task_id,
                    kind: c.kind.as_str().to_string(),
                    message: c.message,
                })
                .collect(),
            affected_task_ids: r.affected_task_ids,
            removed_links: r.removed_links.into_iter().map(Into::into).collect(),
            baseline_variance: r.baseline_variance.into_iter().collect(),
        }
    }
}

fn to_tasks(tasks: &[PyTask]) -> Vec<Task> {
    tasks.iter().map(Task::from).collect()
}

fn to_links(links: &[PyLink]) -> PyResult<Vec<Link>> {
    links.iter().map(PyLink::to_link).collect()
}

fn calendar_or_default(calendar: Option<PyRef<'_, PyCalendar>>) -> Calendar {
    calendar.map(|c| c.inner.clone()).unwrap_or_default()
}

/// Run a scheduling pass, forwarding changed dates to a Python callable.
///
/// The first exception raised by the callable stops further calls and is
/// re-raised once the pass has finished.
fn run_with_callback<F>(py: Python<'_>, callback: Option<&PyObject>, run: F) -> PyResult<ScheduleResult>
where
    F: FnOnce(Option<OnScheduled<'_>>) -> ScheduleResult,
{
    let Some(callback) = callback else {
        return Ok(run(None));
    };
    let mut error: Option<PyErr> = None;
    let mut forward = |task_id: &TaskId, start: NaiveDate, end: NaiveDate| {
        if error.is_none() {
            if let Err(err) = callback.call1(py, (task_id.clone(), start, end)) {
                error = Some(err);
            }
        }
    };
    let result = run(Some(&mut forward));
    match error {
        Some(err) => Err(err),
        None => Ok(result),
    }
}

/// Compute early/late dates, slack and the critical path.
#[pyfunction]
#[pyo3(signature = (tasks, links, calendar=None, options=None))]
fn calculate_critical_path(
    tasks: Vec<PyTask>,
    links: Vec<PyLink>,
    calendar: Option<PyRef<'_, PyCalendar>>,
    options: Option<PyRef<'_, PyCriticalPathOptions>>,
) -> PyResult<PyCriticalPathResult> {
    let tasks = to_tasks(&tasks);
    let links = to_links(&links)?;
    let calendar = calendar_or_default(calendar);
    let options = match options {
        Some(o) => o.to_options()?,
        None => CriticalPathOptions::default(),
    };
    Ok(critical_path::calculate_critical_path(&tasks, &links, &calendar, &options).into())
}

/// Ids of the zero-slack entries, in entry order.
#[pyfunction]
fn get_critical_task_ids(entries: Vec<PyCriticalPathEntry>) -> Vec<EntityId> {
    let entries: Vec<CriticalPathEntry> = entries.iter().map(Into::into).collect();
    critical_path::get_critical_task_ids(&entries)
}

/// Recompute dates for every non-pinned task.
///
/// # Arguments
/// * `baseline` - Optional dict of task id -> (start, end)
/// * `on_scheduled` - Optional callable `(task_id, start, end)` for changed tasks
///
/// # Raises
/// * Whatever `on_scheduled` raised, after the pass completes
#[pyfunction]
#[pyo3(signature = (tasks, links, calendar=None, baseline=None, config=None, on_scheduled=None))]
fn schedule_tasks(
    py: Python<'_>,
    tasks: Vec<PyTask>,
    links: Vec<PyLink>,
    calendar: Option<PyRef<'_, PyCalendar>>,
    baseline: Option<HashMap<EntityId, (NaiveDate, NaiveDate)>>,
    config: Option<PyRef<'_, PyScheduleConfig>>,
    on_scheduled: Option<PyObject>,
) -> PyResult<PyScheduleResult> {
    let tasks = to_tasks(&tasks);
    let links = to_links(&links)?;
    let calendar = calendar_or_default(calendar);
    let config = config.map(|c| ScheduleConfig::from(&*c)).unwrap_or_default();
    let baseline: Option<Baseline> = baseline.map(|b| b.into_iter().collect());

    let result = run_with_callback(py, on_scheduled.as_ref(), |callback| {
        scheduler::schedule_tasks(
            &tasks,
            &links,
            &calendar,
            baseline.as_ref(),
            &config,
            callback,
        )
    })?;
    Ok(result.into())
}

/// Recompute dates for `task_id` and everything downstream of it.
#[pyfunction]
#[pyo3(signature = (task_id, tasks, links, calendar=None, config=None, on_scheduled=None))]
fn reschedule_from_task(
    py: Python<'_>,
    task_id: EntityId,
    tasks: Vec<PyTask>,
    links: Vec<PyLink>,
    calendar: Option<PyRef<'_, PyCalendar>>,
    config: Option<PyRef<'_, PyScheduleConfig>>,
    on_scheduled: Option<PyObject>,
) -> PyResult<PyScheduleResult> {
    let tasks = to_tasks(&tasks);
    let links = to_links(&links)?;
    let calendar = calendar_or_default(calendar);
    let config = config.map(|c| ScheduleConfig::from(&*c)).unwrap_or_default();

    let result = run_with_callback(py, on_scheduled.as_ref(), |callback| {
        scheduler::reschedule_from_task(&task_id, &tasks, &links, &calendar, &config, callback)
    })?;
    Ok(result.into())
}

/// List each dependency cycle once, as task ids in link order.
#[pyfunction]
fn detect_circular_dependencies(tasks: Vec<PyTask>, links: Vec<PyLink>) -> PyResult<Vec<Vec<EntityId>>> {
    Ok(graph::detect_circular_dependencies(&to_tasks(&tasks), &to_links(&links)?))
}

/// Split links into `(valid, removed)`; removed links reference unknown tasks.
#[pyfunction]
fn remove_invalid_links(tasks: Vec<PyTask>, links: Vec<PyLink>) -> PyResult<(Vec<PyLink>, Vec<PyLink>)> {
    let partition = graph::remove_invalid_links(&to_tasks(&tasks), &to_links(&links)?);
    Ok((
        partition.valid_links.into_iter().map(Into::into).collect(),
        partition.removed_links.into_iter().map(Into::into).collect(),
    ))
}

/// Every task reachable downstream of `task_id`, excluding itself.
#[pyfunction]
fn get_affected_successors(task_id: EntityId, links: Vec<PyLink>) -> PyResult<Vec<EntityId>> {
    Ok(graph::get_affected_successors(&task_id, &to_links(&links)?))
}

/// The timeline_sched Python module.
#[pymodule]
fn timeline_sched(m: &Bound<'_, PyModule>) -> PyResult<()> {
    // Inputs
    m.add_class::<PyTask>()?;
    m.add_class::<PyLink>()?;
    m.add_class::<PyCalendar>()?;
    m.add_class::<PyScheduleConfig>()?;
    m.add_class::<PyCriticalPathOptions>()?;

    // Results
    m.add_class::<PyCriticalPathEntry>()?;
    m.add_class::<PyCriticalPathResult>()?;
    m.add_class::<PyTaskSchedule>()?;
    m.add_class::<PyConflict>()?;
    m.add_class::<PyScheduleResult>()?;

    // Algorithms
    m.add_function(wrap_pyfunction!(calculate_critical_path, m)?)?;
    m.add_function(wrap_pyfunction!(get_critical_task_ids, m)?)?;
    m.add_function(wrap_pyfunction!(schedule_tasks, m)?)?;
    m.add_function(wrap_pyfunction!(reschedule_from_task, m)?)?;
    m.add_function(wrap_pyfunction!(detect_circular_dependencies, m)?)?;
    m.add_function(wrap_pyfunction!(remove_invalid_links, m)?)?;
    m.add_function(wrap_pyfunction!(get_affected_successors, m)?)?;

    Ok(())
}
