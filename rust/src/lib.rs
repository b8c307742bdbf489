//! Rust implementation of the timeline scheduling engine.
//!
//! Given a snapshot of tasks, dependency links and a working-time calendar, the
//! engine validates the dependency graph, computes the critical path and
//! auto-schedules tasks. Every operation is pure: inputs are borrowed, results
//! are returned as new values.

// Allow clippy warning triggered by PyO3 macro expansion
#![allow(clippy::useless_conversion)]

pub mod logging;

pub mod calendar;
mod config;
pub mod critical_path;
pub mod graph;
mod models;
pub mod scheduler;

#[cfg(feature = "python")]
mod python;

pub use calendar::{Calendar, CalendarError, DayStatus, TimeAxis, TimeUnit};
pub use config::{CriticalPathOptions, ScheduleConfig};
pub use critical_path::{
    calculate_critical_path, get_critical_task_ids, CriticalPathEntry, CriticalPathResult,
};
pub use graph::{
    detect_circular_dependencies, get_affected_successors, remove_invalid_links, LinkPartition,
    ValidatedGraph,
};
pub use logging::Verbosity;
pub use models::{Anchor, EntityId, Link, LinkId, LinkType, ScheduleMode, Task, TaskId};
pub use scheduler::{
    reschedule_from_task, schedule_tasks, Baseline, Conflict, ConflictKind, OnScheduled,
    ScheduleResult, TaskSchedule,
};
