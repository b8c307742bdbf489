//! Auto-scheduler.
//!
//! Places every non-pinned task at the earliest date its incoming links allow,
//! in topological order, either across the whole project or downstream of one
//! changed task.

mod core;
mod result;

pub use core::{reschedule_from_task, schedule_tasks, AutoScheduler, OnScheduled};
pub use result::{Baseline, Conflict, ConflictKind, ScheduleResult, TaskSchedule};
