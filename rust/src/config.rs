//! Configuration for the critical-path and scheduling passes.

use chrono::NaiveDate;

use crate::calendar::TimeUnit;
use crate::logging::Verbosity;

/// Configuration for `schedule_tasks` and `reschedule_from_task`.
#[derive(Clone, Debug)]
pub struct ScheduleConfig {
    /// Earliest allowed start; computed starts before it are raised to it.
    pub project_start: Option<NaiveDate>,
    /// Latest allowed end; ends after it are reported as conflicts, not clamped.
    pub project_end: Option<NaiveDate>,
    /// Use workday arithmetic (true) or raw calendar days (false).
    pub respect_calendar: bool,
    pub verbosity: Verbosity,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            project_start: None,
            project_end: None,
            respect_calendar: true,
            verbosity: Verbosity::Silent,
        }
    }
}

impl ScheduleConfig {
    pub fn with_project_start(mut self, date: NaiveDate) -> Self {
        self.project_start = Some(date);
        self
    }

    pub fn with_project_end(mut self, date: NaiveDate) -> Self {
        self.project_end = Some(date);
        self
    }

    pub fn with_respect_calendar(mut self, respect: bool) -> Self {
        self.respect_calendar = respect;
        self
    }

    pub fn with_verbosity(mut self, verbosity: Verbosity) -> Self {
        self.verbosity = verbosity;
        self
    }

    /// Unit the scheduler measures durations and gaps in.
    pub fn time_unit(&self) -> TimeUnit {
        if self.respect_calendar {
            TimeUnit::Workdays
        } else {
            TimeUnit::CalendarDays
        }
    }
}

/// Options for `calculate_critical_path`.
#[derive(Clone, Debug, Default)]
pub struct CriticalPathOptions {
    /// Early start of every task is floored here; source tasks start here.
    pub project_start: Option<NaiveDate>,
    /// Late finish of sink tasks; defaults to the latest early finish.
    pub project_end: Option<NaiveDate>,
    /// Unit for durations and slack.
    pub unit: TimeUnit,
    pub verbosity: Verbosity,
}

impl CriticalPathOptions {
    pub fn with_project_start(mut self, date: NaiveDate) -> Self {
        self.project_start = Some(date);
        self
    }

    pub fn with_project_end(mut self, date: NaiveDate) -> Self {
        self.project_end = Some(date);
        self
    }

    pub fn with_unit(mut self, unit: TimeUnit) -> Self {
        self.unit = unit;
        self
    }

    pub fn with_verbosity(mut self, verbosity: Verbosity) -> Self {
        self.verbosity = verbosity;
        self
    }
}
