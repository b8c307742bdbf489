//! Core value types handed to the engine: tasks, links and their identifiers.

use chrono::NaiveDate;
use std::fmt;

/// Identifier of a task or link.
///
/// Opaque to the engine; only hashing and equality matter. Trackers hand out
/// either numeric or string keys, so both are accepted.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EntityId {
    Num(i64),
    Name(String),
}

pub type TaskId = EntityId;
pub type LinkId = EntityId;

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityId::Num(n) => write!(f, "{}", n),
            EntityId::Name(s) => f.write_str(s),
        }
    }
}

impl From<&str> for EntityId {
    fn from(s: &str) -> Self {
        EntityId::Name(s.to_string())
    }
}

impl From<String> for EntityId {
    fn from(s: String) -> Self {
        EntityId::Name(s)
    }
}

impl From<i64> for EntityId {
    fn from(n: i64) -> Self {
        EntityId::Num(n)
    }
}

impl From<u32> for EntityId {
    fn from(n: u32) -> Self {
        EntityId::Num(n as i64)
    }
}

/// Whether the auto-scheduler may move a task.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ScheduleMode {
    /// Dates are computed from dependencies and the calendar.
    #[default]
    Auto,
    /// Dates are pinned by the caller and act as a fixed anchor.
    Manual,
}

/// A task snapshot.
#[derive(Clone, Debug, PartialEq)]
pub struct Task {
    pub id: TaskId,
    pub start: NaiveDate,
    /// Inclusive: the task occupies its end day.
    pub end: NaiveDate,
    /// Length in working units; derived from `start..=end` when absent.
    /// `Some(0)` marks a milestone.
    pub duration: Option<u32>,
    pub mode: ScheduleMode,
    pub progress: Option<f64>,
}

impl Task {
    pub fn new(id: impl Into<TaskId>, start: NaiveDate, end: NaiveDate) -> Self {
        Self {
            id: id.into(),
            start,
            end,
            duration: None,
            mode: ScheduleMode::Auto,
            progress: None,
        }
    }

    pub fn with_duration(mut self, duration: u32) -> Self {
        self.duration = Some(duration);
        self
    }

    pub fn pinned(mut self) -> Self {
        self.mode = ScheduleMode::Manual;
        self
    }

    pub fn with_progress(mut self, progress: f64) -> Self {
        self.progress = Some(progress);
        self
    }

    #[inline]
    pub fn is_manual(&self) -> bool {
        self.mode == ScheduleMode::Manual
    }
}

/// Dependency type between a predecessor (source) and successor (target).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum LinkType {
    #[default]
    FinishToStart,
    StartToStart,
    FinishToFinish,
    StartToFinish,
}

/// Which end of a task a link attaches to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Anchor {
    Start,
    Finish,
}

impl LinkType {
    /// End of the predecessor the constraint is measured from.
    pub fn predecessor_anchor(self) -> Anchor {
        match self {
            LinkType::FinishToStart | LinkType::FinishToFinish => Anchor::Finish,
            LinkType::StartToStart | LinkType::StartToFinish => Anchor::Start,
        }
    }

    /// End of the successor the constraint applies to.
    pub fn successor_anchor(self) -> Anchor {
        match self {
            LinkType::FinishToStart | LinkType::StartToStart => Anchor::Start,
            LinkType::FinishToFinish | LinkType::StartToFinish => Anchor::Finish,
        }
    }

    /// Offset in working units between the two anchors.
    ///
    /// Finishes are inclusive, so a successor starting after a finish needs one
    /// unit, and a successor finishing before a start needs minus one.
    pub fn gap(self) -> i64 {
        match self {
            LinkType::FinishToStart => 1,
            LinkType::StartToStart | LinkType::FinishToFinish => 0,
            LinkType::StartToFinish => -1,
        }
    }

    /// Short code used by Gantt widgets and in log output.
    pub fn code(self) -> &'static str {
        match self {
            LinkType::FinishToStart => "FS",
            LinkType::StartToStart => "SS",
            LinkType::FinishToFinish => "FF",
            LinkType::StartToFinish => "SF",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code.to_ascii_uppercase().as_str() {
            "FS" | "FINISH_TO_START" => Some(LinkType::FinishToStart),
            "SS" | "START_TO_START" => Some(LinkType::StartToStart),
            "FF" | "FINISH_TO_FINISH" => Some(LinkType::FinishToFinish),
            "SF" | "START_TO_FINISH" => Some(LinkType::StartToFinish),
            _ => None,
        }
    }
}

/// A dependency link.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Link {
    pub id: LinkId,
    pub source: TaskId,
    pub target: TaskId,
    pub kind: LinkType,
    /// Extra working units between the anchors; negative values are leads.
    pub lag: i32,
}

impl Link {
    pub fn new(id: impl Into<LinkId>, source: impl Into<TaskId>, target: impl Into<TaskId>) -> Self {
        Self {
            id: id.into(),
            source: source.into(),
            target: target.into(),
            kind: LinkType::FinishToStart,
            lag: 0,
        }
    }

    pub fn with_kind(mut self, kind: LinkType) -> Self {
        self.kind = kind;
        self
    }

    pub fn with_lag(mut self, lag: i32) -> Self {
        self.lag = lag;
        self
    }

    /// Total offset between the anchors, lag included.
    #[inline]
    pub fn offset(&self) -> i64 {
        self.kind.gap() + self.lag as i64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_id_conversions() {
        assert_eq!(EntityId::from("a"), EntityId::Name("a".to_string()));
        assert_eq!(EntityId::from(7_i64), EntityId::Num(7));
        assert_eq!(EntityId::from(7_u32), EntityId::Num(7));
        assert_ne!(EntityId::from("7"), EntityId::from(7_i64));
        assert_eq!(EntityId::from(42_i64).to_string(), "42");
    }

    #[test]
    fn test_gap_mapping_is_total() {
        assert_eq!(LinkType::FinishToStart.gap(), 1);
        assert_eq!(LinkType::StartToStart.gap(), 0);
        assert_eq!(LinkType::FinishToFinish.gap(), 0);
        assert_eq!(LinkType::StartToFinish.gap(), -1);
        assert_eq!(LinkType::StartToFinish.predecessor_anchor(), Anchor::Start);
        assert_eq!(LinkType::StartToFinish.successor_anchor(), Anchor::Finish);
    }

    #[test]
    fn test_link_type_codes() {
        for kind in [
            LinkType::FinishToStart,
            LinkType::StartToStart,
            LinkType::FinishToFinish,
            LinkType::StartToFinish,
        ] {
            assert_eq!(LinkType::from_code(kind.code()), Some(kind));
        }
        assert_eq!(LinkType::from_code("ss"), Some(LinkType::StartToStart));
        assert_eq!(LinkType::from_code("xx"), None);
    }

    #[test]
    fn test_link_offset_includes_lag() {
        let link = Link::new(1_i64, "a", "b").with_lag(2);
        assert_eq!(link.offset(), 3);
        let lead = Link::new(2_i64, "a", "b")
            .with_kind(LinkType::StartToStart)
            .with_lag(-1);
        assert_eq!(lead.offset(), -1);
    }

    #[test]
    fn test_task_builders() {
        let d = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let task = Task::new("a", d, d).with_duration(0).pinned().with_progress(0.5);
        assert!(task.is_manual());
        assert_eq!(task.duration, Some(0));
        assert_eq!(task.progress, Some(0.5));
    }
}
