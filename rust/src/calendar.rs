//! Working-time calendar and date arithmetic over working days.
//!
//! Day classification follows a fixed precedence:
//! workday exception > holiday > weekday default.
//! An exception date is always a working day, even on a weekend that is also
//! listed as a holiday.

use chrono::{Datelike, Days, NaiveDate, Weekday};
use rustc_hash::FxHashSet;
use thiserror::Error;

use crate::models::Task;

const WEEKDAYS: [Weekday; 7] = [
    Weekday::Mon,
    Weekday::Tue,
    Weekday::Wed,
    Weekday::Thu,
    Weekday::Fri,
    Weekday::Sat,
    Weekday::Sun,
];

/// Hours assumed for an exception day that falls on a zero-hour weekday.
pub const DEFAULT_EXCEPTION_HOURS: f32 = 8.0;

/// Errors raised while building a calendar.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CalendarError {
    #[error("Working hours for {weekday} must be within 0..=24, got {hours}")]
    InvalidHours { weekday: Weekday, hours: f32 },
    #[error("Exception-day hours must be within 0..=24, got {0}")]
    InvalidExceptionHours(f32),
    #[error("Calendar has no working weekday")]
    NoWorkingWeekday,
}

/// Classification of a single date, in precedence order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DayStatus {
    /// Forced working by a workday exception.
    Exception,
    /// Forced off by the holiday set.
    Holiday,
    /// Off because the weekday has no working hours.
    NonWorkingWeekday,
    /// Ordinary working weekday.
    Working,
}

impl DayStatus {
    #[inline]
    pub fn is_working(self) -> bool {
        matches!(self, DayStatus::Exception | DayStatus::Working)
    }
}

/// Unit used when measuring durations, gaps and slack.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TimeUnit {
    /// Only working days count; dates snap onto working days.
    #[default]
    Workdays,
    /// Every calendar day counts; the calendar is ignored.
    CalendarDays,
}

/// Working-time calendar.
#[derive(Clone, Debug, PartialEq)]
pub struct Calendar {
    /// Indexed by `Weekday::num_days_from_monday`.
    weekday_hours: [f32; 7],
    holidays: FxHashSet<NaiveDate>,
    workday_exceptions: FxHashSet<NaiveDate>,
    exception_hours: f32,
}

impl Default for Calendar {
    /// Monday to Friday, eight hours a day, no holidays.
    fn default() -> Self {
        Self {
            weekday_hours: [8.0, 8.0, 8.0, 8.0, 8.0, 0.0, 0.0],
            holidays: FxHashSet::default(),
            workday_exceptions: FxHashSet::default(),
            exception_hours: DEFAULT_EXCEPTION_HOURS,
        }
    }
}

impl Calendar {
    /// Create a calendar from per-weekday hours, Monday first.
    ///
    /// At least one weekday must have hours, otherwise searching for the next
    /// working day would never terminate.
    pub fn new(weekday_hours: [f32; 7]) -> Result<Self, CalendarError> {
        for (offset, &hours) in weekday_hours.iter().enumerate() {
            if !(0.0..=24.0).contains(&hours) {
                return Err(CalendarError::InvalidHours {
                    weekday: WEEKDAYS[offset],
                    hours,
                });
            }
        }
        if weekday_hours.iter().all(|&h| h == 0.0) {
            return Err(CalendarError::NoWorkingWeekday);
        }
        Ok(Self {
            weekday_hours,
            ..Self::default()
        })
    }

    pub fn with_holiday(mut self, date: NaiveDate) -> Self {
        self.holidays.insert(date);
        self
    }

    pub fn with_holidays(mut self, dates: impl IntoIterator<Item = NaiveDate>) -> Self {
        self.holidays.extend(dates);
        self
    }

    pub fn with_workday_exception(mut self, date: NaiveDate) -> Self {
        self.workday_exceptions.insert(date);
        self
    }

    pub fn with_workday_exceptions(mut self, dates: impl IntoIterator<Item = NaiveDate>) -> Self {
        self.workday_exceptions.extend(dates);
        self
    }

    pub fn with_exception_hours(mut self, hours: f32) -> Result<Self, CalendarError> {
        if !(0.0..=24.0).contains(&hours) {
            return Err(CalendarError::InvalidExceptionHours(hours));
        }
        self.exception_hours = hours;
        Ok(self)
    }

    pub fn holidays(&self) -> &FxHashSet<NaiveDate> {
        &self.holidays
    }

    pub fn workday_exceptions(&self) -> &FxHashSet<NaiveDate> {
        &self.workday_exceptions
    }

    #[inline]
    pub fn weekday_hours(&self, weekday: Weekday) -> f32 {
        self.weekday_hours[weekday.num_days_from_monday() as usize]
    }

    #[inline]
    pub fn is_working_weekday(&self, weekday: Weekday) -> bool {
        self.weekday_hours(weekday) > 0.0
    }

    #[inline]
    pub fn is_holiday(&self, date: NaiveDate) -> bool {
        self.holidays.contains(&date)
    }

    #[inline]
    pub fn is_workday_exception(&self, date: NaiveDate) -> bool {
        self.workday_exceptions.contains(&date)
    }

    /// Classify a date. The match order is the precedence order.
    pub fn day_status(&self, date: NaiveDate) -> DayStatus {
        if self.is_workday_exception(date) {
            DayStatus::Exception
        } else if self.is_holiday(date) {
            DayStatus::Holiday
        } else if !self.is_working_weekday(date.weekday()) {
            DayStatus::NonWorkingWeekday
        } else {
            DayStatus::Working
        }
    }

    #[inline]
    pub fn is_non_workday(&self, date: NaiveDate) -> bool {
        !self.day_status(date).is_working()
    }

    #[inline]
    pub fn is_workday(&self, date: NaiveDate) -> bool {
        self.day_status(date).is_working()
    }

    /// Hours available on a date.
    pub fn working_hours(&self, date: NaiveDate) -> f32 {
        match self.day_status(date) {
            DayStatus::Working => self.weekday_hours(date.weekday()),
            DayStatus::Exception => {
                let hours = self.weekday_hours(date.weekday());
                if hours > 0.0 {
                    hours
                } else {
                    self.exception_hours
                }
            }
            DayStatus::Holiday | DayStatus::NonWorkingWeekday => 0.0,
        }
    }

    /// Inclusive count of working days in `[start, end]`; 0 when `start > end`.
    pub fn count_workdays(&self, start: NaiveDate, end: NaiveDate) -> u32 {
        start
            .iter_days()
            .take_while(|d| *d <= end)
            .filter(|d| self.is_workday(*d))
            .count() as u32
    }

    /// Sum of working hours in `[start, end]`.
    pub fn count_working_hours(&self, start: NaiveDate, end: NaiveDate) -> f32 {
        start
            .iter_days()
            .take_while(|d| *d <= end)
            .map(|d| self.working_hours(d))
            .sum()
    }

    /// Smallest working date `>= date`.
    pub fn next_workday(&self, date: NaiveDate) -> NaiveDate {
        let mut current = date;
        while !self.is_workday(current) {
            match current.succ_opt() {
                Some(next) => current = next,
                None => return current,
            }
        }
        current
    }

    /// Greatest working date `<= date`.
    pub fn previous_workday(&self, date: NaiveDate) -> NaiveDate {
        let mut current = date;
        while !self.is_workday(current) {
            match current.pred_opt() {
                Some(prev) => current = prev,
                None => return current,
            }
        }
        current
    }

    /// Date of the n-th working day counting from `start`.
    ///
    /// `start` itself counts when it is a working day; otherwise counting begins
    /// at the next working day. `n == 0` yields that first working day.
    pub fn calculate_end_date_by_workdays(&self, start: NaiveDate, n: u32) -> NaiveDate {
        let first = self.next_workday(start);
        self.add_workdays(first, n.saturating_sub(1) as i64)
    }

    /// Mirror of [`Calendar::calculate_end_date_by_workdays`]: the date on which a
    /// task of `n` working days must start to finish on `end`.
    pub fn calculate_start_date_by_workdays(&self, end: NaiveDate, n: u32) -> NaiveDate {
        let last = self.previous_workday(end);
        self.add_workdays(last, -(n.saturating_sub(1) as i64))
    }

    /// Move `n` working days away from `date` (backwards for negative `n`).
    ///
    /// `date` itself is never counted, so shifting a working day by 1 gives the
    /// following working day.
    pub fn add_workdays(&self, date: NaiveDate, n: i64) -> NaiveDate {
        let mut current = date;
        let mut remaining = n.unsigned_abs();
        while remaining > 0 {
            let step = if n > 0 {
                current.succ_opt()
            } else {
                current.pred_opt()
            };
            let Some(next) = step else {
                return current;
            };
            current = next;
            if self.is_workday(current) {
                remaining -= 1;
            }
        }
        current
    }
}

/// A calendar seen through a [`TimeUnit`].
///
/// The critical-path and scheduling passes are written once against this view,
/// so the same code serves workday and calendar-day arithmetic.
#[derive(Clone, Copy, Debug)]
pub struct TimeAxis<'a> {
    calendar: &'a Calendar,
    unit: TimeUnit,
}

impl<'a> TimeAxis<'a> {
    pub fn new(calendar: &'a Calendar, unit: TimeUnit) -> Self {
        Self { calendar, unit }
    }

    pub fn unit(&self) -> TimeUnit {
        self.unit
    }

    pub fn calendar(&self) -> &'a Calendar {
        self.calendar
    }

    /// First usable date at or after `date`.
    pub fn snap_forward(&self, date: NaiveDate) -> NaiveDate {
        match self.unit {
            TimeUnit::Workdays => self.calendar.next_workday(date),
            TimeUnit::CalendarDays => date,
        }
    }

    /// Last usable date at or before `date`.
    pub fn snap_backward(&self, date: NaiveDate) -> NaiveDate {
        match self.unit {
            TimeUnit::Workdays => self.calendar.previous_workday(date),
            TimeUnit::CalendarDays => date,
        }
    }

    /// Move `n` units from `date`.
    pub fn shift(&self, date: NaiveDate, n: i64) -> NaiveDate {
        match self.unit {
            TimeUnit::Workdays => self.calendar.add_workdays(date, n),
            TimeUnit::CalendarDays => {
                let days = Days::new(n.unsigned_abs());
                let moved = if n >= 0 {
                    date.checked_add_days(days)
                } else {
                    date.checked_sub_days(days)
                };
                moved.unwrap_or(if n >= 0 { NaiveDate::MAX } else { NaiveDate::MIN })
            }
        }
    }

    /// Signed number of units from `from` to `to`.
    ///
    /// For snapped dates this is the inverse of [`TimeAxis::shift`].
    pub fn distance(&self, from: NaiveDate, to: NaiveDate) -> i64 {
        match self.unit {
            TimeUnit::CalendarDays => (to - from).num_days(),
            TimeUnit::Workdays => {
                if to > from {
                    let after = from.succ_opt().unwrap_or(from);
                    self.calendar.count_workdays(after, to) as i64
                } else if to < from {
                    let after = to.succ_opt().unwrap_or(to);
                    -(self.calendar.count_workdays(after, from) as i64)
                } else {
                    0
                }
            }
        }
    }

    /// Inclusive end of a span of `duration` units starting at `start`.
    pub fn span_end(&self, start: NaiveDate, duration: u32) -> NaiveDate {
        match self.unit {
            TimeUnit::Workdays => self.calendar.calculate_end_date_by_workdays(start, duration),
            TimeUnit::CalendarDays => self.shift(start, duration.saturating_sub(1) as i64),
        }
    }

    /// Start of a span of `duration` units whose inclusive end is `end`.
    pub fn span_start(&self, end: NaiveDate, duration: u32) -> NaiveDate {
        match self.unit {
            TimeUnit::Workdays => self
                .calendar
                .calculate_start_date_by_workdays(end, duration),
            TimeUnit::CalendarDays => self.shift(end, -(duration.saturating_sub(1) as i64)),
        }
    }

    /// Length of a task in units: the explicit duration, or the units covered by
    /// its dates with a floor of one so a derived duration is never a milestone.
    pub fn duration_of(&self, task: &Task) -> u32 {
        task.duration
            .unwrap_or_else(|| self.units_in(task.start, task.end).max(1))
    }

    /// Number of units covered by `start..=end`, zero if the range is empty.
    pub fn units_in(&self, start: NaiveDate, end: NaiveDate) -> u32 {
        match self.unit {
            TimeUnit::Workdays => self.calendar.count_workdays(start, end),
            TimeUnit::CalendarDays => {
                if end < start {
                    0
                } else {
                    ((end - start).num_days() + 1) as u32
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    // 2024-01-01 is a Monday.
    fn monday() -> NaiveDate {
        date(2024, 1, 1)
    }

    #[test]
    fn test_default_calendar_weekdays() {
        let cal = Calendar::default();
        assert!(cal.is_working_weekday(Weekday::Mon));
        assert!(cal.is_working_weekday(Weekday::Fri));
        assert!(!cal.is_working_weekday(Weekday::Sat));
        assert!(!cal.is_working_weekday(Weekday::Sun));
    }

    #[test]
    fn test_count_workdays_week() {
        let cal = Calendar::default();
        assert_eq!(cal.count_workdays(monday(), date(2024, 1, 5)), 5);
        // Friday through the following Monday skips the weekend
        assert_eq!(cal.count_workdays(date(2024, 1, 5), date(2024, 1, 8)), 2);
        assert_eq!(cal.count_workdays(date(2024, 1, 5), monday()), 0);
    }

    #[test]
    fn test_end_date_by_workdays() {
        let cal = Calendar::default();
        assert_eq!(cal.calculate_end_date_by_workdays(monday(), 3), date(2024, 1, 3));
        assert_eq!(
            cal.calculate_end_date_by_workdays(date(2024, 1, 5), 3),
            date(2024, 1, 9)
        );
        // Saturday start counts from Monday
        assert_eq!(
            cal.calculate_end_date_by_workdays(date(2024, 1, 6), 1),
            date(2024, 1, 8)
        );
        assert_eq!(
            cal.calculate_end_date_by_workdays(date(2024, 1, 6), 0),
            date(2024, 1, 8)
        );
    }

    #[test]
    fn test_start_date_by_workdays() {
        let cal = Calendar::default();
        assert_eq!(
            cal.calculate_start_date_by_workdays(date(2024, 1, 9), 3),
            date(2024, 1, 5)
        );
        // Sunday end counts back from Friday
        assert_eq!(
            cal.calculate_start_date_by_workdays(date(2024, 1, 7), 2),
            date(2024, 1, 4)
        );
    }

    #[test]
    fn test_exception_beats_weekend_and_holiday() {
        let saturday = date(2024, 1, 6);
        let cal = Calendar::default()
            .with_holiday(saturday)
            .with_workday_exception(saturday);
        assert!(!cal.is_non_workday(saturday));
        assert_eq!(cal.day_status(saturday), DayStatus::Exception);
        assert!((cal.working_hours(saturday) - DEFAULT_EXCEPTION_HOURS).abs() < 1e-6);
    }

    #[test]
    fn test_holiday_beats_weekday() {
        let tuesday = date(2024, 1, 2);
        let cal = Calendar::default().with_holiday(tuesday);
        assert_eq!(cal.day_status(tuesday), DayStatus::Holiday);
        assert_eq!(cal.next_workday(tuesday), date(2024, 1, 3));
        assert_eq!(cal.previous_workday(tuesday), monday());
        assert_eq!(cal.count_workdays(monday(), date(2024, 1, 5)), 4);
        assert_eq!(cal.working_hours(tuesday), 0.0);
    }

    #[test]
    fn test_next_workday_identity_on_working_day() {
        let cal = Calendar::default();
        assert_eq!(cal.next_workday(monday()), monday());
        assert_eq!(cal.next_workday(date(2024, 1, 6)), date(2024, 1, 8));
    }

    #[test]
    fn test_add_workdays_both_directions() {
        let cal = Calendar::default();
        assert_eq!(cal.add_workdays(date(2024, 1, 5), 1), date(2024, 1, 8));
        assert_eq!(cal.add_workdays(date(2024, 1, 8), -1), date(2024, 1, 5));
        assert_eq!(cal.add_workdays(monday(), 0), monday());
    }

    #[test]
    fn test_count_working_hours() {
        let cal = Calendar::new([8.0, 8.0, 8.0, 8.0, 4.0, 0.0, 0.0]).unwrap();
        assert!((cal.count_working_hours(monday(), date(2024, 1, 7)) - 36.0).abs() < 1e-6);
    }

    #[test]
    fn test_calendar_validation() {
        assert_eq!(
            Calendar::new([0.0; 7]).unwrap_err(),
            CalendarError::NoWorkingWeekday
        );
        let err = Calendar::new([8.0, 8.0, 30.0, 8.0, 8.0, 0.0, 0.0]).unwrap_err();
        assert_eq!(
            err,
            CalendarError::InvalidHours {
                weekday: Weekday::Wed,
                hours: 30.0
            }
        );
        assert!(Calendar::default().with_exception_hours(-1.0).is_err());
    }

    #[test]
    fn test_axis_distance_inverts_shift() {
        let cal = Calendar::default();
        let axis = TimeAxis::new(&cal, TimeUnit::Workdays);
        let friday = date(2024, 1, 5);
        let later = axis.shift(friday, 4);
        assert_eq!(later, date(2024, 1, 11));
        assert_eq!(axis.distance(friday, later), 4);
        assert_eq!(axis.distance(later, friday), -4);

        let days = TimeAxis::new(&cal, TimeUnit::CalendarDays);
        assert_eq!(days.shift(friday, 4), date(2024, 1, 9));
        assert_eq!(days.distance(friday, date(2024, 1, 9)), 4);
        assert_eq!(days.shift(friday, -5), date(2023, 12, 31));
    }

    #[test]
    fn test_axis_spans() {
        let cal = Calendar::default();
        let axis = TimeAxis::new(&cal, TimeUnit::Workdays);
        assert_eq!(axis.span_end(date(2024, 1, 4), 2), date(2024, 1, 5));
        assert_eq!(axis.span_start(date(2024, 1, 5), 2), date(2024, 1, 4));
        assert_eq!(axis.units_in(monday(), date(2024, 1, 7)), 5);

        let days = TimeAxis::new(&cal, TimeUnit::CalendarDays);
        assert_eq!(days.span_end(monday(), 3), date(2024, 1, 3));
        assert_eq!(days.span_end(monday(), 0), monday());
        assert_eq!(days.units_in(monday(), date(2024, 1, 7)), 7);
        assert_eq!(days.units_in(date(2024, 1, 7), monday()), 0);
    }

    #[test]
    fn test_duration_of_task() {
        let cal = Calendar::default();
        let axis = TimeAxis::new(&cal, TimeUnit::Workdays);
        let weekend = Task::new("w", date(2024, 1, 6), date(2024, 1, 7));
        assert_eq!(axis.duration_of(&weekend), 1);
        let week = Task::new("k", monday(), date(2024, 1, 7));
        assert_eq!(axis.duration_of(&week), 5);
        assert_eq!(axis.duration_of(&week.clone().with_duration(0)), 0);

        let days = TimeAxis::new(&cal, TimeUnit::CalendarDays);
        assert_eq!(days.duration_of(&week), 7);
    }
}
