//! Maps the current wall-clock time to a response-variant index based on its
//! distance to a recurring weekly event.
//!
//! The selector never converts timezones. Callers hand in a wall-clock value
//! already shifted to the event's local time (see [`wall_clock`]).

use crate::{ConfigError, CoreError};
use chrono::{DateTime, Datelike, Duration, FixedOffset, NaiveDateTime, NaiveTime, Utc, Weekday};
use serde::{Deserialize, Serialize};

/// Position of "now" relative to the weekly event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimeWindow {
    /// Two or more days before the next event
    Far,
    /// The calendar day before the event
    Eve,
    /// Event day, before it starts
    DayOf,
    /// Between start and end
    Live,
    /// Shortly after the event ended
    Replay,
}

impl TimeWindow {
    fn slot(self) -> usize {
        match self {
            TimeWindow::Far => 0,
            TimeWindow::Eve => 1,
            TimeWindow::DayOf => 2,
            TimeWindow::Live => 3,
            TimeWindow::Replay => 4,
        }
    }
}

/// Variant index used for each [`TimeWindow`], in far/eve/day-of/live/replay order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WindowTable(pub [usize; 5]);

impl WindowTable {
    pub fn five_bucket() -> Self {
        Self([0, 1, 2, 3, 4])
    }

    /// Legacy three-variant table: eve and day-of get their own variant,
    /// every other window reuses the first one.
    pub fn three_bucket() -> Self {
        Self([0, 1, 2, 0, 0])
    }

    pub fn index_for(&self, window: TimeWindow) -> usize {
        self.0[window.slot()]
    }
}

impl Default for WindowTable {
    fn default() -> Self {
        Self::five_bucket()
    }
}

/// Serialized form of the schedule as it appears in the catalog file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleConfig {
    pub weekday: String,
    pub start: String,
    pub end: String,
    #[serde(default = "default_replay_window_hours")]
    pub replay_window_hours: u32,
    #[serde(default)]
    pub window_indices: Option<WindowTable>,
}

fn default_replay_window_hours() -> u32 {
    24
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventSchedule {
    pub weekday: Weekday,
    pub start: NaiveTime,
    pub end: NaiveTime,
    pub replay_window: Duration,
    pub table: WindowTable,
}

impl EventSchedule {
    pub fn new(weekday: Weekday, start: NaiveTime, end: NaiveTime) -> Result<Self, CoreError> {
        if end <= start {
            return Err(ConfigError::ValidationFailed {
                reason: format!("event end {end} must be after start {start}"),
            }
            .into());
        }
        Ok(Self {
            weekday,
            start,
            end,
            replay_window: Duration::hours(i64::from(default_replay_window_hours())),
            table: WindowTable::default(),
        })
    }

    pub fn with_table(mut self, table: WindowTable) -> Self {
        self.table = table;
        self
    }

    pub fn with_replay_window(mut self, replay_window: Duration) -> Self {
        self.replay_window = replay_window;
        self
    }

    pub fn from_config(config: &ScheduleConfig) -> Result<Self, CoreError> {
        let weekday: Weekday = config.weekday.parse().map_err(|_| ConfigError::InvalidValue {
            field: "schedule.weekday".to_string(),
            value: config.weekday.clone(),
        })?;
        let start = parse_clock("schedule.start", &config.start)?;
        let end = parse_clock("schedule.end", &config.end)?;
        let table = config.window_indices.unwrap_or_default();
        if let Some(bad) = table.0.iter().find(|index| **index > 4) {
            return Err(ConfigError::ValidationFailed {
                reason: format!("window index {bad} is outside 0..=4"),
            }
            .into());
        }

        Ok(Self::new(weekday, start, end)?
            .with_table(table)
            .with_replay_window(Duration::hours(i64::from(config.replay_window_hours))))
    }

    /// Weekly-event window containing `now`.
    ///
    /// Precedence: day-of, live, eve, replay, far.
    pub fn window(&self, now: NaiveDateTime) -> TimeWindow {
        let today = now.weekday().num_days_from_monday() as i64;
        let event_day = self.weekday.num_days_from_monday() as i64;

        let days_since_event = (today - event_day).rem_euclid(7);
        let days_until_event = (event_day - today).rem_euclid(7);

        let last_event_date = now.date() - Duration::days(days_since_event);
        let last_start = last_event_date.and_time(self.start);
        let last_end = last_event_date.and_time(self.end);

        if days_since_event == 0 {
            if now < last_start {
                return TimeWindow::DayOf;
            }
            if now < last_end {
                return TimeWindow::Live;
            }
        }

        if days_until_event == 1 {
            return TimeWindow::Eve;
        }

        if now >= last_end && now < last_end + self.replay_window {
            return TimeWindow::Replay;
        }

        TimeWindow::Far
    }

    pub fn select(&self, now: NaiveDateTime) -> usize {
        self.table.index_for(self.window(now))
    }
}

/// Shifts a UTC instant to the wall clock of a fixed offset in minutes.
pub fn wall_clock(now: DateTime<Utc>, utc_offset_minutes: i32) -> NaiveDateTime {
    match utc_offset_minutes.checked_mul(60).and_then(FixedOffset::east_opt) {
        Some(offset) => now.with_timezone(&offset).naive_local(),
        None => now.naive_utc(),
    }
}

fn parse_clock(field: &str, value: &str) -> Result<NaiveTime, CoreError> {
    NaiveTime::parse_from_str(value.trim(), "%H:%M").map_err(|_| {
        ConfigError::InvalidValue {
            field: field.to_string(),
            value: value.to_string(),
        }
        .into()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(weekday: Weekday, hour: u32, minute: u32) -> NaiveDateTime {
        NaiveDate::from_isoywd_opt(2026, 42, weekday)
            .unwrap()
            .and_hms_opt(hour, minute, 0)
            .unwrap()
    }

    fn friday_show() -> EventSchedule {
        EventSchedule::new(
            Weekday::Fri,
            NaiveTime::from_hms_opt(15, 30, 0).unwrap(),
            NaiveTime::from_hms_opt(18, 0, 0).unwrap(),
        )
        .unwrap()
    }

    #[test]
    fn test_five_bucket_selection() {
        let schedule = friday_show();
        assert_eq!(schedule.select(at(Weekday::Thu, 10, 0)), 1);
        assert_eq!(schedule.select(at(Weekday::Fri, 15, 0)), 2);
        assert_eq!(schedule.select(at(Weekday::Fri, 16, 0)), 3);
        assert_eq!(schedule.select(at(Weekday::Fri, 19, 0)), 4);
        assert_eq!(schedule.select(at(Weekday::Mon, 9, 0)), 0);
    }

    #[test]
    fn test_window_boundaries() {
        let schedule = friday_show();
        assert_eq!(schedule.window(at(Weekday::Fri, 15, 29)), TimeWindow::DayOf);
        assert_eq!(schedule.window(at(Weekday::Fri, 15, 30)), TimeWindow::Live);
        assert_eq!(schedule.window(at(Weekday::Fri, 17, 59)), TimeWindow::Live);
        assert_eq!(schedule.window(at(Weekday::Fri, 18, 0)), TimeWindow::Replay);
        assert_eq!(schedule.window(at(Weekday::Sat, 17, 59)), TimeWindow::Replay);
        assert_eq!(schedule.window(at(Weekday::Sat, 18, 0)), TimeWindow::Far);
        assert_eq!(schedule.window(at(Weekday::Thu, 0, 0)), TimeWindow::Eve);
        assert_eq!(schedule.window(at(Weekday::Wed, 23, 59)), TimeWindow::Far);
    }

    #[test]
    fn test_eve_wins_over_long_replay_window() {
        let schedule = friday_show().with_replay_window(Duration::days(6));
        assert_eq!(schedule.window(at(Weekday::Wed, 12, 0)), TimeWindow::Replay);
        assert_eq!(schedule.window(at(Weekday::Thu, 12, 0)), TimeWindow::Eve);
    }

    #[test]
    fn test_three_bucket_legacy_table() {
        let schedule = friday_show().with_table(WindowTable::three_bucket());
        assert_eq!(schedule.select(at(Weekday::Tue, 12, 0)), 0);
        assert_eq!(schedule.select(at(Weekday::Thu, 12, 0)), 1);
        assert_eq!(schedule.select(at(Weekday::Fri, 9, 0)), 2);
        assert_eq!(schedule.select(at(Weekday::Fri, 16, 0)), 0);
        assert_eq!(schedule.select(at(Weekday::Sat, 9, 0)), 0);
    }

    #[test]
    fn test_from_config() {
        let config = ScheduleConfig {
            weekday: "Friday".to_string(),
            start: "15:30".to_string(),
            end: "18:00".to_string(),
            replay_window_hours: 12,
            window_indices: Some(WindowTable::three_bucket()),
        };
        let schedule = EventSchedule::from_config(&config).unwrap();
        assert_eq!(schedule.weekday, Weekday::Fri);
        assert_eq!(schedule.replay_window, Duration::hours(12));
        assert_eq!(schedule.table, WindowTable::three_bucket());

        let inverted = ScheduleConfig {
            end: "15:00".to_string(),
            ..config.clone()
        };
        assert!(EventSchedule::from_config(&inverted).is_err());

        let out_of_range = ScheduleConfig {
            window_indices: Some(WindowTable([0, 1, 2, 3, 5])),
            ..config.clone()
        };
        assert!(matches!(
            EventSchedule::from_config(&out_of_range),
            Err(CoreError::Config(ConfigError::ValidationFailed { .. }))
        ));

        let bad_day = ScheduleConfig {
            weekday: "Caturday".to_string(),
            ..config
        };
        assert!(EventSchedule::from_config(&bad_day).is_err());
    }

    #[test]
    fn test_wall_clock_offset() {
        let utc = NaiveDate::from_ymd_opt(2026, 10, 16)
            .unwrap()
            .and_hms_opt(20, 30, 0)
            .unwrap()
            .and_utc();
        let central = wall_clock(utc, -300);
        assert_eq!(central.time(), NaiveTime::from_hms_opt(15, 30, 0).unwrap());
        assert_eq!(wall_clock(utc, 0), utc.naive_utc());
        assert_eq!(wall_clock(utc, i32::MIN), utc.naive_utc());
        assert_eq!(wall_clock(utc, 24 * 60), utc.naive_utc());
    }
}
