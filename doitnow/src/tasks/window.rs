//! Calendar windows relative to "now".
//!
//! Windows are computed in the caller's local calendar (any
//! [`TimeZone`]) and expressed as UTC instants. They depend on the current
//! instant and must be recomputed rather than cached across days.

use std::str::FromStr;

use chrono::{DateTime, Datelike, NaiveDate, NaiveTime, TimeDelta, TimeZone, Utc};

/// First day of the calendar week.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WeekStart {
    /// ISO convention.
    #[default]
    Monday,
    /// US convention.
    Sunday,
}

impl FromStr for WeekStart {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "monday" | "mon" => Ok(Self::Monday),
            "sunday" | "sun" => Ok(Self::Sunday),
            other => Err(format!("unknown week start: {other:?}")),
        }
    }
}

/// A half-open interval `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Interval {
    /// Inclusive lower bound.
    pub start: DateTime<Utc>,
    /// Exclusive upper bound.
    pub end: DateTime<Utc>,
}

impl Interval {
    /// Whether `instant` falls inside the interval.
    #[must_use]
    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        self.start <= instant && instant < self.end
    }
}

/// The four canonical windows for one value of "now".
///
/// `today` and `week` are stored; overdue and upcoming are the open rays
/// below `today.start` and from `week.end` onwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindows {
    /// `[local midnight, local midnight + 24h)`.
    pub today: Interval,
    /// `[first day of the week 00:00, first day of next week 00:00)`.
    pub week: Interval,
}

impl TimeWindows {
    /// Computes the windows for `now` in `now`'s own time zone.
    #[must_use]
    pub fn compute<Tz: TimeZone>(now: &DateTime<Tz>, week_start: WeekStart) -> Self {
        let tz = now.timezone();
        let date = now.date_naive();

        let today_start = local_midnight(&tz, date);
        let today = Interval {
            start: today_start,
            end: today_start + TimeDelta::hours(24),
        };

        let back = match week_start {
            WeekStart::Monday => date.weekday().num_days_from_monday(),
            WeekStart::Sunday => date.weekday().num_days_from_sunday(),
        };
        let first_day = date - TimeDelta::days(i64::from(back));
        let week = Interval {
            start: local_midnight(&tz, first_day),
            end: local_midnight(&tz, first_day + TimeDelta::days(7)),
        };

        Self { today, week }
    }

    /// Due strictly before the start of today.
    #[must_use]
    pub fn is_overdue(&self, due: DateTime<Utc>) -> bool {
        due < self.today.start
    }

    /// Due at or after the end of this week (the first instant of the
    /// next week belongs to the next week).
    #[must_use]
    pub fn is_upcoming(&self, due: DateTime<Utc>) -> bool {
        due >= self.week.end
    }
}

/// The first instant of `date` in `tz`, as UTC.
///
/// Zones that skip midnight on a DST change start the day at the first
/// valid local time after it.
pub(crate) fn local_midnight<Tz: TimeZone>(tz: &Tz, date: NaiveDate) -> DateTime<Utc> {
    let midnight = date.and_time(NaiveTime::MIN);
    (0..=2)
        .find_map(|h| {
            tz.from_local_datetime(&(midnight + TimeDelta::hours(h)))
                .earliest()
        })
        .map_or_else(
            || Utc.from_utc_datetime(&midnight),
            |dt| dt.with_timezone(&Utc),
        )
}
