/// Daily run cadence.
///
/// One run per day at a fixed UTC time. Missed slots are not caught up:
/// after downtime the next run is simply the next future slot.

use chrono::{DateTime, Duration, NaiveTime, Utc};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DailySchedule {
    at: NaiveTime,
}

impl DailySchedule {
    pub fn new(at: NaiveTime) -> Self {
        DailySchedule { at }
    }

    /// Midnight UTC.
    pub fn midnight() -> Self {
        DailySchedule::new(NaiveTime::MIN)
    }

    /// First slot strictly after `now`.
    pub fn next_after(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let today = now.date_naive().and_time(self.at).and_utc();
        if today > now {
            today
        } else {
            today + Duration::days(1)
        }
    }

    /// Time to wait from `now` until the next slot.
    pub fn wait_from(&self, now: DateTime<Utc>) -> std::time::Duration {
        (self.next_after(now) - now)
            .to_std()
            .unwrap_or(std::time::Duration::ZERO)
    }
}

impl Default for DailySchedule {
    fn default() -> Self {
        DailySchedule::midnight()
    }
}

impl FromStr for DailySchedule {
    type Err = String;

    /// Parses `HH:MM` or `HH:MM:SS`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        NaiveTime::parse_from_str(s, "%H:%M")
            .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M:%S"))
            .map(DailySchedule::new)
            .map_err(|e| format!("'{}' is not a HH:MM time: {}", s, e))
    }
}

impl fmt::Display for DailySchedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "daily at {} UTC", self.at.format("%H:%M"))
    }
}
