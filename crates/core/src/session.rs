//! Trading session windows.
//!
//! A session is a named, inclusive time-of-day window in a reference time
//! zone. Sessions are plain values: the calendar is built once from
//! configuration and passed to whatever needs it.

use chrono::{NaiveTime, Timelike};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Minutes in one day.
pub const MINUTES_PER_DAY: u32 = 24 * 60;

/// A named trading window in a reference time zone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionWindow {
    /// Session name ("US", "EU", ...).
    pub name: String,
    /// Reference time zone, serialized as its IANA name.
    #[serde(with = "tz_serde")]
    pub zone: Tz,
    /// First local minute of the session.
    pub start: NaiveTime,
    /// Last local minute of the session (inclusive).
    pub end: NaiveTime,
}

/// Custom serde module for chrono_tz::Tz
mod tz_serde {
    use chrono_tz::Tz;
    use serde::{self, Deserialize, Deserializer, Serializer};
    use std::str::FromStr;

    pub fn serialize<S>(tz: &Tz, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(tz.name())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Tz, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Tz::from_str(&s).map_err(serde::de::Error::custom)
    }
}

impl SessionWindow {
    pub fn new(name: impl Into<String>, zone: Tz, start: NaiveTime, end: NaiveTime) -> Self {
        Self {
            name: name.into(),
            zone,
            start,
            end,
        }
    }

    /// US cash session: 09:30-15:59 New York.
    pub fn us() -> Self {
        Self::new("US", chrono_tz::America::New_York, hm(9, 30), hm(15, 59))
    }

    /// European session expressed on the New York clock: 02:00-08:59.
    pub fn eu() -> Self {
        Self::new("EU", chrono_tz::America::New_York, hm(2, 0), hm(8, 59))
    }

    /// Minute of day of the session start.
    #[inline]
    pub fn start_minute(&self) -> u32 {
        minute_of_day(self.start)
    }

    /// Minute of day of the session end (inclusive).
    #[inline]
    pub fn end_minute(&self) -> u32 {
        minute_of_day(self.end)
    }

    /// Whether a local minute of day falls inside the window.
    #[inline]
    pub fn contains_minute(&self, minute: u32) -> bool {
        minute >= self.start_minute() && minute <= self.end_minute()
    }

    /// Whether the inclusive minute range `[from, to]` overlaps the window.
    #[inline]
    pub fn overlaps_minutes(&self, from: u32, to: u32) -> bool {
        from <= self.end_minute() && to >= self.start_minute()
    }

    /// Check the window is usable by the bucket builder.
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::config("session name must not be empty"));
        }
        // Bucket truncation works on time of day only, so no midnight rollover.
        if self.end < self.start {
            return Err(Error::config(format!(
                "session {} crosses midnight ({} > {}), which is not supported",
                self.name, self.start, self.end
            )));
        }
        Ok(())
    }
}

/// Minute of day (0..1440) of a local time, ignoring seconds.
#[inline]
pub fn minute_of_day(t: NaiveTime) -> u32 {
    t.hour() * 60 + t.minute()
}

fn hm(hour: u32, minute: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(hour, minute, 0).unwrap_or(NaiveTime::MIN)
}

/// Immutable lookup table of session windows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionCalendar {
    windows: Vec<SessionWindow>,
}

impl SessionCalendar {
    /// Create a calendar, rejecting duplicate names and invalid windows.
    pub fn new(windows: Vec<SessionWindow>) -> Result<Self> {
        for (i, window) in windows.iter().enumerate() {
            window.validate()?;
            if windows[..i].iter().any(|w| w.name == window.name) {
                return Err(Error::config(format!(
                    "session {} defined more than once",
                    window.name
                )));
            }
        }
        Ok(Self { windows })
    }

    /// Look up a session by name.
    pub fn window_for(&self, name: &str) -> Result<&SessionWindow> {
        self.windows
            .iter()
            .find(|w| w.name == name)
            .ok_or_else(|| Error::unknown_session(name))
    }

    /// Look up several sessions, failing on the first unknown name.
    pub fn resolve<S: AsRef<str>>(&self, names: &[S]) -> Result<Vec<SessionWindow>> {
        names
            .iter()
            .map(|n| self.window_for(n.as_ref()).cloned())
            .collect()
    }

    /// All configured windows.
    pub fn windows(&self) -> &[SessionWindow] {
        &self.windows
    }
}

impl Default for SessionCalendar {
    fn default() -> Self {
        Self {
            windows: vec![SessionWindow::us(), SessionWindow::eu()],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_windows() {
        let calendar = SessionCalendar::default();
        let us = calendar.window_for("US").unwrap();
        assert_eq!(us.start_minute(), 9 * 60 + 30);
        assert_eq!(us.end_minute(), 15 * 60 + 59);
        assert_eq!(us.zone, chrono_tz::America::New_York);

        let eu = calendar.window_for("EU").unwrap();
        assert_eq!(eu.start_minute(), 120);
        assert_eq!(eu.end_minute(), 8 * 60 + 59);
    }

    #[test]
    fn test_unknown_session() {
        let calendar = SessionCalendar::default();
        let err = calendar.window_for("ASIA").unwrap_err();
        assert!(matches!(err, Error::UnknownSession(ref name) if name == "ASIA"));
        assert!(calendar.resolve(&["US", "ASIA"]).is_err());
    }

    #[test]
    fn test_zone_is_per_session() {
        let london = SessionWindow::new("LDN", chrono_tz::Europe::London, hm(8, 0), hm(16, 29));
        let calendar = SessionCalendar::new(vec![SessionWindow::us(), london]).unwrap();
        assert_eq!(
            calendar.window_for("LDN").unwrap().zone,
            chrono_tz::Europe::London
        );
        assert_eq!(
            calendar.window_for("US").unwrap().zone,
            chrono_tz::America::New_York
        );
    }

    #[test]
    fn test_rejects_duplicates_and_midnight_crossing() {
        assert!(SessionCalendar::new(vec![SessionWindow::us(), SessionWindow::us()]).is_err());

        let night = SessionWindow::new("NIGHT", chrono_tz::UTC, hm(22, 0), hm(3, 59));
        assert!(matches!(
            SessionCalendar::new(vec![night]),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_window_boundaries_inclusive() {
        let us = SessionWindow::us();
        assert!(!us.contains_minute(9 * 60 + 29));
        assert!(us.contains_minute(9 * 60 + 30));
        assert!(us.contains_minute(15 * 60 + 59));
        assert!(!us.contains_minute(16 * 60));
        assert!(us.overlaps_minutes(9 * 60, 9 * 60 + 59));
        assert!(!us.overlaps_minutes(16 * 60, 16 * 60 + 59));
    }

    #[test]
    fn test_window_json_uses_zone_name() {
        let json = serde_json::to_string(&SessionWindow::us()).unwrap();
        assert!(json.contains("America/New_York"));
        assert!(json.contains("09:30:00"));
        let back: SessionWindow = serde_json::from_str(&json).unwrap();
        assert_eq!(back, SessionWindow::us());
    }
}
