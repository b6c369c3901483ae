//! Org timestamp literals.
//!
//! Accepted shapes (active `<...>` or inactive `[...]`):
//!
//! ```text
//! <2024-01-15>
//! [2024-01-15 Mon]
//! <2024-01-15 Mon 10:30>
//! <2024-01-15 Mon 10:30-11:45 +1w>
//! ```
//!
//! Only the start time is kept. Repeaters, warning delays and any other trailing
//! tokens before the closing bracket are accepted and ignored.

use chrono::{Local, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use regex::Regex;
use serde::{Serialize, Serializer};
use std::fmt;
use std::sync::LazyLock;

static TIMESTAMP_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?x)
        ^(?P<open>[<\[])
        (?P<year>\d{4})-(?P<month>\d{1,2})-(?P<day>\d{1,2})
        (?:\s+(?P<weekday>[[:alpha:]]+\.?))?
        (?:\s+(?P<hour>\d{1,2}):(?P<minute>\d{2})
            (?:-(?P<end_hour>\d{1,2}):(?P<end_minute>\d{2}))?)?
        (?:\s+[^<>\[\]]*)?
        \s*(?P<close>[>\]])$",
    )
    .expect("timestamp regex is valid")
});

/// Error returned when a timestamp literal cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TimestampError {
    #[error("invalid timestamp '{0}'")]
    InvalidFormat(String),
}

/// A date with an optional start time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Timestamp {
    pub date: NaiveDate,
    pub time: Option<NaiveTime>,
    /// `<...>` timestamps are active, `[...]` inactive
    pub active: bool,
}

impl Timestamp {
    /// Parse a timestamp literal.
    pub fn parse(text: &str) -> Result<Self, TimestampError> {
        let invalid = || TimestampError::InvalidFormat(text.to_string());
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(invalid());
        }

        let caps = TIMESTAMP_RE.captures(trimmed).ok_or_else(invalid)?;
        let active = match (&caps["open"], &caps["close"]) {
            ("<", ">") => true,
            ("[", "]") => false,
            _ => return Err(invalid()),
        };

        let number = |name: &str| -> Result<u32, TimestampError> {
            caps[name].parse::<u32>().map_err(|_| invalid())
        };

        let date = NaiveDate::from_ymd_opt(
            caps["year"].parse::<i32>().map_err(|_| invalid())?,
            number("month")?,
            number("day")?,
        )
        .ok_or_else(invalid)?;

        let time = if caps.name("hour").is_some() {
            let start = NaiveTime::from_hms_opt(number("hour")?, number("minute")?, 0)
                .ok_or_else(invalid)?;
            if caps.name("end_hour").is_some() {
                // The end of a range is validated but not kept.
                NaiveTime::from_hms_opt(number("end_hour")?, number("end_minute")?, 0)
                    .ok_or_else(invalid)?;
            }
            Some(start)
        } else {
            None
        };

        Ok(Self { date, time, active })
    }

    /// Whether `text` parses. Never panics.
    pub fn is_valid(text: &str) -> bool {
        Self::parse(text).is_ok()
    }

    /// Inactive timestamp for the current local minute.
    pub fn now_inactive() -> Self {
        let now = Local::now().naive_local();
        Self {
            date: now.date(),
            time: NaiveTime::from_hms_opt(now.hour(), now.minute(), 0),
            active: false,
        }
    }

    /// Date and start time; midnight when no time was given.
    pub fn to_datetime(&self) -> NaiveDateTime {
        self.date.and_time(self.time.unwrap_or(NaiveTime::MIN))
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (open, close) = if self.active { ('<', '>') } else { ('[', ']') };
        write!(f, "{}{}", open, self.date.format("%Y-%m-%d %a"))?;
        if let Some(time) = self.time {
            write!(f, " {}", time.format("%H:%M"))?;
        }
        write!(f, "{}", close)
    }
}

impl Serialize for Timestamp {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}
