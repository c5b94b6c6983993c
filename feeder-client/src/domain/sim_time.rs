//! Simulation clock times.
//!
//! The driver engine keeps its own "HH:MM" wall clock that advances one
//! minute per tick. Rider ETAs and match formation times use the same format,
//! so they share one type.

use std::fmt;

use chrono::{NaiveTime, Timelike};

/// Error returned when parsing an invalid "HH:MM" string.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid time: {reason}")]
pub struct TimeError {
    reason: &'static str,
}

impl TimeError {
    fn new(reason: &'static str) -> Self {
        Self { reason }
    }
}

/// A time of day on the simulation clock, minute resolution.
///
/// ```
/// use feeder_client::domain::SimTime;
///
/// let t = SimTime::parse_hhmm("09:30").unwrap();
/// assert_eq!(t.to_string(), "09:30");
/// assert!(SimTime::parse_hhmm("9:30").is_err());
/// assert!(SimTime::parse_hhmm("24:00").is_err());
/// ```
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SimTime(NaiveTime);

impl SimTime {
    /// Parse a time from strict "HH:MM" format.
    pub fn parse_hhmm(s: &str) -> Result<Self, TimeError> {
        if s.len() != 5 {
            return Err(TimeError::new("expected HH:MM format"));
        }

        let bytes = s.as_bytes();
        if bytes[2] != b':' {
            return Err(TimeError::new("expected colon at position 2"));
        }

        let hour =
            parse_two_digits(&bytes[0..2]).ok_or_else(|| TimeError::new("invalid hour digits"))?;
        if hour > 23 {
            return Err(TimeError::new("hour must be 0-23"));
        }

        let minute = parse_two_digits(&bytes[3..5])
            .ok_or_else(|| TimeError::new("invalid minute digits"))?;
        if minute > 59 {
            return Err(TimeError::new("minute must be 0-59"));
        }

        NaiveTime::from_hms_opt(hour, minute, 0)
            .map(Self)
            .ok_or_else(|| TimeError::new("invalid time"))
    }

    pub fn from_hm(hour: u32, minute: u32) -> Option<Self> {
        NaiveTime::from_hms_opt(hour, minute, 0).map(Self)
    }

    /// Minutes since midnight.
    pub fn minutes(&self) -> u32 {
        self.0.hour() * 60 + self.0.minute()
    }

    /// Whether `self` is an earlier clock reading than `prev`.
    ///
    /// The engine clock wraps at midnight, so a step from 23:59 to 00:00 is
    /// forward progress, not a regression. Any backwards step of more than
    /// twelve hours is read as a wrap.
    pub fn regressed_from(&self, prev: &SimTime) -> bool {
        let now = self.minutes() as i64;
        let before = prev.minutes() as i64;
        let delta = now - before;
        delta < 0 && delta > -(12 * 60)
    }

    pub fn time(&self) -> NaiveTime {
        self.0
    }

    /// The clock reading `mins` minutes later, wrapping at midnight.
    pub fn plus_minutes(&self, mins: i64) -> SimTime {
        let (next, _) = self
            .0
            .overflowing_add_signed(chrono::Duration::minutes(mins));
        SimTime(next)
    }
}

fn parse_two_digits(bytes: &[u8]) -> Option<u32> {
    match bytes {
        [a, b] if a.is_ascii_digit() && b.is_ascii_digit() => {
            Some(u32::from(a - b'0') * 10 + u32::from(b - b'0'))
        }
        _ => None,
    }
}

impl fmt::Debug for SimTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SimTime({})", self)
    }
}

impl fmt::Display for SimTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.0.hour(), self.0.minute())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(s: &str) -> SimTime {
        SimTime::parse_hhmm(s).unwrap()
    }

    #[test]
    fn parse_valid() {
        assert_eq!(t("00:00").minutes(), 0);
        assert_eq!(t("23:59").minutes(), 23 * 60 + 59);
        assert_eq!(t("09:30").to_string(), "09:30");
    }

    #[test]
    fn reject_malformed() {
        assert!(SimTime::parse_hhmm("").is_err());
        assert!(SimTime::parse_hhmm("0930").is_err());
        assert!(SimTime::parse_hhmm("09-30").is_err());
        assert!(SimTime::parse_hhmm("09:60").is_err());
        assert!(SimTime::parse_hhmm("ab:cd").is_err());
    }

    #[test]
    fn regression_detection() {
        assert!(t("10:00").regressed_from(&t("10:05")));
        assert!(!t("10:06").regressed_from(&t("10:05")));
        assert!(!t("10:05").regressed_from(&t("10:05")));
        // midnight wrap is progress
        assert!(!t("00:01").regressed_from(&t("23:59")));
    }

    #[test]
    fn advance_wraps() {
        assert_eq!(t("10:04").plus_minutes(1), t("10:05"));
        assert_eq!(t("23:59").plus_minutes(1), t("00:00"));
    }

    #[test]
    fn ordering() {
        assert!(t("09:30") < t("10:00"));
    }
}
