//! Timemark parsing.
//!
//! A timemark is a point in playback time given as seconds (`12.5`), a
//! formatted duration (`01:02:03.5`, `02:03`), or a percentage of the total
//! duration (`25%`).

use std::fmt;
use std::str::FromStr;

use crate::Error;

/// Convert a `[[hh:]mm:]ss[.ms]` string (or plain seconds) to seconds.
///
/// Returns `None` when any component is not a number.
pub fn timemark_to_seconds(timemark: &str) -> Option<f64> {
    let timemark = timemark.trim();
    if timemark.is_empty() {
        return None;
    }

    if !timemark.contains(':') {
        return timemark.parse::<f64>().ok().filter(|s| s.is_finite());
    }

    let component = |s: &str| s.parse::<f64>().ok().filter(|v| v.is_finite());
    let mut parts: Vec<&str> = timemark.split(':').collect();
    let mut secs = component(parts.pop()?)?;
    if let Some(minutes) = parts.pop() {
        secs += component(minutes)? * 60.0;
    }
    if let Some(hours) = parts.pop() {
        secs += component(hours)? * 3600.0;
    }
    if !parts.is_empty() {
        return None;
    }
    Some(secs)
}

/// A timemark, either absolute or relative to the media duration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Timemark {
    /// Absolute offset in seconds.
    Seconds(f64),
    /// Percentage (0-100) of the total duration.
    Percent(f64),
}

impl Timemark {
    /// Whether resolving this timemark needs the media duration.
    pub fn is_relative(&self) -> bool {
        matches!(self, Timemark::Percent(_))
    }

    /// Resolve to seconds. Percentages need `duration`; without it they
    /// resolve to `None`.
    pub fn to_seconds(&self, duration: Option<f64>) -> Option<f64> {
        match *self {
            Timemark::Seconds(s) => Some(s),
            Timemark::Percent(p) => duration.map(|d| d * p / 100.0),
        }
    }
}

impl FromStr for Timemark {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Some(number) = s.strip_suffix('%') {
            let valid = !number.is_empty() && number.chars().all(|c| c.is_ascii_digit() || c == '.');
            return match number.parse::<f64>() {
                Ok(p) if valid => Ok(Timemark::Percent(p)),
                _ => Err(Error::config(format!("Invalid timemark: {s}"))),
            };
        }

        timemark_to_seconds(s)
            .map(Timemark::Seconds)
            .ok_or_else(|| Error::config(format!("Invalid timemark: {s}")))
    }
}

impl From<f64> for Timemark {
    fn from(seconds: f64) -> Self {
        Timemark::Seconds(seconds)
    }
}

impl From<u32> for Timemark {
    fn from(seconds: u32) -> Self {
        Timemark::Seconds(f64::from(seconds))
    }
}

impl fmt::Display for Timemark {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Timemark::Seconds(s) => write!(f, "{s}"),
            Timemark::Percent(p) => write!(f, "{p}%"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_seconds() {
        assert_eq!(timemark_to_seconds("12"), Some(12.0));
        assert_eq!(timemark_to_seconds("12.5"), Some(12.5));
    }

    #[test]
    fn formatted_durations() {
        assert_eq!(timemark_to_seconds("01:02"), Some(62.0));
        assert_eq!(timemark_to_seconds("01:02:03.5"), Some(3723.5));
        assert_eq!(timemark_to_seconds("00:00:00.04"), Some(0.04));
    }

    #[test]
    fn invalid_timemarks() {
        assert_eq!(timemark_to_seconds(""), None);
        assert_eq!(timemark_to_seconds("abc"), None);
        assert_eq!(timemark_to_seconds("1:2:3:4"), None);
        assert_eq!(timemark_to_seconds("N/A"), None);
        assert_eq!(timemark_to_seconds("1:NaN"), None);
        assert_eq!(timemark_to_seconds("inf:30"), None);
    }

    #[test]
    fn parse_percent() {
        let t: Timemark = "25%".parse().unwrap();
        assert_eq!(t, Timemark::Percent(25.0));
        assert!(t.is_relative());
        assert_eq!(t.to_seconds(Some(200.0)), Some(50.0));
        assert_eq!(t.to_seconds(None), None);
    }

    #[test]
    fn parse_formatted() {
        let t: Timemark = "00:01:30".parse().unwrap();
        assert_eq!(t, Timemark::Seconds(90.0));
        assert!(!t.is_relative());
    }

    #[test]
    fn parse_rejects_garbage() {
        assert!("x%".parse::<Timemark>().is_err());
        assert!("-5%".parse::<Timemark>().is_err());
        assert!("soon".parse::<Timemark>().is_err());
    }

    #[test]
    fn display() {
        assert_eq!(Timemark::Seconds(1.5).to_string(), "1.5");
        assert_eq!(Timemark::Percent(20.0).to_string(), "20%");
    }
}
