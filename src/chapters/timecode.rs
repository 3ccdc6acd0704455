use crate::error::{Result, SplitError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// A chapter timestamp as a whole number of seconds from the start of the source
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TimeCode(u64);

impl TimeCode {
    pub const ZERO: TimeCode = TimeCode(0);

    pub fn from_secs(seconds: u64) -> Self {
        Self(seconds)
    }

    /// Parse `HH:MM:SS` into seconds.
    ///
    /// Exactly three colon-separated non-negative integers are required. Hours
    /// have no upper bound and minutes/seconds are not range checked, so
    /// `"00:90:00"` is 5400 seconds.
    pub fn parse(text: &str) -> Result<Self> {
        let parts: Vec<&str> = text.split(':').collect();
        if parts.len() != 3 {
            return Err(SplitError::invalid_timestamp(
                text,
                format!("expected HH:MM:SS, found {} component(s)", parts.len()),
            ));
        }

        let hours = parse_component(text, parts[0], "hours")?;
        let minutes = parse_component(text, parts[1], "minutes")?;
        let seconds = parse_component(text, parts[2], "seconds")?;

        hours
            .checked_mul(3600)
            .and_then(|h| h.checked_add(minutes.checked_mul(60)?))
            .and_then(|hm| hm.checked_add(seconds))
            .map(Self)
            .ok_or_else(|| SplitError::invalid_timestamp(text, "timestamp overflows"))
    }

    pub fn as_secs(&self) -> u64 {
        self.0
    }

    pub fn as_secs_f64(&self) -> f64 {
        self.0 as f64
    }

    pub fn as_duration(&self) -> Duration {
        Duration::from_secs(self.0)
    }
}

fn parse_component(text: &str, component: &str, name: &str) -> Result<u64> {
    // u64::from_str accepts a leading '+', which is not a timestamp digit
    if component.is_empty() || !component.bytes().all(|b| b.is_ascii_digit()) {
        return Err(SplitError::invalid_timestamp(
            text,
            format!("{} component {:?} is not a non-negative integer", name, component),
        ));
    }

    component
        .parse()
        .map_err(|e| SplitError::invalid_timestamp(text, format!("{}: {}", name, e)))
}

impl FromStr for TimeCode {
    type Err = SplitError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// Renders as `HH:MM:SS`; hours widen past two digits when needed
impl fmt::Display for TimeCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let hours = self.0 / 3600;
        let minutes = (self.0 % 3600) / 60;
        let seconds = self.0 % 60;
        write!(f, "{:02}:{:02}:{:02}", hours, minutes, seconds)
    }
}
