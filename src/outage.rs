use std::fmt;

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Offset-less layouts the utility uses for `fechaHoraCorte`. They are read
/// as wall-clock time in the configured timezone.
const LOCAL_FORMATS: [&str; 6] = [
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Outage start timestamp could not be parsed: {raw:?}")]
pub struct InvalidTimestamp {
    pub raw: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum WindowStart {
    At(DateTime<Utc>),
    Unparseable(String),
}

impl WindowStart {
    pub fn parse(raw: &str, timezone: &Tz) -> Self {
        match parse_start(raw, timezone) {
            Ok(instant) => WindowStart::At(instant),
            Err(error) => WindowStart::Unparseable(error.raw),
        }
    }

    pub fn instant(&self) -> Result<DateTime<Utc>, InvalidTimestamp> {
        match self {
            WindowStart::At(instant) => Ok(*instant),
            WindowStart::Unparseable(raw) => Err(InvalidTimestamp { raw: raw.clone() }),
        }
    }
}

impl From<DateTime<Utc>> for WindowStart {
    fn from(instant: DateTime<Utc>) -> Self {
        WindowStart::At(instant)
    }
}

fn parse_start(raw: &str, timezone: &Tz) -> Result<DateTime<Utc>, InvalidTimestamp> {
    let trimmed = raw.trim();
    let invalid = || InvalidTimestamp {
        raw: raw.to_owned(),
    };

    if let Ok(instant) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(instant.with_timezone(&Utc));
    }

    let naive = LOCAL_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(trimmed, format).ok())
        .ok_or_else(invalid)?;

    timezone
        .from_local_datetime(&naive)
        .earliest()
        .map(|local| local.with_timezone(&Utc))
        .ok_or_else(invalid)
}

/// Display clock time, `HH:MM` with the hour padded to two digits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClockTime(String);

impl ClockTime {
    pub fn new(raw: &str) -> Self {
        let raw = raw.trim();
        let normalized = match raw.split_once(':') {
            Some((hours, minutes)) => format!("{:0>2}:{}", hours.trim(), minutes),
            None => raw.to_owned(),
        };
        Self(normalized)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ClockTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutageWindow {
    pub date_label: String,
    pub starts_at: WindowStart,
    pub hour_from: ClockTime,
    pub hour_to: ClockTime,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutageNotice {
    pub account_id: String,
    pub address: String,
    pub feeder_id: String,
    pub cue: String,
    pub registration_date: String,
    pub windows: Vec<OutageWindow>,
}

impl OutageNotice {
    pub fn positioned_windows(
        &self,
        notice: usize,
    ) -> impl Iterator<Item = (WindowPosition, &OutageWindow)> {
        self.windows
            .iter()
            .enumerate()
            .map(move |(window, w)| (WindowPosition { notice, window }, w))
    }
}

/// Location of a window inside the notice list it was planned from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct WindowPosition {
    pub notice: usize,
    pub window: usize,
}

impl fmt::Display for WindowPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.notice + 1, self.window + 1)
    }
}
