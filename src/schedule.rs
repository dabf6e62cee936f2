use chrono::{DateTime, Utc};

use crate::outage::{InvalidTimestamp, OutageWindow};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowStatus {
    Past,
    Upcoming,
}

impl WindowStatus {
    pub fn is_past(&self) -> bool {
        matches!(self, WindowStatus::Past)
    }
}

/// A window that starts exactly at `now` has not happened yet.
pub fn status_at(starts_at: DateTime<Utc>, now: DateTime<Utc>) -> WindowStatus {
    if starts_at < now {
        WindowStatus::Past
    } else {
        WindowStatus::Upcoming
    }
}

pub fn classify(
    window: &OutageWindow,
    now: DateTime<Utc>,
) -> Result<WindowStatus, InvalidTimestamp> {
    let starts_at = window.starts_at.instant()?;
    Ok(status_at(starts_at, now))
}
