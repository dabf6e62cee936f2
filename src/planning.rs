use chrono::{DateTime, TimeDelta, Utc};

use crate::outage::{InvalidTimestamp, OutageNotice, OutageWindow, WindowPosition};
use crate::schedule::{WindowStatus, status_at};

pub const LEAD_TIME: TimeDelta = TimeDelta::minutes(15);

const REMINDER_TITLE: &str = "Corte de luz próximo";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReminderMessage {
    pub title: String,
    pub body: String,
}

impl ReminderMessage {
    pub fn for_window(window: &OutageWindow) -> Self {
        Self {
            title: REMINDER_TITLE.to_owned(),
            body: format!("Desde: {} hasta: {}.", window.hour_from, window.hour_to),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReminderTrigger {
    pub position: WindowPosition,
    pub account_id: String,
    pub fire_at: DateTime<Utc>,
    pub message: ReminderMessage,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedWindow {
    pub position: WindowPosition,
    pub account_id: String,
    pub error: InvalidTimestamp,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReminderPlan {
    pub triggers: Vec<ReminderTrigger>,
    /// Windows whose reminder moment is already behind `now`.
    pub dropped: Vec<WindowPosition>,
    pub skipped: Vec<SkippedWindow>,
}

impl ReminderPlan {
    pub fn is_empty(&self) -> bool {
        self.triggers.is_empty()
    }
}

/// Computes the reminders still worth raising for `notices` as seen at `now`.
///
/// Windows are visited notice by notice in input order. A trigger fires
/// `lead_time` before its window starts and is kept only while that moment
/// is strictly after `now`; nothing is ever planned retroactively, even when
/// the outage itself is still ahead. Windows without a usable start time end
/// up in [`ReminderPlan::skipped`] and do not affect the others.
pub fn plan_reminders(
    notices: &[OutageNotice],
    now: DateTime<Utc>,
    lead_time: TimeDelta,
) -> ReminderPlan {
    let mut plan = ReminderPlan::default();

    let windows = notices.iter().enumerate().flat_map(|(index, notice)| {
        notice
            .positioned_windows(index)
            .map(move |(position, window)| (notice, position, window))
    });

    for (notice, position, window) in windows {
        let starts_at = match window.starts_at.instant() {
            Ok(starts_at) => starts_at,
            Err(error) => {
                plan.skipped.push(SkippedWindow {
                    position,
                    account_id: notice.account_id.clone(),
                    error,
                });
                continue;
            }
        };

        let fire_at = match starts_at.checked_sub_signed(lead_time) {
            Some(fire_at) if fire_at > now => fire_at,
            _ => {
                plan.dropped.push(position);
                continue;
            }
        };

        debug_assert_eq!(status_at(fire_at, now), WindowStatus::Upcoming);

        plan.triggers.push(ReminderTrigger {
            position,
            account_id: notice.account_id.clone(),
            fire_at,
            message: ReminderMessage::for_window(window),
        });
    }

    plan
}
