use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::planning::ReminderTrigger;

use super::scheduler::{NotificationScheduler, ScheduledReminder};

/// Records reminders without delivering them.
///
/// Used by one-shot commands, which exit before any reminder fires.
#[derive(Default)]
pub struct PlannedReminderScheduler {
    planned: RwLock<Vec<ScheduledReminder>>,
    next_id: AtomicU64,
}

impl PlannedReminderScheduler {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl NotificationScheduler for PlannedReminderScheduler {
    async fn schedule(&self, trigger: ReminderTrigger) -> anyhow::Result<ScheduledReminder> {
        let reminder = ScheduledReminder {
            id: self.next_id.fetch_add(1, Ordering::Relaxed) + 1,
            fire_at: trigger.fire_at,
        };
        log::debug!(
            "Planned reminder without delivery. [window = {}, fire_at = {}]",
            trigger.position,
            trigger.fire_at
        );

        self.planned.write().await.push(reminder.clone());
        Ok(reminder)
    }

    async fn cancel_all(&self) -> anyhow::Result<usize> {
        let mut planned = self.planned.write().await;
        let dropped = planned.len();
        planned.clear();
        Ok(dropped)
    }

    async fn pending(&self) -> Vec<ScheduledReminder> {
        let mut pending = self.planned.read().await.clone();
        pending.sort_by_key(|reminder| reminder.fire_at);
        pending
    }
}
