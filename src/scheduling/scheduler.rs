use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::planning::ReminderTrigger;

pub type ReminderId = u64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduledReminder {
    pub id: ReminderId,
    pub fire_at: DateTime<Utc>,
}

#[async_trait]
pub trait NotificationScheduler: Send + Sync + 'static {
    async fn schedule(&self, trigger: ReminderTrigger) -> anyhow::Result<ScheduledReminder>;

    /// Cancels every reminder that has not fired yet and returns how many were dropped.
    async fn cancel_all(&self) -> anyhow::Result<usize>;

    async fn pending(&self) -> Vec<ScheduledReminder>;
}
