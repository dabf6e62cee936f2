use std::{
    collections::HashMap,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::{
    sync::{RwLock, watch},
    task::{self, JoinHandle},
};
use tokio_util::sync::CancellationToken;

use crate::planning::ReminderTrigger;

use super::delivery::ReminderDeliveryChannel;
use super::scheduler::{NotificationScheduler, ReminderId, ScheduledReminder};

const CLEANUP_INTERVAL: Duration = Duration::from_secs(300);

struct ScheduledReminderHandle {
    task: JoinHandle<()>,
    cancellation_token: CancellationToken,
    fire_at: DateTime<Utc>,
}

struct CleanupTask(watch::Sender<()>);

type ReminderTaskStore = RwLock<HashMap<ReminderId, ScheduledReminderHandle>>;

/// Keeps one sleeping task per reminder and hands the message to the
/// delivery channel once its moment arrives.
pub struct DeliveryReminderScheduler {
    tasks: Arc<ReminderTaskStore>,
    next_id: AtomicU64,
    delivery_channel: Arc<dyn ReminderDeliveryChannel>,
    cleanup_task: CleanupTask,
}

impl DeliveryReminderScheduler {
    pub fn new(delivery_channel: Arc<dyn ReminderDeliveryChannel>) -> Self {
        let tasks = Arc::new(RwLock::new(HashMap::new()));
        let cleanup_task = Self::spawn_cleanup_task(Arc::clone(&tasks));

        Self {
            tasks,
            next_id: AtomicU64::new(1),
            delivery_channel,
            cleanup_task,
        }
    }
}

impl Drop for DeliveryReminderScheduler {
    fn drop(&mut self) {
        let _ = self.cleanup_task.0.send(());
    }
}

impl DeliveryReminderScheduler {
    fn create_reminder_task(
        &self,
        id: ReminderId,
        trigger: ReminderTrigger,
        delay: Duration,
    ) -> ScheduledReminderHandle {
        let cancellation_token = CancellationToken::new();
        let task_cancellation_token = cancellation_token.child_token();
        let delivery_channel = Arc::clone(&self.delivery_channel);
        let fire_at = trigger.fire_at;

        log::info!(
            "[SCHEDULE] Sleeping for {:?} delay. [reminder_id = {}, window = {}]",
            delay,
            id,
            trigger.position
        );

        let task = task::spawn(async move {
            tokio::select! {
                _ = task_cancellation_token.cancelled() => {
                    log::info!("Reminder was cancelled before firing. [reminder_id = {id}]");
                }
                _ = tokio::time::sleep(delay) => {
                    if let Err(error) = delivery_channel
                        .send_reminder_notification(&trigger.message)
                        .await
                    {
                        log::error!("Failed to deliver reminder. [reminder_id = {id}, error = {error:#}]");
                    }
                }
            }
        });

        ScheduledReminderHandle {
            task,
            cancellation_token,
            fire_at,
        }
    }

    fn spawn_cleanup_task(tasks: Arc<ReminderTaskStore>) -> CleanupTask {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(());
        task::spawn(async move {
            loop {
                tokio::select! {
                    _ = tokio::time::sleep(CLEANUP_INTERVAL) => {
                        Self::clean_finished_tasks(&tasks).await;
                    }
                    _ = shutdown_rx.changed() => {
                        log::debug!("Cleanup task shutting down");
                        break;
                    }
                };
            }
        });

        CleanupTask(shutdown_tx)
    }

    async fn clean_finished_tasks(tasks: &ReminderTaskStore) {
        let mut tasks = tasks.write().await;
        let before = tasks.len();
        tasks.retain(|_, handle| !handle.task.is_finished());
        let after = tasks.len();

        if before != after {
            log::info!("Cleaned up {} fired reminder tasks", before - after);
        }
    }
}

#[async_trait]
impl NotificationScheduler for DeliveryReminderScheduler {
    async fn schedule(&self, trigger: ReminderTrigger) -> anyhow::Result<ScheduledReminder> {
        let fire_at = trigger.fire_at;
        let delay = delay_until(fire_at, Utc::now()).ok_or_else(|| {
            anyhow::anyhow!("Reminder time {fire_at} is not in the future, refusing to schedule")
        })?;

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let handle = self.create_reminder_task(id, trigger, delay);
        self.tasks.write().await.insert(id, handle);

        Ok(ScheduledReminder { id, fire_at })
    }

    async fn cancel_all(&self) -> anyhow::Result<usize> {
        let drained: Vec<_> = self.tasks.write().await.drain().collect();

        let mut cancelled = 0;
        for (_, handle) in drained {
            if !handle.task.is_finished() {
                handle.cancellation_token.cancel();
                cancelled += 1;
            }
        }

        log::info!("Cancelled {cancelled} pending reminders");
        Ok(cancelled)
    }

    async fn pending(&self) -> Vec<ScheduledReminder> {
        let tasks = self.tasks.read().await;
        let mut pending: Vec<_> = tasks
            .iter()
            .filter(|(_, handle)| !handle.task.is_finished())
            .map(|(id, handle)| ScheduledReminder {
                id: *id,
                fire_at: handle.fire_at,
            })
            .collect();
        pending.sort_by_key(|reminder| (reminder.fire_at, reminder.id));
        pending
    }
}

/// Time left until `fire_at`, or `None` once that moment is reached.
pub(crate) fn delay_until(fire_at: DateTime<Utc>, now: DateTime<Utc>) -> Option<Duration> {
    let delta = fire_at - now;
    if delta <= chrono::TimeDelta::zero() {
        return None;
    }
    delta.to_std().ok()
}
