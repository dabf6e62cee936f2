use async_trait::async_trait;

use crate::planning::ReminderMessage;

#[async_trait]
pub trait ReminderDeliveryChannel: Send + Sync + 'static {
    async fn send_reminder_notification(&self, message: &ReminderMessage) -> anyhow::Result<()>;
}

pub struct ConsoleDeliveryChannel;

#[async_trait]
impl ReminderDeliveryChannel for ConsoleDeliveryChannel {
    async fn send_reminder_notification(&self, message: &ReminderMessage) -> anyhow::Result<()> {
        log::info!("Delivering reminder on console. [title = {}]", message.title);
        println!("🔔 {}: {}", message.title, message.body);
        Ok(())
    }
}
