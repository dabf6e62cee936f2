use async_trait::async_trait;
use teloxide::{prelude::*, types::ParseMode, utils::markdown};
use thiserror::Error;

use crate::appsettings::TelegramSettings;
use crate::planning::ReminderMessage;
use crate::scheduling::ReminderDeliveryChannel;

#[derive(Debug, Error)]
pub enum TelegramDeliveryChannelError {
    #[error(transparent)]
    Telegram(#[from] teloxide::RequestError),

    #[error("Telegram bot token is empty")]
    MissingToken,
}

/// Sends reminders to a single configured Telegram chat.
pub struct TelegramDeliveryChannel {
    bot: Bot,
    chat_id: ChatId,
}

impl TelegramDeliveryChannel {
    pub fn create(settings: &TelegramSettings) -> Result<Self, TelegramDeliveryChannelError> {
        if settings.token.trim().is_empty() {
            return Err(TelegramDeliveryChannelError::MissingToken);
        }

        Ok(Self {
            bot: Bot::new(settings.token.clone()),
            chat_id: ChatId(settings.chat_id),
        })
    }
}

#[async_trait]
impl ReminderDeliveryChannel for TelegramDeliveryChannel {
    async fn send_reminder_notification(&self, message: &ReminderMessage) -> anyhow::Result<()> {
        self.bot
            .send_message(self.chat_id, get_message_text(message))
            .parse_mode(ParseMode::MarkdownV2)
            .await
            .map_err(TelegramDeliveryChannelError::from)?;

        Ok(())
    }
}

fn get_message_text(message: &ReminderMessage) -> String {
    format!(
        "⚡ *{}*\n{}",
        markdown::escape(&message.title),
        markdown::escape(&message.body)
    )
}
