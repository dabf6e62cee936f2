mod delivery;

pub use delivery::{TelegramDeliveryChannel, TelegramDeliveryChannelError};
