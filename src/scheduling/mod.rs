mod delivery;
mod delivery_scheduler;
mod planned;
mod scheduler;

pub use delivery::{ConsoleDeliveryChannel, ReminderDeliveryChannel};
pub use delivery_scheduler::DeliveryReminderScheduler;
pub use planned::PlannedReminderScheduler;
pub use scheduler::{NotificationScheduler, ReminderId, ScheduledReminder};
