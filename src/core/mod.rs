mod notification_bus;

pub use notification_bus::{Notification, NotificationBus, NotificationLevel};
