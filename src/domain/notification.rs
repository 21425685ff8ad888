use serde::{Deserialize, Serialize};

use crate::domain::{link::Link, reminder::Reminder};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationType {
    Processed,
    Error,
    Reminder,
    Discussions
}

/// Delivery channel a reminder asks to be notified through
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationMethod {
    Email,
    Web,
    Pushover
}

/// A notification handed to the notification sink
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub notification_type: NotificationType,
    pub message:           String,
    pub entry_id:          Option<String>
}

impl Notification {
    fn new(notification_type: NotificationType, message: impl Into<String>, entry_id: Option<&str>) -> Self {
        Self { notification_type, message: message.into(), entry_id: entry_id.map(str::to_string) }
    }

    pub fn reminder(message: Option<&str>, entry_id: Option<&str>) -> Self {
        Self::new(NotificationType::Reminder, message.unwrap_or("Reminder Elapsed"), entry_id)
    }

    pub fn processed(message: impl Into<String>, entry_id: Option<&str>) -> Self {
        Self::new(NotificationType::Processed, message, entry_id)
    }

    pub fn error(message: impl Into<String>, entry_id: Option<&str>) -> Self {
        Self::new(NotificationType::Error, message, entry_id)
    }

    pub fn discussions(message: impl Into<String>, entry_id: Option<&str>) -> Self {
        Self::new(NotificationType::Discussions, message, entry_id)
    }
}

/// Entity attached to a notification
#[derive(Debug, Clone, PartialEq)]
pub enum NotifyPayload {
    Reminder(Box<Reminder>),
    Link(Box<Link>),
    Empty
}

impl NotifyPayload {
    /// Name of the attached entity, used by sinks that serialize the payload
    pub fn entity(&self) -> Option<&'static str> {
        match self {
            NotifyPayload::Reminder(_) => Some("Reminder"),
            NotifyPayload::Link(_) => Some("Link"),
            NotifyPayload::Empty => None
        }
    }
}
