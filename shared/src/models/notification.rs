use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum NotificationType {
    SaveDate,
    Invitation,
    Reminder,
    TableNumber,
    ThankYou,
}

impl fmt::Display for NotificationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            NotificationType::SaveDate => "save-date",
            NotificationType::Invitation => "invitation",
            NotificationType::Reminder => "reminder",
            NotificationType::TableNumber => "table-number",
            NotificationType::ThankYou => "thank-you",
        };
        write!(f, "{}", s)
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum NotificationStatus {
    #[default]
    Pending,
    /// Claimed by a dispatcher that is texting guests right now
    Sending,
    Sent,
    Failed,
}

impl fmt::Display for NotificationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NotificationStatus::Pending => write!(f, "pending"),
            NotificationStatus::Sending => write!(f, "sending"),
            NotificationStatus::Sent => write!(f, "sent"),
            NotificationStatus::Failed => write!(f, "failed"),
        }
    }
}

/// An SMS blast to an event's guests, scheduled by the event owner
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct ScheduledNotification {
    pub id: String,
    pub event_id: String,
    pub owner_id: String,
    pub notification_type: NotificationType,
    /// RFC 3339; the dispatcher picks the notification up once this has passed
    pub send_at: String,
    pub auto_enabled: bool,
    #[serde(default)]
    pub status: NotificationStatus,
    #[serde(default)]
    pub custom_message: Option<String>,
    #[serde(default)]
    pub sent_at: Option<String>,
    #[serde(default)]
    pub sent_count: u32,
    #[serde(default)]
    pub failed_count: u32,
    #[serde(default)]
    pub failure_reason: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl ScheduledNotification {
    pub fn is_pending(&self) -> bool {
        self.status == NotificationStatus::Pending
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum SendStatus {
    Sent,
    Failed,
}

/// One per-guest delivery attempt of a notification
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct SendLog {
    pub id: String,
    pub notification_id: String,
    pub event_id: String,
    pub guest_id: String,
    #[serde(default)]
    pub phone: Option<String>,
    pub status: SendStatus,
    #[serde(default)]
    pub provider_message_id: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
    pub created_at: String,
}
