use serde::{Deserialize, Serialize};

pub const NOTIFICATION_SEND_REQUESTED: &str = "notification_send_requested";

/// Published when an event owner asks for a scheduled notification to go out now
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct NotificationSendRequestedEvent {
    pub event_type: String,
    pub notification_id: String,
    pub event_id: String,
    pub requested_by: String,
    pub timestamp: String,
}
