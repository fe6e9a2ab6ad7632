use eventdesk_shared::models::{
    deserialize_optional_field, EventRecord, EventStatus, Guest, NotificationStatus,
    NotificationType, OptionalField, RsvpStatus, ScheduledNotification, SeatingTable, SendLog,
    SendStatus,
};
use serde::{Deserialize, Serialize};

// Request DTOs
#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct CreateEventRequest {
    pub name: String,
    pub event_type: String,
    pub event_date: String,
    #[serde(default)]
    pub venue: Option<String>,
    #[serde(default)]
    pub tables: Vec<SeatingTable>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct UpdateEventRequest {
    pub name: Option<String>,
    pub event_type: Option<String>,
    pub event_date: Option<String>,
    #[serde(default, deserialize_with = "deserialize_optional_field")]
    pub venue: Option<OptionalField<String>>,
}

#[derive(Deserialize, Debug)]
pub struct UpdateTablesRequest {
    pub tables: Vec<SeatingTable>,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct CreateGuestRequest {
    pub name: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub rsvp_status: Option<RsvpStatus>,
    #[serde(default)]
    pub seat_count: Option<u32>,
    #[serde(default)]
    pub table_number: Option<u32>,
}

#[derive(Deserialize, Debug)]
pub struct BulkCreateGuestsRequest {
    pub guests: Vec<CreateGuestRequest>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct UpdateGuestRequest {
    pub name: Option<String>,
    #[serde(default, deserialize_with = "deserialize_optional_field")]
    pub phone: Option<OptionalField<String>>,
    pub rsvp_status: Option<RsvpStatus>,
    pub seat_count: Option<u32>,
    #[serde(default, deserialize_with = "deserialize_optional_field")]
    pub table_number: Option<OptionalField<u32>>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct CreateNotificationRequest {
    pub notification_type: NotificationType,
    pub send_at: String,
    #[serde(default = "default_auto_enabled")]
    pub auto_enabled: bool,
    #[serde(default)]
    pub custom_message: Option<String>,
}

fn default_auto_enabled() -> bool {
    true
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct UpdateNotificationRequest {
    pub notification_type: Option<NotificationType>,
    pub send_at: Option<String>,
    pub auto_enabled: Option<bool>,
    #[serde(default, deserialize_with = "deserialize_optional_field")]
    pub custom_message: Option<OptionalField<String>>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct RsvpRequest {
    pub rsvp_status: RsvpStatus,
    pub seat_count: Option<u32>,
}

// Response DTOs
#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct EventResponse {
    pub id: String,
    pub owner_id: String,
    pub name: String,
    pub event_type: String,
    pub event_date: String,
    pub venue: Option<String>,
    pub status: EventStatus,
    pub tables: Vec<SeatingTable>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<EventRecord> for EventResponse {
    fn from(event: EventRecord) -> Self {
        Self {
            id: event.id,
            owner_id: event.owner_id,
            name: event.name,
            event_type: event.event_type,
            event_date: event.event_date,
            venue: event.venue,
            status: event.status,
            tables: event.tables,
            created_at: event.created_at,
            updated_at: event.updated_at,
        }
    }
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct GuestResponse {
    pub id: String,
    pub event_id: String,
    pub name: String,
    pub phone: Option<String>,
    pub rsvp_status: RsvpStatus,
    pub seat_count: u32,
    pub table_number: Option<u32>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<Guest> for GuestResponse {
    fn from(guest: Guest) -> Self {
        Self {
            id: guest.id,
            event_id: guest.event_id,
            name: guest.name,
            phone: guest.phone,
            rsvp_status: guest.rsvp_status,
            seat_count: guest.seat_count,
            table_number: guest.table_number,
            created_at: guest.created_at,
            updated_at: guest.updated_at,
        }
    }
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct NotificationResponse {
    pub id: String,
    pub event_id: String,
    pub notification_type: NotificationType,
    pub send_at: String,
    pub auto_enabled: bool,
    pub status: NotificationStatus,
    pub custom_message: Option<String>,
    pub sent_at: Option<String>,
    pub sent_count: u32,
    pub failed_count: u32,
    pub failure_reason: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<ScheduledNotification> for NotificationResponse {
    fn from(n: ScheduledNotification) -> Self {
        Self {
            id: n.id,
            event_id: n.event_id,
            notification_type: n.notification_type,
            send_at: n.send_at,
            auto_enabled: n.auto_enabled,
            status: n.status,
            custom_message: n.custom_message,
            sent_at: n.sent_at,
            sent_count: n.sent_count,
            failed_count: n.failed_count,
            failure_reason: n.failure_reason,
            created_at: n.created_at,
            updated_at: n.updated_at,
        }
    }
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct SendLogResponse {
    pub id: String,
    pub guest_id: String,
    pub phone: Option<String>,
    pub status: SendStatus,
    pub provider_message_id: Option<String>,
    pub error: Option<String>,
    pub created_at: String,
}

impl From<SendLog> for SendLogResponse {
    fn from(log: SendLog) -> Self {
        Self {
            id: log.id,
            guest_id: log.guest_id,
            phone: log.phone,
            status: log.status,
            provider_message_id: log.provider_message_id,
            error: log.error,
            created_at: log.created_at,
        }
    }
}

#[derive(Serialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct EventSummaryResponse {
    pub total_guests: usize,
    pub no_response: usize,
    pub coming: usize,
    pub not_coming: usize,
    pub maybe: usize,
    pub confirmed_seats: u32,
    pub seated_guests: usize,
    pub total_capacity: u32,
}

/// What a guest sees when opening their RSVP link
#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct RsvpResponse {
    pub event_name: String,
    pub event_date: String,
    pub venue: Option<String>,
    pub guest_name: String,
    pub rsvp_status: RsvpStatus,
    pub seat_count: u32,
}
