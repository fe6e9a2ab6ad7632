pub mod event_handlers;
pub mod guest_handlers;
pub mod notification_handlers;
pub mod rsvp_handlers;

use eventdesk_shared::error::{AppError, Result};
use eventdesk_shared::models::{parse_timestamp, EventRecord, Guest};
use eventdesk_shared::sms::normalize_phone;
use eventdesk_shared::store::EventStore;
use once_cell::sync::Lazy;
use std::env;

/// Largest party a single guest entry may represent
pub const MAX_SEATS_PER_GUEST: u32 = 20;

/// Loads an event and checks that `user_id` owns it
pub async fn load_owned_event<S>(store: &S, event_id: &str, user_id: &str) -> Result<EventRecord>
where
    S: EventStore + ?Sized,
{
    let event = store.get_event(event_id).await?;
    if event.owner_id != user_id {
        return Err(AppError::forbidden(
            "You don't have permission to access this event".into(),
        ));
    }
    Ok(event)
}

pub fn ensure_active(event: &EventRecord) -> Result<()> {
    if event.is_canceled() {
        return Err(AppError::bad_request(
            "This event has been canceled and can no longer be modified.".into(),
        ));
    }
    Ok(())
}

pub fn require_timestamp(field: &str, value: &str) -> Result<()> {
    if parse_timestamp(value).is_none() {
        return Err(AppError::bad_request(format!(
            "{} must be an RFC 3339 date-time, got '{}'",
            field, value
        )));
    }
    Ok(())
}

pub fn require_non_empty(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(AppError::bad_request(format!("{} cannot be empty", field)));
    }
    Ok(())
}

static DEFAULT_COUNTRY_CODE: Lazy<String> = Lazy::new(|| {
    env::var("SMS_DEFAULT_COUNTRY_CODE")
        .ok()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| "972".to_string())
});

/// Rejects phone numbers the dispatcher would not be able to normalize
pub fn validate_phone(phone: &str) -> Result<()> {
    normalize_phone(phone, &DEFAULT_COUNTRY_CODE)
        .map(|_| ())
        .map_err(|e| AppError::bad_request(e.to_string()))
}

pub fn validate_seat_count(seats: u32) -> Result<()> {
    if seats < 1 || seats > MAX_SEATS_PER_GUEST {
        return Err(AppError::bad_request(format!(
            "Seat count must be between 1 and {}",
            MAX_SEATS_PER_GUEST
        )));
    }
    Ok(())
}

/// Checks that seating `seats` more people at `table_number` fits the table.
///
/// `guests` are the event's current guests; the guest being (re)seated is
/// excluded by `guest_id` so moving within the same table is not double counted.
pub fn check_table_capacity(
    event: &EventRecord,
    guests: &[Guest],
    guest_id: Option<&str>,
    table_number: u32,
    seats: u32,
) -> Result<()> {
    let table = event.table(table_number).ok_or_else(|| {
        AppError::bad_request(format!("Table {} does not exist", table_number))
    })?;

    let taken: u32 = guests
        .iter()
        .filter(|g| g.table_number == Some(table_number))
        .filter(|g| Some(g.id.as_str()) != guest_id)
        .map(|g| g.occupied_seats())
        .sum();

    if taken + seats > table.capacity {
        return Err(AppError::bad_request(format!(
            "Table {} has {} of {} seats taken; cannot seat {} more",
            table_number, taken, table.capacity, seats
        )));
    }
    Ok(())
}
