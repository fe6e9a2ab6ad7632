use axum::{
    extract::{Path, State},
    Json,
};
use eventdesk_shared::error::{AppError, Result};
use eventdesk_shared::models::{now_str, EventRecord, Guest, RsvpStatus};
use eventdesk_shared::store::EventDataStore;
use log::info;
use std::sync::Arc;

use super::{check_table_capacity, validate_seat_count};
use crate::models::{RsvpRequest, RsvpResponse};

fn rsvp_view(event: &EventRecord, guest: &Guest) -> RsvpResponse {
    RsvpResponse {
        event_name: event.name.clone(),
        event_date: event.event_date.clone(),
        venue: event.venue.clone(),
        guest_name: guest.name.clone(),
        rsvp_status: guest.rsvp_status,
        seat_count: guest.seat_count,
    }
}

/// Resolves the guest behind an RSVP link. Unknown or mismatched ids are a
/// plain 404 so links cannot be probed across events.
async fn load_invitation<S>(store: &S, event_id: &str, guest_id: &str) -> Result<(EventRecord, Guest)>
where
    S: EventDataStore,
{
    let guest = store.get_guest(guest_id).await?;
    if guest.event_id != event_id {
        return Err(AppError::not_found("Invitation not found".into()));
    }

    let event = store.get_event(event_id).await?;
    if event.is_canceled() {
        return Err(AppError::gone("This event has been canceled.".into()));
    }
    Ok((event, guest))
}

// GET /rsvp/:event_id/:guest_id
pub async fn get_rsvp<S>(
    State(store): State<Arc<S>>,
    Path((event_id, guest_id)): Path<(String, String)>,
) -> Result<Json<serde_json::Value>>
where
    S: EventDataStore,
{
    let (event, guest) = load_invitation(&*store, &event_id, &guest_id).await?;

    Ok(Json(serde_json::json!({ "rsvp": rsvp_view(&event, &guest) })))
}

// PUT /rsvp/:event_id/:guest_id
pub async fn submit_rsvp<S>(
    State(store): State<Arc<S>>,
    Path((event_id, guest_id)): Path<(String, String)>,
    Json(payload): Json<RsvpRequest>,
) -> Result<Json<serde_json::Value>>
where
    S: EventDataStore,
{
    let (event, mut guest) = load_invitation(&*store, &event_id, &guest_id).await?;

    if payload.rsvp_status == RsvpStatus::NoResponse {
        return Err(AppError::bad_request(
            "Please answer coming, not-coming or maybe.".into(),
        ));
    }

    if let Some(seat_count) = payload.seat_count {
        validate_seat_count(seat_count)?;
        guest.seat_count = seat_count;
    }
    guest.rsvp_status = payload.rsvp_status;

    // a guest already seated must still fit after growing their party
    if let Some(table_number) = guest.table_number {
        if event.table(table_number).is_some() {
            let guests = store.get_guests_by_event(&event_id).await?;
            check_table_capacity(
                &event,
                &guests,
                Some(&guest.id),
                table_number,
                guest.occupied_seats(),
            )
            .map_err(|_| {
                AppError::conflict(
                    "Your table is full. Please contact the host to change your party size."
                        .into(),
                )
            })?;
        }
    }

    guest.updated_at = now_str();
    let updated = store.update_guest(guest).await?;
    info!(
        "Guest {} answered {} for event {}",
        updated.id, updated.rsvp_status, event.id
    );

    Ok(Json(serde_json::json!({
        "message": "Thank you for your response!",
        "rsvp": rsvp_view(&event, &updated)
    })))
}
