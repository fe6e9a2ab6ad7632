use axum::{
    extract::{Extension, Path, State},
    http::StatusCode,
    Json,
};
use eventdesk_shared::error::{AppError, Result};
use eventdesk_shared::models::{now_str, EventRecord, Guest, OptionalField};
use eventdesk_shared::store::EventDataStore;
use log::info;
use std::sync::Arc;
use uuid::Uuid;

use super::{
    check_table_capacity, ensure_active, load_owned_event, require_non_empty, validate_phone,
    validate_seat_count,
};
use crate::models::{BulkCreateGuestsRequest, CreateGuestRequest, GuestResponse, UpdateGuestRequest};

/// Validates a new guest entry and builds the record, seating it if asked to
fn build_guest(event: &EventRecord, existing: &[Guest], request: CreateGuestRequest) -> Result<Guest> {
    require_non_empty("Guest name", &request.name)?;

    let phone = request
        .phone
        .map(|p| p.trim().to_string())
        .filter(|p| !p.is_empty());
    if let Some(phone) = &phone {
        validate_phone(phone)?;
    }

    let seat_count = request.seat_count.unwrap_or(1);
    validate_seat_count(seat_count)?;

    let now = now_str();
    let guest = Guest {
        id: Uuid::new_v4().to_string(),
        event_id: event.id.clone(),
        name: request.name.trim().to_string(),
        phone,
        rsvp_status: request.rsvp_status.unwrap_or_default(),
        seat_count,
        table_number: request.table_number,
        created_at: now.clone(),
        updated_at: now,
    };

    if let Some(table_number) = guest.table_number {
        check_table_capacity(event, existing, None, table_number, guest.occupied_seats())?;
    }

    Ok(guest)
}

// GET /events/:id/guests
pub async fn get_guests<S>(
    State(store): State<Arc<S>>,
    Path(event_id): Path<String>,
    Extension(user_id): Extension<String>,
) -> Result<Json<serde_json::Value>>
where
    S: EventDataStore,
{
    load_owned_event(&*store, &event_id, &user_id).await?;
    let guests = store.get_guests_by_event(&event_id).await?;
    let guests: Vec<_> = guests.into_iter().map(GuestResponse::from).collect();

    Ok(Json(serde_json::json!({ "guests": guests })))
}

// POST /events/:id/guests
pub async fn create_guest<S>(
    State(store): State<Arc<S>>,
    Path(event_id): Path<String>,
    Extension(user_id): Extension<String>,
    Json(payload): Json<CreateGuestRequest>,
) -> Result<(StatusCode, Json<serde_json::Value>)>
where
    S: EventDataStore,
{
    let event = load_owned_event(&*store, &event_id, &user_id).await?;
    ensure_active(&event)?;

    let existing = store.get_guests_by_event(&event_id).await?;
    let guest = build_guest(&event, &existing, payload)?;
    let created = store.create_guest(guest).await?;

    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({ "guest": GuestResponse::from(created) })),
    ))
}

// POST /events/:id/guests/bulk
// Imports a whole guest list; nothing is stored unless every entry is valid.
pub async fn bulk_create_guests<S>(
    State(store): State<Arc<S>>,
    Path(event_id): Path<String>,
    Extension(user_id): Extension<String>,
    Json(payload): Json<BulkCreateGuestsRequest>,
) -> Result<(StatusCode, Json<serde_json::Value>)>
where
    S: EventDataStore,
{
    let event = load_owned_event(&*store, &event_id, &user_id).await?;
    ensure_active(&event)?;

    if payload.guests.is_empty() {
        return Err(AppError::bad_request("No guests to import.".into()));
    }

    let mut seated = store.get_guests_by_event(&event_id).await?;
    let mut new_guests = Vec::with_capacity(payload.guests.len());
    for (index, request) in payload.guests.into_iter().enumerate() {
        let guest = build_guest(&event, &seated, request).map_err(|e| {
            AppError::new(e.status, format!("Guest #{}: {}", index + 1, e.message))
        })?;
        seated.push(guest.clone());
        new_guests.push(guest);
    }

    let mut created = Vec::with_capacity(new_guests.len());
    for guest in new_guests {
        created.push(GuestResponse::from(store.create_guest(guest).await?));
    }

    info!("Imported {} guests into event {}", created.len(), event_id);
    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({ "count": created.len(), "guests": created })),
    ))
}

async fn load_event_guest<S>(
    store: &S,
    event_id: &str,
    guest_id: &str,
    user_id: &str,
) -> Result<(EventRecord, Guest)>
where
    S: EventDataStore,
{
    let event = load_owned_event(store, event_id, user_id).await?;
    let guest = store.get_guest(guest_id).await?;
    if guest.event_id != event.id {
        return Err(AppError::not_found(format!(
            "Guest {} not found in event {}",
            guest_id, event_id
        )));
    }
    Ok((event, guest))
}

// PATCH /events/:id/guests/:guest_id
pub async fn update_guest<S>(
    State(store): State<Arc<S>>,
    Path((event_id, guest_id)): Path<(String, String)>,
    Extension(user_id): Extension<String>,
    Json(payload): Json<UpdateGuestRequest>,
) -> Result<Json<serde_json::Value>>
where
    S: EventDataStore,
{
    let (event, mut guest) = load_event_guest(&*store, &event_id, &guest_id, &user_id).await?;
    ensure_active(&event)?;

    if let Some(name) = payload.name {
        require_non_empty("Guest name", &name)?;
        guest.name = name.trim().to_string();
    }

    match payload.phone {
        Some(OptionalField::Value(phone)) => {
            validate_phone(&phone)?;
            guest.phone = Some(phone.trim().to_string());
        }
        Some(OptionalField::Null) => guest.phone = None,
        None => {}
    }

    if let Some(rsvp_status) = payload.rsvp_status {
        guest.rsvp_status = rsvp_status;
    }

    if let Some(seat_count) = payload.seat_count {
        validate_seat_count(seat_count)?;
        guest.seat_count = seat_count;
    }

    if let Some(table_number) = payload.table_number {
        guest.table_number = table_number.into_option();
    }

    // capacity is re-checked whenever seats or the table may have changed
    if let Some(table_number) = guest.table_number {
        let guests = store.get_guests_by_event(&event_id).await?;
        check_table_capacity(
            &event,
            &guests,
            Some(&guest.id),
            table_number,
            guest.occupied_seats(),
        )?;
    }

    guest.updated_at = now_str();
    let updated = store.update_guest(guest).await?;

    Ok(Json(serde_json::json!({ "guest": GuestResponse::from(updated) })))
}

// DELETE /events/:id/guests/:guest_id
pub async fn delete_guest<S>(
    State(store): State<Arc<S>>,
    Path((event_id, guest_id)): Path<(String, String)>,
    Extension(user_id): Extension<String>,
) -> Result<Json<serde_json::Value>>
where
    S: EventDataStore,
{
    let (event, guest) = load_event_guest(&*store, &event_id, &guest_id, &user_id).await?;
    ensure_active(&event)?;
    store.delete_guest(&guest.id).await?;

    Ok(Json(serde_json::json!({
        "message": "Guest deleted successfully",
        "guestId": guest.id
    })))
}
