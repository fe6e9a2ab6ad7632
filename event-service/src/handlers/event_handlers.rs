use axum::{
    extract::{Extension, Path, State},
    http::StatusCode,
    Json,
};
use eventdesk_shared::error::{AppError, Result};
use eventdesk_shared::models::{now_str, EventRecord, EventStatus, RsvpStatus, SeatingTable};
use eventdesk_shared::store::EventDataStore;
use log::info;
use std::collections::HashSet;
use std::sync::Arc;
use uuid::Uuid;

use super::{ensure_active, load_owned_event, require_non_empty, require_timestamp};
use crate::models::{
    CreateEventRequest, EventResponse, EventSummaryResponse, UpdateEventRequest,
    UpdateTablesRequest,
};

fn validate_tables(tables: &[SeatingTable]) -> Result<()> {
    let mut numbers = HashSet::new();
    for table in tables {
        if !numbers.insert(table.number) {
            return Err(AppError::bad_request(format!(
                "Table number {} is used more than once",
                table.number
            )));
        }
        if table.capacity < 1 {
            return Err(AppError::bad_request(format!(
                "Table {} must have at least one seat",
                table.number
            )));
        }
    }
    Ok(())
}

// GET /events
pub async fn get_events<S>(
    State(store): State<Arc<S>>,
    Extension(user_id): Extension<String>,
) -> Result<Json<serde_json::Value>>
where
    S: EventDataStore,
{
    let events = store.get_events_by_owner(&user_id).await?;
    let events: Vec<_> = events.into_iter().map(EventResponse::from).collect();

    Ok(Json(serde_json::json!({ "events": events })))
}

// POST /events
pub async fn create_event<S>(
    State(store): State<Arc<S>>,
    Extension(user_id): Extension<String>,
    Json(payload): Json<CreateEventRequest>,
) -> Result<(StatusCode, Json<serde_json::Value>)>
where
    S: EventDataStore,
{
    require_non_empty("Event name", &payload.name)?;
    require_non_empty("Event type", &payload.event_type)?;
    require_timestamp("eventDate", &payload.event_date)?;
    validate_tables(&payload.tables)?;

    let now = now_str();
    let event = EventRecord {
        id: Uuid::new_v4().to_string(),
        owner_id: user_id,
        name: payload.name.trim().to_string(),
        event_type: payload.event_type.trim().to_string(),
        event_date: payload.event_date,
        venue: payload.venue,
        status: EventStatus::Active,
        tables: payload.tables,
        created_at: now.clone(),
        updated_at: now,
    };

    let created = store.create_event(event).await?;
    info!("Created event {} for owner {}", created.id, created.owner_id);

    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({ "event": EventResponse::from(created) })),
    ))
}

// GET /events/:id
pub async fn get_event<S>(
    State(store): State<Arc<S>>,
    Path(id): Path<String>,
    Extension(user_id): Extension<String>,
) -> Result<Json<serde_json::Value>>
where
    S: EventDataStore,
{
    let event = load_owned_event(&*store, &id, &user_id).await?;

    Ok(Json(serde_json::json!({ "event": EventResponse::from(event) })))
}

// PATCH /events/:id
pub async fn update_event<S>(
    State(store): State<Arc<S>>,
    Path(id): Path<String>,
    Extension(user_id): Extension<String>,
    Json(payload): Json<UpdateEventRequest>,
) -> Result<Json<serde_json::Value>>
where
    S: EventDataStore,
{
    let mut event = load_owned_event(&*store, &id, &user_id).await?;
    ensure_active(&event)?;

    if let Some(name) = payload.name {
        require_non_empty("Event name", &name)?;
        event.name = name.trim().to_string();
    }

    if let Some(event_type) = payload.event_type {
        require_non_empty("Event type", &event_type)?;
        event.event_type = event_type.trim().to_string();
    }

    if let Some(event_date) = payload.event_date {
        require_timestamp("eventDate", &event_date)?;
        event.event_date = event_date;
    }

    if let Some(venue) = payload.venue {
        event.venue = venue.into_option();
    }

    event.updated_at = now_str();
    let updated = store.update_event(event).await?;

    Ok(Json(serde_json::json!({ "event": EventResponse::from(updated) })))
}

// DELETE /events/:id
pub async fn delete_event<S>(
    State(store): State<Arc<S>>,
    Path(id): Path<String>,
    Extension(user_id): Extension<String>,
) -> Result<Json<serde_json::Value>>
where
    S: EventDataStore,
{
    load_owned_event(&*store, &id, &user_id).await?;
    store.delete_event(&id).await?;

    info!("Deleted event {} for owner {}", id, user_id);
    Ok(Json(
        serde_json::json!({ "message": "Event deleted successfully." }),
    ))
}

// POST /events/:id/cancel
// Cancels the event and drops every notification that has not gone out yet.
pub async fn cancel_event<S>(
    State(store): State<Arc<S>>,
    Path(id): Path<String>,
    Extension(user_id): Extension<String>,
) -> Result<Json<serde_json::Value>>
where
    S: EventDataStore,
{
    let event = load_owned_event(&*store, &id, &user_id).await?;
    if event.is_canceled() {
        return Err(AppError::bad_request("Event is already canceled.".into()));
    }

    let canceled = store.cancel_event(&id).await?;
    info!("Owner {} canceled event {}", user_id, id);

    Ok(Json(serde_json::json!({
        "message": "Event canceled. Pending notifications were removed.",
        "event": EventResponse::from(canceled)
    })))
}

// PUT /events/:id/tables
pub async fn update_tables<S>(
    State(store): State<Arc<S>>,
    Path(id): Path<String>,
    Extension(user_id): Extension<String>,
    Json(payload): Json<UpdateTablesRequest>,
) -> Result<Json<serde_json::Value>>
where
    S: EventDataStore,
{
    let mut event = load_owned_event(&*store, &id, &user_id).await?;
    ensure_active(&event)?;
    validate_tables(&payload.tables)?;

    // every seated guest must still fit at a table that exists
    let guests = store.get_guests_by_event(&id).await?;
    for table in &payload.tables {
        let taken: u32 = guests
            .iter()
            .filter(|g| g.table_number == Some(table.number))
            .map(|g| g.occupied_seats())
            .sum();
        if taken > table.capacity {
            return Err(AppError::bad_request(format!(
                "Table {} already seats {} guests, more than its new capacity of {}",
                table.number, taken, table.capacity
            )));
        }
    }
    if let Some(orphan) = guests.iter().find(|g| {
        g.table_number
            .map(|n| !payload.tables.iter().any(|t| t.number == n))
            .unwrap_or(false)
    }) {
        return Err(AppError::bad_request(format!(
            "Guest {} is seated at table {}, which would be removed",
            orphan.name,
            orphan.table_number.unwrap_or_default()
        )));
    }

    event.tables = payload.tables;
    event.updated_at = now_str();
    let updated = store.update_event(event).await?;

    Ok(Json(serde_json::json!({ "event": EventResponse::from(updated) })))
}

// GET /events/:id/summary
pub async fn get_event_summary<S>(
    State(store): State<Arc<S>>,
    Path(id): Path<String>,
    Extension(user_id): Extension<String>,
) -> Result<Json<serde_json::Value>>
where
    S: EventDataStore,
{
    let event = load_owned_event(&*store, &id, &user_id).await?;
    let guests = store.get_guests_by_event(&id).await?;

    let mut summary = EventSummaryResponse {
        total_guests: guests.len(),
        total_capacity: event.tables.iter().map(|t| t.capacity).sum(),
        ..Default::default()
    };
    for guest in &guests {
        match guest.rsvp_status {
            RsvpStatus::NoResponse => summary.no_response += 1,
            RsvpStatus::Coming => {
                summary.coming += 1;
                summary.confirmed_seats += guest.seat_count;
            }
            RsvpStatus::NotComing => summary.not_coming += 1,
            RsvpStatus::Maybe => summary.maybe += 1,
        }
        if guest.table_number.is_some() {
            summary.seated_guests += 1;
        }
    }

    Ok(Json(serde_json::json!({ "summary": summary })))
}
