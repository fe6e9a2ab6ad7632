use aws_sdk_sns::Client as SnsClient;
use axum::{
    extract::{Extension, Path, State},
    http::StatusCode,
    Json,
};
use eventdesk_shared::error::{AppError, Result};
use eventdesk_shared::models::events::{
    NotificationSendRequestedEvent, NOTIFICATION_SEND_REQUESTED,
};
use eventdesk_shared::models::{
    now_str, EventRecord, NotificationStatus, OptionalField, ScheduledNotification,
};
use eventdesk_shared::store::EventDataStore;
use log::{debug, info};
use std::collections::HashMap;
use std::env;
use std::sync::Arc;
use tokio::sync::OnceCell;
use uuid::Uuid;

use super::{ensure_active, load_owned_event, require_timestamp};
use crate::models::{
    CreateNotificationRequest, NotificationResponse, SendLogResponse, UpdateNotificationRequest,
};

fn clean_message(message: Option<String>) -> Option<String> {
    message
        .map(|m| m.trim().to_string())
        .filter(|m| !m.is_empty())
}

async fn load_event_notification<S>(
    store: &S,
    event_id: &str,
    notification_id: &str,
    user_id: &str,
) -> Result<(EventRecord, ScheduledNotification)>
where
    S: EventDataStore,
{
    let event = load_owned_event(store, event_id, user_id).await?;
    let notification = store.get_notification(notification_id).await?;
    if notification.event_id != event.id {
        return Err(AppError::not_found(format!(
            "Notification {} not found in event {}",
            notification_id, event_id
        )));
    }
    Ok((event, notification))
}

// GET /events/:id/notifications
pub async fn get_notifications<S>(
    State(store): State<Arc<S>>,
    Path(event_id): Path<String>,
    Extension(user_id): Extension<String>,
) -> Result<Json<serde_json::Value>>
where
    S: EventDataStore,
{
    load_owned_event(&*store, &event_id, &user_id).await?;
    let notifications = store.get_notifications_by_event(&event_id).await?;
    let notifications: Vec<_> = notifications
        .into_iter()
        .map(NotificationResponse::from)
        .collect();

    Ok(Json(serde_json::json!({ "notifications": notifications })))
}

// POST /events/:id/notifications
pub async fn create_notification<S>(
    State(store): State<Arc<S>>,
    Path(event_id): Path<String>,
    Extension(user_id): Extension<String>,
    Json(payload): Json<CreateNotificationRequest>,
) -> Result<(StatusCode, Json<serde_json::Value>)>
where
    S: EventDataStore,
{
    let event = load_owned_event(&*store, &event_id, &user_id).await?;
    ensure_active(&event)?;
    require_timestamp("sendAt", &payload.send_at)?;

    let now = now_str();
    let notification = ScheduledNotification {
        id: Uuid::new_v4().to_string(),
        event_id: event.id,
        owner_id: user_id,
        notification_type: payload.notification_type,
        send_at: payload.send_at,
        auto_enabled: payload.auto_enabled,
        status: NotificationStatus::Pending,
        custom_message: clean_message(payload.custom_message),
        sent_at: None,
        sent_count: 0,
        failed_count: 0,
        failure_reason: None,
        created_at: now.clone(),
        updated_at: now,
    };

    let created = store.create_notification(notification).await?;
    info!(
        "Scheduled {} notification {} for event {} at {}",
        created.notification_type, created.id, created.event_id, created.send_at
    );

    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({ "notification": NotificationResponse::from(created) })),
    ))
}

// PATCH /events/:id/notifications/:notification_id
pub async fn update_notification<S>(
    State(store): State<Arc<S>>,
    Path((event_id, notification_id)): Path<(String, String)>,
    Extension(user_id): Extension<String>,
    Json(payload): Json<UpdateNotificationRequest>,
) -> Result<Json<serde_json::Value>>
where
    S: EventDataStore,
{
    let (event, mut notification) =
        load_event_notification(&*store, &event_id, &notification_id, &user_id).await?;
    ensure_active(&event)?;

    if !notification.is_pending() {
        return Err(AppError::bad_request(format!(
            "Notification is {} and can no longer be changed.",
            notification.status
        )));
    }

    if let Some(kind) = payload.notification_type {
        notification.notification_type = kind;
    }

    if let Some(send_at) = payload.send_at {
        require_timestamp("sendAt", &send_at)?;
        notification.send_at = send_at;
    }

    if let Some(auto_enabled) = payload.auto_enabled {
        notification.auto_enabled = auto_enabled;
    }

    match payload.custom_message {
        Some(OptionalField::Value(message)) => {
            notification.custom_message = clean_message(Some(message))
        }
        Some(OptionalField::Null) => notification.custom_message = None,
        None => {}
    }

    notification.updated_at = now_str();
    let updated = store.update_notification(notification).await?;

    Ok(Json(
        serde_json::json!({ "notification": NotificationResponse::from(updated) }),
    ))
}

// DELETE /events/:id/notifications/:notification_id
pub async fn delete_notification<S>(
    State(store): State<Arc<S>>,
    Path((event_id, notification_id)): Path<(String, String)>,
    Extension(user_id): Extension<String>,
) -> Result<Json<serde_json::Value>>
where
    S: EventDataStore,
{
    let (_, notification) =
        load_event_notification(&*store, &event_id, &notification_id, &user_id).await?;
    store.delete_notification(&notification.id).await?;

    Ok(Json(
        serde_json::json!({ "message": "Notification deleted successfully." }),
    ))
}

// POST /events/:id/notifications/:notification_id/send
// Hands the notification to the notification service for an immediate send.
pub async fn send_notification_now<S>(
    State(store): State<Arc<S>>,
    Path((event_id, notification_id)): Path<(String, String)>,
    Extension(user_id): Extension<String>,
) -> Result<(StatusCode, Json<serde_json::Value>)>
where
    S: EventDataStore,
{
    let (event, notification) =
        load_event_notification(&*store, &event_id, &notification_id, &user_id).await?;
    ensure_active(&event)?;

    if !notification.is_pending() {
        return Err(AppError::bad_request(format!(
            "Notification is {} and cannot be sent again.",
            notification.status
        )));
    }

    publish_send_requested_event(&notification.id, &event.id, &user_id).await?;

    Ok((
        StatusCode::ACCEPTED,
        Json(serde_json::json!({
            "message": "Notification queued for sending",
            "notificationId": notification.id
        })),
    ))
}

// GET /events/:id/notifications/:notification_id/logs
pub async fn get_send_logs<S>(
    State(store): State<Arc<S>>,
    Path((event_id, notification_id)): Path<(String, String)>,
    Extension(user_id): Extension<String>,
) -> Result<Json<serde_json::Value>>
where
    S: EventDataStore,
{
    let (_, notification) =
        load_event_notification(&*store, &event_id, &notification_id, &user_id).await?;
    let logs = store.get_send_logs_by_notification(&notification.id).await?;
    let logs: Vec<_> = logs.into_iter().map(SendLogResponse::from).collect();

    Ok(Json(serde_json::json!({ "logs": logs })))
}

// SNS publishing for "send now" requests
static SNS_CLIENT: OnceCell<SnsClient> = OnceCell::const_new();
static TOPIC_ARN: OnceCell<String> = OnceCell::const_new();

/// Publishes a notification_send_requested event to SNS
pub async fn publish_send_requested_event(
    notification_id: &str,
    event_id: &str,
    requested_by: &str,
) -> Result<()> {
    debug!(
        "publish_send_requested_event called for notification_id={}, event_id={}",
        notification_id, event_id
    );

    // Check if we're in test mode
    if let Ok(test_sns) = env::var("TEST_SNS") {
        if test_sns == "true" {
            debug!(
                "Test mode: Skipping SNS publishing for notification_id={}",
                notification_id
            );
            return Ok(());
        }
    }

    let client = SNS_CLIENT
        .get_or_init(|| async {
            let config = aws_config::defaults(aws_config::BehaviorVersion::latest())
                .load()
                .await;
            SnsClient::new(&config)
        })
        .await
        .clone();

    let topic_arn = TOPIC_ARN
        .get_or_try_init(|| async {
            env::var("SNS_TOPIC_ARN").map_err(|_| {
                AppError::internal_server_error("SNS_TOPIC_ARN environment variable not set".into())
            })
        })
        .await?;

    let event_payload = NotificationSendRequestedEvent {
        event_type: NOTIFICATION_SEND_REQUESTED.to_string(),
        notification_id: notification_id.to_string(),
        event_id: event_id.to_string(),
        requested_by: requested_by.to_string(),
        timestamp: now_str(),
    };

    let message = serde_json::to_string(&event_payload).map_err(|e| {
        AppError::internal_server_error(format!("Failed to serialize event payload: {}", e))
    })?;

    // Message attribute lets subscribers filter by event type
    let event_type_attr = aws_sdk_sns::types::MessageAttributeValue::builder()
        .data_type("String")
        .string_value(NOTIFICATION_SEND_REQUESTED)
        .build()
        .map_err(|e| {
            AppError::internal_server_error(format!("Failed to build message attribute: {}", e))
        })?;

    let mut message_attributes = HashMap::new();
    message_attributes.insert("eventType".to_string(), event_type_attr);

    client
        .publish()
        .topic_arn(topic_arn)
        .message(message)
        .subject("Notification Send Requested")
        .set_message_attributes(Some(message_attributes))
        .send()
        .await
        .map_err(|e| {
            AppError::internal_server_error(format!("Failed to publish to SNS: {}", e))
        })?;

    info!(
        "Published notification_send_requested for notification_id={}",
        notification_id
    );
    Ok(())
}
