//! Scheduled SMS dispatch.
//!
//! A run picks up every pending, auto-enabled notification whose `send_at`
//! has passed and texts the matching guests one at a time. Each delivery
//! attempt gets a send-log entry; failed deliveries are recorded but never
//! retried, and the notification is marked sent once every guest has been
//! tried.
//!
//! Before any guest is texted the notification is claimed with a conditional
//! `pending -> sending` write, so the scheduled run and a "send now" request
//! never both deliver it.

use chrono::{DateTime, Utc};
use log::{error, info, warn};
use uuid::Uuid;

use crate::config::DispatchConfig;
use crate::error::StoreError;
use crate::messages::render_message;
use crate::models::{
    now_str, parse_timestamp, EventRecord, Guest, NotificationStatus, NotificationType,
    RsvpStatus, ScheduledNotification, SendLog, SendStatus,
};
use crate::sms::{normalize_phone, SmsSender};
use crate::store::EventDataStore;

/// Totals for one dispatcher run
#[derive(Debug, Default, Clone, PartialEq)]
pub struct DispatchSummary {
    pub notifications_processed: usize,
    pub notifications_failed: usize,
    pub messages_sent: usize,
    pub messages_failed: usize,
}

/// Whether the dispatcher should send this notification at `now`
pub fn is_due(notification: &ScheduledNotification, now: DateTime<Utc>) -> bool {
    if !notification.is_pending() || !notification.auto_enabled {
        return false;
    }
    match parse_timestamp(&notification.send_at) {
        Some(send_at) => send_at <= now,
        None => {
            warn!(
                "Notification {} has an unreadable send_at '{}', skipping",
                notification.id, notification.send_at
            );
            false
        }
    }
}

/// Guests a notification of the given type goes to
pub fn select_recipients(kind: NotificationType, guests: &[Guest]) -> Vec<&Guest> {
    guests
        .iter()
        .filter(|g| match kind {
            NotificationType::SaveDate => true,
            NotificationType::Reminder => g.rsvp_status == RsvpStatus::NoResponse,
            NotificationType::Invitation
            | NotificationType::TableNumber
            | NotificationType::ThankYou => g.rsvp_status == RsvpStatus::Coming,
        })
        .collect()
}

async fn mark_failed<S>(
    store: &S,
    mut notification: ScheduledNotification,
    reason: String,
) -> Result<ScheduledNotification, StoreError>
where
    S: EventDataStore + ?Sized,
{
    warn!("Notification {} failed: {}", notification.id, reason);
    notification.status = NotificationStatus::Failed;
    notification.failure_reason = Some(reason);
    notification.updated_at = now_str();
    store.finish_notification(notification).await
}

/// Hands a claimed notification back to `pending` after a store error that
/// happened before any guest was texted
async fn release<S>(store: &S, id: &str, cause: StoreError) -> StoreError
where
    S: EventDataStore + ?Sized,
{
    match store
        .transition_notification(id, NotificationStatus::Sending, NotificationStatus::Pending)
        .await
    {
        Ok(_) => info!("Released notification {} for a later run", id),
        Err(e) => error!("Failed to release notification {}: {}", id, e),
    }
    cause
}

/// Sends one message and returns the send-log entry describing the attempt
async fn send_to_guest<M>(
    sms: &M,
    config: &DispatchConfig,
    notification: &ScheduledNotification,
    event: &EventRecord,
    guest: &Guest,
) -> SendLog
where
    M: SmsSender + ?Sized,
{
    let mut log = SendLog {
        id: Uuid::new_v4().to_string(),
        notification_id: notification.id.clone(),
        event_id: event.id.clone(),
        guest_id: guest.id.clone(),
        phone: None,
        status: SendStatus::Failed,
        provider_message_id: None,
        error: None,
        created_at: now_str(),
    };

    let raw_phone = match guest.phone.as_deref().map(str::trim) {
        Some(phone) if !phone.is_empty() => phone,
        _ => {
            log.error = Some("Guest has no phone number".to_string());
            return log;
        }
    };

    let phone = match normalize_phone(raw_phone, &config.default_country_code) {
        Ok(phone) => phone,
        Err(e) => {
            log.phone = Some(raw_phone.to_string());
            log.error = Some(e.to_string());
            return log;
        }
    };
    log.phone = Some(phone.clone());

    let text = render_message(
        notification.notification_type,
        event,
        guest,
        notification.custom_message.as_deref(),
        &config.links,
    );

    match sms.send_sms(&phone, &text).await {
        Ok(receipt) => {
            log.status = SendStatus::Sent;
            log.provider_message_id = receipt.message_id;
        }
        Err(e) => {
            error!(
                "Failed to send notification {} to guest {}: {}",
                notification.id, guest.id, e
            );
            log.error = Some(e.to_string());
        }
    }
    log
}

/// Claims a notification, sends it to its recipients and records the outcome.
///
/// Used both by the periodic run and by "send now" requests; the caller
/// decides whether the notification should go out. Returns `None` when the
/// notification was no longer pending, so someone else is sending or has
/// sent it.
pub async fn dispatch_notification<S, M>(
    store: &S,
    sms: &M,
    config: &DispatchConfig,
    notification_id: &str,
    now: DateTime<Utc>,
) -> Result<Option<ScheduledNotification>, StoreError>
where
    S: EventDataStore + ?Sized,
    M: SmsSender + ?Sized,
{
    let claimed = store
        .transition_notification(
            notification_id,
            NotificationStatus::Pending,
            NotificationStatus::Sending,
        )
        .await?;
    let Some(mut notification) = claimed else {
        info!(
            "Notification {} is no longer pending, skipping",
            notification_id
        );
        return Ok(None);
    };

    let event = match store.get_event(&notification.event_id).await {
        Ok(event) => event,
        Err(StoreError::NotFound(_)) => {
            let reason = format!("Event {} no longer exists", notification.event_id);
            return mark_failed(store, notification, reason).await.map(Some);
        }
        Err(e) => return Err(release(store, notification_id, e).await),
    };

    if event.is_canceled() {
        let reason = format!("Event {} is canceled", event.id);
        return mark_failed(store, notification, reason).await.map(Some);
    }

    let guests = match store.get_guests_by_event(&event.id).await {
        Ok(guests) => guests,
        Err(e) => return Err(release(store, notification_id, e).await),
    };
    let recipients = select_recipients(notification.notification_type, &guests);

    info!(
        "Dispatching {} notification {} for event {} to {} of {} guests",
        notification.notification_type,
        notification.id,
        event.id,
        recipients.len(),
        guests.len()
    );

    let mut sent = 0u32;
    let mut failed = 0u32;
    for guest in recipients {
        let log = send_to_guest(sms, config, &notification, &event, guest).await;
        match log.status {
            SendStatus::Sent => sent += 1,
            SendStatus::Failed => failed += 1,
        }
        if let Err(e) = store.append_send_log(log).await {
            error!(
                "Failed to write send log for notification {} guest {}: {}",
                notification.id, guest.id, e
            );
        }
    }

    notification.status = NotificationStatus::Sent;
    notification.sent_at = Some(now.to_rfc3339());
    notification.sent_count = sent;
    notification.failed_count = failed;
    notification.updated_at = now_str();
    // messages are out; a failed write leaves it in sending rather than resending
    let updated = store.finish_notification(notification).await?;

    info!(
        "Notification {} sent: {} delivered, {} failed",
        updated.id, sent, failed
    );
    Ok(Some(updated))
}

/// Dispatches every notification that is due at `now`.
///
/// A notification that fails with a store error is logged and left pending
/// for the next run; the remaining notifications are still processed.
pub async fn run_due_notifications<S, M>(
    store: &S,
    sms: &M,
    config: &DispatchConfig,
    now: DateTime<Utc>,
) -> Result<DispatchSummary, StoreError>
where
    S: EventDataStore + ?Sized,
    M: SmsSender + ?Sized,
{
    let candidates = store.scan_pending_auto_notifications().await?;
    let due: Vec<ScheduledNotification> = candidates
        .into_iter()
        .filter(|n| is_due(n, now))
        .collect();

    info!("Found {} due notifications", due.len());

    let mut summary = DispatchSummary::default();
    for notification in due {
        let id = notification.id;
        match dispatch_notification(store, sms, config, &id, now).await {
            Ok(None) => {}
            Ok(Some(done)) => {
                summary.notifications_processed += 1;
                if done.status == NotificationStatus::Failed {
                    summary.notifications_failed += 1;
                }
                summary.messages_sent += done.sent_count as usize;
                summary.messages_failed += done.failed_count as usize;
            }
            Err(e) => {
                error!("Failed to dispatch notification {}: {}", id, e);
                summary.notifications_failed += 1;
            }
        }
    }

    Ok(summary)
}
