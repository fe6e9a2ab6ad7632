use anyhow::Context;
use aws_lambda_events::event::sns::SnsEvent;
use chrono::Utc;
use eventdesk_shared::config::DispatchConfig;
use eventdesk_shared::dispatch::dispatch_notification;
use eventdesk_shared::models::events::{
    NotificationSendRequestedEvent, NOTIFICATION_SEND_REQUESTED,
};
use eventdesk_shared::models::ScheduledNotification;
use eventdesk_shared::sms::{HttpSmsSender, SmsSender};
use eventdesk_shared::store::dynamo::DynamoEventStore;
use eventdesk_shared::store::EventDataStore;
use lambda_runtime::{service_fn, Error, LambdaEvent};
use log::{error, info, warn};
use std::sync::Arc;

mod errors;

use errors::NotificationError;

/// Everything the handler needs, cheap to clone into each invocation
#[derive(Clone)]
struct Services {
    store: Arc<DynamoEventStore>,
    sms: Arc<HttpSmsSender>,
    config: Arc<DispatchConfig>,
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    info!("Starting Notification Service Lambda");

    let services = Services {
        store: Arc::new(DynamoEventStore::new().await),
        sms: Arc::new(HttpSmsSender::from_env()),
        config: Arc::new(DispatchConfig::from_env()),
    };

    lambda_runtime::run(service_fn(|event| handler(event, services.clone()))).await?;
    Ok(())
}

async fn handler(event: LambdaEvent<SnsEvent>, services: Services) -> Result<(), Error> {
    for record in event.payload.records {
        let message = record.sns;
        info!("Processing SNS message: {:?}", message.message_id);

        // one bad record must not block the rest of the batch
        if let Err(e) = process_message(
            &*services.store,
            &*services.sms,
            &services.config,
            &message.message,
        )
        .await
        {
            error!("Failed to process SNS message {:?}: {:#}", message.message_id, e);
        }
    }

    Ok(())
}

/// Parses one SNS message body and dispatches the requested notification
async fn process_message<S, M>(
    store: &S,
    sms: &M,
    config: &DispatchConfig,
    body: &str,
) -> anyhow::Result<Option<ScheduledNotification>>
where
    S: EventDataStore + ?Sized,
    M: SmsSender + ?Sized,
{
    let request: NotificationSendRequestedEvent =
        serde_json::from_str(body).context("SNS message is not a send request")?;

    if request.event_type != NOTIFICATION_SEND_REQUESTED {
        warn!("Unexpected event type: {}", request.event_type);
        return Ok(None);
    }

    info!(
        "Send requested by {} for notification_id={}",
        request.requested_by, request.notification_id
    );

    let notification = match load_sendable(store, &request).await {
        Ok(notification) => notification,
        Err(NotificationError::NotPending(id, status)) => {
            // the scheduled run may have got there first
            info!("Skipping notification {}: already {}", id, status);
            return Ok(None);
        }
        Err(e) => return Err(e.into()),
    };

    // the claim inside dispatch settles a race with the scheduled run
    let Some(done) = dispatch_notification(store, sms, config, &notification.id, Utc::now())
        .await
        .with_context(|| format!("Dispatch of notification {} failed", request.notification_id))?
    else {
        info!("Notification {} was claimed by another sender", notification.id);
        return Ok(None);
    };

    info!(
        "Notification {} finished as {}: {} sent, {} failed",
        done.id, done.status, done.sent_count, done.failed_count
    );
    Ok(Some(done))
}

async fn load_sendable<S>(
    store: &S,
    request: &NotificationSendRequestedEvent,
) -> Result<ScheduledNotification, NotificationError>
where
    S: EventDataStore + ?Sized,
{
    let notification = store.get_notification(&request.notification_id).await?;

    if notification.event_id != request.event_id {
        return Err(NotificationError::EventMismatch(
            notification.id,
            request.event_id.clone(),
        ));
    }
    if !notification.is_pending() {
        return Err(NotificationError::NotPending(
            notification.id,
            notification.status,
        ));
    }
    Ok(notification)
}

#[cfg(test)]
mod tests {
    use super::*;
    use eventdesk_shared::config::AppLinks;
    use eventdesk_shared::models::{
        now_str, EventRecord, EventStatus, Guest, NotificationStatus, NotificationType,
        RsvpStatus,
    };
    use eventdesk_shared::store::{EventStore, GuestStore, NotificationStore};
    use eventdesk_shared::test_utils::mock_event_store::MockEventStore;
    use eventdesk_shared::test_utils::mock_sms::MockSmsSender;
    use eventdesk_shared::test_utils::test_logging::init_test_logging;

    fn config() -> DispatchConfig {
        DispatchConfig {
            links: AppLinks::new("https://events.test"),
            default_country_code: "972".into(),
        }
    }

    async fn seeded_store(auto_enabled: bool) -> MockEventStore {
        let store = MockEventStore::new();
        store
            .create_event(EventRecord {
                id: "ev1".into(),
                owner_id: "owner-1".into(),
                name: "Gala".into(),
                event_type: "party".into(),
                event_date: "2030-03-01T20:00:00Z".into(),
                venue: Some("Rooftop".into()),
                status: EventStatus::Active,
                tables: vec![],
                created_at: now_str(),
                updated_at: now_str(),
            })
            .await
            .unwrap();
        store
            .create_guest(Guest {
                id: "g1".into(),
                event_id: "ev1".into(),
                name: "Ori".into(),
                phone: Some("052-123-4567".into()),
                rsvp_status: RsvpStatus::Coming,
                seat_count: 1,
                table_number: None,
                created_at: now_str(),
                updated_at: now_str(),
            })
            .await
            .unwrap();
        store
            .create_notification(ScheduledNotification {
                id: "n1".into(),
                event_id: "ev1".into(),
                owner_id: "owner-1".into(),
                notification_type: NotificationType::Invitation,
                // far in the future: "send now" ignores the schedule
                send_at: "2030-02-01T10:00:00Z".into(),
                auto_enabled,
                status: NotificationStatus::Pending,
                custom_message: None,
                sent_at: None,
                sent_count: 0,
                failed_count: 0,
                failure_reason: None,
                created_at: now_str(),
                updated_at: now_str(),
            })
            .await
            .unwrap();
        store
    }

    fn send_request(notification_id: &str, event_id: &str) -> String {
        serde_json::to_string(&NotificationSendRequestedEvent {
            event_type: NOTIFICATION_SEND_REQUESTED.into(),
            notification_id: notification_id.into(),
            event_id: event_id.into(),
            requested_by: "owner-1".into(),
            timestamp: now_str(),
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_send_now_dispatches_immediately() {
        init_test_logging();
        let store = seeded_store(false).await;
        let sms = MockSmsSender::new();

        let done = process_message(&store, &sms, &config(), &send_request("n1", "ev1"))
            .await
            .unwrap()
            .unwrap();

        assert_eq!(done.status, NotificationStatus::Sent);
        assert_eq!(done.sent_count, 1);
        assert_eq!(sms.sent()[0].to, "+972521234567");
    }

    #[tokio::test]
    async fn test_already_sent_notification_is_skipped() {
        init_test_logging();
        let store = seeded_store(true).await;
        let sms = MockSmsSender::new();

        process_message(&store, &sms, &config(), &send_request("n1", "ev1"))
            .await
            .unwrap();
        let second = process_message(&store, &sms, &config(), &send_request("n1", "ev1"))
            .await
            .unwrap();

        assert!(second.is_none());
        assert_eq!(sms.sent().len(), 1);
    }

    #[tokio::test]
    async fn test_send_now_skips_notification_claimed_by_scheduled_run() {
        init_test_logging();
        let store = seeded_store(true).await;
        let sms = MockSmsSender::new();
        store
            .transition_notification("n1", NotificationStatus::Pending, NotificationStatus::Sending)
            .await
            .unwrap();

        let skipped = process_message(&store, &sms, &config(), &send_request("n1", "ev1"))
            .await
            .unwrap();

        assert!(skipped.is_none());
        assert!(sms.sent().is_empty());
        assert_eq!(
            store.get_notification("n1").await.unwrap().status,
            NotificationStatus::Sending
        );
    }

    #[tokio::test]
    async fn test_rejects_mismatched_or_malformed_requests() {
        init_test_logging();
        let store = seeded_store(true).await;
        let sms = MockSmsSender::new();

        assert!(
            process_message(&store, &sms, &config(), &send_request("n1", "other-event"))
                .await
                .is_err()
        );
        assert!(
            process_message(&store, &sms, &config(), &send_request("missing", "ev1"))
                .await
                .is_err()
        );
        assert!(process_message(&store, &sms, &config(), "not json")
            .await
            .is_err());
        assert!(sms.sent().is_empty());
        assert_eq!(
            store.get_notification("n1").await.unwrap().status,
            NotificationStatus::Pending
        );
    }
}
