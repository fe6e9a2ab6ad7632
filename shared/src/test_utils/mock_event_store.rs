use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

use crate::error::StoreError;
use crate::models::{
    now_str, EventRecord, EventStatus, Guest, NotificationStatus, ScheduledNotification, SendLog,
};
use crate::store::{EventStore, GuestStore, NotificationStore, StoreResult};

/// In-memory stand-in for `DynamoEventStore`
#[derive(Default)]
pub struct MockEventStore {
    events: Mutex<HashMap<String, EventRecord>>,
    guests: Mutex<HashMap<String, Guest>>,
    notifications: Mutex<HashMap<String, ScheduledNotification>>,
    send_logs: Mutex<Vec<SendLog>>,
}

impl MockEventStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn all_send_logs(&self) -> Vec<SendLog> {
        self.send_logs.lock().unwrap().clone()
    }

    pub fn notification_count(&self) -> usize {
        self.notifications.lock().unwrap().len()
    }
}

fn not_found(what: &str, id: &str) -> StoreError {
    StoreError::NotFound(format!("{} {} not found", what, id))
}

/// Replaces a stored notification whose status is `expected`, or the status
/// of the incoming record when `expected` is `None`
fn replace_if_status(
    notifications: &mut HashMap<String, ScheduledNotification>,
    notification: ScheduledNotification,
    expected: Option<NotificationStatus>,
) -> StoreResult<ScheduledNotification> {
    let stored = notifications
        .get(&notification.id)
        .ok_or_else(|| StoreError::Conflict(format!("Notification {} is gone", notification.id)))?;
    let expected = expected.unwrap_or(notification.status);
    if stored.status != expected {
        return Err(StoreError::Conflict(format!(
            "Notification {} is {}, expected {}",
            notification.id, stored.status, expected
        )));
    }
    notifications.insert(notification.id.clone(), notification.clone());
    Ok(notification)
}

#[async_trait]
impl EventStore for MockEventStore {
    async fn create_event(&self, event: EventRecord) -> StoreResult<EventRecord> {
        let mut events = self.events.lock().unwrap();
        if events.contains_key(&event.id) {
            return Err(StoreError::Conflict(format!("Event {} exists", event.id)));
        }
        events.insert(event.id.clone(), event.clone());
        Ok(event)
    }

    async fn get_event(&self, id: &str) -> StoreResult<EventRecord> {
        self.events
            .lock()
            .unwrap()
            .get(id)
            .cloned()
            .ok_or_else(|| not_found("Event", id))
    }

    async fn get_events_by_owner(&self, owner_id: &str) -> StoreResult<Vec<EventRecord>> {
        let mut events: Vec<EventRecord> = self
            .events
            .lock()
            .unwrap()
            .values()
            .filter(|e| e.owner_id == owner_id)
            .cloned()
            .collect();
        events.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(events)
    }

    async fn update_event(&self, event: EventRecord) -> StoreResult<EventRecord> {
        let mut events = self.events.lock().unwrap();
        let stored = events.get(&event.id).ok_or_else(|| not_found("Event", &event.id))?;
        if stored.status != event.status {
            return Err(StoreError::Conflict(format!(
                "Event {} is no longer {}",
                event.id, event.status
            )));
        }
        events.insert(event.id.clone(), event.clone());
        Ok(event)
    }

    async fn delete_event(&self, id: &str) -> StoreResult<()> {
        self.guests.lock().unwrap().retain(|_, g| g.event_id != id);
        self.notifications
            .lock()
            .unwrap()
            .retain(|_, n| n.event_id != id);
        self.events.lock().unwrap().remove(id);
        Ok(())
    }

    async fn cancel_event(&self, id: &str) -> StoreResult<EventRecord> {
        // both maps are held for the whole operation, like a transaction
        let mut events = self.events.lock().unwrap();
        let mut notifications = self.notifications.lock().unwrap();

        let event = events.get_mut(id).ok_or_else(|| not_found("Event", id))?;
        event.status = EventStatus::Canceled;
        event.updated_at = now_str();
        notifications.retain(|_, n| !(n.event_id == id && n.is_pending()));

        Ok(event.clone())
    }
}

#[async_trait]
impl GuestStore for MockEventStore {
    async fn create_guest(&self, guest: Guest) -> StoreResult<Guest> {
        self.guests
            .lock()
            .unwrap()
            .insert(guest.id.clone(), guest.clone());
        Ok(guest)
    }

    async fn get_guest(&self, id: &str) -> StoreResult<Guest> {
        self.guests
            .lock()
            .unwrap()
            .get(id)
            .cloned()
            .ok_or_else(|| not_found("Guest", id))
    }

    async fn get_guests_by_event(&self, event_id: &str) -> StoreResult<Vec<Guest>> {
        let mut guests: Vec<Guest> = self
            .guests
            .lock()
            .unwrap()
            .values()
            .filter(|g| g.event_id == event_id)
            .cloned()
            .collect();
        guests.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        Ok(guests)
    }

    async fn update_guest(&self, guest: Guest) -> StoreResult<Guest> {
        let mut guests = self.guests.lock().unwrap();
        if !guests.contains_key(&guest.id) {
            return Err(not_found("Guest", &guest.id));
        }
        guests.insert(guest.id.clone(), guest.clone());
        Ok(guest)
    }

    async fn delete_guest(&self, id: &str) -> StoreResult<()> {
        self.guests.lock().unwrap().remove(id);
        Ok(())
    }
}

#[async_trait]
impl NotificationStore for MockEventStore {
    async fn create_notification(
        &self,
        notification: ScheduledNotification,
    ) -> StoreResult<ScheduledNotification> {
        self.notifications
            .lock()
            .unwrap()
            .insert(notification.id.clone(), notification.clone());
        Ok(notification)
    }

    async fn get_notification(&self, id: &str) -> StoreResult<ScheduledNotification> {
        self.notifications
            .lock()
            .unwrap()
            .get(id)
            .cloned()
            .ok_or_else(|| not_found("Notification", id))
    }

    async fn get_notifications_by_event(
        &self,
        event_id: &str,
    ) -> StoreResult<Vec<ScheduledNotification>> {
        let mut notifications: Vec<ScheduledNotification> = self
            .notifications
            .lock()
            .unwrap()
            .values()
            .filter(|n| n.event_id == event_id)
            .cloned()
            .collect();
        notifications.sort_by(|a, b| a.send_at.cmp(&b.send_at));
        Ok(notifications)
    }

    async fn update_notification(
        &self,
        notification: ScheduledNotification,
    ) -> StoreResult<ScheduledNotification> {
        let mut notifications = self.notifications.lock().unwrap();
        replace_if_status(&mut notifications, notification, None)
    }

    async fn transition_notification(
        &self,
        id: &str,
        from: NotificationStatus,
        to: NotificationStatus,
    ) -> StoreResult<Option<ScheduledNotification>> {
        let mut notifications = self.notifications.lock().unwrap();
        match notifications.get_mut(id) {
            Some(notification) if notification.status == from => {
                notification.status = to;
                notification.updated_at = now_str();
                Ok(Some(notification.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn finish_notification(
        &self,
        notification: ScheduledNotification,
    ) -> StoreResult<ScheduledNotification> {
        let mut notifications = self.notifications.lock().unwrap();
        replace_if_status(
            &mut notifications,
            notification,
            Some(NotificationStatus::Sending),
        )
    }

    async fn delete_notification(&self, id: &str) -> StoreResult<()> {
        self.notifications.lock().unwrap().remove(id);
        Ok(())
    }

    async fn scan_pending_auto_notifications(&self) -> StoreResult<Vec<ScheduledNotification>> {
        let mut due: Vec<ScheduledNotification> = self
            .notifications
            .lock()
            .unwrap()
            .values()
            .filter(|n| n.is_pending() && n.auto_enabled)
            .cloned()
            .collect();
        due.sort_by(|a, b| a.send_at.cmp(&b.send_at));
        Ok(due)
    }

    async fn append_send_log(&self, log: SendLog) -> StoreResult<()> {
        self.send_logs.lock().unwrap().push(log);
        Ok(())
    }

    async fn get_send_logs_by_notification(
        &self,
        notification_id: &str,
    ) -> StoreResult<Vec<SendLog>> {
        Ok(self
            .send_logs
            .lock()
            .unwrap()
            .iter()
            .filter(|l| l.notification_id == notification_id)
            .cloned()
            .collect())
    }
}
