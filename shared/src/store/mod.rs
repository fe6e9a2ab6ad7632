pub mod dynamo;

use async_trait::async_trait;

use crate::error::StoreError;
use crate::models::{
    EventRecord, Guest, NotificationStatus, PaymentRequest, PaymentStatus, PaymentTransaction,
    RecordOutcome, ScheduledNotification, SendLog,
};

pub type StoreResult<T> = std::result::Result<T, StoreError>;

#[async_trait]
pub trait EventStore: Send + Sync {
    async fn create_event(&self, event: EventRecord) -> StoreResult<EventRecord>;
    async fn get_event(&self, id: &str) -> StoreResult<EventRecord>;
    async fn get_events_by_owner(&self, owner_id: &str) -> StoreResult<Vec<EventRecord>>;
    /// Replaces an event. Fails with `Conflict` when the stored status no
    /// longer matches `event.status`, so a stale write cannot undo a cancel.
    async fn update_event(&self, event: EventRecord) -> StoreResult<EventRecord>;
    /// Deletes the event along with its guests and notifications
    async fn delete_event(&self, id: &str) -> StoreResult<()>;
    /// Marks the event canceled and removes its pending notifications in one transaction
    async fn cancel_event(&self, id: &str) -> StoreResult<EventRecord>;
}

#[async_trait]
pub trait GuestStore: Send + Sync {
    async fn create_guest(&self, guest: Guest) -> StoreResult<Guest>;
    async fn get_guest(&self, id: &str) -> StoreResult<Guest>;
    async fn get_guests_by_event(&self, event_id: &str) -> StoreResult<Vec<Guest>>;
    async fn update_guest(&self, guest: Guest) -> StoreResult<Guest>;
    async fn delete_guest(&self, id: &str) -> StoreResult<()>;
}

#[async_trait]
pub trait NotificationStore: Send + Sync {
    async fn create_notification(
        &self,
        notification: ScheduledNotification,
    ) -> StoreResult<ScheduledNotification>;
    async fn get_notification(&self, id: &str) -> StoreResult<ScheduledNotification>;
    async fn get_notifications_by_event(
        &self,
        event_id: &str,
    ) -> StoreResult<Vec<ScheduledNotification>>;
    /// Replaces a notification. Fails with `Conflict` when the stored status
    /// no longer matches `notification.status`.
    async fn update_notification(
        &self,
        notification: ScheduledNotification,
    ) -> StoreResult<ScheduledNotification>;
    /// Conditionally moves a notification from `from` to `to`.
    ///
    /// Returns `None` when the stored status is not `from`, e.g. another
    /// dispatcher already claimed it.
    async fn transition_notification(
        &self,
        id: &str,
        from: NotificationStatus,
        to: NotificationStatus,
    ) -> StoreResult<Option<ScheduledNotification>>;
    /// Writes the outcome of a notification this caller holds in `sending`
    async fn finish_notification(
        &self,
        notification: ScheduledNotification,
    ) -> StoreResult<ScheduledNotification>;
    async fn delete_notification(&self, id: &str) -> StoreResult<()>;
    /// All notifications that are still pending and have automatic sending enabled
    async fn scan_pending_auto_notifications(&self) -> StoreResult<Vec<ScheduledNotification>>;
    async fn append_send_log(&self, log: SendLog) -> StoreResult<()>;
    async fn get_send_logs_by_notification(
        &self,
        notification_id: &str,
    ) -> StoreResult<Vec<SendLog>>;
}

/// Everything tied to an event: the event itself, its guests and its notifications
pub trait EventDataStore: EventStore + GuestStore + NotificationStore {}

impl<T> EventDataStore for T where T: EventStore + GuestStore + NotificationStore {}

#[async_trait]
pub trait PaymentStore: Send + Sync {
    async fn create_payment_request(&self, request: PaymentRequest) -> StoreResult<PaymentRequest>;
    async fn get_payment_request(&self, token: &str) -> StoreResult<PaymentRequest>;
    async fn get_payment_requests_by_owner(
        &self,
        owner_id: &str,
    ) -> StoreResult<Vec<PaymentRequest>>;
    /// Replaces a draft. Requests past draft change only through
    /// `transition_payment_request` and `record_payment`.
    async fn update_payment_request(&self, request: PaymentRequest) -> StoreResult<PaymentRequest>;
    /// Moves a request from `from` to `to` without touching any other field.
    /// Fails with `Conflict` when the stored status is no longer `from`.
    async fn transition_payment_request(
        &self,
        token: &str,
        from: PaymentStatus,
        to: PaymentStatus,
    ) -> StoreResult<PaymentRequest>;
    /// Records a confirmed provider transaction and consumes one use of the request.
    ///
    /// Must be atomic: a transaction id is recorded at most once, and
    /// `uses_so_far` never exceeds `usage_limit` however many confirmations race.
    async fn record_payment(&self, transaction: PaymentTransaction) -> StoreResult<RecordOutcome>;
    async fn get_transactions_by_token(&self, token: &str)
        -> StoreResult<Vec<PaymentTransaction>>;
}
