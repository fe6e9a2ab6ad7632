use async_trait::async_trait;
use aws_sdk_dynamodb::{
    error::DisplayErrorContext,
    operation::transact_write_items::TransactWriteItemsError,
    types::{AttributeValue, Delete, Put, ReturnValue, TransactWriteItem, Update},
    Client,
};
use log::{debug, info, warn};
use serde::{de::DeserializeOwned, Serialize};
use serde_dynamo::{from_item, from_items, to_item};
use std::collections::HashMap;
use std::env;

use super::{EventStore, GuestStore, NotificationStore, PaymentStore, StoreResult};
use crate::error::StoreError;
use crate::models::{
    now_str, EventRecord, Guest, NotificationStatus, PaymentRequest, PaymentStatus,
    PaymentTransaction, RecordOutcome, ScheduledNotification, SendLog,
};

type Item = HashMap<String, AttributeValue>;

/// DynamoDB caps a single transaction at 100 items
const MAX_TRANSACTION_ITEMS: usize = 100;

const OWNER_INDEX: &str = "owner_id-index";
const EVENT_INDEX: &str = "event_id-index";
const NOTIFICATION_INDEX: &str = "notification_id-index";
const TOKEN_INDEX: &str = "token-index";

pub async fn create_client() -> Client {
    let config = aws_config::defaults(aws_config::BehaviorVersion::latest())
        .load()
        .await;
    Client::new(&config)
}

fn table_from_env(var: &str, default: &str) -> String {
    env::var(var).unwrap_or_else(|_| {
        debug!("{} not set, using table '{}'", var, default);
        default.to_string()
    })
}

fn db_err<E>(e: E) -> StoreError
where
    E: std::error::Error + 'static,
{
    StoreError::Database(DisplayErrorContext(e).to_string())
}

fn build_err(e: aws_sdk_dynamodb::error::BuildError) -> StoreError {
    StoreError::Database(format!("Failed to build request: {}", e))
}

fn s(value: &str) -> AttributeValue {
    AttributeValue::S(value.to_string())
}

async fn get_by_key<T: DeserializeOwned>(
    client: &Client,
    table: &str,
    key: &str,
    value: &str,
    what: &str,
) -> StoreResult<T> {
    let output = client
        .get_item()
        .table_name(table)
        .key(key, s(value))
        .send()
        .await
        .map_err(db_err)?;

    match output.item {
        Some(item) => Ok(from_item(item)?),
        None => Err(StoreError::NotFound(format!("{} {} not found", what, value))),
    }
}

/// Puts an item that must not exist yet
async fn insert<T: Serialize>(client: &Client, table: &str, key: &str, record: &T) -> StoreResult<()> {
    let item: Item = to_item(record)?;
    client
        .put_item()
        .table_name(table)
        .set_item(Some(item))
        .condition_expression("attribute_not_exists(#pk)")
        .expression_attribute_names("#pk", key)
        .send()
        .await
        .map_err(|e| {
            let service_error = e.into_service_error();
            if service_error.is_conditional_check_failed_exception() {
                StoreError::Conflict(format!("Item already exists in {}", table))
            } else {
                db_err(service_error)
            }
        })?;
    Ok(())
}

/// Overwrites an item that must already exist.
///
/// With `expected_status` the write also requires the stored `status` to
/// still equal it; a mismatch is a `Conflict`.
async fn replace<T: Serialize>(
    client: &Client,
    table: &str,
    key: &str,
    key_value: &str,
    record: &T,
    expected_status: Option<&str>,
) -> StoreResult<()> {
    let item: Item = to_item(record)?;
    let request = client
        .put_item()
        .table_name(table)
        .set_item(Some(item))
        .expression_attribute_names("#pk", key);
    let request = match expected_status {
        Some(status) => request
            .condition_expression("attribute_exists(#pk) AND #status = :expected")
            .expression_attribute_names("#status", "status")
            .expression_attribute_values(":expected", s(status)),
        None => request.condition_expression("attribute_exists(#pk)"),
    };

    request.send().await.map_err(|e| {
        let service_error = e.into_service_error();
        if !service_error.is_conditional_check_failed_exception() {
            return db_err(service_error);
        }
        match expected_status {
            Some(status) => StoreError::Conflict(format!(
                "{} in {} is missing or no longer {}",
                key_value, table, status
            )),
            None => StoreError::NotFound(format!("{} not found in {}", key_value, table)),
        }
    })?;
    Ok(())
}

/// Moves an item's `status` from `from` to `to` and returns the updated item,
/// or `None` when the stored status is not `from`.
async fn transition_status<T: DeserializeOwned>(
    client: &Client,
    table: &str,
    key: &str,
    key_value: &str,
    from: &str,
    to: &str,
) -> StoreResult<Option<T>> {
    let result = client
        .update_item()
        .table_name(table)
        .key(key, s(key_value))
        .update_expression("SET #status = :to, updated_at = :now")
        .condition_expression("#status = :from")
        .expression_attribute_names("#status", "status")
        .expression_attribute_values(":from", s(from))
        .expression_attribute_values(":to", s(to))
        .expression_attribute_values(":now", s(&now_str()))
        .return_values(ReturnValue::AllNew)
        .send()
        .await;

    match result {
        Ok(output) => match output.attributes {
            Some(item) => Ok(Some(from_item(item)?)),
            None => Err(StoreError::Database(format!(
                "Update of {} in {} returned no attributes",
                key_value, table
            ))),
        },
        Err(e) => {
            let service_error = e.into_service_error();
            if service_error.is_conditional_check_failed_exception() {
                debug!("{} in {} is not {}, leaving it alone", key_value, table, from);
                Ok(None)
            } else {
                Err(db_err(service_error))
            }
        }
    }
}

async fn delete_by_key(client: &Client, table: &str, key: &str, value: &str) -> StoreResult<()> {
    client
        .delete_item()
        .table_name(table)
        .key(key, s(value))
        .send()
        .await
        .map_err(db_err)?;
    Ok(())
}

/// Runs a GSI query to completion, following pagination
async fn query_index<T: DeserializeOwned>(
    client: &Client,
    table: &str,
    index: &str,
    key: &str,
    value: &str,
) -> StoreResult<Vec<T>> {
    let mut items: Vec<Item> = Vec::new();
    let mut start_key: Option<Item> = None;

    loop {
        let output = client
            .query()
            .table_name(table)
            .index_name(index)
            .key_condition_expression("#k = :v")
            .expression_attribute_names("#k", key)
            .expression_attribute_values(":v", s(value))
            .set_exclusive_start_key(start_key)
            .send()
            .await
            .map_err(db_err)?;

        items.extend(output.items.unwrap_or_default());
        start_key = output.last_evaluated_key;
        if start_key.is_none() {
            break;
        }
    }

    Ok(from_items(items)?)
}

/// Table names used by [`DynamoEventStore`]
#[derive(Debug, Clone)]
pub struct EventTables {
    pub events: String,
    pub guests: String,
    pub notifications: String,
    pub send_logs: String,
}

impl EventTables {
    pub fn from_env() -> Self {
        Self {
            events: table_from_env("EVENTS_TABLE", "events"),
            guests: table_from_env("GUESTS_TABLE", "guests"),
            notifications: table_from_env("NOTIFICATIONS_TABLE", "scheduled-notifications"),
            send_logs: table_from_env("SEND_LOGS_TABLE", "send-logs"),
        }
    }
}

/// Events, guests, scheduled notifications and send logs in DynamoDB
pub struct DynamoEventStore {
    client: Client,
    tables: EventTables,
}

impl DynamoEventStore {
    pub async fn new() -> Self {
        let tables = EventTables::from_env();
        info!("Creating DynamoEventStore with tables {:?}", tables);
        Self::with_client_and_tables(create_client().await, tables)
    }

    pub fn with_client_and_tables(client: Client, tables: EventTables) -> Self {
        Self { client, tables }
    }
}

#[async_trait]
impl EventStore for DynamoEventStore {
    async fn create_event(&self, event: EventRecord) -> StoreResult<EventRecord> {
        insert(&self.client, &self.tables.events, "id", &event).await?;
        Ok(event)
    }

    async fn get_event(&self, id: &str) -> StoreResult<EventRecord> {
        get_by_key(&self.client, &self.tables.events, "id", id, "Event").await
    }

    async fn get_events_by_owner(&self, owner_id: &str) -> StoreResult<Vec<EventRecord>> {
        query_index(&self.client, &self.tables.events, OWNER_INDEX, "owner_id", owner_id).await
    }

    async fn update_event(&self, event: EventRecord) -> StoreResult<EventRecord> {
        replace(
            &self.client,
            &self.tables.events,
            "id",
            &event.id,
            &event,
            Some(&event.status.to_string()),
        )
        .await?;
        Ok(event)
    }

    async fn delete_event(&self, id: &str) -> StoreResult<()> {
        let guests: Vec<Guest> =
            query_index(&self.client, &self.tables.guests, EVENT_INDEX, "event_id", id).await?;
        for guest in &guests {
            delete_by_key(&self.client, &self.tables.guests, "id", &guest.id).await?;
        }

        let notifications: Vec<ScheduledNotification> = query_index(
            &self.client,
            &self.tables.notifications,
            EVENT_INDEX,
            "event_id",
            id,
        )
        .await?;
        for notification in &notifications {
            delete_by_key(&self.client, &self.tables.notifications, "id", &notification.id)
                .await?;
        }

        delete_by_key(&self.client, &self.tables.events, "id", id).await?;
        info!(
            "Deleted event {} with {} guests and {} notifications",
            id,
            guests.len(),
            notifications.len()
        );
        Ok(())
    }

    async fn cancel_event(&self, id: &str) -> StoreResult<EventRecord> {
        let notifications: Vec<ScheduledNotification> = query_index(
            &self.client,
            &self.tables.notifications,
            EVENT_INDEX,
            "event_id",
            id,
        )
        .await?;
        let pending: Vec<&ScheduledNotification> =
            notifications.iter().filter(|n| n.is_pending()).collect();

        if pending.len() + 1 > MAX_TRANSACTION_ITEMS {
            return Err(StoreError::Conflict(format!(
                "Event {} has too many pending notifications ({}) to cancel atomically",
                id,
                pending.len()
            )));
        }

        let cancel = Update::builder()
            .table_name(&self.tables.events)
            .key("id", s(id))
            .update_expression("SET #status = :canceled, updated_at = :now")
            .condition_expression("attribute_exists(id)")
            .expression_attribute_names("#status", "status")
            .expression_attribute_values(":canceled", s("canceled"))
            .expression_attribute_values(":now", s(&now_str()))
            .build()
            .map_err(build_err)?;

        let mut items = vec![TransactWriteItem::builder().update(cancel).build()];
        for notification in &pending {
            let delete = Delete::builder()
                .table_name(&self.tables.notifications)
                .key("id", s(&notification.id))
                .condition_expression("#status = :pending")
                .expression_attribute_names("#status", "status")
                .expression_attribute_values(":pending", s(&NotificationStatus::Pending.to_string()))
                .build()
                .map_err(build_err)?;
            items.push(TransactWriteItem::builder().delete(delete).build());
        }

        self.client
            .transact_write_items()
            .set_transact_items(Some(items))
            .send()
            .await
            .map_err(|e| match e.into_service_error() {
                TransactWriteItemsError::TransactionCanceledException(c) => {
                    warn!("Cancel of event {} was rejected: {:?}", id, c.cancellation_reasons());
                    StoreError::Conflict(format!(
                        "Event {} changed while it was being canceled",
                        id
                    ))
                }
                other => db_err(other),
            })?;

        info!(
            "Canceled event {} and removed {} pending notifications",
            id,
            pending.len()
        );
        self.get_event(id).await
    }
}

#[async_trait]
impl GuestStore for DynamoEventStore {
    async fn create_guest(&self, guest: Guest) -> StoreResult<Guest> {
        insert(&self.client, &self.tables.guests, "id", &guest).await?;
        Ok(guest)
    }

    async fn get_guest(&self, id: &str) -> StoreResult<Guest> {
        get_by_key(&self.client, &self.tables.guests, "id", id, "Guest").await
    }

    async fn get_guests_by_event(&self, event_id: &str) -> StoreResult<Vec<Guest>> {
        query_index(&self.client, &self.tables.guests, EVENT_INDEX, "event_id", event_id).await
    }

    async fn update_guest(&self, guest: Guest) -> StoreResult<Guest> {
        replace(&self.client, &self.tables.guests, "id", &guest.id, &guest, None).await?;
        Ok(guest)
    }

    async fn delete_guest(&self, id: &str) -> StoreResult<()> {
        delete_by_key(&self.client, &self.tables.guests, "id", id).await
    }
}

#[async_trait]
impl NotificationStore for DynamoEventStore {
    async fn create_notification(
        &self,
        notification: ScheduledNotification,
    ) -> StoreResult<ScheduledNotification> {
        insert(&self.client, &self.tables.notifications, "id", &notification).await?;
        Ok(notification)
    }

    async fn get_notification(&self, id: &str) -> StoreResult<ScheduledNotification> {
        get_by_key(&self.client, &self.tables.notifications, "id", id, "Notification").await
    }

    async fn get_notifications_by_event(
        &self,
        event_id: &str,
    ) -> StoreResult<Vec<ScheduledNotification>> {
        query_index(
            &self.client,
            &self.tables.notifications,
            EVENT_INDEX,
            "event_id",
            event_id,
        )
        .await
    }

    async fn update_notification(
        &self,
        notification: ScheduledNotification,
    ) -> StoreResult<ScheduledNotification> {
        replace(
            &self.client,
            &self.tables.notifications,
            "id",
            &notification.id,
            &notification,
            Some(&notification.status.to_string()),
        )
        .await?;
        Ok(notification)
    }

    async fn transition_notification(
        &self,
        id: &str,
        from: NotificationStatus,
        to: NotificationStatus,
    ) -> StoreResult<Option<ScheduledNotification>> {
        transition_status(
            &self.client,
            &self.tables.notifications,
            "id",
            id,
            &from.to_string(),
            &to.to_string(),
        )
        .await
    }

    async fn finish_notification(
        &self,
        notification: ScheduledNotification,
    ) -> StoreResult<ScheduledNotification> {
        replace(
            &self.client,
            &self.tables.notifications,
            "id",
            &notification.id,
            &notification,
            Some(&NotificationStatus::Sending.to_string()),
        )
        .await?;
        Ok(notification)
    }

    async fn delete_notification(&self, id: &str) -> StoreResult<()> {
        delete_by_key(&self.client, &self.tables.notifications, "id", id).await
    }

    async fn scan_pending_auto_notifications(&self) -> StoreResult<Vec<ScheduledNotification>> {
        let mut items: Vec<Item> = Vec::new();
        let mut start_key: Option<Item> = None;

        loop {
            let output = self
                .client
                .scan()
                .table_name(&self.tables.notifications)
                .filter_expression("#status = :pending AND auto_enabled = :enabled")
                .expression_attribute_names("#status", "status")
                .expression_attribute_values(":pending", s("pending"))
                .expression_attribute_values(":enabled", AttributeValue::Bool(true))
                .set_exclusive_start_key(start_key)
                .send()
                .await
                .map_err(db_err)?;

            items.extend(output.items.unwrap_or_default());
            start_key = output.last_evaluated_key;
            if start_key.is_none() {
                break;
            }
        }

        Ok(from_items(items)?)
    }

    async fn append_send_log(&self, log: SendLog) -> StoreResult<()> {
        insert(&self.client, &self.tables.send_logs, "id", &log).await
    }

    async fn get_send_logs_by_notification(
        &self,
        notification_id: &str,
    ) -> StoreResult<Vec<SendLog>> {
        query_index(
            &self.client,
            &self.tables.send_logs,
            NOTIFICATION_INDEX,
            "notification_id",
            notification_id,
        )
        .await
    }
}

/// Table names used by [`DynamoPaymentStore`]
#[derive(Debug, Clone)]
pub struct PaymentTables {
    pub requests: String,
    pub transactions: String,
}

impl PaymentTables {
    pub fn from_env() -> Self {
        Self {
            requests: table_from_env("PAYMENT_REQUESTS_TABLE", "payment-requests"),
            transactions: table_from_env("PAYMENT_TRANSACTIONS_TABLE", "payment-transactions"),
        }
    }
}

/// Payment requests and their confirmed transactions in DynamoDB
pub struct DynamoPaymentStore {
    client: Client,
    tables: PaymentTables,
}

impl DynamoPaymentStore {
    pub async fn new() -> Self {
        let tables = PaymentTables::from_env();
        info!("Creating DynamoPaymentStore with tables {:?}", tables);
        Self::with_client_and_tables(create_client().await, tables)
    }

    pub fn with_client_and_tables(client: Client, tables: PaymentTables) -> Self {
        Self { client, tables }
    }

    /// Moves a request whose uses are exhausted from active to paid
    async fn mark_paid_if_exhausted(&self, token: &str) -> StoreResult<()> {
        let now = now_str();
        let result = self
            .client
            .update_item()
            .table_name(&self.tables.requests)
            .key("token", s(token))
            .update_expression("SET #status = :paid, paid_at = :now, updated_at = :now")
            .condition_expression("#status = :active AND uses_so_far >= usage_limit")
            .expression_attribute_names("#status", "status")
            .expression_attribute_values(":paid", s("paid"))
            .expression_attribute_values(":active", s("active"))
            .expression_attribute_values(":now", s(&now))
            .send()
            .await;

        match result {
            Ok(_) => {
                info!("Payment request {} is fully paid", token);
                Ok(())
            }
            Err(e) => {
                let service_error = e.into_service_error();
                if service_error.is_conditional_check_failed_exception() {
                    // uses left, or a concurrent confirmation already closed it
                    Ok(())
                } else {
                    Err(db_err(service_error))
                }
            }
        }
    }

    /// Finishes a close to `paid` that a confirmation recorded but never
    /// completed, then returns the stored state.
    async fn close_if_exhausted(&self, request: PaymentRequest) -> StoreResult<PaymentRequest> {
        if !request.needs_closing() {
            return Ok(request);
        }
        warn!(
            "Payment request {} has no uses left but is still active, closing it",
            request.token
        );
        self.mark_paid_if_exhausted(&request.token).await?;
        get_by_key(
            &self.client,
            &self.tables.requests,
            "token",
            &request.token,
            "Payment request",
        )
        .await
    }
}

#[async_trait]
impl PaymentStore for DynamoPaymentStore {
    async fn create_payment_request(&self, request: PaymentRequest) -> StoreResult<PaymentRequest> {
        insert(&self.client, &self.tables.requests, "token", &request).await?;
        Ok(request)
    }

    async fn get_payment_request(&self, token: &str) -> StoreResult<PaymentRequest> {
        let request = get_by_key(
            &self.client,
            &self.tables.requests,
            "token",
            token,
            "Payment request",
        )
        .await?;
        self.close_if_exhausted(request).await
    }

    async fn get_payment_requests_by_owner(
        &self,
        owner_id: &str,
    ) -> StoreResult<Vec<PaymentRequest>> {
        let stored: Vec<PaymentRequest> = query_index(
            &self.client,
            &self.tables.requests,
            OWNER_INDEX,
            "owner_id",
            owner_id,
        )
        .await?;

        let mut requests = Vec::with_capacity(stored.len());
        for request in stored {
            requests.push(self.close_if_exhausted(request).await?);
        }
        Ok(requests)
    }

    async fn update_payment_request(&self, request: PaymentRequest) -> StoreResult<PaymentRequest> {
        if request.status != PaymentStatus::Draft {
            return Err(StoreError::Conflict(format!(
                "Payment request {} is {}; only drafts are replaced",
                request.token, request.status
            )));
        }
        replace(
            &self.client,
            &self.tables.requests,
            "token",
            &request.token,
            &request,
            Some(&PaymentStatus::Draft.to_string()),
        )
        .await?;
        Ok(request)
    }

    async fn transition_payment_request(
        &self,
        token: &str,
        from: PaymentStatus,
        to: PaymentStatus,
    ) -> StoreResult<PaymentRequest> {
        let updated = transition_status(
            &self.client,
            &self.tables.requests,
            "token",
            token,
            &from.to_string(),
            &to.to_string(),
        )
        .await?;

        match updated {
            Some(request) => {
                info!("Payment request {} moved from {} to {}", token, from, to);
                Ok(request)
            }
            None => Err(StoreError::Conflict(format!(
                "Payment request {} is no longer {}",
                token, from
            ))),
        }
    }

    async fn record_payment(&self, transaction: PaymentTransaction) -> StoreResult<RecordOutcome> {
        let item: Item = to_item(&transaction)?;

        let put_transaction = Put::builder()
            .table_name(&self.tables.transactions)
            .set_item(Some(item))
            .condition_expression("attribute_not_exists(id)")
            .build()
            .map_err(build_err)?;

        let consume_use = Update::builder()
            .table_name(&self.tables.requests)
            .key("token", s(&transaction.token))
            .update_expression("SET uses_so_far = uses_so_far + :one, updated_at = :now")
            .condition_expression("#status = :active AND uses_so_far < usage_limit")
            .expression_attribute_names("#status", "status")
            .expression_attribute_values(":one", AttributeValue::N("1".to_string()))
            .expression_attribute_values(":active", s("active"))
            .expression_attribute_values(":now", s(&now_str()))
            .build()
            .map_err(build_err)?;

        let result = self
            .client
            .transact_write_items()
            .transact_items(TransactWriteItem::builder().put(put_transaction).build())
            .transact_items(TransactWriteItem::builder().update(consume_use).build())
            .send()
            .await;

        if let Err(e) = result {
            let service_error = e.into_service_error();
            if let TransactWriteItemsError::TransactionCanceledException(canceled) = &service_error
            {
                let reasons = canceled.cancellation_reasons();
                let check_failed = |i: usize| {
                    reasons.get(i).and_then(|r| r.code()) == Some("ConditionalCheckFailed")
                };
                if check_failed(0) {
                    info!(
                        "Transaction {} already recorded, ignoring duplicate",
                        transaction.id
                    );
                    return Ok(RecordOutcome::Duplicate);
                }
                if check_failed(1) {
                    warn!(
                        "Payment request {} cannot take transaction {}",
                        transaction.token, transaction.id
                    );
                    return Ok(RecordOutcome::LimitReached);
                }
            }
            return Err(db_err(service_error));
        }

        self.mark_paid_if_exhausted(&transaction.token).await?;
        let request = self.get_payment_request(&transaction.token).await?;
        Ok(RecordOutcome::Recorded(request))
    }

    async fn get_transactions_by_token(&self, token: &str) -> StoreResult<Vec<PaymentTransaction>> {
        query_index(
            &self.client,
            &self.tables.transactions,
            TOKEN_INDEX,
            "token",
            token,
        )
        .await
    }
}
