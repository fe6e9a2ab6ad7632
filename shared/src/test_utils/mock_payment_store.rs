use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

use crate::error::StoreError;
use crate::models::{now_str, PaymentRequest, PaymentStatus, PaymentTransaction, RecordOutcome};
use crate::store::{PaymentStore, StoreResult};

#[derive(Default)]
struct PaymentTables {
    requests: HashMap<String, PaymentRequest>,
    transactions: HashMap<String, PaymentTransaction>,
}

/// In-memory stand-in for `DynamoPaymentStore`.
///
/// A single lock covers requests and transactions so `record_payment` is atomic.
#[derive(Default)]
pub struct MockPaymentStore {
    tables: Mutex<PaymentTables>,
}

impl MockPaymentStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PaymentStore for MockPaymentStore {
    async fn create_payment_request(&self, request: PaymentRequest) -> StoreResult<PaymentRequest> {
        let mut tables = self.tables.lock().unwrap();
        if tables.requests.contains_key(&request.token) {
            return Err(StoreError::Conflict(format!(
                "Payment request {} exists",
                request.token
            )));
        }
        tables
            .requests
            .insert(request.token.clone(), request.clone());
        Ok(request)
    }

    async fn get_payment_request(&self, token: &str) -> StoreResult<PaymentRequest> {
        self.tables
            .lock()
            .unwrap()
            .requests
            .get(token)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("Payment request {} not found", token)))
    }

    async fn get_payment_requests_by_owner(
        &self,
        owner_id: &str,
    ) -> StoreResult<Vec<PaymentRequest>> {
        let mut requests: Vec<PaymentRequest> = self
            .tables
            .lock()
            .unwrap()
            .requests
            .values()
            .filter(|r| r.owner_id == owner_id)
            .cloned()
            .collect();
        requests.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(requests)
    }

    async fn update_payment_request(&self, request: PaymentRequest) -> StoreResult<PaymentRequest> {
        let mut tables = self.tables.lock().unwrap();
        let stored = tables.requests.get(&request.token).ok_or_else(|| {
            StoreError::NotFound(format!("Payment request {} not found", request.token))
        })?;
        if request.status != PaymentStatus::Draft || stored.status != PaymentStatus::Draft {
            return Err(StoreError::Conflict(format!(
                "Payment request {} is {}; only drafts are replaced",
                request.token, stored.status
            )));
        }
        tables
            .requests
            .insert(request.token.clone(), request.clone());
        Ok(request)
    }

    async fn transition_payment_request(
        &self,
        token: &str,
        from: PaymentStatus,
        to: PaymentStatus,
    ) -> StoreResult<PaymentRequest> {
        let mut tables = self.tables.lock().unwrap();
        let request = tables.requests.get_mut(token).ok_or_else(|| {
            StoreError::NotFound(format!("Payment request {} not found", token))
        })?;
        if request.status != from {
            return Err(StoreError::Conflict(format!(
                "Payment request {} is no longer {}",
                token, from
            )));
        }
        request.status = to;
        request.updated_at = now_str();
        Ok(request.clone())
    }

    async fn record_payment(&self, transaction: PaymentTransaction) -> StoreResult<RecordOutcome> {
        let mut tables = self.tables.lock().unwrap();

        if tables.transactions.contains_key(&transaction.id) {
            return Ok(RecordOutcome::Duplicate);
        }

        let request = tables
            .requests
            .get_mut(&transaction.token)
            .ok_or_else(|| {
                StoreError::NotFound(format!("Payment request {} not found", transaction.token))
            })?;

        if request.status != PaymentStatus::Active || request.uses_so_far >= request.usage_limit {
            return Ok(RecordOutcome::LimitReached);
        }

        let now = now_str();
        request.uses_so_far += 1;
        request.updated_at = now.clone();
        if request.uses_so_far >= request.usage_limit {
            request.status = PaymentStatus::Paid;
            request.paid_at = Some(now);
        }
        let updated = request.clone();

        tables
            .transactions
            .insert(transaction.id.clone(), transaction);
        Ok(RecordOutcome::Recorded(updated))
    }

    async fn get_transactions_by_token(&self, token: &str) -> StoreResult<Vec<PaymentTransaction>> {
        let mut transactions: Vec<PaymentTransaction> = self
            .tables
            .lock()
            .unwrap()
            .transactions
            .values()
            .filter(|t| t.token == token)
            .cloned()
            .collect();
        transactions.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(transactions)
    }
}
