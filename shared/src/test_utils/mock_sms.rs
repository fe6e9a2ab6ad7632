use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Mutex;

use crate::sms::{SmsError, SmsReceipt, SmsSender};

#[derive(Debug, Clone, PartialEq)]
pub struct SentSms {
    pub to: String,
    pub text: String,
}

/// Records messages instead of sending them; chosen numbers can be made to fail
#[derive(Default)]
pub struct MockSmsSender {
    sent: Mutex<Vec<SentSms>>,
    failing_numbers: Mutex<HashSet<String>>,
}

impl MockSmsSender {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every send to `phone` (normalized form) is rejected
    pub fn fail_for(&self, phone: &str) {
        self.failing_numbers
            .lock()
            .unwrap()
            .insert(phone.to_string());
    }

    pub fn sent(&self) -> Vec<SentSms> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl SmsSender for MockSmsSender {
    async fn send_sms(&self, to: &str, text: &str) -> Result<SmsReceipt, SmsError> {
        if self.failing_numbers.lock().unwrap().contains(to) {
            return Err(SmsError::Rejected(format!("mock rejection for {}", to)));
        }
        let mut sent = self.sent.lock().unwrap();
        sent.push(SentSms {
            to: to.to_string(),
            text: text.to_string(),
        });
        Ok(SmsReceipt {
            message_id: Some(format!("mock-{}", sent.len())),
        })
    }
}
