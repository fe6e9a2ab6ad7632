use eventdesk_shared::error::StoreError;
use eventdesk_shared::models::NotificationStatus;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum NotificationError {
    #[error("Failed to look up notification: {0}")]
    LookupFailed(#[from] StoreError),

    #[error("Notification {0} does not belong to event {1}")]
    EventMismatch(String, String),

    #[error("Notification {0} is already {1}")]
    NotPending(String, NotificationStatus),
}
