pub mod event;
pub mod events;
pub mod guest;
pub mod notification;
pub mod payment;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

pub use event::{EventRecord, EventStatus, SeatingTable};
pub use guest::{Guest, RsvpStatus};
pub use notification::{
    NotificationStatus, NotificationType, ScheduledNotification, SendLog, SendStatus,
};
pub use payment::{
    FeeMode, PaymentKind, PaymentRequest, PaymentStatus, PaymentTransaction, RecordOutcome,
};

/// Current time as an RFC 3339 string, the storage format for all timestamps
pub fn now_str() -> String {
    Utc::now().to_rfc3339()
}

/// Parses a stored RFC 3339 timestamp
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

#[derive(Serialize, Debug)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// A PATCH field that distinguishes "set to null" from "not sent".
///
/// Use with `#[serde(default, deserialize_with = "deserialize_optional_field")]`
/// on an `Option<OptionalField<T>>`.
#[derive(Debug, Clone, PartialEq)]
pub enum OptionalField<T> {
    Value(T),
    Null,
}

impl<T> OptionalField<T> {
    pub fn into_option(self) -> Option<T> {
        match self {
            OptionalField::Value(v) => Some(v),
            OptionalField::Null => None,
        }
    }
}

pub fn deserialize_optional_field<'de, T, D>(
    deserializer: D,
) -> Result<Option<OptionalField<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    let value = Option::<T>::deserialize(deserializer)?;
    Ok(Some(match value {
        Some(v) => OptionalField::Value(v),
        None => OptionalField::Null,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Deserialize)]
    struct Patch {
        #[serde(default, deserialize_with = "deserialize_optional_field")]
        venue: Option<OptionalField<String>>,
    }

    #[test]
    fn optional_field_distinguishes_null_from_missing() {
        let missing: Patch = serde_json::from_str("{}").unwrap();
        assert!(missing.venue.is_none());

        let null: Patch = serde_json::from_str(r#"{"venue":null}"#).unwrap();
        assert_eq!(null.venue, Some(OptionalField::Null));

        let set: Patch = serde_json::from_str(r#"{"venue":"Hall"}"#).unwrap();
        assert_eq!(set.venue, Some(OptionalField::Value("Hall".to_string())));
    }
}
