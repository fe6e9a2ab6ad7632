use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum EventStatus {
    #[default]
    Active,
    Canceled,
}

impl fmt::Display for EventStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventStatus::Active => write!(f, "active"),
            EventStatus::Canceled => write!(f, "canceled"),
        }
    }
}

/// A table guests can be seated at
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SeatingTable {
    pub number: u32,
    #[serde(default)]
    pub name: Option<String>,
    pub capacity: u32,
}

/// An event (wedding, birthday, ...) owned by a single user
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct EventRecord {
    pub id: String,
    pub owner_id: String,
    pub name: String,
    pub event_type: String,
    /// RFC 3339 date-time of the event itself
    pub event_date: String,
    #[serde(default)]
    pub venue: Option<String>,
    #[serde(default)]
    pub status: EventStatus,
    #[serde(default)]
    pub tables: Vec<SeatingTable>,
    pub created_at: String,
    pub updated_at: String,
}

impl EventRecord {
    pub fn is_canceled(&self) -> bool {
        self.status == EventStatus::Canceled
    }

    pub fn table(&self, number: u32) -> Option<&SeatingTable> {
        self.tables.iter().find(|t| t.number == number)
    }
}
