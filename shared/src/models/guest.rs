use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "kebab-case")]
pub enum RsvpStatus {
    #[default]
    NoResponse,
    Coming,
    NotComing,
    Maybe,
}

impl fmt::Display for RsvpStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RsvpStatus::NoResponse => "no-response",
            RsvpStatus::Coming => "coming",
            RsvpStatus::NotComing => "not-coming",
            RsvpStatus::Maybe => "maybe",
        };
        write!(f, "{}", s)
    }
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct Guest {
    pub id: String,
    pub event_id: String,
    pub name: String,
    /// Phone as entered by the owner; normalized only when a message is sent
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub rsvp_status: RsvpStatus,
    pub seat_count: u32,
    #[serde(default)]
    pub table_number: Option<u32>,
    pub created_at: String,
    pub updated_at: String,
}

impl Guest {
    /// Seats this guest currently occupies at their table
    pub fn occupied_seats(&self) -> u32 {
        match self.rsvp_status {
            RsvpStatus::NotComing => 0,
            _ => self.seat_count,
        }
    }
}
