use chrono::DateTime;

use crate::config::AppLinks;
use crate::models::{EventRecord, Guest, NotificationType};

fn display_date(event_date: &str) -> String {
    DateTime::parse_from_rfc3339(event_date)
        .map(|dt| dt.format("%d/%m/%Y at %H:%M").to_string())
        .unwrap_or_else(|_| event_date.to_string())
}

fn venue_suffix(event: &EventRecord) -> String {
    match event.venue.as_deref().map(str::trim) {
        Some(venue) if !venue.is_empty() => format!(" at {}", venue),
        _ => String::new(),
    }
}

/// Builds the SMS text a guest receives for a notification.
///
/// The output depends only on the arguments, so re-rendering a notification
/// for the same guest always yields the same text.
pub fn render_message(
    kind: NotificationType,
    event: &EventRecord,
    guest: &Guest,
    custom_message: Option<&str>,
    links: &AppLinks,
) -> String {
    let greeting = format!("Hi {}", guest.name.trim());

    if let Some(custom) = custom_message.map(str::trim).filter(|m| !m.is_empty()) {
        return format!("{}, {}", greeting, custom);
    }

    let date = display_date(&event.event_date);
    let venue = venue_suffix(event);
    let rsvp = links.rsvp_link(&event.id, &guest.id);

    match kind {
        NotificationType::SaveDate => format!(
            "{}! Save the date: {} on {}{}. Details: {}",
            greeting, event.name, date, venue, rsvp
        ),
        NotificationType::Invitation => format!(
            "{}, you're invited to {} on {}{}. Please RSVP: {}",
            greeting, event.name, date, venue, rsvp
        ),
        NotificationType::Reminder => format!(
            "{}, we haven't heard from you yet about {} on {}. Please RSVP: {}",
            greeting, event.name, date, rsvp
        ),
        NotificationType::TableNumber => match guest.table_number {
            Some(number) => format!(
                "{}, welcome to {}! Your table number is {}.",
                greeting, event.name, number
            ),
            None => format!(
                "{}, welcome to {}! Please see the host for your seat.",
                greeting, event.name
            ),
        },
        NotificationType::ThankYou => format!(
            "{}, thank you for celebrating {} with us!",
            greeting, event.name
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{EventStatus, RsvpStatus};

    fn event() -> EventRecord {
        EventRecord {
            id: "ev1".into(),
            owner_id: "owner".into(),
            name: "Dana & Yoni's Wedding".into(),
            event_type: "wedding".into(),
            event_date: "2026-06-12T19:30:00+03:00".into(),
            venue: Some("Garden Hall".into()),
            status: EventStatus::Active,
            tables: vec![],
            created_at: "2026-01-01T00:00:00+00:00".into(),
            updated_at: "2026-01-01T00:00:00+00:00".into(),
        }
    }

    fn guest(table: Option<u32>) -> Guest {
        Guest {
            id: "g1".into(),
            event_id: "ev1".into(),
            name: "Noa".into(),
            phone: Some("0541234567".into()),
            rsvp_status: RsvpStatus::Coming,
            seat_count: 2,
            table_number: table,
            created_at: "2026-01-01T00:00:00+00:00".into(),
            updated_at: "2026-01-01T00:00:00+00:00".into(),
        }
    }

    #[test]
    fn test_invitation_text() {
        let links = AppLinks::new("https://events.example.com");
        let text = render_message(NotificationType::Invitation, &event(), &guest(None), None, &links);
        assert_eq!(
            text,
            "Hi Noa, you're invited to Dana & Yoni's Wedding on 12/06/2026 at 19:30 at Garden Hall. \
             Please RSVP: https://events.example.com/rsvp/ev1/g1"
        );
    }

    #[test]
    fn test_table_number_text() {
        let links = AppLinks::new("https://events.example.com");
        let seated = render_message(NotificationType::TableNumber, &event(), &guest(Some(7)), None, &links);
        assert!(seated.ends_with("Your table number is 7."));

        let unseated = render_message(NotificationType::TableNumber, &event(), &guest(None), None, &links);
        assert!(unseated.contains("see the host"));
    }

    #[test]
    fn test_custom_message_keeps_greeting() {
        let links = AppLinks::new("https://events.example.com");
        let text = render_message(
            NotificationType::ThankYou,
            &event(),
            &guest(None),
            Some("  the photos are online! "),
            &links,
        );
        assert_eq!(text, "Hi Noa, the photos are online!");

        let blank = render_message(NotificationType::ThankYou, &event(), &guest(None), Some("   "), &links);
        assert!(blank.starts_with("Hi Noa, thank you for celebrating"));
    }

    #[test]
    fn test_rendering_is_deterministic() {
        let links = AppLinks::new("https://events.example.com");
        for kind in [
            NotificationType::SaveDate,
            NotificationType::Invitation,
            NotificationType::Reminder,
            NotificationType::TableNumber,
            NotificationType::ThankYou,
        ] {
            let a = render_message(kind, &event(), &guest(Some(3)), None, &links);
            let b = render_message(kind, &event(), &guest(Some(3)), None, &links);
            assert_eq!(a, b);
            assert!(a.starts_with("Hi Noa"));
        }
    }
}
