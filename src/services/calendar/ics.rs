use crate::models::{Appointment, AppointmentStatus};

fn ics_time(dt: &chrono::DateTime<chrono::Utc>) -> String {
    dt.format("%Y%m%dT%H%M%SZ").to_string()
}

/// Escapes TEXT values (RFC 5545 section 3.3.11).
fn escape(text: &str) -> String {
    text.replace('\\', "\\\\")
        .replace(';', "\\;")
        .replace(',', "\\,")
        .replace("\r\n", "\\n")
        .replace('\n', "\\n")
}

pub fn generate_ics(appointment: &Appointment, counterpart_name: &str) -> String {
    let uid = format!("{}@appointly", appointment.id);
    let summary = escape(&format!("{} - Meeting with {counterpart_name}", appointment.title));
    let description = escape(
        appointment
            .description
            .as_deref()
            .unwrap_or("No additional notes"),
    );
    let status = match appointment.status {
        AppointmentStatus::Pending => "TENTATIVE",
        AppointmentStatus::Confirmed | AppointmentStatus::Completed => "CONFIRMED",
        AppointmentStatus::Cancelled => "CANCELLED",
    };

    let mut lines = vec![
        "BEGIN:VCALENDAR".to_string(),
        "VERSION:2.0".to_string(),
        "PRODID:-//Appointly//Appointments//EN".to_string(),
        "BEGIN:VEVENT".to_string(),
        format!("UID:{uid}"),
        format!("DTSTAMP:{}", ics_time(&appointment.updated_at)),
        format!("DTSTART:{}", ics_time(&appointment.start_time)),
        format!("DTEND:{}", ics_time(&appointment.end_time)),
        format!("SUMMARY:{summary}"),
        format!("DESCRIPTION:{description}"),
        format!("STATUS:{status}"),
    ];
    for email in [&appointment.buyer_email, &appointment.seller_email]
        .into_iter()
        .flatten()
    {
        lines.push(format!("ATTENDEE:mailto:{email}"));
    }
    if let Some(link) = &appointment.meet_link {
        lines.push(format!("URL:{link}"));
    }
    lines.push("END:VEVENT".to_string());
    lines.push("END:VCALENDAR".to_string());

    let mut ics = lines.join("\r\n");
    ics.push_str("\r\n");
    ics
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Utc};

    fn utc(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    fn appointment() -> Appointment {
        Appointment {
            id: "test-123".to_string(),
            buyer_id: "b".to_string(),
            seller_id: "s".to_string(),
            title: "Haircut".to_string(),
            description: Some("Short, please; thanks".to_string()),
            start_time: utc("2025-03-15T14:00:00Z"),
            end_time: utc("2025-03-15T15:00:00Z"),
            status: AppointmentStatus::Confirmed,
            buyer_email: Some("buyer@example.com".to_string()),
            seller_email: None,
            google_calendar_event_id: None,
            meet_link: Some("https://meet.google.com/abc-defg-hij".to_string()),
            created_at: utc("2025-03-10T10:00:00Z"),
            updated_at: utc("2025-03-10T10:00:00Z"),
        }
    }

    #[test]
    fn test_generate_ics() {
        let ics = generate_ics(&appointment(), "Bob's Barbershop");
        assert!(ics.starts_with("BEGIN:VCALENDAR\r\n"));
        assert!(ics.contains("DTSTART:20250315T140000Z"));
        assert!(ics.contains("DTEND:20250315T150000Z"));
        assert!(ics.contains("SUMMARY:Haircut - Meeting with Bob's Barbershop"));
        assert!(ics.contains("DESCRIPTION:Short\\, please\\; thanks"));
        assert!(ics.contains("STATUS:CONFIRMED"));
        assert!(ics.contains("UID:test-123@appointly"));
        assert!(ics.contains("ATTENDEE:mailto:buyer@example.com"));
        assert!(!ics.contains("ATTENDEE:mailto:\r\n"));
        assert!(ics.contains("URL:https://meet.google.com/abc-defg-hij"));
        assert!(ics.ends_with("END:VEVENT\r\nEND:VCALENDAR\r\n"));
    }

    #[test]
    fn test_generate_ics_no_notes_pending() {
        let mut appt = appointment();
        appt.description = None;
        appt.status = AppointmentStatus::Pending;
        appt.meet_link = None;

        let ics = generate_ics(&appt, "Test Biz");
        assert!(ics.contains("DESCRIPTION:No additional notes"));
        assert!(ics.contains("STATUS:TENTATIVE"));
        assert!(!ics.contains("URL:"));
    }
}
