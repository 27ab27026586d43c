use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use rusqlite::Connection;

use crate::db::queries;
use crate::models::AvailabilitySettings;
use crate::services::availability::fits_working_hours;

#[derive(Debug, thiserror::Error)]
pub enum SchedulingError {
    #[error("end time must be after start time")]
    InvalidRange,

    #[error("appointments must start in the future")]
    InPast,

    #[error("that time is outside the seller's working hours ({hours})")]
    OutsideWorkingHours { hours: String },

    #[error("time slot is no longer available")]
    Conflict { appointment_id: String },

    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

/// Full check for a new booking of `[start, end)` with a seller.
pub fn validate_appointment_window(
    conn: &Connection,
    seller_id: &str,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    settings: &AvailabilitySettings,
    tz: Tz,
    now: DateTime<Utc>,
) -> Result<(), SchedulingError> {
    if end <= start {
        return Err(SchedulingError::InvalidRange);
    }
    if start <= now {
        return Err(SchedulingError::InPast);
    }
    if !fits_working_hours(settings, start, end, tz) {
        return Err(SchedulingError::OutsideWorkingHours {
            hours: settings.to_human_readable(),
        });
    }
    check_conflicts(conn, seller_id, start, end, None)
}

/// Rejects `[start, end)` if it overlaps a pending or confirmed appointment of
/// the seller other than `exclude_id`.
pub fn check_conflicts(
    conn: &Connection,
    seller_id: &str,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    exclude_id: Option<&str>,
) -> Result<(), SchedulingError> {
    let overlapping = queries::get_blocking_appointments(conn, seller_id, &start, &end, exclude_id)?;

    match overlapping.into_iter().next() {
        Some(existing) => Err(SchedulingError::Conflict {
            appointment_id: existing.id,
        }),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use crate::models::{Appointment, AppointmentStatus, Role, Seller, UserProfile};
    use chrono::Duration;

    fn setup_db() -> Connection {
        let conn = db::init_db(":memory:").unwrap();
        let now = Utc::now();
        for (id, role) in [("buyer", Role::Buyer), ("owner", Role::Seller)] {
            queries::create_profile(
                &conn,
                &UserProfile {
                    id: id.to_string(),
                    email: format!("{id}@example.com"),
                    full_name: None,
                    role,
                    created_at: now,
                },
            )
            .unwrap();
        }
        queries::create_seller(
            &conn,
            &Seller {
                id: "shop".to_string(),
                user_id: "owner".to_string(),
                business_name: None,
                description: None,
                location: None,
                is_active: true,
                availability_settings: None,
                created_at: now,
            },
        )
        .unwrap();
        conn
    }

    fn utc(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    fn book(conn: &Connection, id: &str, start: &str, minutes: i64, status: AppointmentStatus) {
        let now = Utc::now();
        let start = utc(start);
        queries::create_appointment(
            conn,
            &Appointment {
                id: id.to_string(),
                buyer_id: "buyer".to_string(),
                seller_id: "shop".to_string(),
                title: "Fitting".to_string(),
                description: None,
                start_time: start,
                end_time: start + Duration::minutes(minutes),
                status,
                buyer_email: None,
                seller_email: None,
                google_calendar_event_id: None,
                meet_link: None,
                created_at: now,
                updated_at: now,
            },
        )
        .unwrap();
    }

    fn validate(conn: &Connection, start: &str, end: &str) -> Result<(), SchedulingError> {
        validate_appointment_window(
            conn,
            "shop",
            utc(start),
            utc(end),
            &AvailabilitySettings::default(),
            Tz::UTC,
            utc("2025-06-01T00:00:00Z"),
        )
    }

    #[test]
    fn test_valid_window() {
        let conn = setup_db();
        assert!(validate(&conn, "2025-06-16T10:00:00Z", "2025-06-16T11:00:00Z").is_ok());
    }

    #[test]
    fn test_inverted_range() {
        let conn = setup_db();
        let err = validate(&conn, "2025-06-16T11:00:00Z", "2025-06-16T11:00:00Z").unwrap_err();
        assert!(matches!(err, SchedulingError::InvalidRange));
    }

    #[test]
    fn test_past_start() {
        let conn = setup_db();
        let err = validate(&conn, "2025-05-19T10:00:00Z", "2025-05-19T11:00:00Z").unwrap_err();
        assert!(matches!(err, SchedulingError::InPast));
    }

    #[test]
    fn test_outside_working_hours() {
        let conn = setup_db();
        let err = validate(&conn, "2025-06-16T16:30:00Z", "2025-06-16T17:30:00Z").unwrap_err();
        match err {
            SchedulingError::OutsideWorkingHours { hours } => {
                assert!(hours.starts_with("Mon: 09:00-17:00"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_conflict_with_existing_appointment() {
        let conn = setup_db();
        book(&conn, "existing", "2025-06-16T10:00:00Z", 60, AppointmentStatus::Confirmed);

        // Starts before the existing one and runs into it. A check on start
        // times alone would miss this.
        let err = validate(&conn, "2025-06-16T09:30:00Z", "2025-06-16T10:30:00Z").unwrap_err();
        match err {
            SchedulingError::Conflict { appointment_id } => assert_eq!(appointment_id, "existing"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_adjacent_appointment_is_fine() {
        let conn = setup_db();
        book(&conn, "existing", "2025-06-16T10:00:00Z", 60, AppointmentStatus::Pending);
        assert!(validate(&conn, "2025-06-16T11:00:00Z", "2025-06-16T12:00:00Z").is_ok());
        assert!(validate(&conn, "2025-06-16T09:00:00Z", "2025-06-16T10:00:00Z").is_ok());
    }

    #[test]
    fn test_cancelled_appointment_does_not_block() {
        let conn = setup_db();
        book(&conn, "gone", "2025-06-16T10:00:00Z", 60, AppointmentStatus::Cancelled);
        assert!(validate(&conn, "2025-06-16T10:00:00Z", "2025-06-16T11:00:00Z").is_ok());
    }

    #[test]
    fn test_check_conflicts_excludes_self() {
        let conn = setup_db();
        book(&conn, "me", "2025-06-16T10:00:00Z", 60, AppointmentStatus::Pending);
        let start = utc("2025-06-16T10:00:00Z");
        let end = utc("2025-06-16T11:00:00Z");
        assert!(check_conflicts(&conn, "shop", start, end, Some("me")).is_ok());
        assert!(check_conflicts(&conn, "shop", start, end, None).is_err());
    }
}
