use anyhow::Context;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use crate::models::{
    Appointment, AppointmentStatus, AppointmentView, AvailabilitySettings, CalendarToken,
    Counterpart, Role, Seller, UserProfile,
};

/// Timestamps are stored as second-precision RFC 3339 UTC text so that
/// string comparison in SQL matches chronological order.
pub fn fmt_ts(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Secs, true)
}

pub fn parse_ts(s: &str) -> anyhow::Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(s)
        .with_context(|| format!("invalid stored timestamp: {s}"))?
        .with_timezone(&Utc))
}

pub fn ping(conn: &Connection) -> anyhow::Result<()> {
    conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))?;
    Ok(())
}

// ── User Profiles ──

pub fn create_profile(conn: &Connection, profile: &UserProfile) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO user_profiles (id, email, full_name, role, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            profile.id,
            profile.email,
            profile.full_name,
            profile.role.as_str(),
            fmt_ts(&profile.created_at),
        ],
    )?;
    Ok(())
}

pub fn get_profile(conn: &Connection, id: &str) -> anyhow::Result<Option<UserProfile>> {
    conn.query_row(
        "SELECT id, email, full_name, role, created_at FROM user_profiles WHERE id = ?1",
        params![id],
        |row| Ok(parse_profile_row(row)),
    )
    .optional()?
    .transpose()
}

pub fn profile_email_exists(conn: &Connection, email: &str) -> anyhow::Result<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM user_profiles WHERE email = ?1",
        params![email],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

fn parse_profile_row(row: &rusqlite::Row) -> anyhow::Result<UserProfile> {
    let role_str: String = row.get(3)?;
    let created_at: String = row.get(4)?;
    Ok(UserProfile {
        id: row.get(0)?,
        email: row.get(1)?,
        full_name: row.get(2)?,
        role: Role::parse(&role_str)
            .ok_or_else(|| anyhow::anyhow!("unknown role: {role_str}"))?,
        created_at: parse_ts(&created_at)?,
    })
}

// ── Sellers ──

const SELLER_COLUMNS: &str = "id, user_id, business_name, description, location, is_active, availability_settings, created_at";

pub fn create_seller(conn: &Connection, seller: &Seller) -> anyhow::Result<()> {
    let settings = seller
        .availability_settings
        .as_ref()
        .map(serde_json::to_string)
        .transpose()?;

    conn.execute(
        "INSERT INTO sellers (id, user_id, business_name, description, location, is_active, availability_settings, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            seller.id,
            seller.user_id,
            seller.business_name,
            seller.description,
            seller.location,
            seller.is_active as i32,
            settings,
            fmt_ts(&seller.created_at),
        ],
    )?;
    Ok(())
}

pub fn get_seller(conn: &Connection, id: &str) -> anyhow::Result<Option<Seller>> {
    conn.query_row(
        &format!("SELECT {SELLER_COLUMNS} FROM sellers WHERE id = ?1"),
        params![id],
        |row| Ok(parse_seller_row(row)),
    )
    .optional()?
    .transpose()
}

pub fn get_seller_by_user(conn: &Connection, user_id: &str) -> anyhow::Result<Option<Seller>> {
    conn.query_row(
        &format!("SELECT {SELLER_COLUMNS} FROM sellers WHERE user_id = ?1"),
        params![user_id],
        |row| Ok(parse_seller_row(row)),
    )
    .optional()?
    .transpose()
}

pub fn list_active_sellers(conn: &Connection) -> anyhow::Result<Vec<Seller>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {SELLER_COLUMNS} FROM sellers WHERE is_active = 1 ORDER BY created_at ASC"
    ))?;
    let rows = stmt.query_map([], |row| Ok(parse_seller_row(row)))?;

    let mut sellers = vec![];
    for row in rows {
        sellers.push(row??);
    }
    Ok(sellers)
}

pub fn update_seller_availability(
    conn: &Connection,
    id: &str,
    settings: &AvailabilitySettings,
) -> anyhow::Result<bool> {
    let json = serde_json::to_string(settings)?;
    let count = conn.execute(
        "UPDATE sellers SET availability_settings = ?1 WHERE id = ?2",
        params![json, id],
    )?;
    Ok(count > 0)
}

fn parse_seller_row(row: &rusqlite::Row) -> anyhow::Result<Seller> {
    let settings_json: Option<String> = row.get(6)?;
    let created_at: String = row.get(7)?;
    Ok(Seller {
        id: row.get(0)?,
        user_id: row.get(1)?,
        business_name: row.get(2)?,
        description: row.get(3)?,
        location: row.get(4)?,
        is_active: row.get::<_, i32>(5)? != 0,
        availability_settings: settings_json
            .map(|s| serde_json::from_str::<AvailabilitySettings>(&s))
            .transpose()
            .context("invalid stored availability settings")?,
        created_at: parse_ts(&created_at)?,
    })
}

// ── Appointments ──

const APPOINTMENT_COLUMNS: &str = "a.id, a.buyer_id, a.seller_id, a.title, a.description, a.start_time, a.end_time, a.status, \
     a.buyer_email, a.seller_email, a.google_calendar_event_id, a.meet_link, a.created_at, a.updated_at";

pub fn create_appointment(conn: &Connection, appt: &Appointment) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO appointments (id, buyer_id, seller_id, title, description, start_time, end_time, status,
                                   buyer_email, seller_email, google_calendar_event_id, meet_link, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
        params![
            appt.id,
            appt.buyer_id,
            appt.seller_id,
            appt.title,
            appt.description,
            fmt_ts(&appt.start_time),
            fmt_ts(&appt.end_time),
            appt.status.as_str(),
            appt.buyer_email,
            appt.seller_email,
            appt.google_calendar_event_id,
            appt.meet_link,
            fmt_ts(&appt.created_at),
            fmt_ts(&appt.updated_at),
        ],
    )?;
    Ok(())
}

pub fn get_appointment(conn: &Connection, id: &str) -> anyhow::Result<Option<Appointment>> {
    conn.query_row(
        &format!("SELECT {APPOINTMENT_COLUMNS} FROM appointments a WHERE a.id = ?1"),
        params![id],
        |row| Ok(parse_appointment_row(row)),
    )
    .optional()?
    .transpose()
}

/// Pending or confirmed appointments of a seller that overlap `[from, to)`.
pub fn get_blocking_appointments(
    conn: &Connection,
    seller_id: &str,
    from: &DateTime<Utc>,
    to: &DateTime<Utc>,
    exclude_id: Option<&str>,
) -> anyhow::Result<Vec<Appointment>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {APPOINTMENT_COLUMNS} FROM appointments a
         WHERE a.seller_id = ?1
           AND a.status IN ('pending', 'confirmed')
           AND a.start_time < ?3 AND a.end_time > ?2
           AND (?4 IS NULL OR a.id != ?4)
         ORDER BY a.start_time ASC"
    ))?;

    let rows = stmt.query_map(
        params![seller_id, fmt_ts(from), fmt_ts(to), exclude_id],
        |row| Ok(parse_appointment_row(row)),
    )?;

    let mut appointments = vec![];
    for row in rows {
        appointments.push(row??);
    }
    Ok(appointments)
}

pub fn list_buyer_appointments(
    conn: &Connection,
    buyer_id: &str,
) -> anyhow::Result<Vec<AppointmentView>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {APPOINTMENT_COLUMNS}, p.full_name, COALESCE(p.email, a.seller_email), s.business_name, s.location
         FROM appointments a
         INNER JOIN sellers s ON s.id = a.seller_id
         LEFT JOIN user_profiles p ON p.id = s.user_id
         WHERE a.buyer_id = ?1
         ORDER BY a.start_time ASC"
    ))?;

    let rows = stmt.query_map(params![buyer_id], |row| Ok(parse_view_row(row)))?;

    let mut views = vec![];
    for row in rows {
        views.push(row??);
    }
    Ok(views)
}

pub fn list_seller_appointments(
    conn: &Connection,
    seller_id: &str,
) -> anyhow::Result<Vec<AppointmentView>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {APPOINTMENT_COLUMNS}, p.full_name, COALESCE(p.email, a.buyer_email), NULL, NULL
         FROM appointments a
         LEFT JOIN user_profiles p ON p.id = a.buyer_id
         WHERE a.seller_id = ?1
         ORDER BY a.start_time ASC"
    ))?;

    let rows = stmt.query_map(params![seller_id], |row| Ok(parse_view_row(row)))?;

    let mut views = vec![];
    for row in rows {
        views.push(row??);
    }
    Ok(views)
}

pub fn update_appointment_status(
    conn: &Connection,
    id: &str,
    status: AppointmentStatus,
) -> anyhow::Result<bool> {
    let count = conn.execute(
        "UPDATE appointments SET status = ?1, updated_at = ?2 WHERE id = ?3",
        params![status.as_str(), fmt_ts(&Utc::now()), id],
    )?;
    Ok(count > 0)
}

pub fn set_calendar_details(
    conn: &Connection,
    id: &str,
    event_id: Option<&str>,
    meet_link: Option<&str>,
) -> anyhow::Result<bool> {
    let count = conn.execute(
        "UPDATE appointments
         SET google_calendar_event_id = COALESCE(?1, google_calendar_event_id),
             meet_link = COALESCE(?2, meet_link),
             updated_at = ?3
         WHERE id = ?4",
        params![event_id, meet_link, fmt_ts(&Utc::now()), id],
    )?;
    Ok(count > 0)
}

fn parse_appointment_row(row: &rusqlite::Row) -> anyhow::Result<Appointment> {
    let start_time: String = row.get(5)?;
    let end_time: String = row.get(6)?;
    let status_str: String = row.get(7)?;
    let created_at: String = row.get(12)?;
    let updated_at: String = row.get(13)?;

    Ok(Appointment {
        id: row.get(0)?,
        buyer_id: row.get(1)?,
        seller_id: row.get(2)?,
        title: row.get(3)?,
        description: row.get(4)?,
        start_time: parse_ts(&start_time)?,
        end_time: parse_ts(&end_time)?,
        status: AppointmentStatus::parse(&status_str)
            .ok_or_else(|| anyhow::anyhow!("unknown appointment status: {status_str}"))?,
        buyer_email: row.get(8)?,
        seller_email: row.get(9)?,
        google_calendar_event_id: row.get(10)?,
        meet_link: row.get(11)?,
        created_at: parse_ts(&created_at)?,
        updated_at: parse_ts(&updated_at)?,
    })
}

fn parse_view_row(row: &rusqlite::Row) -> anyhow::Result<AppointmentView> {
    Ok(AppointmentView {
        appointment: parse_appointment_row(row)?,
        counterpart: Counterpart {
            full_name: row.get(14)?,
            email: row.get(15)?,
            business_name: row.get(16)?,
            location: row.get(17)?,
        },
    })
}

// ── Calendar Tokens ──

pub fn upsert_token(conn: &Connection, token: &CalendarToken) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO google_calendar_tokens (user_id, user_type, access_token, refresh_token, expires_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)
         ON CONFLICT(user_id, user_type) DO UPDATE SET
           access_token = excluded.access_token,
           refresh_token = COALESCE(excluded.refresh_token, google_calendar_tokens.refresh_token),
           expires_at = excluded.expires_at,
           updated_at = excluded.updated_at",
        params![
            token.user_id,
            token.user_type.as_str(),
            token.access_token,
            token.refresh_token,
            fmt_ts(&token.expires_at),
            fmt_ts(&token.updated_at),
        ],
    )?;
    Ok(())
}

pub fn get_token(
    conn: &Connection,
    user_id: &str,
    user_type: Role,
) -> anyhow::Result<Option<CalendarToken>> {
    conn.query_row(
        "SELECT user_id, user_type, access_token, refresh_token, expires_at, updated_at
         FROM google_calendar_tokens WHERE user_id = ?1 AND user_type = ?2",
        params![user_id, user_type.as_str()],
        |row| Ok(parse_token_row(row)),
    )
    .optional()?
    .transpose()
}

/// All token rows of a user, most recently updated first.
pub fn get_tokens_for_user(conn: &Connection, user_id: &str) -> anyhow::Result<Vec<CalendarToken>> {
    let mut stmt = conn.prepare(
        "SELECT user_id, user_type, access_token, refresh_token, expires_at, updated_at
         FROM google_calendar_tokens WHERE user_id = ?1 ORDER BY updated_at DESC",
    )?;
    let rows = stmt.query_map(params![user_id], |row| Ok(parse_token_row(row)))?;

    let mut tokens = vec![];
    for row in rows {
        tokens.push(row??);
    }
    Ok(tokens)
}

fn parse_token_row(row: &rusqlite::Row) -> anyhow::Result<CalendarToken> {
    let user_type: String = row.get(1)?;
    let expires_at: String = row.get(4)?;
    let updated_at: String = row.get(5)?;
    Ok(CalendarToken {
        user_id: row.get(0)?,
        user_type: Role::parse(&user_type)
            .ok_or_else(|| anyhow::anyhow!("unknown token user type: {user_type}"))?,
        access_token: row.get(2)?,
        refresh_token: row.get(3)?,
        expires_at: parse_ts(&expires_at)?,
        updated_at: parse_ts(&updated_at)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use chrono::{Duration, TimeZone};

    fn setup_db() -> Connection {
        db::init_db(":memory:").unwrap()
    }

    fn ts(s: &str) -> DateTime<Utc> {
        parse_ts(s).unwrap()
    }

    fn profile(id: &str, role: Role) -> UserProfile {
        UserProfile {
            id: id.to_string(),
            email: format!("{id}@example.com"),
            full_name: Some(format!("User {id}")),
            role,
            created_at: Utc::now(),
        }
    }

    fn seller(id: &str, user_id: &str) -> Seller {
        Seller {
            id: id.to_string(),
            user_id: user_id.to_string(),
            business_name: Some("Studio".to_string()),
            description: None,
            location: Some("Zurich".to_string()),
            is_active: true,
            availability_settings: None,
            created_at: Utc::now(),
        }
    }

    fn appointment(id: &str, start: &str, end: &str, status: AppointmentStatus) -> Appointment {
        let now = Utc::now();
        Appointment {
            id: id.to_string(),
            buyer_id: "buyer".to_string(),
            seller_id: "shop".to_string(),
            title: "Session".to_string(),
            description: None,
            start_time: ts(start),
            end_time: ts(end),
            status,
            buyer_email: Some("buyer@example.com".to_string()),
            seller_email: Some("owner@example.com".to_string()),
            google_calendar_event_id: None,
            meet_link: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn seed(conn: &Connection) {
        create_profile(conn, &profile("buyer", Role::Buyer)).unwrap();
        create_profile(conn, &profile("owner", Role::Seller)).unwrap();
        create_seller(conn, &seller("shop", "owner")).unwrap();
    }

    #[test]
    fn test_timestamp_format_sorts_chronologically() {
        let a = Utc.with_ymd_and_hms(2025, 6, 16, 9, 0, 0).unwrap();
        let b = a + Duration::minutes(75);
        assert_eq!(fmt_ts(&a), "2025-06-16T09:00:00Z");
        assert!(fmt_ts(&a) < fmt_ts(&b));
        assert_eq!(parse_ts(&fmt_ts(&b)).unwrap(), b);
    }

    #[test]
    fn test_profile_round_trip() {
        let conn = setup_db();
        create_profile(&conn, &profile("p1", Role::Buyer)).unwrap();

        let loaded = get_profile(&conn, "p1").unwrap().unwrap();
        assert_eq!(loaded.email, "p1@example.com");
        assert_eq!(loaded.role, Role::Buyer);
        assert!(profile_email_exists(&conn, "p1@example.com").unwrap());
        assert!(get_profile(&conn, "missing").unwrap().is_none());
    }

    #[test]
    fn test_seller_settings_persist() {
        let conn = setup_db();
        seed(&conn);

        let mut settings = AvailabilitySettings::default();
        settings.slot_duration = 30;
        assert!(update_seller_availability(&conn, "shop", &settings).unwrap());
        assert!(!update_seller_availability(&conn, "nope", &settings).unwrap());

        let loaded = get_seller_by_user(&conn, "owner").unwrap().unwrap();
        assert_eq!(loaded.id, "shop");
        assert_eq!(loaded.availability_settings.unwrap().slot_duration, 30);
    }

    #[test]
    fn test_list_active_sellers_skips_inactive() {
        let conn = setup_db();
        seed(&conn);
        create_profile(&conn, &profile("owner2", Role::Seller)).unwrap();
        let mut closed = seller("closed", "owner2");
        closed.is_active = false;
        create_seller(&conn, &closed).unwrap();

        let sellers = list_active_sellers(&conn).unwrap();
        assert_eq!(sellers.len(), 1);
        assert_eq!(sellers[0].id, "shop");
    }

    #[test]
    fn test_blocking_appointments_use_overlap() {
        let conn = setup_db();
        seed(&conn);
        create_appointment(
            &conn,
            &appointment("a1", "2025-06-16T09:00:00Z", "2025-06-16T10:00:00Z", AppointmentStatus::Pending),
        )
        .unwrap();
        create_appointment(
            &conn,
            &appointment("a2", "2025-06-16T11:00:00Z", "2025-06-16T12:00:00Z", AppointmentStatus::Cancelled),
        )
        .unwrap();
        // Starts the previous evening and runs into the queried window.
        create_appointment(
            &conn,
            &appointment("a3", "2025-06-15T23:30:00Z", "2025-06-16T08:30:00Z", AppointmentStatus::Confirmed),
        )
        .unwrap();

        let found = get_blocking_appointments(
            &conn,
            "shop",
            &ts("2025-06-16T08:00:00Z"),
            &ts("2025-06-16T13:00:00Z"),
            None,
        )
        .unwrap();
        let ids: Vec<&str> = found.iter().map(|a| a.id.as_str()).collect();
        assert_eq!(ids, vec!["a3", "a1"]);

        // Touching the end of a1 is not an overlap.
        let found = get_blocking_appointments(
            &conn,
            "shop",
            &ts("2025-06-16T10:00:00Z"),
            &ts("2025-06-16T11:00:00Z"),
            None,
        )
        .unwrap();
        assert!(found.is_empty());

        let found = get_blocking_appointments(
            &conn,
            "shop",
            &ts("2025-06-16T09:30:00Z"),
            &ts("2025-06-16T09:45:00Z"),
            Some("a1"),
        )
        .unwrap();
        assert!(found.is_empty());
    }

    #[test]
    fn test_views_carry_counterpart() {
        let conn = setup_db();
        seed(&conn);
        create_appointment(
            &conn,
            &appointment("a1", "2025-06-17T09:00:00Z", "2025-06-17T10:00:00Z", AppointmentStatus::Pending),
        )
        .unwrap();
        create_appointment(
            &conn,
            &appointment("a0", "2025-06-16T09:00:00Z", "2025-06-16T10:00:00Z", AppointmentStatus::Pending),
        )
        .unwrap();

        let for_buyer = list_buyer_appointments(&conn, "buyer").unwrap();
        assert_eq!(for_buyer.len(), 2);
        assert_eq!(for_buyer[0].appointment.id, "a0");
        assert_eq!(for_buyer[0].counterpart.business_name.as_deref(), Some("Studio"));
        assert_eq!(for_buyer[0].counterpart.email.as_deref(), Some("owner@example.com"));

        let for_seller = list_seller_appointments(&conn, "shop").unwrap();
        assert_eq!(for_seller.len(), 2);
        assert_eq!(for_seller[1].counterpart.full_name.as_deref(), Some("User buyer"));
        assert!(for_seller[1].counterpart.business_name.is_none());
    }

    #[test]
    fn test_status_and_calendar_updates() {
        let conn = setup_db();
        seed(&conn);
        create_appointment(
            &conn,
            &appointment("a1", "2025-06-16T09:00:00Z", "2025-06-16T10:00:00Z", AppointmentStatus::Pending),
        )
        .unwrap();

        assert!(update_appointment_status(&conn, "a1", AppointmentStatus::Confirmed).unwrap());
        assert!(!update_appointment_status(&conn, "zzz", AppointmentStatus::Confirmed).unwrap());

        set_calendar_details(&conn, "a1", Some("evt-1"), Some("https://meet.example/abc")).unwrap();
        set_calendar_details(&conn, "a1", None, None).unwrap();

        let loaded = get_appointment(&conn, "a1").unwrap().unwrap();
        assert_eq!(loaded.status, AppointmentStatus::Confirmed);
        assert_eq!(loaded.google_calendar_event_id.as_deref(), Some("evt-1"));
        assert_eq!(loaded.meet_link.as_deref(), Some("https://meet.example/abc"));
    }

    #[test]
    fn test_token_upsert_keeps_refresh_token() {
        let conn = setup_db();
        seed(&conn);
        let now = Utc::now();
        let mut token = CalendarToken {
            user_id: "owner".to_string(),
            user_type: Role::Seller,
            access_token: "first".to_string(),
            refresh_token: Some("refresh".to_string()),
            expires_at: now + Duration::hours(1),
            updated_at: now,
        };
        upsert_token(&conn, &token).unwrap();

        token.access_token = "second".to_string();
        token.refresh_token = None;
        upsert_token(&conn, &token).unwrap();

        let loaded = get_token(&conn, "owner", Role::Seller).unwrap().unwrap();
        assert_eq!(loaded.access_token, "second");
        assert_eq!(loaded.refresh_token.as_deref(), Some("refresh"));
        assert!(get_token(&conn, "owner", Role::Buyer).unwrap().is_none());
        assert_eq!(get_tokens_for_user(&conn, "owner").unwrap().len(), 1);
    }
}
