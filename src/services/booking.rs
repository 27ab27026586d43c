use chrono::{DateTime, Duration, NaiveDate, SubsecRound, Utc};
use serde::Serialize;

use crate::db::queries;
use crate::errors::AppError;
use crate::models::{
    Appointment, AppointmentStatus, AppointmentView, CalendarToken, Role, UserProfile,
};
use crate::services::availability::{self, Interval, Slot};
use crate::services::calendar::{CalendarProvider, CreatedEvent, NewCalendarEvent};
use crate::services::scheduling;
use crate::state::AppState;

#[derive(Debug, Clone)]
pub struct NewAppointment {
    pub buyer_id: String,
    pub seller_id: String,
    pub title: String,
    pub description: Option<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

/// What happened when pushing the appointment to each party's calendar.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CalendarReport {
    pub buyer_event_created: bool,
    pub seller_event_created: bool,
    pub buyer_event_id: Option<String>,
    pub seller_event_id: Option<String>,
    pub errors: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BookingOutcome {
    pub appointment: Appointment,
    pub calendar: CalendarReport,
}

pub async fn create_appointment(
    state: &AppState,
    req: NewAppointment,
    now: DateTime<Utc>,
) -> Result<BookingOutcome, AppError> {
    let title = req.title.trim();
    if title.is_empty() {
        return Err(AppError::Validation("title is required".to_string()));
    }
    let default_tz = state.config.default_tz()?;
    let (start_time, end_time) = whole_seconds(req.start_time, req.end_time);

    let (mut appointment, buyer, owner, buyer_token, seller_token) = {
        let mut db = state.db()?;

        let buyer = queries::get_profile(&db, &req.buyer_id)?
            .ok_or_else(|| AppError::NotFound("buyer".to_string()))?;
        let seller = queries::get_seller(&db, &req.seller_id)?
            .filter(|s| s.is_active)
            .ok_or_else(|| AppError::NotFound("seller".to_string()))?;
        let owner = queries::get_profile(&db, &seller.user_id)?
            .ok_or_else(|| AppError::NotFound("seller profile".to_string()))?;

        let settings = seller.settings();
        let tz = settings.tz_or(default_tz);

        // Check and insert under one lock and one transaction so two requests
        // for the same slot cannot both pass the conflict check.
        let tx = db.transaction()?;
        scheduling::validate_appointment_window(
            &tx,
            &seller.id,
            start_time,
            end_time,
            &settings,
            tz,
            now,
        )?;

        let appointment = Appointment {
            id: uuid::Uuid::new_v4().to_string(),
            buyer_id: buyer.id.clone(),
            seller_id: seller.id.clone(),
            title: title.to_string(),
            description: req.description.filter(|d| !d.trim().is_empty()),
            start_time,
            end_time,
            status: AppointmentStatus::Pending,
            buyer_email: Some(buyer.email.clone()),
            seller_email: Some(owner.email.clone()),
            google_calendar_event_id: None,
            meet_link: None,
            created_at: now,
            updated_at: now,
        };
        queries::create_appointment(&tx, &appointment)?;
        tx.commit()?;

        let buyer_token = queries::get_token(&db, &buyer.id, Role::Buyer)?;
        let seller_token = queries::get_token(&db, &owner.id, Role::Seller)?;
        (appointment, buyer, owner, buyer_token, seller_token)
    };

    tracing::info!(
        appointment_id = %appointment.id,
        seller_id = %appointment.seller_id,
        start = %appointment.start_time,
        "appointment created"
    );

    let (calendar, meet_link) = match state.calendar.as_deref() {
        Some(provider) => {
            sync_calendars(
                provider,
                &appointment,
                (&buyer, buyer_token.as_ref()),
                (&owner, seller_token.as_ref()),
                now,
            )
            .await
        }
        None => (CalendarReport::default(), None),
    };

    let event_id = calendar
        .buyer_event_id
        .clone()
        .or_else(|| calendar.seller_event_id.clone());
    if event_id.is_some() || meet_link.is_some() {
        let db = state.db()?;
        queries::set_calendar_details(
            &db,
            &appointment.id,
            event_id.as_deref(),
            meet_link.as_deref(),
        )?;
        appointment.google_calendar_event_id = event_id;
        appointment.meet_link = meet_link;
    }

    Ok(BookingOutcome {
        appointment,
        calendar,
    })
}

/// Widens `[start, end)` outward to whole seconds, the precision appointments
/// are stored and compared at, so the stored interval covers the requested one.
fn whole_seconds(start: DateTime<Utc>, end: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
    let end = if end.timestamp_subsec_nanos() == 0 {
        end
    } else {
        end.trunc_subsecs(0) + Duration::seconds(1)
    };
    (start.trunc_subsecs(0), end)
}

/// Creates one event per connected party. Failures are collected, never
/// propagated: the appointment already exists at this point.
async fn sync_calendars(
    provider: &dyn CalendarProvider,
    appointment: &Appointment,
    buyer: (&UserProfile, Option<&CalendarToken>),
    seller: (&UserProfile, Option<&CalendarToken>),
    now: DateTime<Utc>,
) -> (CalendarReport, Option<String>) {
    let (buyer_profile, buyer_token) = buyer;
    let (seller_profile, seller_token) = seller;
    let attendees = vec![buyer_profile.email.clone(), seller_profile.email.clone()];

    let buyer_event = event_for(appointment, seller_profile, "Seller", &attendees);
    let seller_event = event_for(appointment, buyer_profile, "Client", &attendees);

    let mut report = CalendarReport::default();
    let mut meet_link = None;

    match push_event(provider, buyer_token, &buyer_event, now).await {
        Some(Ok(created)) => {
            tracing::info!(event_id = %created.id, "buyer calendar event created");
            report.buyer_event_created = true;
            report.buyer_event_id = Some(created.id);
            meet_link = created.meet_link;
        }
        Some(Err(e)) => {
            tracing::warn!(error = %e, "buyer calendar event failed");
            report.errors.push(format!("buyer calendar: {e}"));
        }
        None => {}
    }

    match push_event(provider, seller_token, &seller_event, now).await {
        Some(Ok(created)) => {
            tracing::info!(event_id = %created.id, "seller calendar event created");
            report.seller_event_created = true;
            report.seller_event_id = Some(created.id);
            meet_link = meet_link.or(created.meet_link);
        }
        Some(Err(e)) => {
            tracing::warn!(error = %e, "seller calendar event failed");
            report.errors.push(format!("seller calendar: {e}"));
        }
        None => {}
    }

    (report, meet_link)
}

/// `None` when the user has no calendar connected.
async fn push_event(
    provider: &dyn CalendarProvider,
    token: Option<&CalendarToken>,
    event: &NewCalendarEvent,
    now: DateTime<Utc>,
) -> Option<Result<CreatedEvent, String>> {
    let token = token?;
    if token.is_expired(now) {
        return Some(Err("access token expired".to_string()));
    }
    Some(
        provider
            .create_event(&token.access_token, event)
            .await
            .map_err(|e| format!("{e:#}")),
    )
}

fn event_for(
    appointment: &Appointment,
    other: &UserProfile,
    fallback_name: &str,
    attendees: &[String],
) -> NewCalendarEvent {
    let name = other.display_name(fallback_name);
    let details = format!("Appointment with: {name}\nEmail: {}", other.email);
    let description = match appointment.description.as_deref() {
        Some(d) => format!("{d}\n\n{details}"),
        None => details,
    };

    NewCalendarEvent {
        summary: format!("{} - Meeting with {name}", appointment.title),
        description: Some(description),
        start: appointment.start_time,
        end: appointment.end_time,
        attendees: attendees.to_vec(),
    }
}

pub fn list_appointments(
    state: &AppState,
    user_id: &str,
    role: Role,
) -> Result<Vec<AppointmentView>, AppError> {
    let db = state.db()?;
    match role {
        Role::Buyer => Ok(queries::list_buyer_appointments(&db, user_id)?),
        Role::Seller => match queries::get_seller_by_user(&db, user_id)? {
            Some(seller) => Ok(queries::list_seller_appointments(&db, &seller.id)?),
            None => Ok(vec![]),
        },
    }
}

pub fn update_status(
    state: &AppState,
    appointment_id: &str,
    status: AppointmentStatus,
    user_id: &str,
) -> Result<Appointment, AppError> {
    let mut db = state.db()?;
    let tx = db.transaction()?;

    let appointment = queries::get_appointment(&tx, appointment_id)?
        .ok_or_else(|| AppError::NotFound("appointment".to_string()))?;
    let seller = queries::get_seller(&tx, &appointment.seller_id)?;

    let is_buyer = appointment.buyer_id == user_id;
    let is_seller = seller.is_some_and(|s| s.user_id == user_id);
    if !is_buyer && !is_seller {
        return Err(AppError::Forbidden(
            "only the buyer or the seller can update this appointment".to_string(),
        ));
    }

    // Bringing a cancelled or completed appointment back must not double-book.
    if status.is_blocking() && !appointment.status.is_blocking() {
        scheduling::check_conflicts(
            &tx,
            &appointment.seller_id,
            appointment.start_time,
            appointment.end_time,
            Some(&appointment.id),
        )?;
    }

    queries::update_appointment_status(&tx, appointment_id, status)?;
    let updated = queries::get_appointment(&tx, appointment_id)?
        .ok_or_else(|| AppError::NotFound("appointment".to_string()))?;
    tx.commit()?;

    tracing::info!(
        appointment_id = %appointment_id,
        from = appointment.status.as_str(),
        to = status.as_str(),
        "appointment status changed"
    );
    Ok(updated)
}

/// Slots for one day of a seller's calendar, marked against pending and
/// confirmed appointments and, when the seller's calendar is reachable, the
/// busy periods it reports.
pub async fn available_slots(
    state: &AppState,
    seller_id: &str,
    date: NaiveDate,
    now: DateTime<Utc>,
) -> Result<Vec<Slot>, AppError> {
    let default_tz = state.config.default_tz()?;

    let (settings, tz, token, mut busy) = {
        let db = state.db()?;
        let seller = queries::get_seller(&db, seller_id)?
            .ok_or_else(|| AppError::NotFound("seller".to_string()))?;

        let tokens = queries::get_tokens_for_user(&db, &seller.user_id)?;
        let token = CalendarToken::preferred(&tokens, Role::Seller, now)
            .cloned()
            .ok_or_else(|| {
                AppError::Validation("seller has not connected a calendar".to_string())
            })?;

        let settings = seller.settings();
        let tz = settings.tz_or(default_tz);
        let (day_start, day_end) = availability::day_bounds(date, tz);
        let busy: Vec<Interval> =
            queries::get_blocking_appointments(&db, &seller.id, &day_start, &day_end, None)?
                .into_iter()
                .map(|a| (a.start_time, a.end_time))
                .collect();
        (settings, tz, token, busy)
    };

    if let Some(provider) = state.calendar.as_deref() {
        if token.is_expired(now) {
            tracing::info!(seller_id = %seller_id, "seller calendar token expired, busy periods skipped");
        } else {
            let (day_start, day_end) = availability::day_bounds(date, tz);
            match provider
                .busy_periods(&token.access_token, day_start, day_end)
                .await
            {
                Ok(periods) => busy.extend(periods),
                Err(e) => {
                    tracing::warn!(error = %e, seller_id = %seller_id, "could not read seller calendar")
                }
            }
        }
    }

    let slots = availability::generate_slots(&settings, date, tz);
    Ok(availability::mark_availability(slots, &busy, now))
}
