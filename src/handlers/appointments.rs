use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::db::queries;
use crate::errors::AppError;
use crate::handlers::{check_auth, required};
use crate::models::{Appointment, AppointmentStatus, AppointmentView, Role};
use crate::services::booking::{self, BookingOutcome, NewAppointment};
use crate::state::AppState;

// POST /api/appointments
#[derive(Deserialize)]
pub struct CreateAppointmentRequest {
    pub buyer_id: String,
    pub seller_id: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub title: String,
    pub description: Option<String>,
}

pub async fn create_appointment(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Result<Json<CreateAppointmentRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<BookingOutcome>), AppError> {
    check_auth(&headers, &state.config.api_token)?;
    let Json(body) = body?;

    let req = NewAppointment {
        buyer_id: body.buyer_id,
        seller_id: body.seller_id,
        title: body.title,
        description: body.description,
        start_time: body.start_time,
        end_time: body.end_time,
    };
    let outcome = booking::create_appointment(&state, req, Utc::now()).await?;
    Ok((StatusCode::CREATED, Json(outcome)))
}

// GET /api/appointments?user_id=&role=
#[derive(Deserialize)]
pub struct ListQuery {
    pub user_id: Option<String>,
    pub role: Option<String>,
}

#[derive(Serialize)]
pub struct AppointmentsResponse {
    appointments: Vec<AppointmentView>,
}

pub async fn list_appointments(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<ListQuery>,
) -> Result<Json<AppointmentsResponse>, AppError> {
    check_auth(&headers, &state.config.api_token)?;

    let user_id = required(query.user_id, "user_id")?;
    let role = required(query.role, "role")?;
    let role = Role::parse(&role)
        .ok_or_else(|| AppError::Validation("role must be buyer or seller".to_string()))?;

    let appointments = booking::list_appointments(&state, &user_id, role)?;
    Ok(Json(AppointmentsResponse { appointments }))
}

// GET /api/appointments/:id
pub async fn get_appointment(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<Appointment>, AppError> {
    check_auth(&headers, &state.config.api_token)?;

    let db = state.db()?;
    let appointment = queries::get_appointment(&db, &id)?
        .ok_or_else(|| AppError::NotFound("appointment".to_string()))?;
    Ok(Json(appointment))
}

// PATCH /api/appointments/:id/status
#[derive(Deserialize)]
pub struct UpdateStatusRequest {
    pub status: String,
    pub user_id: String,
}

pub async fn update_status(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    body: Result<Json<UpdateStatusRequest>, JsonRejection>,
) -> Result<Json<Appointment>, AppError> {
    check_auth(&headers, &state.config.api_token)?;
    let Json(body) = body?;

    let status = AppointmentStatus::parse(&body.status).ok_or_else(|| {
        AppError::Validation(
            "status must be one of pending, confirmed, cancelled, completed".to_string(),
        )
    })?;

    let appointment = booking::update_status(&state, &id, status, &body.user_id)?;
    Ok(Json(appointment))
}
