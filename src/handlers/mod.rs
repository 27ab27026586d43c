pub mod appointments;
pub mod calendar;
pub mod health;
pub mod profiles;
pub mod sellers;

use std::sync::Arc;

use axum::http::HeaderMap;
use axum::routing::{get, patch, post, put};
use axum::Router;

use crate::errors::AppError;
use crate::state::AppState;

/// Checks `Authorization: Bearer <token>`. An empty `expected_token` turns the
/// check off.
pub fn check_auth(headers: &HeaderMap, expected_token: &str) -> Result<(), AppError> {
    if expected_token.is_empty() {
        return Ok(());
    }

    let auth = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    let token = auth.strip_prefix("Bearer ").unwrap_or("");
    if token != expected_token {
        return Err(AppError::Unauthorized);
    }
    Ok(())
}

/// Unwraps a query parameter the route cannot do without.
pub(crate) fn required<T>(value: Option<T>, name: &str) -> Result<T, AppError> {
    value.ok_or_else(|| AppError::Validation(format!("{name} is required")))
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health::health))
        .route("/api/profiles", post(profiles::create_profile))
        .route("/api/profiles/:id", get(profiles::get_profile))
        .route("/api/sellers", post(sellers::create_seller))
        .route("/api/sellers/available", get(sellers::list_available))
        .route(
            "/api/sellers/:id/availability",
            put(sellers::update_availability),
        )
        .route("/api/sellers/:id/slots", get(sellers::get_slots))
        .route(
            "/api/appointments",
            post(appointments::create_appointment).get(appointments::list_appointments),
        )
        .route("/api/appointments/:id", get(appointments::get_appointment))
        .route(
            "/api/appointments/:id/status",
            patch(appointments::update_status),
        )
        .route("/api/appointments/:id/ics", get(calendar::download_ics))
        .route(
            "/api/calendar/tokens",
            post(calendar::store_tokens).get(calendar::get_tokens),
        )
        .route("/api/calendar/status", get(calendar::connection_status))
        .with_state(state)
}
