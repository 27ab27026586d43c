use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderMap};
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::db::queries;
use crate::errors::AppError;
use crate::handlers::{check_auth, required};
use crate::models::{CalendarToken, Role};
use crate::services::calendar::ics::generate_ics;
use crate::state::AppState;

// GET /api/appointments/:id/ics
pub async fn download_ics(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(raw_id): Path<String>,
) -> Result<Response, AppError> {
    check_auth(&headers, &state.config.api_token)?;

    // Strip .ics suffix if present
    let appointment_id = raw_id.strip_suffix(".ics").unwrap_or(&raw_id);

    let (appointment, counterpart) = {
        let db = state.db()?;
        let appointment = queries::get_appointment(&db, appointment_id)?
            .ok_or_else(|| AppError::NotFound("appointment".to_string()))?;

        // Name the event after the business, falling back to its owner.
        let seller = queries::get_seller(&db, &appointment.seller_id)?;
        let business = seller
            .as_ref()
            .and_then(|s| s.business_name.clone())
            .filter(|n| !n.trim().is_empty());
        let counterpart = match (business, seller) {
            (Some(name), _) => name,
            (None, Some(seller)) => queries::get_profile(&db, &seller.user_id)?
                .map(|p| p.display_name("Seller").to_string())
                .unwrap_or_else(|| "Seller".to_string()),
            (None, None) => "Seller".to_string(),
        };
        (appointment, counterpart)
    };

    let ics = generate_ics(&appointment, &counterpart);
    let filename = format!("appointment-{}.ics", appointment.id);

    Ok((
        [
            (header::CONTENT_TYPE, "text/calendar; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{filename}\""),
            ),
        ],
        ics,
    )
        .into_response())
}

// POST /api/calendar/tokens
#[derive(Deserialize)]
pub struct StoreTokensRequest {
    pub user_id: String,
    pub user_type: String,
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_at: DateTime<Utc>,
}

pub async fn store_tokens(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Result<Json<StoreTokensRequest>, JsonRejection>,
) -> Result<Json<serde_json::Value>, AppError> {
    check_auth(&headers, &state.config.api_token)?;
    let Json(body) = body?;

    if body.access_token.trim().is_empty() {
        return Err(AppError::Validation("access_token is required".to_string()));
    }
    let user_type = Role::parse(&body.user_type)
        .ok_or_else(|| AppError::Validation("user_type must be buyer or seller".to_string()))?;

    let token = CalendarToken {
        user_id: body.user_id,
        user_type,
        access_token: body.access_token,
        refresh_token: body.refresh_token.filter(|t| !t.is_empty()),
        expires_at: body.expires_at,
        updated_at: Utc::now(),
    };

    {
        let db = state.db()?;
        if queries::get_profile(&db, &token.user_id)?.is_none() {
            return Err(AppError::NotFound("user".to_string()));
        }
        queries::upsert_token(&db, &token)?;
    }

    tracing::info!(user_id = %token.user_id, user_type = user_type.as_str(), "calendar tokens stored");
    Ok(Json(serde_json::json!({"success": true})))
}

// GET /api/calendar/tokens?user_id=&user_type=
#[derive(Deserialize)]
pub struct TokensQuery {
    pub user_id: Option<String>,
    pub user_type: Option<String>,
}

#[derive(Serialize)]
pub struct TokensResponse {
    connected: bool,
    tokens: CalendarToken,
}

pub async fn get_tokens(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<TokensQuery>,
) -> Result<Json<TokensResponse>, AppError> {
    check_auth(&headers, &state.config.api_token)?;

    let user_id = required(query.user_id, "user_id")?;
    let user_type = required(query.user_type, "user_type")?;
    let user_type = Role::parse(&user_type)
        .ok_or_else(|| AppError::Validation("user_type must be buyer or seller".to_string()))?;

    let token = {
        let db = state.db()?;
        queries::get_token(&db, &user_id, user_type)?
            .ok_or_else(|| AppError::NotFound("calendar tokens".to_string()))?
    };

    Ok(Json(TokensResponse {
        connected: !token.is_expired(Utc::now()),
        tokens: token,
    }))
}

// GET /api/calendar/status?user_id=
#[derive(Deserialize)]
pub struct StatusQuery {
    pub user_id: Option<String>,
}

#[derive(Serialize)]
pub struct StatusResponse {
    connected: bool,
    expires_at: Option<DateTime<Utc>>,
}

pub async fn connection_status(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<StatusQuery>,
) -> Result<Json<StatusResponse>, AppError> {
    check_auth(&headers, &state.config.api_token)?;

    let user_id = required(query.user_id, "user_id")?;
    let tokens = {
        let db = state.db()?;
        queries::get_tokens_for_user(&db, &user_id)?
    };

    let now = Utc::now();
    let live = tokens.iter().filter(|t| !t.is_expired(now)).map(|t| t.expires_at).max();
    Ok(Json(StatusResponse {
        connected: live.is_some(),
        expires_at: live,
    }))
}
