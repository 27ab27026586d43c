use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::db::queries;
use crate::errors::AppError;
use crate::handlers::{check_auth, required};
use crate::models::{AvailabilitySettings, CalendarToken, Role, Seller, SellerListing};
use crate::services::availability::Slot;
use crate::services::booking;
use crate::state::AppState;

// POST /api/sellers
#[derive(Deserialize)]
pub struct CreateSellerRequest {
    pub user_id: String,
    pub business_name: Option<String>,
    pub description: Option<String>,
    pub location: Option<String>,
    pub availability_settings: Option<AvailabilitySettings>,
}

pub async fn create_seller(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Result<Json<CreateSellerRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Seller>), AppError> {
    check_auth(&headers, &state.config.api_token)?;
    let Json(body) = body?;

    if let Some(settings) = &body.availability_settings {
        settings
            .validate()
            .map_err(|e| AppError::Validation(e.to_string()))?;
    }

    let db = state.db()?;
    let owner = queries::get_profile(&db, &body.user_id)?
        .ok_or_else(|| AppError::NotFound("user".to_string()))?;
    if owner.role != Role::Seller {
        return Err(AppError::Validation(
            "only seller profiles can register a business".to_string(),
        ));
    }
    if queries::get_seller_by_user(&db, &owner.id)?.is_some() {
        return Err(AppError::Conflict("user already has a seller profile".to_string()));
    }

    let seller = Seller {
        id: uuid::Uuid::new_v4().to_string(),
        user_id: owner.id,
        business_name: body.business_name,
        description: body.description,
        location: body.location,
        is_active: true,
        availability_settings: body.availability_settings,
        created_at: Utc::now(),
    };
    queries::create_seller(&db, &seller)?;

    tracing::info!(seller_id = %seller.id, user_id = %seller.user_id, "seller created");
    Ok((StatusCode::CREATED, Json(seller)))
}

// GET /api/sellers/available
#[derive(Serialize)]
pub struct SellersResponse {
    sellers: Vec<SellerListing>,
}

pub async fn list_available(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<SellersResponse>, AppError> {
    check_auth(&headers, &state.config.api_token)?;

    let now = Utc::now();
    let db = state.db()?;
    let mut sellers = vec![];
    for seller in queries::list_active_sellers(&db)? {
        let owner = queries::get_profile(&db, &seller.user_id)?;
        let tokens = queries::get_tokens_for_user(&db, &seller.user_id)?;
        let token = CalendarToken::preferred(&tokens, Role::Seller, now);
        sellers.push(SellerListing::new(&seller, owner.as_ref(), token, now));
    }

    Ok(Json(SellersResponse { sellers }))
}

// PUT /api/sellers/:id/availability
pub async fn update_availability(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    settings: Result<Json<AvailabilitySettings>, JsonRejection>,
) -> Result<Json<AvailabilitySettings>, AppError> {
    check_auth(&headers, &state.config.api_token)?;
    let Json(settings) = settings?;

    settings
        .validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let db = state.db()?;
    if !queries::update_seller_availability(&db, &id, &settings)? {
        return Err(AppError::NotFound("seller".to_string()));
    }

    tracing::info!(seller_id = %id, hours = %settings.to_human_readable(), "availability updated");
    Ok(Json(settings))
}

// GET /api/sellers/:id/slots?date=YYYY-MM-DD
#[derive(Deserialize)]
pub struct SlotsQuery {
    pub date: Option<String>,
}

#[derive(Serialize)]
pub struct SlotsResponse {
    date: NaiveDate,
    slots: Vec<Slot>,
}

pub async fn get_slots(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Query(query): Query<SlotsQuery>,
) -> Result<Json<SlotsResponse>, AppError> {
    check_auth(&headers, &state.config.api_token)?;

    let raw = required(query.date, "date")?;
    let date = NaiveDate::parse_from_str(&raw, "%Y-%m-%d")
        .map_err(|_| AppError::Validation("date must be YYYY-MM-DD".to_string()))?;

    let slots = booking::available_slots(&state, &id, date, Utc::now()).await?;
    Ok(Json(SlotsResponse { date, slots }))
}
