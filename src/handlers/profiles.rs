use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use chrono::Utc;
use serde::Deserialize;

use crate::db::queries;
use crate::errors::AppError;
use crate::handlers::check_auth;
use crate::models::{Role, UserProfile};
use crate::state::AppState;

// POST /api/profiles
#[derive(Deserialize)]
pub struct CreateProfileRequest {
    /// Id issued by the identity provider. Generated when absent.
    pub id: Option<String>,
    pub email: String,
    pub full_name: Option<String>,
    pub role: String,
}

pub async fn create_profile(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Result<Json<CreateProfileRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<UserProfile>), AppError> {
    check_auth(&headers, &state.config.api_token)?;
    let Json(body) = body?;

    let email = body.email.trim().to_lowercase();
    if !email.contains('@') {
        return Err(AppError::Validation("a valid email is required".to_string()));
    }
    let role = Role::parse(&body.role)
        .ok_or_else(|| AppError::Validation("role must be buyer or seller".to_string()))?;

    let profile = UserProfile {
        id: body
            .id
            .filter(|id| !id.trim().is_empty())
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
        email,
        full_name: body.full_name.filter(|n| !n.trim().is_empty()),
        role,
        created_at: Utc::now(),
    };

    {
        let db = state.db()?;
        if queries::get_profile(&db, &profile.id)?.is_some() {
            return Err(AppError::Conflict("profile already exists".to_string()));
        }
        if queries::profile_email_exists(&db, &profile.email)? {
            return Err(AppError::Conflict("email already registered".to_string()));
        }
        queries::create_profile(&db, &profile)?;
    }

    tracing::info!(profile_id = %profile.id, role = profile.role.as_str(), "profile created");
    Ok((StatusCode::CREATED, Json(profile)))
}

// GET /api/profiles/:id
pub async fn get_profile(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<UserProfile>, AppError> {
    check_auth(&headers, &state.config.api_token)?;

    let db = state.db()?;
    let profile = queries::get_profile(&db, &id)?
        .ok_or_else(|| AppError::NotFound("profile".to_string()))?;
    Ok(Json(profile))
}
