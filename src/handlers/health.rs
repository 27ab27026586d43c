use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::db::queries;
use crate::errors::AppError;
use crate::state::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    status: &'static str,
    database: &'static str,
    calendar_provider: String,
}

// GET /health
pub async fn health(State(state): State<Arc<AppState>>) -> Result<Json<HealthResponse>, AppError> {
    {
        let db = state.db()?;
        queries::ping(&db)?;
    }

    Ok(Json(HealthResponse {
        status: "ok",
        database: "ok",
        calendar_provider: if state.calendar.is_some() {
            state.config.calendar_provider.clone()
        } else {
            "none".to_string()
        },
    }))
}
