//! Prediction history handlers

use axum::{extract::{Path, State}, Json};

use crate::models::Prediction;
use crate::{AppResult, AppState};

pub async fn list(State(state): State<AppState>) -> AppResult<Json<Vec<Prediction>>> {
    let predictions = Prediction::list(&state.pool).await?;
    Ok(Json(predictions))
}

pub async fn list_by_user(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> AppResult<Json<Vec<Prediction>>> {
    let predictions = Prediction::list_by_user(&state.pool, &user_id).await?;
    Ok(Json(predictions))
}
