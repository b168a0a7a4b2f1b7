//! Dashboard statistics

use axum::{extract::State, Json};

use crate::models::SystemStats;
use crate::{AppResult, AppState};

pub async fn get(State(state): State<AppState>) -> AppResult<Json<SystemStats>> {
    let stats = SystemStats::collect(&state.pool).await?;
    Ok(Json(stats))
}
