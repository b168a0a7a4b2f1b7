//! Plant knowledge base handlers

use axum::{extract::{Path, State}, Json};

use crate::models::PlantInfo;
use crate::{AppError, AppResult, AppState};

/// Names of plants with stored medicinal information
pub async fn list(State(state): State<AppState>) -> AppResult<Json<Vec<String>>> {
    let names = PlantInfo::list_names(&state.pool).await?;
    Ok(Json(names))
}

/// Case-insensitive lookup
pub async fn get(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> AppResult<Json<PlantInfo>> {
    let plant = PlantInfo::find_by_name(&state.pool, &name)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("No information found for plant: {}", name)))?;

    Ok(Json(plant))
}
