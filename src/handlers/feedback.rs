//! Feedback handlers

use axum::{extract::{Path, State}, Json};
use serde_json::{json, Value};
use validator::Validate;

use crate::handlers::success;
use crate::models::{CreateFeedback, Feedback};
use crate::{AppResult, AppState};

pub async fn create(
    State(state): State<AppState>,
    Json(req): Json<CreateFeedback>,
) -> AppResult<Json<Value>> {
    req.validate()?;
    let feedback = Feedback::create(&state.pool, &req).await?;
    tracing::info!("Feedback {} received from {}", feedback.id, feedback.user_id);
    Ok(success("Feedback received successfully", json!({ "id": feedback.id })))
}

pub async fn list(State(state): State<AppState>) -> AppResult<Json<Vec<Feedback>>> {
    let feedback = Feedback::list(&state.pool).await?;
    Ok(Json(feedback))
}

pub async fn list_by_user(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> AppResult<Json<Vec<Feedback>>> {
    let feedback = Feedback::list_by_user(&state.pool, &user_id).await?;
    Ok(Json(feedback))
}
