//! User profile handlers

use axum::{extract::{Multipart, Path, State}, Json};
use serde_json::{json, Value};
use validator::Validate;

use crate::handlers::success;
use crate::models::{CreateProfile, UpdateProfile, UserProfile};
use crate::uploads::{save_image, UploadForm};
use crate::{AppError, AppResult, AppState};

fn not_found() -> AppError {
    AppError::NotFound("Profile not found".to_string())
}

fn already_exists() -> AppError {
    AppError::AlreadyExists("Profile already exists".to_string())
}

pub async fn create(
    State(state): State<AppState>,
    Json(req): Json<CreateProfile>,
) -> AppResult<Json<Value>> {
    req.validate()?;

    if UserProfile::find_by_user_id(&state.pool, &req.user_id).await?.is_some() {
        return Err(already_exists());
    }

    let profile = UserProfile::create(&state.pool, &req)
        .await
        .map_err(create_error)?;

    tracing::info!("Profile created for {}", profile.user_id);
    Ok(success("Profile created successfully", json!(profile)))
}

/// A unique violation means a concurrent create won the race
fn create_error(err: sqlx::Error) -> AppError {
    if matches!(&err, sqlx::Error::Database(db) if db.is_unique_violation()) {
        already_exists()
    } else {
        AppError::from(err)
    }
}

pub async fn get(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> AppResult<Json<UserProfile>> {
    let profile = UserProfile::find_by_user_id(&state.pool, &user_id)
        .await?
        .ok_or_else(not_found)?;
    Ok(Json(profile))
}

/// Partial update; omitted fields are left unchanged
pub async fn update(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Json(req): Json<UpdateProfile>,
) -> AppResult<Json<Value>> {
    req.validate()?;

    let profile = UserProfile::update(&state.pool, &user_id, &req)
        .await?
        .ok_or_else(not_found)?;

    Ok(success("Profile updated successfully", json!(profile)))
}

pub async fn list(State(state): State<AppState>) -> AppResult<Json<Vec<UserProfile>>> {
    let profiles = UserProfile::list(&state.pool).await?;
    Ok(Json(profiles))
}

pub async fn upload_image(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    multipart: Multipart,
) -> AppResult<Json<Value>> {
    if UserProfile::find_by_user_id(&state.pool, &user_id).await?.is_none() {
        return Err(not_found());
    }

    let mut form = UploadForm::read(multipart).await?;
    let file = form.require_file()?;
    file.check_content_type()?;

    let image_url = save_image(&state.config.upload_dir, "profiles", &file.bytes).await?;
    let profile = UserProfile::set_image(&state.pool, &user_id, &image_url)
        .await?
        .ok_or_else(not_found)?;

    Ok(success(
        "Profile image uploaded successfully",
        json!({ "profile_image_url": image_url, "profile": profile }),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use crate::db::{self, Backend};

    #[tokio::test]
    async fn racing_create_is_a_conflict() {
        let pool = db::create_pool("sqlite::memory:", 1).await.unwrap();
        db::run_migrations(&pool, Backend::Sqlite).await.unwrap();

        let req = CreateProfile {
            user_id: "u1".to_string(),
            name: Some("Asha".to_string()),
            email: None,
            phone: None,
            state: None,
            profile_image_url: None,
        };
        UserProfile::create(&pool, &req).await.unwrap();

        // Second insert skips the existence check, as the losing request would
        let err = create_error(UserProfile::create(&pool, &req).await.unwrap_err());
        assert_eq!(err.status_code(), StatusCode::CONFLICT);

        let err = create_error(sqlx::Error::RowNotFound);
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
