//! Plant prediction handlers

use axum::{
    extract::{Multipart, State},
    Json,
};
use serde_json::{json, Value};

use crate::classifier::{Classification, SAFETY_NOTE};
use crate::handlers::success;
use crate::models::{CreatePrediction, Prediction};
use crate::uploads::{save_image, UploadForm};
use crate::{AppError, AppResult, AppState};

/// Classify on the blocking pool
async fn classify(state: &AppState, bytes: axum::body::Bytes) -> AppResult<Classification> {
    let classifier = state.classifier.clone();
    let classification = tokio::task::spawn_blocking(move || classifier.classify(&bytes))
        .await
        .map_err(|e| AppError::InternalError(format!("classification task failed: {}", e)))??;
    Ok(classification)
}

/// Anonymous prediction, nothing is stored
pub async fn predict(
    State(state): State<AppState>,
    multipart: Multipart,
) -> AppResult<Json<Value>> {
    let mut form = UploadForm::read(multipart).await?;
    let file = form.require_file()?;
    file.check_content_type()?;

    tracing::info!(
        "Prediction request: {} ({} bytes)",
        file.filename.as_deref().unwrap_or("<unnamed>"),
        file.bytes.len()
    );

    let result = classify(&state, file.bytes).await?;

    Ok(Json(json!({
        "predicted_class": result.predicted_class,
        "confidence": result.confidence,
        "all_predictions": result.all_predictions(),
        "model_type": result.model_kind,
        "medical_warning": result.warning,
        "safety_note": SAFETY_NOTE,
        "model_info": {
            "top_class": result.top_class,
            "in_scope": result.in_scope,
            "threshold": state.classifier.threshold(),
            "input_size": state.classifier.image_size(),
            "num_classes": state.classifier.classes().len(),
        }
    })))
}

/// Prediction for a signed-in user: the image and result are kept in history
pub async fn predict_for_user(
    State(state): State<AppState>,
    multipart: Multipart,
) -> AppResult<Json<Value>> {
    let mut form = UploadForm::read(multipart).await?;
    let user_id = form.require_field("user_id")?;
    let file = form.require_file()?;
    file.check_content_type()?;

    let result = classify(&state, file.bytes.clone()).await?;
    let image_url = save_image(&state.config.upload_dir, "predictions", &file.bytes).await?;

    let prediction = Prediction::create(
        &state.pool,
        CreatePrediction {
            user_id,
            image_url: Some(image_url.clone()),
            prediction_result: result.predicted_class.clone(),
            confidence: result.confidence,
        },
    )
    .await?;

    tracing::info!(
        "Stored prediction {} for user {}: {}",
        prediction.id,
        prediction.user_id,
        prediction.prediction_result
    );

    Ok(success(
        "Prediction completed successfully",
        json!({
            "predicted_class": result.predicted_class,
            "confidence": result.confidence,
            "all_predictions": result.all_predictions(),
            "prediction_id": prediction.id,
            "image_url": image_url,
            "medical_warning": result.warning,
        }),
    ))
}
