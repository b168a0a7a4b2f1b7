//! Health check, service banner and model information

use axum::{extract::State, Json};
use serde::Serialize;
use serde_json::{json, Value};

use crate::classifier::ModelKind;
use crate::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    status: &'static str,
    service: &'static str,
    version: &'static str,
    model_loaded: bool,
    model_type: ModelKind,
    timestamp: i64,
}

pub async fn check(State(state): State<AppState>) -> Json<HealthResponse> {
    let status = state.classifier.status();
    Json(HealthResponse {
        status: "healthy",
        service: "LeafSense API",
        version: env!("CARGO_PKG_VERSION"),
        model_loaded: status.model_loaded,
        model_type: status.model_type,
        timestamp: chrono::Utc::now().timestamp(),
    })
}

pub async fn root(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "message": "LeafSense Medicinal Plant API",
        "version": env!("CARGO_PKG_VERSION"),
        "model_type": state.classifier.model_kind(),
        "classes": state.classifier.classes().len(),
        "endpoints": {
            "health": "/health",
            "model_info": "/model/info",
            "plants": "/plants",
            "predict": "/predict",
            "api_predict": "/api/predict",
            "predictions": "/api/predictions",
            "plant_info": "/api/plant/{name}",
            "feedback": "/api/feedback/",
            "appointments": "/api/appointments/",
            "profiles": "/api/profile/",
            "stats": "/api/stats"
        }
    }))
}

pub async fn model_info(State(state): State<AppState>) -> Json<Value> {
    let classifier = &state.classifier;
    let status = classifier.status();
    let size = classifier.image_size();

    Json(json!({
        "model_loaded": status.model_loaded,
        "model_type": status.model_type,
        "model_name": status.model_name,
        "model_path": status.model_path,
        "input_shape": [1, size, size, 3],
        "num_classes": status.class_count,
        "classes": classifier.classes().as_slice(),
        "confidence_threshold": classifier.threshold(),
        "preprocessing": classifier.preprocessing(),
        "inference_count": status.inference_count,
        "avg_latency_ms": status.avg_latency_ms,
    }))
}

/// Class names in model output order
pub async fn class_names(State(state): State<AppState>) -> Json<Vec<String>> {
    Json(state.classifier.classes().as_slice().to_vec())
}
