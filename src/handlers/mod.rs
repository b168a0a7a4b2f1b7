//! HTTP handlers

pub mod appointments;
pub mod feedback;
pub mod health;
pub mod plants;
pub mod predict;
pub mod predictions;
pub mod profiles;
pub mod stats;

#[cfg(test)]
mod tests;

use axum::Json;
use serde_json::{json, Value};

/// `{"status": "success", "message": ..., "data": ...}` envelope used by
/// every mutating endpoint
pub fn success(message: impl Into<String>, data: Value) -> Json<Value> {
    Json(json!({
        "status": "success",
        "message": message.into(),
        "data": data,
    }))
}
