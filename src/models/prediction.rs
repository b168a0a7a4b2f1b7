//! Prediction history model

use serde::Serialize;
use sqlx::{AnyPool, FromRow};

use super::now_timestamp;

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Prediction {
    pub id: i64,
    pub user_id: String,
    pub image_url: Option<String>,
    pub prediction_result: String,
    pub confidence: f64,
    pub timestamp: String,
}

#[derive(Debug)]
pub struct CreatePrediction {
    pub user_id: String,
    pub image_url: Option<String>,
    pub prediction_result: String,
    pub confidence: f64,
}

impl Prediction {
    pub async fn create(pool: &AnyPool, data: CreatePrediction) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Prediction>(
            r#"
            INSERT INTO predictions (user_id, image_url, prediction_result, confidence, timestamp)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, user_id, image_url, prediction_result, confidence, timestamp
            "#
        )
        .bind(data.user_id)
        .bind(data.image_url)
        .bind(data.prediction_result)
        .bind(data.confidence)
        .bind(now_timestamp())
        .fetch_one(pool)
        .await
    }

    pub async fn list(pool: &AnyPool) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Prediction>(
            r#"
            SELECT id, user_id, image_url, prediction_result, confidence, timestamp
            FROM predictions
            ORDER BY timestamp DESC, id DESC
            "#
        )
        .fetch_all(pool)
        .await
    }

    pub async fn list_by_user(pool: &AnyPool, user_id: &str) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Prediction>(
            r#"
            SELECT id, user_id, image_url, prediction_result, confidence, timestamp
            FROM predictions
            WHERE user_id = $1
            ORDER BY timestamp DESC, id DESC
            "#
        )
        .bind(user_id)
        .fetch_all(pool)
        .await
    }
}
