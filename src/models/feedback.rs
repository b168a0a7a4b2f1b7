//! Feedback model

use serde::{Deserialize, Serialize};
use sqlx::{AnyPool, FromRow};
use validator::Validate;

use super::now_timestamp;

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Feedback {
    pub id: i64,
    pub user_id: String,
    pub message: String,
    pub timestamp: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateFeedback {
    #[validate(length(min = 1, max = 128))]
    pub user_id: String,
    #[validate(length(min = 1, max = 5000))]
    pub message: String,
}

impl Feedback {
    pub async fn create(pool: &AnyPool, data: &CreateFeedback) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Feedback>(
            r#"
            INSERT INTO feedback (user_id, message, timestamp)
            VALUES ($1, $2, $3)
            RETURNING id, user_id, message, timestamp
            "#
        )
        .bind(&data.user_id)
        .bind(&data.message)
        .bind(now_timestamp())
        .fetch_one(pool)
        .await
    }

    pub async fn list(pool: &AnyPool) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Feedback>(
            "SELECT id, user_id, message, timestamp FROM feedback ORDER BY timestamp DESC, id DESC"
        )
        .fetch_all(pool)
        .await
    }

    pub async fn list_by_user(pool: &AnyPool, user_id: &str) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Feedback>(
            r#"
            SELECT id, user_id, message, timestamp FROM feedback
            WHERE user_id = $1
            ORDER BY timestamp DESC, id DESC
            "#
        )
        .bind(user_id)
        .fetch_all(pool)
        .await
    }
}
