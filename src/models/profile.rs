//! User profile model

use serde::{Deserialize, Serialize};
use sqlx::{AnyPool, FromRow};
use validator::Validate;

use super::now_timestamp;

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct UserProfile {
    pub id: i64,
    pub user_id: String,
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub state: Option<String>,
    pub profile_image_url: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateProfile {
    #[validate(length(min = 1, max = 128))]
    pub user_id: String,
    #[validate(length(max = 255))]
    pub name: Option<String>,
    #[validate(email)]
    pub email: Option<String>,
    #[validate(length(max = 32))]
    pub phone: Option<String>,
    #[validate(length(max = 128))]
    pub state: Option<String>,
    pub profile_image_url: Option<String>,
}

/// Partial update: absent fields keep their stored value
#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateProfile {
    #[validate(length(max = 255))]
    pub name: Option<String>,
    #[validate(email)]
    pub email: Option<String>,
    #[validate(length(max = 32))]
    pub phone: Option<String>,
    #[validate(length(max = 128))]
    pub state: Option<String>,
    pub profile_image_url: Option<String>,
}

impl UserProfile {
    pub async fn create(pool: &AnyPool, data: &CreateProfile) -> Result<Self, sqlx::Error> {
        let now = now_timestamp();
        sqlx::query_as::<_, UserProfile>(
            r#"
            INSERT INTO user_profiles (user_id, name, email, phone, state, profile_image_url, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING id, user_id, name, email, phone, state, profile_image_url, created_at, updated_at
            "#
        )
        .bind(&data.user_id)
        .bind(&data.name)
        .bind(&data.email)
        .bind(&data.phone)
        .bind(&data.state)
        .bind(&data.profile_image_url)
        .bind(&now)
        .bind(&now)
        .fetch_one(pool)
        .await
    }

    pub async fn find_by_user_id(pool: &AnyPool, user_id: &str) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, UserProfile>(
            r#"
            SELECT id, user_id, name, email, phone, state, profile_image_url, created_at, updated_at
            FROM user_profiles WHERE user_id = $1
            "#
        )
        .bind(user_id)
        .fetch_optional(pool)
        .await
    }

    pub async fn list(pool: &AnyPool) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, UserProfile>(
            r#"
            SELECT id, user_id, name, email, phone, state, profile_image_url, created_at, updated_at
            FROM user_profiles ORDER BY created_at DESC, id DESC
            "#
        )
        .fetch_all(pool)
        .await
    }

    pub async fn update(
        pool: &AnyPool,
        user_id: &str,
        data: &UpdateProfile,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, UserProfile>(
            r#"
            UPDATE user_profiles SET
                name = COALESCE($2, name),
                email = COALESCE($3, email),
                phone = COALESCE($4, phone),
                state = COALESCE($5, state),
                profile_image_url = COALESCE($6, profile_image_url),
                updated_at = $7
            WHERE user_id = $1
            RETURNING id, user_id, name, email, phone, state, profile_image_url, created_at, updated_at
            "#
        )
        .bind(user_id)
        .bind(&data.name)
        .bind(&data.email)
        .bind(&data.phone)
        .bind(&data.state)
        .bind(&data.profile_image_url)
        .bind(now_timestamp())
        .fetch_optional(pool)
        .await
    }

    pub async fn set_image(
        pool: &AnyPool,
        user_id: &str,
        image_url: &str,
    ) -> Result<Option<Self>, sqlx::Error> {
        let update = UpdateProfile {
            profile_image_url: Some(image_url.to_string()),
            ..Default::default()
        };
        Self::update(pool, user_id, &update).await
    }
}
