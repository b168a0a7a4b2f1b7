//! Aggregate counts for the admin dashboard

use serde::Serialize;
use sqlx::AnyPool;

use super::AppointmentStatus;

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct SystemStats {
    pub total_predictions: i64,
    pub total_appointments: i64,
    pub total_feedback: i64,
    pub total_profiles: i64,
    pub pending_appointments: i64,
    pub approved_appointments: i64,
}

impl SystemStats {
    pub async fn collect(pool: &AnyPool) -> Result<Self, sqlx::Error> {
        Ok(Self {
            total_predictions: count(pool, "SELECT COUNT(*) FROM predictions").await?,
            total_appointments: count(pool, "SELECT COUNT(*) FROM appointments").await?,
            total_feedback: count(pool, "SELECT COUNT(*) FROM feedback").await?,
            total_profiles: count(pool, "SELECT COUNT(*) FROM user_profiles").await?,
            pending_appointments: count_status(pool, AppointmentStatus::Pending).await?,
            approved_appointments: count_status(pool, AppointmentStatus::Approved).await?,
        })
    }
}

async fn count(pool: &AnyPool, sql: &str) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar::<_, i64>(sql).fetch_one(pool).await
}

async fn count_status(pool: &AnyPool, status: AppointmentStatus) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM appointments WHERE status = $1")
        .bind(status.as_str())
        .fetch_one(pool)
        .await
}
