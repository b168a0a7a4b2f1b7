//! Appointment model and consultation status workflow

use serde::{Deserialize, Serialize};
use sqlx::{AnyPool, FromRow};
use validator::{Validate, ValidationError};

use super::now_timestamp;

/// Consultation status.
///
/// ```text
/// pending ──► approved ──► cancelled
///    │
///    ├──────► rejected
///    └──────► cancelled
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AppointmentStatus {
    Pending,
    Approved,
    Rejected,
    Cancelled,
}

impl AppointmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn can_transition_to(self, next: AppointmentStatus) -> bool {
        use AppointmentStatus::*;
        matches!(
            (self, next),
            (Pending, Approved) | (Pending, Rejected) | (Pending, Cancelled) | (Approved, Cancelled)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Rejected | Self::Cancelled)
    }
}

impl std::fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown appointment status: {0}")]
pub struct UnknownStatus(pub String);

impl TryFrom<String> for AppointmentStatus {
    type Error = UnknownStatus;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "pending" => Ok(Self::Pending),
            "approved" => Ok(Self::Approved),
            "rejected" => Ok(Self::Rejected),
            "cancelled" => Ok(Self::Cancelled),
            _ => Err(UnknownStatus(value)),
        }
    }
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Appointment {
    pub id: i64,
    pub user_id: String,
    pub name: String,
    pub email: String,
    pub date: String,
    pub time: Option<String>,
    pub doctor: Option<String>,
    pub reason: String,
    #[sqlx(try_from = "String")]
    pub status: AppointmentStatus,
    pub meet_link: Option<String>,
    #[serde(skip_serializing)]
    pub hidden_from_user: i64,
    pub timestamp: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateAppointment {
    #[validate(length(min = 1, max = 128))]
    pub user_id: String,
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    #[validate(email)]
    pub email: String,
    #[validate(custom(function = "validate_appointment_date"))]
    pub date: String,
    #[validate(length(max = 32))]
    pub time: Option<String>,
    #[validate(length(max = 255))]
    pub doctor: Option<String>,
    #[validate(length(min = 1, max = 2000))]
    pub reason: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateAppointmentStatus {
    pub status: AppointmentStatus,
}

#[derive(Debug, Deserialize)]
pub struct HideAppointment {
    pub user_id: String,
}

fn validate_appointment_date(date: &str) -> Result<(), ValidationError> {
    if crate::meet::parse_appointment_date(date).is_some() {
        Ok(())
    } else {
        Err(ValidationError::new("date"))
    }
}

const SELECT_COLUMNS: &str = r#"
    SELECT id, user_id, name, email, date, time, doctor, reason, status, meet_link, hidden_from_user, timestamp
    FROM appointments
"#;

impl Appointment {
    pub async fn create(pool: &AnyPool, data: &CreateAppointment) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Appointment>(
            r#"
            INSERT INTO appointments (user_id, name, email, date, time, doctor, reason, status, hidden_from_user, timestamp)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, 0, $9)
            RETURNING id, user_id, name, email, date, time, doctor, reason, status, meet_link, hidden_from_user, timestamp
            "#
        )
        .bind(&data.user_id)
        .bind(&data.name)
        .bind(&data.email)
        .bind(&data.date)
        .bind(&data.time)
        .bind(&data.doctor)
        .bind(&data.reason)
        .bind(AppointmentStatus::Pending.as_str())
        .bind(now_timestamp())
        .fetch_one(pool)
        .await
    }

    pub async fn find_by_id(pool: &AnyPool, id: i64) -> Result<Option<Self>, sqlx::Error> {
        let sql = format!("{SELECT_COLUMNS} WHERE id = $1");
        let appointment = sqlx::query_as::<_, Appointment>(&sql)
            .bind(id)
            .fetch_optional(pool)
            .await?;
        Ok(appointment)
    }

    pub async fn list(pool: &AnyPool) -> Result<Vec<Self>, sqlx::Error> {
        let sql = format!("{SELECT_COLUMNS} ORDER BY timestamp DESC, id DESC");
        let appointments = sqlx::query_as::<_, Appointment>(&sql)
            .fetch_all(pool)
            .await?;
        Ok(appointments)
    }

    pub async fn list_by_status(
        pool: &AnyPool,
        status: AppointmentStatus,
    ) -> Result<Vec<Self>, sqlx::Error> {
        let sql = format!("{SELECT_COLUMNS} WHERE status = $1 ORDER BY timestamp DESC, id DESC");
        let appointments = sqlx::query_as::<_, Appointment>(&sql)
            .bind(status.as_str())
            .fetch_all(pool)
            .await?;
        Ok(appointments)
    }

    /// Appointments the user has not hidden
    pub async fn list_visible_to_user(pool: &AnyPool, user_id: &str) -> Result<Vec<Self>, sqlx::Error> {
        let sql = format!(
            "{SELECT_COLUMNS} WHERE user_id = $1 AND hidden_from_user = 0 ORDER BY timestamp DESC, id DESC"
        );
        let appointments = sqlx::query_as::<_, Appointment>(&sql)
            .bind(user_id)
            .fetch_all(pool)
            .await?;
        Ok(appointments)
    }

    /// Compare-and-set on status so concurrent moderators cannot both win
    pub async fn transition(
        pool: &AnyPool,
        id: i64,
        from: AppointmentStatus,
        to: AppointmentStatus,
        meet_link: Option<&str>,
    ) -> Result<Option<Self>, sqlx::Error> {
        let updated = sqlx::query_as::<_, Appointment>(
            r#"
            UPDATE appointments
            SET status = $3, meet_link = COALESCE($4, meet_link)
            WHERE id = $1 AND status = $2
            RETURNING id, user_id, name, email, date, time, doctor, reason, status, meet_link, hidden_from_user, timestamp
            "#
        )
        .bind(id)
        .bind(from.as_str())
        .bind(to.as_str())
        .bind(meet_link)
        .fetch_optional(pool)
        .await?;
        Ok(updated)
    }

    pub async fn hide_from_user(pool: &AnyPool, id: i64) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("UPDATE appointments SET hidden_from_user = 1 WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn delete(pool: &AnyPool, id: i64) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM appointments WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
