//! Appointment handlers

use axum::{extract::{Path, State}, Json};
use serde_json::{json, Value};
use validator::Validate;

use crate::handlers::success;
use crate::models::{
    Appointment, AppointmentStatus, CreateAppointment, HideAppointment, UpdateAppointmentStatus,
};
use crate::{AppError, AppResult, AppState};

fn not_found() -> AppError {
    AppError::NotFound("Appointment not found".to_string())
}

/// Book a consultation; new appointments start as pending
pub async fn create(
    State(state): State<AppState>,
    Json(req): Json<CreateAppointment>,
) -> AppResult<Json<Value>> {
    req.validate()?;
    let appointment = Appointment::create(&state.pool, &req).await?;

    tracing::info!("Appointment {} booked by {}", appointment.id, appointment.user_id);

    Ok(success(
        "Appointment booked successfully",
        json!({ "id": appointment.id, "status": appointment.status }),
    ))
}

pub async fn list(State(state): State<AppState>) -> AppResult<Json<Vec<Appointment>>> {
    let appointments = Appointment::list(&state.pool).await?;
    Ok(Json(appointments))
}

pub async fn list_pending(State(state): State<AppState>) -> AppResult<Json<Vec<Appointment>>> {
    let appointments = Appointment::list_by_status(&state.pool, AppointmentStatus::Pending).await?;
    Ok(Json(appointments))
}

/// A user's appointments, minus the ones they removed from their history
pub async fn list_by_user(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> AppResult<Json<Vec<Appointment>>> {
    let appointments = Appointment::list_visible_to_user(&state.pool, &user_id).await?;
    Ok(Json(appointments))
}

pub async fn get(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> AppResult<Json<Appointment>> {
    let appointment = Appointment::find_by_id(&state.pool, id)
        .await?
        .ok_or_else(not_found)?;
    Ok(Json(appointment))
}

/// Moderate an appointment (approve, reject or cancel)
pub async fn update_status(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(req): Json<UpdateAppointmentStatus>,
) -> AppResult<Json<Value>> {
    let appointment = apply_transition(&state, id, req.status).await?;

    Ok(success(
        format!("Appointment {} successfully", appointment.status),
        json!({
            "id": appointment.id,
            "status": appointment.status,
            "meet_link": appointment.meet_link,
        }),
    ))
}

pub async fn cancel(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> AppResult<Json<Value>> {
    let appointment = apply_transition(&state, id, AppointmentStatus::Cancelled).await?;

    Ok(success(
        "Appointment cancelled successfully",
        json!({ "id": appointment.id, "status": appointment.status }),
    ))
}

/// Hide an appointment from its owner's list; the record is kept
pub async fn hide(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(req): Json<HideAppointment>,
) -> AppResult<Json<Value>> {
    let appointment = Appointment::find_by_id(&state.pool, id)
        .await?
        .ok_or_else(not_found)?;

    if appointment.user_id != req.user_id {
        tracing::warn!("User {} tried to hide appointment {} owned by someone else", req.user_id, id);
        return Err(AppError::Forbidden);
    }

    if !Appointment::hide_from_user(&state.pool, id).await? {
        return Err(not_found());
    }

    Ok(success("Appointment removed from your list", json!({ "id": id })))
}

/// Permanently delete an appointment
pub async fn delete(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> AppResult<Json<Value>> {
    if !Appointment::delete(&state.pool, id).await? {
        return Err(not_found());
    }

    tracing::info!("Appointment {} deleted", id);
    Ok(success("Appointment deleted successfully", json!({ "id": id })))
}

fn changed_concurrently() -> AppError {
    AppError::InvalidTransition("Appointment status changed by another request".to_string())
}

/// Check the state machine, create a Meet link on approval and write the
/// new status only if nobody changed it in between
async fn apply_transition(
    state: &AppState,
    id: i64,
    next: AppointmentStatus,
) -> AppResult<Appointment> {
    let current = Appointment::find_by_id(&state.pool, id)
        .await?
        .ok_or_else(not_found)?;

    if !current.status.can_transition_to(next) {
        let message = if current.status.is_terminal() {
            format!("Appointment is already {}", current.status)
        } else {
            format!("Cannot change appointment status from {} to {}", current.status, next)
        };
        return Err(AppError::InvalidTransition(message));
    }

    let meet_link = match next {
        AppointmentStatus::Approved => Some(state.meet.link_for(&current).await),
        _ => None,
    };

    let updated = Appointment::transition(&state.pool, id, current.status, next, meet_link.as_deref())
        .await?
        .ok_or_else(changed_concurrently)?;

    tracing::info!("Appointment {} moved {} -> {}", id, current.status, updated.status);
    Ok(updated)
}
