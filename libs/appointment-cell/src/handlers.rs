use std::sync::Arc;

use axum::{
    extract::{Extension, Path, State},
    Json,
};
use serde_json::{json, Value};
use uuid::Uuid;

use shared_models::auth::Actor;
use shared_models::context::RequestContext;
use shared_models::error::AppError;
use shared_utils::AppState;

use crate::models::{BookSlotRequest, RescheduleRequest, UpdateStatusRequest};
use crate::services::AppointmentBookingService;

fn booking_service(state: &AppState) -> AppointmentBookingService {
    AppointmentBookingService::new(Arc::clone(&state.store), &state.config.scheduling)
}

#[axum::debug_handler]
pub async fn book_appointment(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
    Json(request): Json<BookSlotRequest>,
) -> Result<Json<Value>, AppError> {
    let ctx = RequestContext::new(actor);
    let booking_service = booking_service(&state);

    let appointment_id = booking_service.book_slot(&ctx, request).await?;
    let appointment = booking_service.get_appointment(&ctx, appointment_id).await?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment,
        "message": "Appointment booked successfully"
    })))
}

#[axum::debug_handler]
pub async fn get_appointment(
    State(state): State<Arc<AppState>>,
    Path(appointment_id): Path<Uuid>,
    Extension(actor): Extension<Actor>,
) -> Result<Json<Value>, AppError> {
    let ctx = RequestContext::new(actor);

    let appointment = booking_service(&state)
        .get_appointment(&ctx, appointment_id)
        .await?;

    Ok(Json(json!(appointment)))
}

#[axum::debug_handler]
pub async fn cancel_appointment(
    State(state): State<Arc<AppState>>,
    Path(appointment_id): Path<Uuid>,
    Extension(actor): Extension<Actor>,
) -> Result<Json<Value>, AppError> {
    let ctx = RequestContext::new(actor);

    let appointment = booking_service(&state)
        .cancel_appointment(&ctx, appointment_id)
        .await?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment,
        "message": "Appointment canceled"
    })))
}

#[axum::debug_handler]
pub async fn reschedule_appointment(
    State(state): State<Arc<AppState>>,
    Path(appointment_id): Path<Uuid>,
    Extension(actor): Extension<Actor>,
    Json(request): Json<RescheduleRequest>,
) -> Result<Json<Value>, AppError> {
    let ctx = RequestContext::new(actor);

    let replacement = booking_service(&state)
        .reschedule_appointment(&ctx, appointment_id, request)
        .await?;

    Ok(Json(json!({
        "success": true,
        "appointment": replacement,
        "rescheduled_from": appointment_id,
        "message": "Appointment rescheduled"
    })))
}

#[axum::debug_handler]
pub async fn update_appointment_status(
    State(state): State<Arc<AppState>>,
    Path(appointment_id): Path<Uuid>,
    Extension(actor): Extension<Actor>,
    Json(request): Json<UpdateStatusRequest>,
) -> Result<Json<Value>, AppError> {
    let ctx = RequestContext::new(actor);

    let appointment = booking_service(&state)
        .update_status(&ctx, appointment_id, request)
        .await?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment
    })))
}
