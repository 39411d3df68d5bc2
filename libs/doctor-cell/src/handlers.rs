use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query, State},
    Json,
};
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use shared_models::auth::Actor;
use shared_models::context::RequestContext;
use shared_models::error::AppError;
use shared_utils::AppState;

use crate::models::{AddBlockedDateRequest, RegisterDoctorRequest, WeeklyTemplate};
use crate::services::schedule::schedule_summary;
use crate::services::{AvailabilityService, ScheduleService};

#[derive(Debug, Deserialize)]
pub struct AvailableSlotsQuery {
    pub from: NaiveDate,
    pub to: NaiveDate,
    pub duration_minutes: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct DateRangeQuery {
    pub from: NaiveDate,
    pub to: NaiveDate,
}

// ==============================================================================
// AVAILABILITY
// ==============================================================================

#[axum::debug_handler]
pub async fn get_available_slots(
    State(state): State<Arc<AppState>>,
    Path(doctor_id): Path<Uuid>,
    Extension(actor): Extension<Actor>,
    Query(query): Query<AvailableSlotsQuery>,
) -> Result<Json<Value>, AppError> {
    let ctx = RequestContext::new(actor);
    let availability = AvailabilityService::new(Arc::clone(&state.store), &state.config.scheduling);
    let duration = query
        .duration_minutes
        .unwrap_or(state.config.scheduling.default_slot_duration_minutes);

    let response = availability
        .available_slots(&ctx, doctor_id, query.from, query.to, duration)
        .await?;

    Ok(Json(json!(response)))
}

// ==============================================================================
// SCHEDULE MANAGEMENT
// ==============================================================================

#[axum::debug_handler]
pub async fn register_doctor(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
    Json(request): Json<RegisterDoctorRequest>,
) -> Result<Json<Value>, AppError> {
    let ctx = RequestContext::new(actor);
    let schedule = ScheduleService::new(Arc::clone(&state.store));

    let doctor = schedule.register_doctor(&ctx, request).await?;

    Ok(Json(json!(doctor)))
}

#[axum::debug_handler]
pub async fn get_weekly_template(
    State(state): State<Arc<AppState>>,
    Path(doctor_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let schedule = ScheduleService::new(Arc::clone(&state.store));

    let doctor = schedule.get_doctor(doctor_id).await?;

    Ok(Json(schedule_summary(&doctor)))
}

#[axum::debug_handler]
pub async fn update_weekly_template(
    State(state): State<Arc<AppState>>,
    Path(doctor_id): Path<Uuid>,
    Extension(actor): Extension<Actor>,
    Json(template): Json<WeeklyTemplate>,
) -> Result<Json<Value>, AppError> {
    let ctx = RequestContext::new(actor);
    let schedule = ScheduleService::new(Arc::clone(&state.store));

    let doctor = schedule.update_weekly_template(&ctx, doctor_id, template).await?;

    Ok(Json(schedule_summary(&doctor)))
}

#[axum::debug_handler]
pub async fn list_blocked_dates(
    State(state): State<Arc<AppState>>,
    Path(doctor_id): Path<Uuid>,
    Query(query): Query<DateRangeQuery>,
) -> Result<Json<Value>, AppError> {
    let schedule = ScheduleService::new(Arc::clone(&state.store));

    let blocked = schedule
        .get_blocked_dates(doctor_id, query.from, query.to)
        .await?;

    Ok(Json(json!({
        "doctor_id": doctor_id,
        "blocked_dates": blocked,
        "total": blocked.len()
    })))
}

#[axum::debug_handler]
pub async fn add_blocked_date(
    State(state): State<Arc<AppState>>,
    Path(doctor_id): Path<Uuid>,
    Extension(actor): Extension<Actor>,
    Json(request): Json<AddBlockedDateRequest>,
) -> Result<Json<Value>, AppError> {
    let ctx = RequestContext::new(actor);
    let schedule = ScheduleService::new(Arc::clone(&state.store));

    let block = schedule.add_blocked_date(&ctx, doctor_id, request).await?;

    Ok(Json(json!(block)))
}
