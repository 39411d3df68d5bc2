use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

use doctor_cell::models::ScheduleError;
use shared_database::StoreError;
use shared_models::error::AppError;

pub use shared_models::appointment::{Appointment, AppointmentStatus};

// ==============================================================================
// REQUEST MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookSlotRequest {
    pub doctor_id: Uuid,
    pub patient_id: Uuid,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub metadata: Option<Value>,
}

/// New wall-clock placement for an existing appointment, same doctor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RescheduleRequest {
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: AppointmentStatus,
}

// ==============================================================================
// ERRORS
// ==============================================================================

#[derive(Error, Debug)]
pub enum AppointmentError {
    #[error("Appointment not found: {0}")]
    NotFound(Uuid),

    #[error("Doctor not found: {0}")]
    DoctorNotFound(Uuid),

    #[error("Patient not found: {0}")]
    PatientNotFound(Uuid),

    #[error("Slot no longer available: {0}")]
    Conflict(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Stored schedule is inconsistent: {0}")]
    DataIntegrity(String),

    #[error("Appointment cannot move from {from} to {to}")]
    InvalidStatusTransition {
        from: AppointmentStatus,
        to: AppointmentStatus,
    },

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Storage error: {0}")]
    Store(StoreError),
}

impl From<StoreError> for AppointmentError {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::Conflict { .. } => {
                AppointmentError::Conflict("another booking claimed the slot".to_string())
            }
            StoreError::Malformed { collection, reason } => {
                AppointmentError::DataIntegrity(format!("{}: {}", collection, reason))
            }
            other => AppointmentError::Store(other),
        }
    }
}

impl From<ScheduleError> for AppointmentError {
    fn from(error: ScheduleError) -> Self {
        match error {
            ScheduleError::DoctorNotFound(id) => AppointmentError::DoctorNotFound(id),
            ScheduleError::Validation(msg) => AppointmentError::Validation(msg),
            ScheduleError::DataIntegrity(msg) => AppointmentError::DataIntegrity(msg),
            ScheduleError::Unauthorized(msg) => AppointmentError::Unauthorized(msg),
            ScheduleError::Store(e) => e.into(),
        }
    }
}

impl From<AppointmentError> for AppError {
    fn from(error: AppointmentError) -> Self {
        let message = error.to_string();
        match error {
            AppointmentError::NotFound(_)
            | AppointmentError::DoctorNotFound(_)
            | AppointmentError::PatientNotFound(_) => AppError::NotFound(message),
            AppointmentError::Conflict(_) => AppError::Conflict(message),
            AppointmentError::Validation(msg) => AppError::ValidationError(msg),
            AppointmentError::DataIntegrity(msg) => AppError::DataIntegrity(msg),
            AppointmentError::InvalidStatusTransition { .. } => AppError::BadRequest(message),
            AppointmentError::Unauthorized(msg) => AppError::Forbidden(msg),
            AppointmentError::Store(e) => AppError::Database(e.to_string()),
        }
    }
}
