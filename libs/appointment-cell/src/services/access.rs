use tracing::warn;
use uuid::Uuid;

use shared_models::auth::Actor;

use crate::models::{Appointment, AppointmentError};

fn deny(actor: &Actor, action: &str) -> AppointmentError {
    warn!("Actor {} ({}) may not {}", actor.id, actor.role, action);
    AppointmentError::Unauthorized(format!("{} may not {}", actor.role, action))
}

/// Patients book for themselves; the doctor and admins book on their behalf.
pub fn ensure_can_book(actor: &Actor, doctor_id: Uuid, patient_id: Uuid) -> Result<(), AppointmentError> {
    if actor.is_admin() || actor.is_doctor(doctor_id) || actor.is_patient(patient_id) {
        Ok(())
    } else {
        Err(deny(actor, "book this appointment"))
    }
}

/// Viewing, canceling and rescheduling belong to either party or an admin.
pub fn ensure_party(actor: &Actor, appointment: &Appointment, action: &str) -> Result<(), AppointmentError> {
    if actor.is_admin() || actor.is_doctor(appointment.doctor_id) || actor.is_patient(appointment.patient_id) {
        Ok(())
    } else {
        Err(deny(actor, action))
    }
}

/// Confirm and complete belong to the owning doctor or an admin.
pub fn ensure_can_update_status(actor: &Actor, appointment: &Appointment) -> Result<(), AppointmentError> {
    if actor.is_admin() || actor.is_doctor(appointment.doctor_id) {
        Ok(())
    } else {
        Err(deny(actor, "change the status of this appointment"))
    }
}
