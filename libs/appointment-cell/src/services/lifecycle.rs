use tracing::{debug, warn};

use crate::models::{Appointment, AppointmentError, AppointmentStatus};

#[derive(Debug, Clone, Copy, Default)]
pub struct AppointmentLifecycleService;

impl AppointmentLifecycleService {
    pub fn new() -> Self {
        Self
    }

    /// Validate that `appointment` may move to `new_status`.
    pub fn validate_status_transition(
        &self,
        appointment: &Appointment,
        new_status: AppointmentStatus,
    ) -> Result<(), AppointmentError> {
        debug!(
            "Validating status transition of {} from {} to {}",
            appointment.id, appointment.status, new_status
        );

        let allowed = self.get_valid_transitions(appointment.status);
        if self.is_final(appointment) || !allowed.contains(&new_status) {
            warn!(
                "Invalid status transition attempted on {}: {} -> {}",
                appointment.id, appointment.status, new_status
            );
            return Err(AppointmentError::InvalidStatusTransition {
                from: appointment.status,
                to: new_status,
            });
        }

        Ok(())
    }

    /// All valid next statuses for a given current status.
    pub fn get_valid_transitions(&self, current_status: AppointmentStatus) -> Vec<AppointmentStatus> {
        match current_status {
            AppointmentStatus::Pending => vec![
                AppointmentStatus::Confirmed,
                AppointmentStatus::Canceled,
                AppointmentStatus::Rescheduled,
            ],
            AppointmentStatus::Confirmed => vec![
                AppointmentStatus::Completed,
                AppointmentStatus::Canceled,
                AppointmentStatus::Rescheduled,
            ],
            AppointmentStatus::Completed
            | AppointmentStatus::Canceled
            | AppointmentStatus::Rescheduled => vec![],
        }
    }

    /// Terminal: completed, canceled, or rescheduled with a replacement.
    pub fn is_final(&self, appointment: &Appointment) -> bool {
        appointment.status.is_terminal()
            || (appointment.status == AppointmentStatus::Rescheduled && appointment.replaced_by.is_some())
    }

    /// Status a freshly committed booking starts in.
    pub fn initial_status(&self, auto_confirm: bool) -> AppointmentStatus {
        if auto_confirm {
            AppointmentStatus::Confirmed
        } else {
            AppointmentStatus::Pending
        }
    }
}
