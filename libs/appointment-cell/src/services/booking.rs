use std::sync::Arc;

use chrono::{NaiveDate, NaiveTime};
use serde_json::Value;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use doctor_cell::models::{is_whole_minute, Doctor};
use doctor_cell::services::availability::local_now;
use doctor_cell::services::interval::{self, Interval};
use doctor_cell::services::AvailabilityService;
use shared_config::SchedulingConfig;
use shared_database::{
    collections, decode_record, encode_record, RecordFilter, RecordStore, StoreError,
};
use shared_models::context::RequestContext;

use crate::models::{
    Appointment, AppointmentError, AppointmentStatus, BookSlotRequest, RescheduleRequest,
    UpdateStatusRequest,
};
use crate::services::access;
use crate::services::conflict;
use crate::services::lifecycle::AppointmentLifecycleService;

/// Everything needed to commit one appointment.
struct NewAppointment {
    doctor_id: Uuid,
    patient_id: Uuid,
    date: NaiveDate,
    start_time: NaiveTime,
    end_time: NaiveTime,
    notes: Option<String>,
    metadata: Option<Value>,
    rescheduled_from: Option<Uuid>,
}

/// Commits bookings and drives the appointment state machine.
#[derive(Clone)]
pub struct AppointmentBookingService {
    store: Arc<dyn RecordStore>,
    availability: AvailabilityService,
    lifecycle: AppointmentLifecycleService,
    config: SchedulingConfig,
}

impl AppointmentBookingService {
    pub fn new(store: Arc<dyn RecordStore>, config: &SchedulingConfig) -> Self {
        Self {
            availability: AvailabilityService::new(Arc::clone(&store), config),
            lifecycle: AppointmentLifecycleService::new(),
            store,
            config: config.clone(),
        }
    }

    /// Book `[start_time, end_time)` on `date` with a doctor. Returns the new
    /// appointment id; on any error the store is left unchanged.
    #[instrument(
        skip(self, ctx, request),
        fields(actor = %ctx.actor.id, doctor_id = %request.doctor_id, date = %request.date)
    )]
    pub async fn book_slot(
        &self,
        ctx: &RequestContext,
        request: BookSlotRequest,
    ) -> Result<Uuid, AppointmentError> {
        info!(
            "Booking {}-{} for patient {}",
            request.start_time, request.end_time, request.patient_id
        );
        access::ensure_can_book(&ctx.actor, request.doctor_id, request.patient_id)?;

        let appointment = self
            .commit(
                ctx,
                NewAppointment {
                    doctor_id: request.doctor_id,
                    patient_id: request.patient_id,
                    date: request.date,
                    start_time: request.start_time,
                    end_time: request.end_time,
                    notes: request.notes,
                    metadata: request.metadata,
                    rescheduled_from: None,
                },
                None,
            )
            .await?;

        Ok(appointment.id)
    }

    pub async fn get_appointment(
        &self,
        ctx: &RequestContext,
        appointment_id: Uuid,
    ) -> Result<Appointment, AppointmentError> {
        let appointment = self.load_appointment(appointment_id).await?;
        access::ensure_party(&ctx.actor, &appointment, "view this appointment")?;
        Ok(appointment)
    }

    /// Cancel a pending or confirmed appointment, freeing its interval.
    #[instrument(skip(self, ctx), fields(actor = %ctx.actor.id))]
    pub async fn cancel_appointment(
        &self,
        ctx: &RequestContext,
        appointment_id: Uuid,
    ) -> Result<Appointment, AppointmentError> {
        let appointment = self.load_appointment(appointment_id).await?;
        access::ensure_party(&ctx.actor, &appointment, "cancel this appointment")?;

        let canceled = self
            .transition(ctx, appointment, AppointmentStatus::Canceled, None)
            .await?;

        info!("Appointment {} canceled", appointment_id);
        Ok(canceled)
    }

    /// Confirm or complete an appointment.
    #[instrument(skip(self, ctx, request), fields(actor = %ctx.actor.id, status = %request.status))]
    pub async fn update_status(
        &self,
        ctx: &RequestContext,
        appointment_id: Uuid,
        request: UpdateStatusRequest,
    ) -> Result<Appointment, AppointmentError> {
        if !matches!(request.status, AppointmentStatus::Confirmed | AppointmentStatus::Completed) {
            return Err(AppointmentError::Validation(format!(
                "status {} is set through cancel or reschedule",
                request.status
            )));
        }

        let appointment = self.load_appointment(appointment_id).await?;
        access::ensure_can_update_status(&ctx.actor, &appointment)?;

        let updated = self.transition(ctx, appointment, request.status, None).await?;

        info!("Appointment {} is now {}", appointment_id, updated.status);
        Ok(updated)
    }

    /// Move an appointment to a new slot with the same doctor.
    ///
    /// The replacement is committed first with the original excluded from
    /// conflict detection; the original is then marked `rescheduled` and
    /// linked to it. If that second write fails the replacement is canceled.
    #[instrument(skip(self, ctx, request), fields(actor = %ctx.actor.id, date = %request.date))]
    pub async fn reschedule_appointment(
        &self,
        ctx: &RequestContext,
        appointment_id: Uuid,
        request: RescheduleRequest,
    ) -> Result<Appointment, AppointmentError> {
        let original = self.load_appointment(appointment_id).await?;
        access::ensure_party(&ctx.actor, &original, "reschedule this appointment")?;
        self.lifecycle
            .validate_status_transition(&original, AppointmentStatus::Rescheduled)?;

        let replacement = self
            .commit(
                ctx,
                NewAppointment {
                    doctor_id: original.doctor_id,
                    patient_id: original.patient_id,
                    date: request.date,
                    start_time: request.start_time,
                    end_time: request.end_time,
                    notes: original.notes.clone(),
                    metadata: original.metadata.clone(),
                    rescheduled_from: Some(original.id),
                },
                Some(original.id),
            )
            .await?;

        // Re-read: the original may have moved on while the replacement was committed.
        let marked = match self.load_appointment(appointment_id).await {
            Ok(current) => {
                self.transition(ctx, current, AppointmentStatus::Rescheduled, Some(replacement.id))
                    .await
            }
            Err(e) => Err(e),
        };

        if let Err(e) = marked {
            warn!(
                "Failed to retire appointment {} after rescheduling; canceling replacement {}",
                appointment_id, replacement.id
            );
            self.compensate(ctx, replacement.id).await;
            return Err(e);
        }

        info!("Appointment {} rescheduled to {}", appointment_id, replacement.id);
        Ok(replacement)
    }

    async fn commit(
        &self,
        ctx: &RequestContext,
        new: NewAppointment,
        exclude: Option<Uuid>,
    ) -> Result<Appointment, AppointmentError> {
        self.validate_shape(new.start_time, new.end_time)?;

        let doctor = self.availability.schedule().get_doctor(new.doctor_id).await?;
        self.ensure_patient_exists(new.patient_id).await?;
        self.ensure_not_past(ctx, &doctor, new.date, new.start_time)?;

        let requested = Interval::from_times(new.start_time, new.end_time).ok_or_else(|| {
            AppointmentError::Validation("slot must start before it ends".to_string())
        })?;

        let day = self
            .availability
            .day_availability(&doctor, new.date, exclude)
            .await?;

        if !interval::any_contains(&day.working, &requested) {
            return Err(AppointmentError::Validation(format!(
                "{} {}-{} is outside the doctor's working hours",
                new.date, new.start_time, new.end_time
            )));
        }
        if !interval::any_contains(&day.unblocked, &requested) {
            warn!("Slot {} {}-{} is blocked", new.date, new.start_time, new.end_time);
            return Err(AppointmentError::Conflict(
                "the doctor is unavailable at that time".to_string(),
            ));
        }
        if !interval::any_contains(&day.free, &requested) {
            return Err(AppointmentError::Conflict("slot no longer available".to_string()));
        }
        if !conflict::find_overlaps(&day.appointments, new.date, new.start_time, new.end_time, exclude)
            .is_empty()
        {
            return Err(AppointmentError::Conflict("slot no longer available".to_string()));
        }

        let appointment = Appointment {
            id: Uuid::new_v4(),
            doctor_id: new.doctor_id,
            patient_id: new.patient_id,
            date: new.date,
            start_time: new.start_time,
            end_time: new.end_time,
            status: self.lifecycle.initial_status(self.config.auto_confirm_bookings),
            notes: new.notes,
            metadata: new.metadata,
            rescheduled_from: new.rescheduled_from,
            replaced_by: None,
            version: 0,
            created_at: ctx.now,
            updated_at: ctx.now,
        };

        let record = encode_record(collections::APPOINTMENTS, &appointment)?;
        let predicate = conflict::slot_conflict_predicate(
            appointment.doctor_id,
            appointment.date,
            appointment.start_time,
            appointment.end_time,
            exclude,
        );

        self.store
            .write_record_if_unconflicted(
                collections::APPOINTMENTS,
                &appointment.id.to_string(),
                record,
                &predicate,
            )
            .await
            .map_err(|e| {
                if matches!(e, StoreError::Conflict { .. }) {
                    warn!(
                        "Lost the race for {} {}-{} with doctor {}",
                        appointment.date, appointment.start_time, appointment.end_time, appointment.doctor_id
                    );
                }
                AppointmentError::from(e)
            })?;

        info!(
            "Appointment {} committed as {} with doctor {}",
            appointment.id, appointment.status, appointment.doctor_id
        );
        Ok(appointment)
    }

    /// Apply a status change to `appointment` as it was read. The write only
    /// lands if the stored record still has the status and version that were
    /// read; otherwise the caller gets `Conflict` and nothing changes.
    async fn transition(
        &self,
        ctx: &RequestContext,
        mut appointment: Appointment,
        status: AppointmentStatus,
        replaced_by: Option<Uuid>,
    ) -> Result<Appointment, AppointmentError> {
        self.lifecycle.validate_status_transition(&appointment, status)?;

        let expected = RecordFilter::new()
            .eq("status", appointment.status.to_string())
            .eq("version", appointment.version);

        appointment.status = status;
        appointment.replaced_by = replaced_by.or(appointment.replaced_by);
        appointment.version += 1;
        appointment.updated_at = ctx.now;

        let record = encode_record(collections::APPOINTMENTS, &appointment)?;
        self.store
            .write_record_if_matches(
                collections::APPOINTMENTS,
                &appointment.id.to_string(),
                record,
                &expected,
            )
            .await
            .map_err(|e| match e {
                StoreError::Conflict { .. } => {
                    warn!(
                        "Appointment {} changed before it could become {}",
                        appointment.id, status
                    );
                    AppointmentError::Conflict(format!(
                        "appointment {} was modified concurrently",
                        appointment.id
                    ))
                }
                StoreError::NotFound { .. } => AppointmentError::NotFound(appointment.id),
                other => other.into(),
            })?;

        Ok(appointment)
    }

    async fn compensate(&self, ctx: &RequestContext, replacement_id: Uuid) {
        let canceled = match self.load_appointment(replacement_id).await {
            Ok(current) => {
                self.transition(ctx, current, AppointmentStatus::Canceled, None)
                    .await
            }
            Err(e) => Err(e),
        };

        if let Err(e) = canceled {
            error!(
                "Replacement appointment {} could not be canceled and still occludes its slot: {}",
                replacement_id, e
            );
        }
    }

    async fn load_appointment(&self, appointment_id: Uuid) -> Result<Appointment, AppointmentError> {
        let record = self
            .store
            .read_record(collections::APPOINTMENTS, &appointment_id.to_string())
            .await
            .map_err(|e| match e {
                StoreError::NotFound { .. } => AppointmentError::NotFound(appointment_id),
                other => other.into(),
            })?;

        Ok(decode_record(collections::APPOINTMENTS, record)?)
    }

    async fn ensure_patient_exists(&self, patient_id: Uuid) -> Result<(), AppointmentError> {
        match self
            .store
            .read_record(collections::PATIENTS, &patient_id.to_string())
            .await
        {
            Ok(_) => Ok(()),
            Err(StoreError::NotFound { .. }) => Err(AppointmentError::PatientNotFound(patient_id)),
            Err(e) => Err(e.into()),
        }
    }

    fn validate_shape(&self, start: NaiveTime, end: NaiveTime) -> Result<(), AppointmentError> {
        if start >= end {
            return Err(AppointmentError::Validation(format!(
                "slot {}-{} must start before it ends",
                start, end
            )));
        }
        if !is_whole_minute(start) || !is_whole_minute(end) {
            return Err(AppointmentError::Validation(format!(
                "slot {}-{} must fall on whole minutes",
                start, end
            )));
        }

        let minutes = (end - start).num_minutes();
        let min = i64::from(self.config.min_appointment_minutes);
        let max = i64::from(self.config.max_appointment_minutes);
        if minutes < min || minutes > max {
            return Err(AppointmentError::Validation(format!(
                "appointments last between {} and {} minutes, got {}",
                min, max, minutes
            )));
        }

        Ok(())
    }

    fn ensure_not_past(
        &self,
        ctx: &RequestContext,
        doctor: &Doctor,
        date: NaiveDate,
        start: NaiveTime,
    ) -> Result<(), AppointmentError> {
        let now = local_now(doctor, ctx.now);
        if date.and_time(start) < now {
            debug!("Rejecting slot at {} {}; doctor's local time is {}", date, start, now);
            return Err(AppointmentError::Validation(format!(
                "slot {} {} is in the past",
                date, start
            )));
        }
        Ok(())
    }
}
