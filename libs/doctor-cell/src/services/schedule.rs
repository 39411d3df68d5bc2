use std::sync::Arc;

use chrono::NaiveDate;
use serde_json::json;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use shared_database::{collections, decode_record, encode_record, RecordFilter, RecordStore, StoreError};
use shared_models::auth::Actor;
use shared_models::context::RequestContext;

use crate::models::{
    AddBlockedDateRequest, BlockedDate, Doctor, RegisterDoctorRequest, ScheduleError,
    WeeklyTemplate,
};

/// Read/write access to a doctor's weekly template and blocked dates.
///
/// Everything read back from the store is parsed and checked here before any
/// other service sees it.
#[derive(Clone)]
pub struct ScheduleService {
    store: Arc<dyn RecordStore>,
}

impl ScheduleService {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    /// Load a doctor with a validated template and offset.
    pub async fn get_doctor(&self, doctor_id: Uuid) -> Result<Doctor, ScheduleError> {
        let doctor = self.load_doctor(doctor_id).await?;

        if let Err(reason) = doctor.weekly_template.validate() {
            error!("Doctor {} has an invalid weekly template: {}", doctor_id, reason);
            return Err(ScheduleError::DataIntegrity(format!(
                "weekly template of doctor {}: {}",
                doctor_id, reason
            )));
        }

        if doctor.offset().is_none() {
            error!("Doctor {} has an invalid UTC offset: {}", doctor_id, doctor.utc_offset_minutes);
            return Err(ScheduleError::DataIntegrity(format!(
                "UTC offset of doctor {} is out of range: {} minutes",
                doctor_id, doctor.utc_offset_minutes
            )));
        }

        Ok(doctor)
    }

    pub async fn get_weekly_template(&self, doctor_id: Uuid) -> Result<WeeklyTemplate, ScheduleError> {
        debug!("Fetching weekly template for doctor {}", doctor_id);
        Ok(self.get_doctor(doctor_id).await?.weekly_template)
    }

    /// Blocked dates of `doctor_id` falling in `[range_start, range_end]`, ordered by date.
    pub async fn get_blocked_dates(
        &self,
        doctor_id: Uuid,
        range_start: NaiveDate,
        range_end: NaiveDate,
    ) -> Result<Vec<BlockedDate>, ScheduleError> {
        // Resolve the doctor first so an unknown id is NotFound rather than empty.
        self.ensure_doctor_exists(doctor_id).await?;
        self.query_blocked_dates(doctor_id, range_start, range_end).await
    }

    pub(crate) async fn query_blocked_dates(
        &self,
        doctor_id: Uuid,
        range_start: NaiveDate,
        range_end: NaiveDate,
    ) -> Result<Vec<BlockedDate>, ScheduleError> {
        if range_end < range_start {
            return Ok(Vec::new());
        }

        let filter = RecordFilter::new()
            .eq("doctor_id", doctor_id.to_string())
            .between("date", range_start.to_string(), range_end.to_string());

        let mut blocked = self
            .store
            .query_records(collections::BLOCKED_DATES, &filter)
            .await?
            .into_iter()
            .map(|record| decode_record::<BlockedDate>(collections::BLOCKED_DATES, record))
            .collect::<Result<Vec<_>, _>>()?;

        for block in &blocked {
            if let Some(range) = &block.range {
                if let Err(reason) = range.validate() {
                    error!("Blocked date {} of doctor {} is invalid: {}", block.id, doctor_id, reason);
                    return Err(ScheduleError::DataIntegrity(format!(
                        "blocked date {}: {}",
                        block.id, reason
                    )));
                }
            }
        }

        blocked.sort_by_key(|block| (block.date, block.range.map(|r| r.start)));
        debug!("Found {} blocked dates for doctor {}", blocked.len(), doctor_id);
        Ok(blocked)
    }

    pub async fn register_doctor(
        &self,
        ctx: &RequestContext,
        request: RegisterDoctorRequest,
    ) -> Result<Doctor, ScheduleError> {
        if !ctx.actor.is_admin() {
            return Err(ScheduleError::Unauthorized(
                "only administrators can register doctors".to_string(),
            ));
        }
        if request.full_name.trim().is_empty() {
            return Err(ScheduleError::Validation("full_name must not be empty".to_string()));
        }
        request
            .weekly_template
            .validate()
            .map_err(ScheduleError::Validation)?;

        let doctor = Doctor {
            id: Uuid::new_v4(),
            full_name: request.full_name,
            specialty: request.specialty,
            utc_offset_minutes: request.utc_offset_minutes,
            weekly_template: request.weekly_template,
            created_at: ctx.now,
            updated_at: ctx.now,
        };

        if doctor.offset().is_none() {
            return Err(ScheduleError::Validation(format!(
                "utc_offset_minutes {} is out of range",
                doctor.utc_offset_minutes
            )));
        }

        let record = encode_record(collections::DOCTORS, &doctor)?;
        self.store
            .write_record(collections::DOCTORS, &doctor.id.to_string(), record)
            .await?;

        info!("Registered doctor {} ({})", doctor.id, doctor.full_name);
        Ok(doctor)
    }

    /// Replace the weekly template. Existing appointments are left untouched.
    pub async fn update_weekly_template(
        &self,
        ctx: &RequestContext,
        doctor_id: Uuid,
        template: WeeklyTemplate,
    ) -> Result<Doctor, ScheduleError> {
        ensure_can_manage(&ctx.actor, doctor_id)?;
        template.validate().map_err(|reason| {
            warn!("Rejected weekly template for doctor {}: {}", doctor_id, reason);
            ScheduleError::Validation(reason)
        })?;

        let mut doctor = self.load_doctor(doctor_id).await?;
        doctor.weekly_template = template;
        doctor.updated_at = ctx.now;

        let record = encode_record(collections::DOCTORS, &doctor)?;
        self.store
            .write_record(collections::DOCTORS, &doctor_id.to_string(), record)
            .await?;

        info!("Updated weekly template for doctor {}", doctor_id);
        Ok(doctor)
    }

    pub async fn add_blocked_date(
        &self,
        ctx: &RequestContext,
        doctor_id: Uuid,
        request: AddBlockedDateRequest,
    ) -> Result<BlockedDate, ScheduleError> {
        ensure_can_manage(&ctx.actor, doctor_id)?;
        if let Some(range) = &request.range {
            range.validate().map_err(ScheduleError::Validation)?;
        }
        self.ensure_doctor_exists(doctor_id).await?;

        let block = BlockedDate {
            id: Uuid::new_v4(),
            doctor_id,
            date: request.date,
            range: request.range,
            reason: request.reason,
            created_at: ctx.now,
        };

        let record = encode_record(collections::BLOCKED_DATES, &block)?;
        self.store
            .write_record(collections::BLOCKED_DATES, &block.id.to_string(), record)
            .await?;

        match &block.range {
            Some(range) => info!(
                "Blocked {} {}-{} for doctor {}",
                block.date, range.start, range.end, doctor_id
            ),
            None => info!("Blocked all of {} for doctor {}", block.date, doctor_id),
        }
        Ok(block)
    }

    /// Parse the stored doctor without checking schedule invariants, so a
    /// corrupt template can still be replaced.
    async fn load_doctor(&self, doctor_id: Uuid) -> Result<Doctor, ScheduleError> {
        let record = self
            .store
            .read_record(collections::DOCTORS, &doctor_id.to_string())
            .await
            .map_err(|e| match e {
                StoreError::NotFound { .. } => ScheduleError::DoctorNotFound(doctor_id),
                other => other.into(),
            })?;

        Ok(decode_record(collections::DOCTORS, record)?)
    }

    async fn ensure_doctor_exists(&self, doctor_id: Uuid) -> Result<(), ScheduleError> {
        match self
            .store
            .read_record(collections::DOCTORS, &doctor_id.to_string())
            .await
        {
            Ok(_) => Ok(()),
            Err(StoreError::NotFound { .. }) => Err(ScheduleError::DoctorNotFound(doctor_id)),
            Err(e) => Err(e.into()),
        }
    }
}

/// Template and block writes belong to the doctor themself or an admin.
pub fn ensure_can_manage(actor: &Actor, doctor_id: Uuid) -> Result<(), ScheduleError> {
    if actor.is_admin() || actor.is_doctor(doctor_id) {
        Ok(())
    } else {
        warn!("Actor {} may not manage the schedule of doctor {}", actor.id, doctor_id);
        Err(ScheduleError::Unauthorized(format!(
            "actor {} may not manage the schedule of doctor {}",
            actor.id, doctor_id
        )))
    }
}

/// JSON body used by the HTTP layer for a doctor's schedule summary.
pub fn schedule_summary(doctor: &Doctor) -> serde_json::Value {
    json!({
        "doctor_id": doctor.id,
        "full_name": doctor.full_name,
        "utc_offset_minutes": doctor.utc_offset_minutes,
        "weekly_template": doctor.weekly_template,
    })
}
