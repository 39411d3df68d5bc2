use std::sync::Arc;

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, Utc};
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use shared_config::SchedulingConfig;
use shared_database::{collections, decode_record, RecordFilter, RecordStore};
use shared_models::appointment::Appointment;
use shared_models::context::RequestContext;

use crate::models::{
    AvailableSlotsResponse, BlockedDate, Doctor, ScheduleError, Slot, WeeklyTemplate,
};
use crate::services::interval::{self, Interval};
use crate::services::schedule::ScheduleService;

const MINUTES_PER_DAY: u32 = 24 * 60;

/// One doctor's availability on one date, kept per stage so callers can tell
/// *why* a span is unavailable.
#[derive(Debug, Clone, PartialEq)]
pub struct DayAvailability {
    pub date: NaiveDate,
    /// Template intervals for the weekday, merged.
    pub working: Vec<Interval>,
    /// `working` minus blocked ranges.
    pub unblocked: Vec<Interval>,
    /// `unblocked` minus occluding appointments.
    pub free: Vec<Interval>,
    /// Occluding appointments on the date.
    pub appointments: Vec<Appointment>,
}

/// Expands weekly templates into bookable slots.
#[derive(Clone)]
pub struct AvailabilityService {
    store: Arc<dyn RecordStore>,
    schedule: ScheduleService,
    config: SchedulingConfig,
}

impl AvailabilityService {
    pub fn new(store: Arc<dyn RecordStore>, config: &SchedulingConfig) -> Self {
        Self {
            schedule: ScheduleService::new(Arc::clone(&store)),
            store,
            config: config.clone(),
        }
    }

    pub fn schedule(&self) -> &ScheduleService {
        &self.schedule
    }

    /// Free slots of `slot_duration_minutes` for every date in
    /// `[range_start, range_end]`, ordered by `(date, start_time)`.
    ///
    /// Slots on the doctor's current local date start no earlier than now;
    /// earlier dates produce nothing.
    #[instrument(skip(self, ctx), fields(actor = %ctx.actor.id))]
    pub async fn generate_available_slots(
        &self,
        ctx: &RequestContext,
        doctor_id: Uuid,
        range_start: NaiveDate,
        range_end: NaiveDate,
        slot_duration_minutes: u32,
    ) -> Result<Vec<Slot>, ScheduleError> {
        if !self.validate_request(doctor_id, range_start, range_end, slot_duration_minutes)? {
            return Ok(Vec::new());
        }

        let doctor = self.schedule.get_doctor(doctor_id).await?;
        self.slots_for_doctor(ctx, &doctor, range_start, range_end, slot_duration_minutes)
            .await
    }

    /// Slots together with the offset of the doctor record they were computed
    /// from. Unlike `generate_available_slots`, an unknown doctor is an error
    /// even for an empty range.
    #[instrument(skip(self, ctx), fields(actor = %ctx.actor.id))]
    pub async fn available_slots(
        &self,
        ctx: &RequestContext,
        doctor_id: Uuid,
        range_start: NaiveDate,
        range_end: NaiveDate,
        slot_duration_minutes: u32,
    ) -> Result<AvailableSlotsResponse, ScheduleError> {
        let non_empty =
            self.validate_request(doctor_id, range_start, range_end, slot_duration_minutes)?;

        let doctor = self.schedule.get_doctor(doctor_id).await?;
        let slots = if non_empty {
            self.slots_for_doctor(ctx, &doctor, range_start, range_end, slot_duration_minutes)
                .await?
        } else {
            Vec::new()
        };

        Ok(AvailableSlotsResponse {
            doctor_id,
            from: range_start,
            to: range_end,
            utc_offset_minutes: doctor.utc_offset_minutes,
            slots,
        })
    }

    /// `Ok(false)` for an inverted range.
    fn validate_request(
        &self,
        doctor_id: Uuid,
        range_start: NaiveDate,
        range_end: NaiveDate,
        slot_duration_minutes: u32,
    ) -> Result<bool, ScheduleError> {
        self.validate_slot_duration(slot_duration_minutes)?;

        if range_end < range_start {
            debug!("Empty range {}..{} for doctor {}", range_start, range_end, doctor_id);
            return Ok(false);
        }

        let days = (range_end - range_start).num_days() + 1;
        if days > i64::from(self.config.max_availability_range_days) {
            return Err(ScheduleError::Validation(format!(
                "range of {} days exceeds the maximum of {}",
                days, self.config.max_availability_range_days
            )));
        }

        Ok(true)
    }

    async fn slots_for_doctor(
        &self,
        ctx: &RequestContext,
        doctor: &Doctor,
        range_start: NaiveDate,
        range_end: NaiveDate,
        slot_duration_minutes: u32,
    ) -> Result<Vec<Slot>, ScheduleError> {
        let local_now = local_now(doctor, ctx.now);
        let today = local_now.date();

        let first_day = range_start.max(today);
        if range_end < first_day {
            debug!("Range {}..{} lies entirely in the past", range_start, range_end);
            return Ok(Vec::new());
        }

        let blocked = self
            .schedule
            .query_blocked_dates(doctor.id, first_day, range_end)
            .await?;
        let appointments = self
            .occluding_appointments(doctor.id, first_day, range_end, None)
            .await?;

        let mut slots = Vec::new();
        for date in first_day.iter_days().take_while(|date| *date <= range_end) {
            let day = compute_day(&doctor.weekly_template, date, &blocked, &appointments);
            let earliest = (date == today).then(|| interval::ceil_minute_of_day(local_now.time()));
            slots.extend(slots_for_day(doctor.id, &day, slot_duration_minutes, earliest));
        }

        debug!(
            "Generated {} slots for doctor {} between {} and {}",
            slots.len(),
            doctor.id,
            range_start,
            range_end
        );
        Ok(slots)
    }

    /// Fresh availability for a single date, read straight from the store.
    /// `exclude` drops one appointment from the occluding set.
    pub async fn day_availability(
        &self,
        doctor: &Doctor,
        date: NaiveDate,
        exclude: Option<Uuid>,
    ) -> Result<DayAvailability, ScheduleError> {
        let blocked = self.schedule.query_blocked_dates(doctor.id, date, date).await?;
        let appointments = self
            .occluding_appointments(doctor.id, date, date, exclude)
            .await?;

        Ok(compute_day(&doctor.weekly_template, date, &blocked, &appointments))
    }

    pub fn validate_slot_duration(&self, minutes: u32) -> Result<(), ScheduleError> {
        let min = self.config.min_appointment_minutes;
        let max = self.config.max_appointment_minutes;

        if minutes < min || minutes > max || minutes >= MINUTES_PER_DAY {
            return Err(ScheduleError::Validation(format!(
                "slot duration must be between {} and {} minutes, got {}",
                min, max, minutes
            )));
        }
        Ok(())
    }

    async fn occluding_appointments(
        &self,
        doctor_id: Uuid,
        range_start: NaiveDate,
        range_end: NaiveDate,
        exclude: Option<Uuid>,
    ) -> Result<Vec<Appointment>, ScheduleError> {
        let filter = RecordFilter::new()
            .eq("doctor_id", doctor_id.to_string())
            .between("date", range_start.to_string(), range_end.to_string());

        let records = self
            .store
            .query_records(collections::APPOINTMENTS, &filter)
            .await?;

        let mut appointments = Vec::with_capacity(records.len());
        for record in records {
            let appointment: Appointment = decode_record(collections::APPOINTMENTS, record)?;
            if appointment.occludes() && Some(appointment.id) != exclude {
                appointments.push(appointment);
            }
        }

        Ok(appointments)
    }
}

/// The doctor's wall clock at `now`.
pub fn local_now(doctor: &Doctor, now: DateTime<Utc>) -> NaiveDateTime {
    match doctor.offset() {
        Some(offset) => now.with_timezone(&offset).naive_local(),
        None => now.naive_utc(),
    }
}

/// Template − blocks − appointments for one date. Pure.
pub fn compute_day(
    template: &WeeklyTemplate,
    date: NaiveDate,
    blocked: &[BlockedDate],
    appointments: &[Appointment],
) -> DayAvailability {
    let working = interval::union(
        template
            .day(date.weekday())
            .iter()
            .filter_map(Interval::from_range)
            .collect(),
    );

    let blocks: Vec<Interval> = blocked
        .iter()
        .filter(|block| block.date == date)
        .filter_map(|block| match &block.range {
            None => Interval::new(0, MINUTES_PER_DAY),
            Some(range) => Interval::from_range(range),
        })
        .collect();
    let unblocked = interval::subtract(&working, &interval::union(blocks));

    let day_appointments: Vec<Appointment> = appointments
        .iter()
        .filter(|apt| apt.date == date && apt.occludes())
        .cloned()
        .collect();
    let booked: Vec<Interval> = day_appointments
        .iter()
        .filter_map(|apt| {
            let span = Interval::from_times(apt.start_time, apt.end_time);
            if span.is_none() {
                warn!("Appointment {} has an empty or inverted interval", apt.id);
            }
            span
        })
        .collect();
    let free = interval::subtract(&unblocked, &interval::union(booked));

    DayAvailability {
        date,
        working,
        unblocked,
        free,
        appointments: day_appointments,
    }
}

/// Chunk a day's free spans into slots, dropping any starting before
/// `earliest_start` (minutes since local midnight).
pub fn slots_for_day(
    doctor_id: Uuid,
    day: &DayAvailability,
    slot_duration_minutes: u32,
    earliest_start: Option<u32>,
) -> Vec<Slot> {
    interval::chunk(&day.free, slot_duration_minutes)
        .into_iter()
        .filter(|chunk| earliest_start.map_or(true, |earliest| chunk.start >= earliest))
        .filter_map(|chunk| {
            Some(Slot {
                doctor_id,
                date: day.date,
                start_time: chunk.start_time()?,
                end_time: chunk.end_time()?,
                duration_minutes: slot_duration_minutes,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveTime, Weekday};
    use serde_json::json;
    use shared_models::appointment::AppointmentStatus;

    use crate::models::TimeRange;

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    // 2025-06-16 is a Monday.
    fn monday() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, 16).unwrap()
    }

    fn appointment(date: NaiveDate, start: NaiveTime, end: NaiveTime, status: AppointmentStatus) -> Appointment {
        serde_json::from_value(json!({
            "id": Uuid::new_v4(),
            "doctor_id": Uuid::new_v4(),
            "patient_id": Uuid::new_v4(),
            "date": date,
            "start_time": start,
            "end_time": end,
            "status": status,
            "created_at": "2025-06-01T00:00:00Z",
            "updated_at": "2025-06-01T00:00:00Z"
        }))
        .unwrap()
    }

    fn block(date: NaiveDate, range: Option<TimeRange>) -> BlockedDate {
        BlockedDate {
            id: Uuid::new_v4(),
            doctor_id: Uuid::new_v4(),
            date,
            range,
            reason: None,
            created_at: Utc::now(),
        }
    }

    fn starts(slots: &[Slot]) -> Vec<NaiveTime> {
        slots.iter().map(|slot| slot.start_time).collect()
    }

    #[test]
    fn partial_block_removes_only_overlapping_slot() {
        let template = WeeklyTemplate::default().with(Weekday::Mon, t(9, 0), t(12, 0));
        let blocked = vec![block(monday(), Some(TimeRange::new(t(10, 0), t(10, 30))))];

        let day = compute_day(&template, monday(), &blocked, &[]);
        let slots = slots_for_day(Uuid::new_v4(), &day, 30, None);

        assert_eq!(
            starts(&slots),
            vec![t(9, 0), t(9, 30), t(10, 30), t(11, 0), t(11, 30)]
        );
    }

    #[test]
    fn full_day_block_removes_everything() {
        let template = WeeklyTemplate::default().with(Weekday::Mon, t(9, 0), t(17, 0));
        let blocked = vec![block(monday(), None)];

        let day = compute_day(&template, monday(), &blocked, &[]);

        assert!(day.free.is_empty());
        assert_eq!(day.working.len(), 1);
    }

    #[test]
    fn canceled_and_completed_appointments_do_not_occlude() {
        let template = WeeklyTemplate::default().with(Weekday::Mon, t(9, 0), t(10, 0));
        let appointments = vec![
            appointment(monday(), t(9, 0), t(9, 30), AppointmentStatus::Canceled),
            appointment(monday(), t(9, 30), t(10, 0), AppointmentStatus::Completed),
        ];

        let day = compute_day(&template, monday(), &[], &appointments);

        assert_eq!(slots_for_day(Uuid::new_v4(), &day, 30, None).len(), 2);
        assert!(day.appointments.is_empty());
    }

    #[test]
    fn pending_appointment_occludes_its_interval() {
        let template = WeeklyTemplate::default().with(Weekday::Mon, t(9, 0), t(11, 0));
        let appointments = vec![appointment(monday(), t(9, 30), t(10, 0), AppointmentStatus::Pending)];

        let day = compute_day(&template, monday(), &[], &appointments);

        assert_eq!(
            starts(&slots_for_day(Uuid::new_v4(), &day, 30, None)),
            vec![t(9, 0), t(10, 0), t(10, 30)]
        );
    }

    #[test]
    fn touching_template_intervals_chunk_as_one_span() {
        let template = WeeklyTemplate::default()
            .with(Weekday::Mon, t(9, 0), t(9, 45))
            .with(Weekday::Mon, t(9, 45), t(10, 30));

        let day = compute_day(&template, monday(), &[], &[]);

        assert_eq!(
            starts(&slots_for_day(Uuid::new_v4(), &day, 30, None)),
            vec![t(9, 0), t(9, 30), t(10, 0)]
        );
    }

    #[test]
    fn weekday_without_template_yields_nothing() {
        let template = WeeklyTemplate::default().with(Weekday::Tue, t(9, 0), t(12, 0));

        let day = compute_day(&template, monday(), &[], &[]);

        assert!(slots_for_day(Uuid::new_v4(), &day, 30, None).is_empty());
    }

    #[test]
    fn earliest_start_keeps_grid_alignment() {
        let template = WeeklyTemplate::default().with(Weekday::Mon, t(9, 0), t(17, 0));
        let day = compute_day(&template, monday(), &[], &[]);

        let at_two = slots_for_day(Uuid::new_v4(), &day, 30, Some(14 * 60));
        let after_two = slots_for_day(Uuid::new_v4(), &day, 30, Some(14 * 60 + 10));

        assert_eq!(at_two.first().map(|s| s.start_time), Some(t(14, 0)));
        assert_eq!(after_two.first().map(|s| s.start_time), Some(t(14, 30)));
    }
}
