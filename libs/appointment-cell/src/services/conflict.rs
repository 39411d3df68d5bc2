use chrono::{NaiveDate, NaiveTime};
use serde_json::Value;
use tracing::{debug, warn};
use uuid::Uuid;

use shared_database::{ConflictPredicate, RecordFilter};

use crate::models::Appointment;

/// Occluding appointments on `date` overlapping `[start, end)`, skipping `exclude`.
pub fn find_overlaps<'a>(
    appointments: &'a [Appointment],
    date: NaiveDate,
    start: NaiveTime,
    end: NaiveTime,
    exclude: Option<Uuid>,
) -> Vec<&'a Appointment> {
    let overlapping: Vec<&Appointment> = appointments
        .iter()
        .filter(|apt| Some(apt.id) != exclude)
        .filter(|apt| apt.occludes() && apt.overlaps(date, start, end))
        .collect();

    if !overlapping.is_empty() {
        warn!(
            "Conflict detected on {} {}-{}: {} overlapping appointments",
            date,
            start,
            end,
            overlapping.len()
        );
    }
    overlapping
}

/// Predicate evaluated by the store, under its write lock, before an
/// appointment is committed. Same rule as [`find_overlaps`].
pub fn slot_conflict_predicate(
    doctor_id: Uuid,
    date: NaiveDate,
    start: NaiveTime,
    end: NaiveTime,
    exclude: Option<Uuid>,
) -> ConflictPredicate {
    let filter = RecordFilter::new()
        .eq("doctor_id", doctor_id.to_string())
        .eq("date", date.to_string());

    ConflictPredicate::new(filter, move |record: &Value| {
        match serde_json::from_value::<Appointment>(record.clone()) {
            Ok(existing) => {
                Some(existing.id) != exclude && existing.occludes() && existing.overlaps(date, start, end)
            }
            Err(e) => {
                // An unreadable neighbour cannot be proven free.
                warn!("Treating unreadable appointment record as a conflict: {}", e);
                true
            }
        }
    })
}
