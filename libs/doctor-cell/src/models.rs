use chrono::{DateTime, FixedOffset, NaiveDate, NaiveTime, Timelike, Utc, Weekday};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use shared_database::StoreError;
use shared_models::error::AppError;

// ==============================================================================
// SCHEDULE MODELS
// ==============================================================================

/// A wall-clock interval `[start, end)` within one day.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct TimeRange {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl TimeRange {
    pub fn new(start: NaiveTime, end: NaiveTime) -> Self {
        Self { start, end }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.start >= self.end {
            return Err(format!(
                "interval {}-{} must start before it ends",
                self.start, self.end
            ));
        }
        if !is_whole_minute(self.start) || !is_whole_minute(self.end) {
            return Err(format!(
                "interval {}-{} must fall on whole minutes",
                self.start, self.end
            ));
        }
        Ok(())
    }
}

pub fn is_whole_minute(time: NaiveTime) -> bool {
    time.second() == 0 && time.nanosecond() == 0
}

/// Recurring availability per weekday, in the doctor's fixed offset.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct WeeklyTemplate {
    #[serde(default)]
    pub monday: Vec<TimeRange>,
    #[serde(default)]
    pub tuesday: Vec<TimeRange>,
    #[serde(default)]
    pub wednesday: Vec<TimeRange>,
    #[serde(default)]
    pub thursday: Vec<TimeRange>,
    #[serde(default)]
    pub friday: Vec<TimeRange>,
    #[serde(default)]
    pub saturday: Vec<TimeRange>,
    #[serde(default)]
    pub sunday: Vec<TimeRange>,
}

impl WeeklyTemplate {
    pub fn day(&self, weekday: Weekday) -> &[TimeRange] {
        match weekday {
            Weekday::Mon => &self.monday,
            Weekday::Tue => &self.tuesday,
            Weekday::Wed => &self.wednesday,
            Weekday::Thu => &self.thursday,
            Weekday::Fri => &self.friday,
            Weekday::Sat => &self.saturday,
            Weekday::Sun => &self.sunday,
        }
    }

    pub fn day_mut(&mut self, weekday: Weekday) -> &mut Vec<TimeRange> {
        match weekday {
            Weekday::Mon => &mut self.monday,
            Weekday::Tue => &mut self.tuesday,
            Weekday::Wed => &mut self.wednesday,
            Weekday::Thu => &mut self.thursday,
            Weekday::Fri => &mut self.friday,
            Weekday::Sat => &mut self.saturday,
            Weekday::Sun => &mut self.sunday,
        }
    }

    /// Builder helper: append one interval to a weekday.
    pub fn with(mut self, weekday: Weekday, start: NaiveTime, end: NaiveTime) -> Self {
        self.day_mut(weekday).push(TimeRange::new(start, end));
        self
    }

    /// Each day's intervals must be well-formed, sorted and non-overlapping.
    /// Touching intervals (`a.end == b.start`) are allowed.
    pub fn validate(&self) -> Result<(), String> {
        for weekday in ALL_WEEKDAYS {
            let ranges = self.day(weekday);
            for range in ranges {
                range.validate().map_err(|e| format!("{}: {}", weekday, e))?;
            }
            for pair in ranges.windows(2) {
                if pair[1].start < pair[0].end {
                    return Err(format!(
                        "{}: intervals {}-{} and {}-{} overlap or are out of order",
                        weekday, pair[0].start, pair[0].end, pair[1].start, pair[1].end
                    ));
                }
            }
        }
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        ALL_WEEKDAYS.iter().all(|day| self.day(*day).is_empty())
    }
}

pub const ALL_WEEKDAYS: [Weekday; 7] = [
    Weekday::Mon,
    Weekday::Tue,
    Weekday::Wed,
    Weekday::Thu,
    Weekday::Fri,
    Weekday::Sat,
    Weekday::Sun,
];

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Doctor {
    pub id: Uuid,
    pub full_name: String,
    #[serde(default)]
    pub specialty: Option<String>,
    /// Fixed offset from UTC, in minutes, that all schedule times are expressed in.
    #[serde(default)]
    pub utc_offset_minutes: i32,
    #[serde(default)]
    pub weekly_template: WeeklyTemplate,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Doctor {
    pub fn offset(&self) -> Option<FixedOffset> {
        FixedOffset::east_opt(self.utc_offset_minutes.checked_mul(60)?)
    }
}

/// A specific date (optionally a sub-range of it) the doctor is unavailable.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BlockedDate {
    pub id: Uuid,
    pub doctor_id: Uuid,
    pub date: NaiveDate,
    /// `None` blocks the whole day.
    #[serde(default)]
    pub range: Option<TimeRange>,
    #[serde(default)]
    pub reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl BlockedDate {
    pub fn is_full_day(&self) -> bool {
        self.range.is_none()
    }
}

/// A bookable unit of time. Computed per query, never stored.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Slot {
    pub doctor_id: Uuid,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub duration_minutes: u32,
}

// ==============================================================================
// REQUEST/RESPONSE MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterDoctorRequest {
    pub full_name: String,
    pub specialty: Option<String>,
    #[serde(default)]
    pub utc_offset_minutes: i32,
    #[serde(default)]
    pub weekly_template: WeeklyTemplate,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddBlockedDateRequest {
    pub date: NaiveDate,
    pub range: Option<TimeRange>,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AvailableSlotsResponse {
    pub doctor_id: Uuid,
    pub from: NaiveDate,
    pub to: NaiveDate,
    pub utc_offset_minutes: i32,
    pub slots: Vec<Slot>,
}

// ==============================================================================
// ERRORS
// ==============================================================================

#[derive(Error, Debug)]
pub enum ScheduleError {
    #[error("Doctor not found: {0}")]
    DoctorNotFound(Uuid),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Stored schedule is inconsistent: {0}")]
    DataIntegrity(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Storage error: {0}")]
    Store(StoreError),
}

impl From<StoreError> for ScheduleError {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::Malformed { collection, reason } => {
                ScheduleError::DataIntegrity(format!("{}: {}", collection, reason))
            }
            other => ScheduleError::Store(other),
        }
    }
}

impl From<ScheduleError> for AppError {
    fn from(error: ScheduleError) -> Self {
        match error {
            ScheduleError::DoctorNotFound(id) => AppError::NotFound(format!("Doctor not found: {}", id)),
            ScheduleError::Validation(msg) => AppError::ValidationError(msg),
            ScheduleError::DataIntegrity(msg) => AppError::DataIntegrity(msg),
            ScheduleError::Unauthorized(msg) => AppError::Forbidden(msg),
            ScheduleError::Store(e) => AppError::Database(e.to_string()),
        }
    }
}
