pub mod availability;
pub mod interval;
pub mod schedule;

pub use availability::{AvailabilityService, DayAvailability};
pub use schedule::ScheduleService;
