pub mod access;
pub mod booking;
pub mod conflict;
pub mod lifecycle;

pub use booking::AppointmentBookingService;
pub use lifecycle::AppointmentLifecycleService;
