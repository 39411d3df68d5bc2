pub mod appointment;
pub mod auth;
pub mod context;
pub mod error;

pub use appointment::{Appointment, AppointmentStatus};
pub use auth::{Actor, Role};
pub use context::RequestContext;
pub use error::AppError;
