pub const DOCTORS: &str = "doctors";
pub const PATIENTS: &str = "patients";
pub const BLOCKED_DATES: &str = "blocked_dates";
pub const APPOINTMENTS: &str = "appointments";
