use std::env;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    Memory,
    File,
    Supabase,
}

impl FromStr for StorageBackend {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(StorageBackend::Memory),
            "file" => Ok(StorageBackend::File),
            "supabase" => Ok(StorageBackend::Supabase),
            other => Err(format!("unknown storage backend '{}'", other)),
        }
    }
}

impl fmt::Display for StorageBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageBackend::Memory => write!(f, "memory"),
            StorageBackend::File => write!(f, "file"),
            StorageBackend::Supabase => write!(f, "supabase"),
        }
    }
}

/// Tunables for slot generation and booking validation.
#[derive(Debug, Clone)]
pub struct SchedulingConfig {
    pub default_slot_duration_minutes: u32,
    pub min_appointment_minutes: u32,
    pub max_appointment_minutes: u32,
    pub max_availability_range_days: u32,
    pub auto_confirm_bookings: bool,
}

impl Default for SchedulingConfig {
    fn default() -> Self {
        Self {
            default_slot_duration_minutes: 30,
            min_appointment_minutes: 5,
            max_appointment_minutes: 240,
            max_availability_range_days: 62,
            auto_confirm_bookings: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub storage_backend: StorageBackend,
    pub data_dir: PathBuf,
    pub supabase_url: String,
    pub supabase_anon_key: String,
    pub supabase_jwt_secret: String,
    pub server_port: u16,
    pub scheduling: SchedulingConfig,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let defaults = SchedulingConfig::default();

        let config = Self {
            storage_backend: env_parsed("STORAGE_BACKEND", StorageBackend::File),
            data_dir: env::var("DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| {
                    warn!("DATA_DIR not set, using ./data");
                    PathBuf::from("./data")
                }),
            supabase_url: env::var("SUPABASE_URL")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_URL not set, using empty value");
                    String::new()
                }),
            supabase_anon_key: env::var("SUPABASE_ANON_PUBLIC_KEY")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_ANON_PUBLIC_KEY not set, using empty value");
                    String::new()
                }),
            supabase_jwt_secret: env::var("SUPABASE_JWT_SECRET")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_JWT_SECRET not set, using empty value");
                    String::new()
                }),
            server_port: env_parsed("SERVER_PORT", 3000),
            scheduling: SchedulingConfig {
                default_slot_duration_minutes: env_parsed(
                    "DEFAULT_SLOT_DURATION_MINUTES",
                    defaults.default_slot_duration_minutes,
                ),
                min_appointment_minutes: env_parsed(
                    "MIN_APPOINTMENT_MINUTES",
                    defaults.min_appointment_minutes,
                ),
                max_appointment_minutes: env_parsed(
                    "MAX_APPOINTMENT_MINUTES",
                    defaults.max_appointment_minutes,
                ),
                max_availability_range_days: env_parsed(
                    "MAX_AVAILABILITY_RANGE_DAYS",
                    defaults.max_availability_range_days,
                ),
                auto_confirm_bookings: env_parsed(
                    "AUTO_CONFIRM_BOOKINGS",
                    defaults.auto_confirm_bookings,
                ),
            },
        };

        if !config.is_configured() {
            warn!("Application not fully configured - missing environment variables");
        }

        config
    }

    /// Configuration for an in-process store, used by tests and local tooling.
    pub fn in_memory() -> Self {
        Self {
            storage_backend: StorageBackend::Memory,
            data_dir: PathBuf::from("./data"),
            supabase_url: String::new(),
            supabase_anon_key: String::new(),
            supabase_jwt_secret: String::new(),
            server_port: 3000,
            scheduling: SchedulingConfig::default(),
        }
    }

    pub fn is_configured(&self) -> bool {
        let storage_ready = match self.storage_backend {
            StorageBackend::Supabase => {
                !self.supabase_url.is_empty() && !self.supabase_anon_key.is_empty()
            }
            StorageBackend::Memory | StorageBackend::File => true,
        };

        storage_ready && !self.supabase_jwt_secret.is_empty()
    }
}

fn env_parsed<T>(key: &str, default: T) -> T
where
    T: FromStr + std::fmt::Debug,
{
    match env::var(key) {
        Ok(raw) => raw.parse().unwrap_or_else(|_| {
            warn!("{} has invalid value '{}', using {:?}", key, raw, default);
            default
        }),
        Err(_) => {
            warn!("{} not set, using {:?}", key, default);
            default
        }
    }
}
