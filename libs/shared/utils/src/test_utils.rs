use base64::{engine::general_purpose, Engine as _};
use chrono::{Duration, Utc};
use hmac::{Hmac, Mac};
use serde_json::json;
use sha2::Sha256;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::{collections, RecordStore, StoreError};
use shared_models::auth::Actor;

pub struct TestConfig {
    pub jwt_secret: String,
    pub auto_confirm_bookings: bool,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            jwt_secret: "test-secret-key-for-jwt-validation-must-be-long-enough".to_string(),
            auto_confirm_bookings: false,
        }
    }
}

impl TestConfig {
    pub fn to_app_config(&self) -> AppConfig {
        let mut config = AppConfig::in_memory();
        config.supabase_jwt_secret = self.jwt_secret.clone();
        config.scheduling.auto_confirm_bookings = self.auto_confirm_bookings;
        config
    }
}

pub struct JwtTestUtils;

impl JwtTestUtils {
    pub fn create_test_token(actor: &Actor, secret: &str, exp_hours: Option<i64>) -> String {
        let now = Utc::now();
        let exp = now + Duration::hours(exp_hours.unwrap_or(24));

        let header = json!({
            "alg": "HS256",
            "typ": "JWT"
        });

        let payload = json!({
            "sub": actor.id,
            "role": actor.role,
            "iat": now.timestamp(),
            "exp": exp.timestamp()
        });

        let header_encoded = general_purpose::URL_SAFE_NO_PAD.encode(header.to_string());
        let payload_encoded = general_purpose::URL_SAFE_NO_PAD.encode(payload.to_string());

        let signing_input = format!("{}.{}", header_encoded, payload_encoded);

        let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
            .expect("HMAC can take key of any size");
        mac.update(signing_input.as_bytes());
        let signature = mac.finalize().into_bytes();
        let signature_encoded = general_purpose::URL_SAFE_NO_PAD.encode(signature);

        format!("{}.{}", signing_input, signature_encoded)
    }

    pub fn create_expired_token(actor: &Actor, secret: &str) -> String {
        Self::create_test_token(actor, secret, Some(-1))
    }

    pub fn bearer(actor: &Actor, secret: &str) -> String {
        format!("Bearer {}", Self::create_test_token(actor, secret, None))
    }
}

/// Insert a bare patient record so bookings can resolve the patient id.
pub async fn seed_patient(store: &dyn RecordStore, name: &str) -> Result<Uuid, StoreError> {
    let id = Uuid::new_v4();
    store
        .write_record(
            collections::PATIENTS,
            &id.to_string(),
            json!({
                "full_name": name,
                "created_at": Utc::now().to_rfc3339()
            }),
        )
        .await?;
    Ok(id)
}
