use std::sync::Arc;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use chrono::{Duration, NaiveTime, Utc, Weekday};
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

use doctor_cell::models::{RegisterDoctorRequest, WeeklyTemplate};
use doctor_cell::router::doctor_routes;
use doctor_cell::services::ScheduleService;
use shared_models::auth::Actor;
use shared_models::context::RequestContext;
use shared_utils::test_utils::{JwtTestUtils, TestConfig};
use shared_utils::AppState;

fn t(h: u32, m: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(h, m, 0).unwrap()
}

struct TestApp {
    state: Arc<AppState>,
    secret: String,
}

impl TestApp {
    fn new() -> Self {
        let test_config = TestConfig::default();
        Self {
            state: Arc::new(AppState::in_memory(test_config.to_app_config())),
            secret: test_config.jwt_secret,
        }
    }

    fn router(&self) -> Router {
        doctor_routes(Arc::clone(&self.state))
    }

    fn bearer(&self, actor: &Actor) -> String {
        JwtTestUtils::bearer(actor, &self.secret)
    }

    /// A doctor working every weekday 09:00-12:00.
    async fn seed_doctor(&self) -> Uuid {
        let mut template = WeeklyTemplate::default();
        for day in [Weekday::Mon, Weekday::Tue, Weekday::Wed, Weekday::Thu, Weekday::Fri] {
            template = template.with(day, t(9, 0), t(12, 0));
        }

        ScheduleService::new(Arc::clone(&self.state.store))
            .register_doctor(
                &RequestContext::new(Actor::admin(Uuid::new_v4())),
                RegisterDoctorRequest {
                    full_name: "Dr. Ada Lovelace".to_string(),
                    specialty: None,
                    utc_offset_minutes: 0,
                    weekly_template: template,
                },
            )
            .await
            .unwrap()
            .id
    }
}

async fn body_json(response: axum::response::Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&body).unwrap()
}

#[tokio::test]
async fn available_slots_require_a_token() {
    let app = TestApp::new();
    let doctor_id = app.seed_doctor().await;

    let request = Request::builder()
        .method("GET")
        .uri(format!("/{}/available-slots?from=2030-01-07&to=2030-01-07", doctor_id))
        .body(Body::empty())
        .unwrap();

    let response = app.router().oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn available_slots_use_default_duration() {
    let app = TestApp::new();
    let doctor_id = app.seed_doctor().await;
    let patient = Actor::patient(Uuid::new_v4());

    // 2030-01-07 is a Monday.
    let request = Request::builder()
        .method("GET")
        .uri(format!("/{}/available-slots?from=2030-01-07&to=2030-01-07", doctor_id))
        .header("Authorization", app.bearer(&patient))
        .body(Body::empty())
        .unwrap();

    let response = app.router().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    let slots = json["slots"].as_array().unwrap();
    assert_eq!(slots.len(), 6);
    assert_eq!(slots[0]["start_time"], "09:00:00");
    assert_eq!(slots[0]["duration_minutes"], 30);
    assert_eq!(json["utc_offset_minutes"], 0);
}

#[tokio::test]
async fn oversized_range_is_bad_request() {
    let app = TestApp::new();
    let doctor_id = app.seed_doctor().await;
    let patient = Actor::patient(Uuid::new_v4());

    let request = Request::builder()
        .method("GET")
        .uri(format!("/{}/available-slots?from=2030-01-01&to=2030-12-31", doctor_id))
        .header("Authorization", app.bearer(&patient))
        .body(Body::empty())
        .unwrap();

    let response = app.router().oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn unknown_doctor_is_not_found() {
    let app = TestApp::new();
    let patient = Actor::patient(Uuid::new_v4());

    let request = Request::builder()
        .method("GET")
        .uri(format!("/{}/weekly-template", Uuid::new_v4()))
        .header("Authorization", app.bearer(&patient))
        .body(Body::empty())
        .unwrap();

    let response = app.router().oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn doctor_replaces_own_template() {
    let app = TestApp::new();
    let doctor_id = app.seed_doctor().await;
    let doctor = Actor::doctor(doctor_id);

    let request = Request::builder()
        .method("PUT")
        .uri(format!("/{}/weekly-template", doctor_id))
        .header("Authorization", app.bearer(&doctor))
        .header("Content-Type", "application/json")
        .body(Body::from(
            json!({ "saturday": [{"start": "10:00:00", "end": "14:00:00"}] }).to_string(),
        ))
        .unwrap();

    let response = app.router().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["weekly_template"]["saturday"][0]["start"], "10:00:00");
    assert_eq!(json["weekly_template"]["monday"], json!([]));
}

#[tokio::test]
async fn patient_cannot_block_dates() {
    let app = TestApp::new();
    let doctor_id = app.seed_doctor().await;
    let patient = Actor::patient(Uuid::new_v4());

    let request = Request::builder()
        .method("POST")
        .uri(format!("/{}/blocked-dates", doctor_id))
        .header("Authorization", app.bearer(&patient))
        .header("Content-Type", "application/json")
        .body(Body::from(json!({ "date": "2030-01-07" }).to_string()))
        .unwrap();

    let response = app.router().oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn blocked_dates_round_trip_through_http() {
    let app = TestApp::new();
    let doctor_id = app.seed_doctor().await;
    let doctor = Actor::doctor(doctor_id);
    let day = (Utc::now() + Duration::days(30)).date_naive();

    let create = Request::builder()
        .method("POST")
        .uri(format!("/{}/blocked-dates", doctor_id))
        .header("Authorization", app.bearer(&doctor))
        .header("Content-Type", "application/json")
        .body(Body::from(
            json!({ "date": day, "range": null, "reason": "vacation" }).to_string(),
        ))
        .unwrap();
    let response = app.router().oneshot(create).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let list = Request::builder()
        .method("GET")
        .uri(format!("/{}/blocked-dates?from={}&to={}", doctor_id, day, day))
        .header("Authorization", app.bearer(&doctor))
        .body(Body::empty())
        .unwrap();
    let response = app.router().oneshot(list).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["total"], 1);
    assert_eq!(json["blocked_dates"][0]["reason"], "vacation");
}

#[tokio::test]
async fn expired_token_is_rejected() {
    let app = TestApp::new();
    let doctor_id = app.seed_doctor().await;
    let token = JwtTestUtils::create_expired_token(&Actor::doctor(doctor_id), &app.secret);

    let request = Request::builder()
        .method("GET")
        .uri(format!("/{}/weekly-template", doctor_id))
        .header("Authorization", format!("Bearer {}", token))
        .body(Body::empty())
        .unwrap();

    let response = app.router().oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}
