use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use shared_utils::extractor::auth_middleware;
use shared_utils::AppState;

use crate::handlers;

pub fn doctor_routes(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", post(handlers::register_doctor))
        .route("/{doctor_id}/available-slots", get(handlers::get_available_slots))
        .route(
            "/{doctor_id}/weekly-template",
            get(handlers::get_weekly_template).put(handlers::update_weekly_template),
        )
        .route(
            "/{doctor_id}/blocked-dates",
            get(handlers::list_blocked_dates).post(handlers::add_blocked_date),
        )
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
        .with_state(state)
}
