pub mod dto;
pub mod extract;
pub mod middleware;
pub mod rest;
pub mod state;

use axum::{
    middleware as axum_middleware,
    routing::{get, post, put},
    Router,
};
use std::sync::Arc;

use middleware::{require_claims, require_role, Role};
use state::AppState;

/// Builds the REST router for every ledger endpoint.
pub fn router(app_state: Arc<AppState>) -> Router {
    let student_routes = Router::new()
        .route("/api/v1/log-harian", get(rest::get_daily_log_handler))
        .route("/api/v1/log-harian/detail", post(rest::add_session_handler))
        .route(
            "/api/v1/log-harian/detail/{id}",
            put(rest::update_progress_handler).delete(rest::delete_session_handler),
        )
        .route("/api/v1/log-harian/rekap/mingguan", get(rest::weekly_recap_handler))
        .route("/api/v1/log-harian/statistik", get(rest::statistics_handler))
        .route(
            "/api/v1/log-harian/detail/dari-rekomendasi",
            post(rest::apply_recommendation_handler),
        )
        .layer(axum_middleware::from_fn_with_state(Role::Student, require_role));

    let mentor_routes = Router::new()
        .route(
            "/api/v1/mentor/mahasantri/{student_id}/log-harian",
            get(rest::mentor_student_log_handler),
        )
        .route(
            "/api/v1/mentor/log-harian-mahasantri",
            get(rest::mentor_dashboard_handler),
        )
        .route(
            "/api/v1/mentor/rekap-bimbingan/mingguan",
            get(rest::mentor_weekly_rollup_handler),
        )
        .layer(axum_middleware::from_fn_with_state(Role::Mentor, require_role));

    Router::new()
        .merge(student_routes)
        .merge(mentor_routes)
        .layer(axum_middleware::from_fn(require_claims))
        .with_state(app_state)
}
