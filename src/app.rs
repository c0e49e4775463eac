use crate::handlers;
use crate::state::AppState;
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::index))
        .route("/reports", post(handlers::submit_report_form))
        .route("/api/options", get(handlers::get_options))
        .route(
            "/api/reports",
            get(handlers::list_reports).post(handlers::create_report),
        )
        .route("/api/dashboard", get(handlers::get_dashboard))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
