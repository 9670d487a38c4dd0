use axum::{
    routing::{get, post},
    Router,
};

use crate::api::handlers;

/// All application routes
pub fn configure_routes() -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        // ========================================
        // D402 LOGISTICS STATISTICS DASHBOARD
        // ========================================
        .route(
            "/api/d402/statistics",
            get(handlers::d402_logistics_statistics::get_statistics),
        )
        .route(
            "/api/d402/aggregate",
            post(handlers::d402_logistics_statistics::aggregate_records),
        )
        .route(
            "/api/d402/histograms",
            get(handlers::d402_logistics_statistics::get_monthly_histograms),
        )
        .route(
            "/api/d402/kpi/:side/:label",
            get(handlers::d402_logistics_statistics::get_kpi),
        )
}
