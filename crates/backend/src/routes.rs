use axum::{routing::get, Router};

use crate::api::handlers;

/// Configure all application routes
pub fn configure_routes() -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        // P900 Seller monthly KPI projection
        .route(
            "/api/p900/seller_monthly_kpis",
            get(handlers::p900_seller_monthly_kpi::list),
        )
        // D400 Seller performance dashboard
        .route(
            "/api/d400/periods",
            get(handlers::d400_seller_performance::get_available_periods),
        )
        .route(
            "/api/d400/seller_performance",
            get(handlers::d400_seller_performance::get_seller_performance),
        )
}
