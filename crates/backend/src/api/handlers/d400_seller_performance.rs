use axum::{extract::Query, http::StatusCode, Json};
use chrono::NaiveDate;
use contracts::dashboards::d400_seller_performance::{
    RedFlagView, SellerPerformanceRequest, SellerPerformanceResponse,
};

use crate::dashboards::d400_seller_performance::service;
use crate::shared::format::format_pct;

/// GET /api/d400/seller_performance?month=2024-03
pub async fn get_seller_performance(
    Query(request): Query<SellerPerformanceRequest>,
) -> Result<Json<SellerPerformanceResponse>, StatusCode> {
    let month = match request.month.as_deref() {
        Some(raw) => match service::parse_month(raw) {
            Some(month) => Some(month),
            None => {
                tracing::warn!("D400 Dashboard: rejecting month '{}'", raw);
                return Err(StatusCode::BAD_REQUEST);
            }
        },
        None => None,
    };

    match service::get_seller_performance(month).await {
        Ok(response) => {
            match &response.red_flagged {
                RedFlagView::Flagged { view } => tracing::info!(
                    "D400 Dashboard: {:?} -> {} sellers, {} red-flagged (worst {})",
                    response.selected_month,
                    response.by_revenue.rows.len(),
                    view.rows.len(),
                    view.rows
                        .first()
                        .map(|r| format_pct(r.late_delivery_pct))
                        .unwrap_or_default()
                ),
                RedFlagView::NoneFlagged { .. } => tracing::info!(
                    "D400 Dashboard: {:?} -> {} sellers, none red-flagged",
                    response.selected_month,
                    response.by_revenue.rows.len()
                ),
            }
            Ok(Json(response))
        }
        Err(e) => {
            tracing::error!("D400 Dashboard: Failed to get seller performance: {}", e);
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

/// GET /api/d400/periods
pub async fn get_available_periods() -> Result<Json<Vec<NaiveDate>>, StatusCode> {
    match service::get_available_periods().await {
        Ok(periods) => {
            tracing::info!(
                "D400 Dashboard: Returning {} available periods",
                periods.len()
            );
            Ok(Json(periods))
        }
        Err(e) => {
            tracing::error!("D400 Dashboard: Failed to get periods: {}", e);
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}
