use axum::{extract::Query, http::StatusCode, Json};
use contracts::projections::p900_seller_monthly_kpi::{SellerMonthKpi, SellerMonthlyKpiListRequest};

use crate::projections::p900_seller_monthly_kpi::service;

/// GET /api/p900/seller_monthly_kpis?seller_id=...
pub async fn list(
    Query(request): Query<SellerMonthlyKpiListRequest>,
) -> Result<Json<Vec<SellerMonthKpi>>, StatusCode> {
    match service::current().await {
        Ok(set) => {
            let rows: Vec<SellerMonthKpi> = set
                .rows()
                .iter()
                .filter(|r| {
                    request
                        .seller_id
                        .as_deref()
                        .map_or(true, |id| r.seller_id == id)
                })
                .cloned()
                .collect();
            Ok(Json(rows))
        }
        Err(e) => {
            tracing::error!("P900: Failed to list seller monthly KPIs: {}", e);
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}
