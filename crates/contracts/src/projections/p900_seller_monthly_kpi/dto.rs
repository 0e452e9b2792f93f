use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Late-delivery share above which a seller-month is red-flagged
pub const RED_FLAG_THRESHOLD: f64 = 0.20;

/// Aggregate of one seller's activity in one calendar month.
///
/// `(seller_id, order_month)` is unique across the projection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SellerMonthKpi {
    pub seller_id: String,
    /// First day of the purchase month
    pub order_month: NaiveDate,
    /// Distinct orders that carried at least one item of this seller
    pub total_orders: i64,
    /// Sum of price + freight over the seller's items
    pub total_revenue: f64,
    /// Share of orders delivered after the estimated date, 0..=1
    pub late_delivery_pct: f64,
}

impl SellerMonthKpi {
    /// Derived flag, never stored
    pub fn is_red_flagged(&self) -> bool {
        self.late_delivery_pct > RED_FLAG_THRESHOLD
    }
}

/// Query parameters for GET /api/p900/seller_monthly_kpis
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SellerMonthlyKpiListRequest {
    pub seller_id: Option<String>,
}
