use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::projections::p900_seller_monthly_kpi::SellerMonthKpi;

/// Message shown in place of the red-flag table when nobody breached the threshold
pub const NO_RED_FLAGS_MESSAGE: &str =
    "No sellers breached the late-delivery threshold for this month.";

/// Request for the seller performance dashboard
///
/// `month` accepts `YYYY-MM` or `YYYY-MM-DD` (any day, truncated to the
/// first of the month). Missing means "latest available month".
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SellerPerformanceRequest {
    pub month: Option<String>,
}

/// Response for the seller performance dashboard
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SellerPerformanceResponse {
    /// Month the views were computed for; None only when no data exists at all
    pub selected_month: Option<NaiveDate>,
    /// Distinct months present in the KPI table, ascending (selector options)
    pub available_months: Vec<NaiveDate>,
    /// Sellers of the month, by revenue descending
    pub by_revenue: SellerView,
    /// Sellers of the month, by distinct order count descending
    pub by_order_volume: SellerView,
    /// Sellers of the month above the late-delivery threshold
    pub red_flagged: RedFlagView,
}

/// Column identifiers, in the order a renderer should display them
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SellerColumn {
    SellerId,
    TotalRevenue,
    TotalOrders,
    LateDeliveryPct,
}

/// One sorted table of the dashboard
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SellerView {
    pub title: String,
    pub columns: Vec<SellerColumn>,
    pub rows: Vec<SellerRow>,
}

impl SellerView {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SellerRow {
    pub seller_id: String,
    pub total_revenue: f64,
    pub total_orders: i64,
    pub late_delivery_pct: f64,
    pub red_flag: bool,
}

impl From<&SellerMonthKpi> for SellerRow {
    fn from(kpi: &SellerMonthKpi) -> Self {
        Self {
            seller_id: kpi.seller_id.clone(),
            total_revenue: kpi.total_revenue,
            total_orders: kpi.total_orders,
            late_delivery_pct: kpi.late_delivery_pct,
            red_flag: kpi.is_red_flagged(),
        }
    }
}

/// Red-flag section. An empty subset is a normal outcome and carries its own
/// message instead of an empty table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RedFlagView {
    Flagged { view: SellerView },
    NoneFlagged { message: String },
}

impl RedFlagView {
    pub fn none_flagged() -> Self {
        Self::NoneFlagged {
            message: NO_RED_FLAGS_MESSAGE.to_string(),
        }
    }

    pub fn rows(&self) -> &[SellerRow] {
        match self {
            Self::Flagged { view } => &view.rows,
            Self::NoneFlagged { .. } => &[],
        }
    }
}
