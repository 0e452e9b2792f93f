use anyhow::Result;
use chrono::NaiveDate;
use contracts::dashboards::d400_seller_performance::{
    RedFlagView, SellerColumn, SellerPerformanceResponse, SellerRow, SellerView,
};
use contracts::projections::p900_seller_monthly_kpi::SellerMonthKpi;
use std::cmp::Ordering;

use crate::projections::p900_seller_monthly_kpi::projection_builder::month_start;
use crate::projections::p900_seller_monthly_kpi::service as kpi_service;
use crate::projections::p900_seller_monthly_kpi::KpiSet;

const REVENUE_TITLE: &str = "Top Sellers by Revenue";
const VOLUME_TITLE: &str = "Top Sellers by Order Volume";
const RED_FLAG_TITLE: &str = "Red-Flagged Sellers (Late Delivery > 20%)";

/// Parse a month selector value: `YYYY-MM` or `YYYY-MM-DD`, truncated to the
/// first day of the month
pub fn parse_month(raw: &str) -> Option<NaiveDate> {
    let value = raw.trim();
    let date = NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(&format!("{}-01", value), "%Y-%m-%d"))
        .ok()?;
    Some(month_start(date))
}

/// Requested month if any, else the latest month with data
pub fn select_month(requested: Option<NaiveDate>, available: &[NaiveDate]) -> Option<NaiveDate> {
    requested.or_else(|| available.last().copied())
}

fn by_desc(a: f64, b: f64) -> Ordering {
    b.total_cmp(&a)
}

fn view(title: &str, columns: Vec<SellerColumn>, rows: &[&SellerMonthKpi]) -> SellerView {
    SellerView {
        title: title.to_string(),
        columns,
        rows: rows.iter().map(|kpi| SellerRow::from(*kpi)).collect(),
    }
}

/// Build the three dashboard views for one month.
///
/// A month without rows (including one absent from the data) yields empty
/// views and the "no sellers flagged" state; it is never an error.
pub fn build_report(set: &KpiSet, requested: Option<NaiveDate>) -> SellerPerformanceResponse {
    let selected_month = select_month(requested, set.months());

    let month_rows: Vec<&SellerMonthKpi> = match selected_month {
        Some(month) => set.for_month(month).collect(),
        None => Vec::new(),
    };

    let mut by_revenue = month_rows.clone();
    by_revenue.sort_by(|a, b| {
        by_desc(a.total_revenue, b.total_revenue).then_with(|| a.seller_id.cmp(&b.seller_id))
    });

    let mut by_volume = month_rows.clone();
    by_volume.sort_by(|a, b| {
        b.total_orders
            .cmp(&a.total_orders)
            .then_with(|| a.seller_id.cmp(&b.seller_id))
    });

    let mut flagged: Vec<&SellerMonthKpi> = month_rows
        .iter()
        .copied()
        .filter(|kpi| kpi.is_red_flagged())
        .collect();
    flagged.sort_by(|a, b| {
        by_desc(a.late_delivery_pct, b.late_delivery_pct)
            .then_with(|| a.seller_id.cmp(&b.seller_id))
    });

    let red_flagged = if flagged.is_empty() {
        RedFlagView::none_flagged()
    } else {
        RedFlagView::Flagged {
            view: view(
                RED_FLAG_TITLE,
                vec![
                    SellerColumn::SellerId,
                    SellerColumn::LateDeliveryPct,
                    SellerColumn::TotalOrders,
                    SellerColumn::TotalRevenue,
                ],
                &flagged,
            ),
        }
    };

    SellerPerformanceResponse {
        selected_month,
        available_months: set.months().to_vec(),
        by_revenue: view(
            REVENUE_TITLE,
            vec![
                SellerColumn::SellerId,
                SellerColumn::TotalRevenue,
                SellerColumn::TotalOrders,
                SellerColumn::LateDeliveryPct,
            ],
            &by_revenue,
        ),
        by_order_volume: view(
            VOLUME_TITLE,
            vec![
                SellerColumn::SellerId,
                SellerColumn::TotalOrders,
                SellerColumn::TotalRevenue,
                SellerColumn::LateDeliveryPct,
            ],
            &by_volume,
        ),
        red_flagged,
    }
}

/// Get the seller performance dashboard for a month (latest when None)
pub async fn get_seller_performance(month: Option<NaiveDate>) -> Result<SellerPerformanceResponse> {
    let set = kpi_service::current().await?;
    Ok(build_report(&set, month))
}

/// Months available in the selector, ascending
pub async fn get_available_periods() -> Result<Vec<NaiveDate>> {
    let set = kpi_service::current().await?;
    Ok(set.months().to_vec())
}
