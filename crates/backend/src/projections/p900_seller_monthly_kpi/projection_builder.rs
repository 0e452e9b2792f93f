use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveDateTime};
use contracts::domain::a001_order::Order;
use contracts::domain::a002_order_item::OrderItem;
use contracts::projections::p900_seller_monthly_kpi::SellerMonthKpi;
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap, HashSet};

use super::error::KpiError;

/// How orders without a delivery date enter the late-delivery ratio
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UndeliveredPolicy {
    /// Count as delivered on time: stays in the denominator, never late
    #[default]
    OnTime,
    /// Leave out of the denominator; ratio over delivered orders only
    Exclude,
}

impl UndeliveredPolicy {
    /// Same spelling as the config value
    pub fn as_str(self) -> &'static str {
        match self {
            UndeliveredPolicy::OnTime => "on_time",
            UndeliveredPolicy::Exclude => "exclude",
        }
    }
}

/// Facts about one order needed for the aggregation, parsed once
#[derive(Debug, Clone, Copy)]
struct OrderFacts {
    month: NaiveDate,
    delivered: bool,
    late: bool,
}

#[derive(Debug, Default)]
struct SellerMonthAcc<'a> {
    orders: HashSet<&'a str>,
    revenue: f64,
    delivered: u64,
    late: u64,
}

const TIMESTAMP_FORMATS: [&str; 3] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S%.f"];

/// Parse the timestamp formats found in order exports.
/// A bare date is read as midnight.
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let value = raw.trim();
    if value.is_empty() {
        return None;
    }
    for format in TIMESTAMP_FORMATS {
        if let Ok(ts) = NaiveDateTime::parse_from_str(value, format) {
            return Some(ts);
        }
    }
    if let Ok(ts) = DateTime::parse_from_rfc3339(value) {
        return Some(ts.naive_local());
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

/// First day of the month `date` falls in
pub fn month_start(date: NaiveDate) -> NaiveDate {
    date - Duration::days(i64::from(date.day0()))
}

fn required_timestamp(order: &Order, raw: &str) -> Result<NaiveDateTime, KpiError> {
    parse_timestamp(raw).ok_or_else(|| KpiError::InvalidTimestamp {
        order_id: order.order_id.clone(),
        value: raw.to_string(),
    })
}

fn order_facts(order: &Order) -> Result<OrderFacts, KpiError> {
    let purchased = required_timestamp(order, &order.order_purchase_timestamp)?;
    let estimated = required_timestamp(order, &order.order_estimated_delivery_date)?;

    let delivered_at = match order.order_delivered_customer_date.as_deref() {
        Some(raw) if !raw.trim().is_empty() => Some(required_timestamp(order, raw)?),
        _ => None,
    };

    Ok(OrderFacts {
        month: month_start(purchased.date()),
        delivered: delivered_at.is_some(),
        late: delivered_at.map(|d| d > estimated).unwrap_or(false),
    })
}

fn check_amount(item: &OrderItem, value: f64) -> Result<(), KpiError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(KpiError::InvalidAmount {
            order_id: item.order_id.clone(),
            item_id: item.order_item_id,
            value,
        })
    }
}

/// Build the seller-month KPI set.
///
/// Items are joined to orders on `order_id` (items without an order are
/// dropped), grouped by `(seller_id, purchase month)`. The late ratio counts
/// each distinct order once, regardless of how many of its lines belong to
/// the seller. Output is ordered by month, then seller.
pub fn build_seller_monthly_kpis(
    orders: &[Order],
    items: &[OrderItem],
    policy: UndeliveredPolicy,
) -> Result<Vec<SellerMonthKpi>, KpiError> {
    let mut facts: HashMap<&str, OrderFacts> = HashMap::with_capacity(orders.len());
    for order in orders {
        facts.insert(order.order_id.as_str(), order_facts(order)?);
    }

    let mut groups: BTreeMap<(NaiveDate, &str), SellerMonthAcc> = BTreeMap::new();
    let mut orphan_items = 0usize;

    for item in items {
        let Some(order) = facts.get(item.order_id.as_str()) else {
            orphan_items += 1;
            continue;
        };
        check_amount(item, item.price)?;
        check_amount(item, item.freight_value)?;

        let acc = groups
            .entry((order.month, item.seller_id.as_str()))
            .or_default();
        acc.revenue += item.line_total();
        if acc.orders.insert(item.order_id.as_str()) {
            if order.delivered {
                acc.delivered += 1;
            }
            if order.late {
                acc.late += 1;
            }
        }
    }

    if orphan_items > 0 {
        tracing::warn!(
            "P900: {} order items reference unknown orders and were skipped",
            orphan_items
        );
    }

    let kpis = groups
        .into_iter()
        .map(|((month, seller_id), acc)| {
            let total_orders = acc.orders.len() as u64;
            let denominator = match policy {
                UndeliveredPolicy::OnTime => total_orders,
                UndeliveredPolicy::Exclude => acc.delivered,
            };
            let late_delivery_pct = if denominator == 0 {
                0.0
            } else {
                acc.late as f64 / denominator as f64
            };

            SellerMonthKpi {
                seller_id: seller_id.to_string(),
                order_month: month,
                total_orders: total_orders as i64,
                total_revenue: acc.revenue,
                late_delivery_pct,
            }
        })
        .collect();

    Ok(kpis)
}
