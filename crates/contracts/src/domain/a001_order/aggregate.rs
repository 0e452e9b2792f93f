use serde::{Deserialize, Serialize};

/// Raw order record as it arrives from the source dataset.
///
/// Timestamps are kept verbatim (`YYYY-MM-DD HH:MM:SS` in the Olist exports)
/// and parsed only when the KPI projection is built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub order_id: String,
    pub order_purchase_timestamp: String,
    /// None while the order is still in flight
    #[serde(default)]
    pub order_delivered_customer_date: Option<String>,
    pub order_estimated_delivery_date: String,
}

impl Order {
    pub fn is_delivered(&self) -> bool {
        self.order_delivered_customer_date
            .as_deref()
            .map(|d| !d.trim().is_empty())
            .unwrap_or(false)
    }
}
