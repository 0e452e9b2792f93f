use serde::{Deserialize, Serialize};

/// One line of an order. Revenue is attributed to `seller_id` per line,
/// so a single order may contribute to several sellers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderItem {
    pub order_id: String,
    /// Line number inside the order (1-based in the Olist exports)
    pub order_item_id: i64,
    pub seller_id: String,
    pub price: f64,
    pub freight_value: f64,
}

impl OrderItem {
    /// Amount billed for the line: goods plus freight
    pub fn line_total(&self) -> f64 {
        self.price + self.freight_value
    }
}
