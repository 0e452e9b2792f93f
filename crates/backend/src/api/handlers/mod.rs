// Projection handlers (p900)
pub mod p900_seller_monthly_kpi;

// Dashboard handlers (d400)
pub mod d400_seller_performance;
