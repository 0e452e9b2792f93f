use sea_orm::DbErr;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum KpiError {
    /// A raw table needed for the build does not exist
    #[error("Missing input table: {0}")]
    MissingInput(String),

    /// Read-only mode and nothing has been materialized yet
    #[error("KPI table seller_monthly_kpis is not materialized and the connection is read-only")]
    KpiTableMissing,

    /// The stored table was built under another undelivered-order policy
    #[error(
        "KPI table was built with undelivered_policy '{stored}' but '{configured}' is configured; \
         drop seller_monthly_kpis to rebuild"
    )]
    PolicyMismatch { stored: String, configured: String },

    #[error("Invalid timestamp '{value}' in order {order_id}")]
    InvalidTimestamp { order_id: String, value: String },

    #[error("Invalid amount {value} in item {item_id} of order {order_id}")]
    InvalidAmount {
        order_id: String,
        item_id: i64,
        value: f64,
    },

    #[error("Invalid order_month '{0}' in KPI table")]
    InvalidMonth(String),

    #[error("Database error: {0}")]
    Database(#[from] DbErr),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
