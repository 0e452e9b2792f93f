//! Seller-month KPI projection: built once from raw orders and order items,
//! read-only afterwards.

pub mod error;
pub mod projection_builder;
pub mod repository;
pub mod service;

pub use error::KpiError;
pub use projection_builder::UndeliveredPolicy;
pub use service::{ConnectionMode, KpiSet, KpiSettings};
