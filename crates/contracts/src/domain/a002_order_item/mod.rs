pub mod aggregate;

pub use aggregate::OrderItem;
