//! Core library for the cluster usage monitor
//!
//! This crate provides:
//! - Sample types for the four tracked entity kinds
//! - The in-memory metrics store with windowed queries
//! - Host and workload sampling from kernel pseudo-files
//! - The periodic collection loop and sample delivery seam
//! - Prometheus observability

pub mod collector;
pub mod error;
pub mod models;
pub mod observability;
pub mod store;

pub use error::StoreError;
pub use models::*;
pub use observability::MonitorMetrics;
pub use store::{MetricsStore, RetentionPolicy};
