//! Aggregator library surface: the routing shim and configuration,
//! exposed for the binary and for integration tests.

pub mod api;
pub mod config;
