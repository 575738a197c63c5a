//! Error taxonomy for store ingestion and queries

use thiserror::Error;

/// Errors reported by [`crate::store::MetricsStore`] operations
///
/// All variants are local and synchronous; none are swallowed by the store.
/// Boundary callers translate `NotFound` into a not-found response and the
/// other two into a bad-request response.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A sample's declared identity does not match the key it is being
    /// stored under, or a required identity field is empty
    #[error("identity validation failed: {0}")]
    Validation(String),

    /// Query against a key with no series. Distinct from an empty result on
    /// a known key, which is a successful empty sequence.
    #[error("no series for key {0:?}")]
    NotFound(String),

    /// Malformed query parameters
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}
