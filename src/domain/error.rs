// Error taxonomy shared across the editor core
use thiserror::Error;

/// Errors surfaced by the version manager, placement engine, and data gateway.
///
/// `Clone` is required so deduplicated in-flight fetches can hand the same
/// settled outcome to every joined caller.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DashboardError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("not permitted: {0}")]
    Permission(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("fetch failed: {0}")]
    TransientFetch(String),
}

impl DashboardError {
    /// True when a manual retry can reasonably succeed.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, DashboardError::TransientFetch(_))
    }
}
