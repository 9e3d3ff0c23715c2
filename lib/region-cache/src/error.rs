use std::sync::Arc;
use thiserror::Error;

/// Outcome of a failed topology refresh.
///
/// Cloneable so one failure can be handed to every caller waiting on the
/// same fetch.
#[derive(Error, Debug, Clone)]
pub enum RefreshError {
    #[error("Topology fetch failed: {0:#}")]
    FetchFailed(Arc<anyhow::Error>),

    #[error("Topology fetch aborted: {0}")]
    Aborted(String),
}
