//! Load balancer error types.

use axum::http::uri::InvalidUri;
use thiserror::Error;

/// Boxed error produced by a transport.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Failure while relaying a request to a chosen backend.
#[derive(Debug, Error)]
pub enum ForwardError {
    #[error("invalid upstream target: {0}")]
    InvalidTarget(#[from] InvalidUri),

    #[error("upstream request failed: {0}")]
    Upstream(#[source] BoxError),
}

/// Per-request dispatch failure, surfaced to the transport adapter.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// No live backend was found after probing the whole list.
    #[error("all backends are down ({probed} probed)")]
    AllBackendsDown { probed: usize },

    #[error("forwarding to {backend} failed: {source}")]
    Forwarding {
        backend: String,
        #[source]
        source: ForwardError,
    },
}

impl DispatchError {
    /// Short label used in logs and metrics.
    pub fn reason(&self) -> &'static str {
        match self {
            DispatchError::AllBackendsDown { .. } => "all_backends_down",
            DispatchError::Forwarding { .. } => "forwarding",
        }
    }
}
