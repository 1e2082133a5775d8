pub mod client;
pub mod droplet_cache;
pub mod metrics_defs;

pub use client::Client;
pub use droplet_cache::{DropletClient, DropletGuidCache};

use http::StatusCode;
use thiserror::Error;

/// Result type alias for platform API operations
pub type Result<T, E = CapiError> = std::result::Result<T, E>;

#[derive(Error, Debug)]
pub enum CapiError {
    #[error("platform API request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("platform API returned {status} during {operation}")]
    UnexpectedStatus {
        operation: &'static str,
        status: StatusCode,
    },

    #[error("no app named {0:?} visible in the configured space")]
    AppNotFound(String),

    #[error("app {0} has no current droplet")]
    DropletNotFound(String),

    /// Outcome of a shared resolution attempt, re-reported to every
    /// coalesced caller.
    #[error("identity resolution failed: {0}")]
    Resolution(String),

    #[error("invalid platform API url: {0}")]
    Url(#[from] url::ParseError),
}
