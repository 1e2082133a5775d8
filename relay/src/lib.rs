pub mod metrics_defs;
pub mod protocol;
mod relayer;

pub use protocol::{CapturedRequest, Completion, RelayResponse};
pub use relayer::{RelayHandle, RequestRelayer};

use thiserror::Error;

/// Result type alias for relay operations
pub type Result<T, E = RelayError> = std::result::Result<T, E>;

#[derive(Error, Debug)]
pub enum RelayError {
    #[error("could not build relay callback url: {0}")]
    CallbackUrl(#[from] url::ParseError),

    #[error("relayed request was cancelled before a worker completed it")]
    Cancelled,

    #[error("malformed completion payload: {0}")]
    MalformedCompletion(String),
}
