use call_signal_protocol::{CallId, Role, SdpType};
use thiserror::Error;

/// Result type used across the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by a [`DocumentStore`](crate::store::DocumentStore) implementation.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The addressed document does not exist.
    #[error("document not found: {0}")]
    NotFound(CallId),
    /// The store could not be reached or the connection to it is gone.
    #[error("store unavailable: {0}")]
    Unavailable(String),
    /// The store answered with something that makes no sense for the request.
    #[error("unexpected store response: {0}")]
    Protocol(String),
}

/// Errors surfaced by the [`SignalingChannel`](crate::channel::SignalingChannel).
#[derive(Debug, Error)]
pub enum Error {
    /// Creating, writing or watching the call document failed. Not retried.
    #[error(transparent)]
    StoreUnavailable(#[from] StoreError),
    /// A snapshot had a known field with the wrong shape.
    #[error("malformed snapshot: {0}")]
    MalformedSnapshot(#[source] serde_json::Error),
    /// Local state could not be encoded for writing.
    #[error("failed to encode call document: {0}")]
    Serialization(#[from] serde_json::Error),
    /// The channel has neither created nor joined a call.
    #[error("channel is not attached to a call, call connect or join first")]
    NotConnected,
    /// A role tried to publish the other role's description kind.
    #[error("{role} publishes {expected:?} descriptions, got {actual:?}")]
    RoleMismatch {
        /// Role of the channel.
        role: Role,
        /// Kind this role publishes.
        expected: SdpType,
        /// Kind that was passed in.
        actual: SdpType,
    },
}
