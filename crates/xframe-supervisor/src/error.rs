//! Supervisor error types.

use xframe_protocol::{Origin, ServiceId};

/// A message that broke the call-chain protocol.
///
/// Every violation is fatal for the chain in flight: the call context is
/// reset and the application (when known) is told the call failed.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolViolation {
    /// A top-level call arrived while another chain was still running.
    #[error("function call requested while a call chain is in flight")]
    OverlappingCall,

    /// A loader reply or nested call came from the wrong origin.
    #[error("unexpected sender: expected {expected}, got {got}")]
    UnexpectedSender { expected: Origin, got: Origin },

    /// A reply from the right loader carried an id that is not in flight.
    #[error("stale response: expected id {expected}, got {got}")]
    StaleResponse { expected: String, got: String },

    /// A loader replied while no call was in flight.
    #[error("plugin response received with no call in flight")]
    NoCallInFlight,

    /// A nested call would grow the stack past the configured limit.
    #[error("call stack exceeded {limit} frames")]
    StackOverflow { limit: usize },

    /// A loader that is not on top of the call stack asked for its caller.
    #[error("caller requested by inactive service {service}")]
    CallerQueryFromInactive { service: ServiceId },
}

/// Origin arithmetic failures.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum OriginError {
    /// The URL (or a derived URL) does not parse.
    #[error("invalid url: {0}")]
    InvalidUrl(String),

    /// The supervisor host has no label that can be swapped for a service name.
    #[error("host has no subdomain: {0}")]
    MissingSubdomain(String),

    /// Only http and https locations are supported.
    #[error("unsupported scheme: {0}")]
    UnsupportedScheme(String),
}

/// Failures reported by a [`crate::Host`] implementation.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum HostError {
    /// The loader iframe could not be created.
    #[error("frame creation failed: {0}")]
    FrameCreationFailed(String),

    /// No frame with this id exists.
    #[error("frame not found: {0}")]
    FrameNotFound(String),

    /// The message could not be posted.
    #[error("post failed: {0}")]
    PostFailed(String),
}

/// Anything that aborts the call chain in flight.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum SupervisorError {
    #[error("protocol violation: {0}")]
    Protocol(#[from] ProtocolViolation),

    #[error("origin error: {0}")]
    Origin(#[from] OriginError),

    /// An outbound message could not be serialized.
    #[error("encode error: {0}")]
    Encode(String),

    #[error("host error: {0}")]
    Host(#[from] HostError),

    /// The loader for `service` did not answer before its deadline.
    #[error("call to {service} timed out")]
    Timeout { service: ServiceId },
}

impl From<serde_json::Error> for SupervisorError {
    fn from(e: serde_json::Error) -> Self {
        Self::Encode(e.to_string())
    }
}

/// Result alias for supervisor operations.
pub type SupervisorResult<T> = Result<T, SupervisorError>;
