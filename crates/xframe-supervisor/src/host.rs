//! Host abstraction for the supervisor core
//!
//! The core never touches a window, a document, or a timer directly. Every
//! side effect goes through [`Host`], which the browser binding implements
//! with `web-sys` and tests implement with [`crate::testing::MockHost`].
//!
//! # Inbound events
//!
//! The host turns every browser callback into a [`SupervisorEvent`] and hands
//! it to [`crate::Supervisor::handle`]. That is the only way state changes.

use core::fmt;

use serde_json::Value;
use xframe_protocol::{Origin, ServiceId, BROADCAST_TARGET};

use crate::constants::LOADER_FRAME_ID_PREFIX;
use crate::error::HostError;

/// Host services required by the supervisor
///
/// Implementations provide platform-specific functionality for:
/// - Posting messages to the parent window and to loader frames
/// - Creating and removing hidden loader iframes
/// - Time measurement
/// - Debug output
pub trait Host {
    // === Messaging ===

    /// Post a message to the parent window
    ///
    /// # Arguments
    /// * `message` - JSON message to post
    /// * `target` - Target origin passed to `postMessage`
    ///
    /// # Returns
    /// * `Ok(())` - Message posted
    /// * `Err(HostError::PostFailed)` - No parent, or the post threw
    fn post_to_parent(&self, message: &Value, target: &TargetOrigin) -> Result<(), HostError>;

    /// Post a message to a loader frame
    ///
    /// # Arguments
    /// * `frame_id` - Id given to the frame by [`Host::create_frame`]
    /// * `message` - JSON message to post
    /// * `target` - Target origin passed to `postMessage`
    ///
    /// # Returns
    /// * `Ok(())` - Message posted
    /// * `Err(HostError::FrameNotFound)` - No frame with this id
    /// * `Err(HostError::PostFailed)` - The post threw
    fn post_to_frame(
        &self,
        frame_id: &str,
        message: &Value,
        target: &TargetOrigin,
    ) -> Result<(), HostError>;

    // === Frames ===

    /// Create a hidden iframe for a loader
    ///
    /// When the document is still loading, insertion may be deferred until
    /// `DOMContentLoaded`; the call still succeeds immediately.
    fn create_frame(&self, frame: &FrameInfo) -> Result<(), HostError>;

    /// Remove a loader iframe
    fn remove_frame(&self, frame_id: &str) -> Result<(), HostError>;

    // === Time & Debug ===

    /// Current time in milliseconds (monotonic within a page load)
    fn now_ms(&self) -> u64;

    /// Write a line to the debug console
    fn log(&self, line: &str);
}

/// Target origin of a `postMessage`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TargetOrigin {
    /// Deliver only if the recipient's origin matches exactly.
    Exact(Origin),
    /// `"*"`, reserved for the two handshake broadcasts.
    Broadcast,
}

impl TargetOrigin {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Exact(origin) => origin.as_str(),
            Self::Broadcast => BROADCAST_TARGET,
        }
    }
}

impl fmt::Display for TargetOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A hidden loader iframe for one service.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FrameInfo {
    pub id: String,
    pub service: ServiceId,
    pub src: String,
}

impl FrameInfo {
    pub fn for_service(service: impl Into<ServiceId>, src: impl Into<String>) -> Self {
        let service = service.into();
        Self {
            id: frame_id(&service),
            service,
            src: src.into(),
        }
    }
}

/// DOM id of the loader frame for `service`.
pub fn frame_id(service: &str) -> String {
    format!("{LOADER_FRAME_ID_PREFIX}{service}")
}

/// How the sending window relates to the supervisor window.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SourceKind {
    /// The sender is both `window.top` and `window.parent`.
    TopAndParent,
    /// The sender is neither `window.top` nor `window.parent`.
    Child,
    /// Anything else (e.g. a parent that is not the top window).
    Other,
}

/// An inbound `message` event, before any payload is trusted.
#[derive(Clone, Debug, PartialEq)]
pub struct RawMessage {
    pub origin: Origin,
    pub source: SourceKind,
    pub data: Value,
}

impl RawMessage {
    pub fn new(origin: impl Into<Origin>, source: SourceKind, data: Value) -> Self {
        Self {
            origin: origin.into(),
            source,
            data,
        }
    }
}

/// Everything that can drive the supervisor.
#[derive(Clone, Debug, PartialEq)]
pub enum SupervisorEvent {
    /// A `message` event from any window.
    Message(RawMessage),
    /// A scheduled deadline timer fired.
    Tick,
}

impl From<RawMessage> for SupervisorEvent {
    fn from(message: RawMessage) -> Self {
        Self::Message(message)
    }
}
