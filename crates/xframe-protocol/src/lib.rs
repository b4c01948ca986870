//! Cross-Frame Protocol for the xframe Supervisor
//!
//! This crate defines every message exchanged between the host application,
//! the supervisor frame, and the per-service plugin loader frames. It is the
//! **single source of truth** for message discriminants and wire shapes.
//!
//! # Message Kinds
//!
//! | `type`                    | Direction            |
//! |---------------------------|----------------------|
//! | `FUNCTION_CALL_REQUEST`   | app → supervisor     |
//! | `FUNCTION_CALL_RESPONSE`  | supervisor → app     |
//! | `PRELOAD_PLUGINS_REQUEST` | app → supervisor     |
//! | `IFRAME_INITIALIZED`      | supervisor → app     |
//! | `PLUGIN_CALL_REQUEST`     | supervisor → loader  |
//! | `PLUGIN_CALL_RESPONSE`    | loader → supervisor  |
//! | `PLUGIN_SYNC_CALL`        | loader → supervisor  |
//! | `PRELOAD_START`           | supervisor → loader  |
//! | `LOADER_PRELOAD_COMPLETE` | loader → supervisor  |
//! | `LOADER_INITIALIZED`      | loader → supervisor  |
//! | `GET_CALLER_REQUEST`      | loader → supervisor  |
//! | `GET_CALLER_RESPONSE`     | supervisor → loader  |
//!
//! Every message is a JSON object carrying a `type` discriminant. Senders are
//! untrusted, so decoding always checks the discriminant and then the shape
//! of the required fields before anything is handed to the dispatch loop.
//!
//! # Usage
//!
//! ```rust
//! use serde_json::json;
//! use xframe_protocol::{Message, PluginCallResponse, WireMessage};
//!
//! let raw = json!({ "type": "PLUGIN_CALL_RESPONSE", "id": "7", "result": { "ok": true } });
//! assert!(PluginCallResponse::is(&raw));
//! assert!(matches!(Message::decode(&raw), Ok(Message::PluginCallResponse(_))));
//! ```

pub mod cache;
pub mod error;
pub mod messages;
pub mod types;

pub use cache::{CacheKey, ResultCacheEntry};
pub use error::{
    error_codes, is_unrecoverable_result, DecodeError, ErrorKind, PluginError, PLUGIN_ERROR_KEY,
};
pub use messages::{
    message_type, FunctionCallRequest, FunctionCallResponse, GetCallerRequest, GetCallerResponse,
    IFrameInitialized, LoaderInitialized, LoaderPreloadComplete, Message, PluginCallRequest,
    PluginCallResponse, PluginSyncCall, PreLoadPluginsRequest, PreloadPayload, PreloadStart,
    WireMessage,
};
pub use types::{
    CallArgs, InterfaceName, MethodName, Origin, OriginationData, PluginId, QualifiedPluginId,
    ServiceId,
};

/// Message discriminants (the `type` field of every message).
pub mod msg {
    /// Top-level call from the application.
    pub const FUNCTION_CALL_REQUEST: &str = "FUNCTION_CALL_REQUEST";
    /// Final answer for a top-level call.
    pub const FUNCTION_CALL_RESPONSE: &str = "FUNCTION_CALL_RESPONSE";
    /// Call dispatched to a loader.
    pub const PLUGIN_CALL_REQUEST: &str = "PLUGIN_CALL_REQUEST";
    /// Loader reply to a dispatched call.
    pub const PLUGIN_CALL_RESPONSE: &str = "PLUGIN_CALL_RESPONSE";
    /// Nested call issued by the loader on top of the call stack.
    pub const PLUGIN_SYNC_CALL: &str = "PLUGIN_SYNC_CALL";
    /// Application asks for plugins to be warmed up.
    pub const PRELOAD_PLUGINS_REQUEST: &str = "PRELOAD_PLUGINS_REQUEST";
    /// Supervisor asks a loader to start preparing plugins.
    pub const PRELOAD_START: &str = "PRELOAD_START";
    /// Loader finished preparing plugins.
    pub const LOADER_PRELOAD_COMPLETE: &str = "LOADER_PRELOAD_COMPLETE";
    /// Loader handshake (broadcast).
    pub const LOADER_INITIALIZED: &str = "LOADER_INITIALIZED";
    /// Supervisor handshake to its parent (broadcast).
    pub const IFRAME_INITIALIZED: &str = "IFRAME_INITIALIZED";
    /// Active plugin asks who called it.
    pub const GET_CALLER_REQUEST: &str = "GET_CALLER_REQUEST";
    /// Answer to `GET_CALLER_REQUEST`.
    pub const GET_CALLER_RESPONSE: &str = "GET_CALLER_RESPONSE";
}

/// Target origin for the two handshake broadcasts.
///
/// No other message may be posted with this target.
pub const BROADCAST_TARGET: &str = "*";
