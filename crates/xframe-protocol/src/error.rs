//! Plugin error values and decode errors.
//!
//! A plugin failure travels inside an ordinary result value, wrapped as
//! `{ "pluginError": { kind, code, producer, message } }`, so that results
//! and failures share one wire field.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::types::QualifiedPluginId;

/// Key under which a [`PluginError`] is embedded in a result value.
pub const PLUGIN_ERROR_KEY: &str = "pluginError";

/// Error codes carried in [`PluginError::code`].
pub mod error_codes {
    /// Unspecified plugin failure.
    pub const GENERIC: i64 = 0;
    /// The plugin asked the application to navigate elsewhere.
    pub const REDIRECT: i64 = 999;
    /// A loader did not answer before its deadline.
    pub const TIMEOUT: i64 = 1001;
    /// The call chain was abandoned after a protocol violation.
    pub const PROTOCOL_VIOLATION: i64 = 1002;
}

/// Classification of a plugin failure.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ErrorKind {
    /// An ordinary value for the calling plugin to interpret.
    Recoverable,
    /// Ends the whole call chain immediately.
    Unrecoverable,
    /// Terminal error telling the application to redirect.
    Redirect,
}

/// A failure produced by a plugin (or by the supervisor on its behalf).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginError {
    pub kind: ErrorKind,
    #[serde(default)]
    pub code: i64,
    #[serde(default)]
    pub producer: Option<QualifiedPluginId>,
    pub message: String,
}

impl PluginError {
    pub fn recoverable(producer: Option<QualifiedPluginId>, message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::Recoverable,
            code: error_codes::GENERIC,
            producer,
            message: message.into(),
        }
    }

    pub fn unrecoverable(producer: Option<QualifiedPluginId>, message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::Unrecoverable,
            code: error_codes::GENERIC,
            producer,
            message: message.into(),
        }
    }

    pub fn with_code(mut self, code: i64) -> Self {
        self.code = code;
        self
    }

    /// Extract a plugin error embedded in a result value, if any.
    pub fn from_result(result: &Value) -> Option<Self> {
        let inner = result.as_object()?.get(PLUGIN_ERROR_KEY)?;
        Self::deserialize(inner).ok()
    }

    /// Embed this error in a result value.
    pub fn to_result(&self) -> Value {
        json!({ "pluginError": self })
    }

    pub fn is_unrecoverable(&self) -> bool {
        !matches!(self.kind, ErrorKind::Recoverable)
    }

    /// Convert into the error shape delivered to the application.
    ///
    /// A recoverable error is only recoverable at intermediate steps of a call
    /// chain; once it is the final value it becomes unrecoverable, or a
    /// redirect when it carries the redirect code.
    pub fn finalized(mut self) -> Self {
        if self.kind == ErrorKind::Recoverable {
            self.kind = if self.code == error_codes::REDIRECT {
                ErrorKind::Redirect
            } else {
                ErrorKind::Unrecoverable
            };
        }
        self
    }
}

/// Whether a raw result value is an unrecoverable failure.
pub fn is_unrecoverable_result(result: &Value) -> bool {
    PluginError::from_result(result).is_some_and(|e| e.is_unrecoverable())
}

/// Why an inbound value was not accepted as a given message kind.
///
/// None of these are errors at the supervisor level: a value that fails to
/// decode is ambient page noise and is ignored.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    /// The value is not a JSON object.
    #[error("message is not an object")]
    NotAnObject,

    /// The object has no string `type` field.
    #[error("message has no type discriminant")]
    MissingType,

    /// The discriminant names a different message kind.
    #[error("unexpected message type: expected {expected}, got {got}")]
    UnexpectedType { expected: &'static str, got: String },

    /// The discriminant is not part of this protocol.
    #[error("unknown message type: {0}")]
    UnknownType(String),

    /// The discriminant matched but required fields are missing or mistyped.
    #[error("malformed {kind}: {reason}")]
    Malformed { kind: &'static str, reason: String },
}
