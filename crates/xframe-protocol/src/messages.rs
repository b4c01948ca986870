//! Message builders and runtime-checked decoders.
//!
//! Each message kind is a plain struct. [`WireMessage`] adds the `type`
//! discriminant on encode and verifies it (then the field shape) on decode.
//! [`Message`] is the sum of every kind and is what the supervisor decodes
//! inbound traffic into.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::cache::ResultCacheEntry;
use crate::error::DecodeError;
use crate::msg;
use crate::types::{CallArgs, OriginationData, PluginId, QualifiedPluginId};

/// Read the `type` discriminant of a raw value.
pub fn message_type(value: &Value) -> Result<&str, DecodeError> {
    let object = value.as_object().ok_or(DecodeError::NotAnObject)?;
    object
        .get("type")
        .and_then(Value::as_str)
        .ok_or(DecodeError::MissingType)
}

/// A message kind with a fixed discriminant.
pub trait WireMessage: Serialize + DeserializeOwned {
    /// Value of the `type` field.
    const TYPE: &'static str;

    /// Serialize, adding the discriminant.
    fn encode(&self) -> Result<Value, serde_json::Error> {
        let mut object = match serde_json::to_value(self)? {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        object.insert("type".to_string(), Value::String(Self::TYPE.to_string()));
        Ok(Value::Object(object))
    }

    /// Check the discriminant, then the shape.
    fn decode(value: &Value) -> Result<Self, DecodeError> {
        let got = message_type(value)?;
        if got != Self::TYPE {
            return Err(DecodeError::UnexpectedType {
                expected: Self::TYPE,
                got: got.to_string(),
            });
        }
        Self::deserialize(value).map_err(|e| DecodeError::Malformed {
            kind: Self::TYPE,
            reason: e.to_string(),
        })
    }

    /// Type predicate.
    fn is(value: &Value) -> bool {
        Self::decode(value).is_ok()
    }
}

macro_rules! wire_message {
    ($name:ident, $tag:path) => {
        impl WireMessage for $name {
            const TYPE: &'static str = $tag;
        }
    };
}

/// Top-level call from the application.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FunctionCallRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub args: CallArgs,
}

impl FunctionCallRequest {
    pub fn new(args: CallArgs) -> Self {
        Self { id: None, args }
    }

    pub fn with_id(id: impl Into<String>, args: CallArgs) -> Self {
        Self {
            id: Some(id.into()),
            args,
        }
    }
}

/// Final answer for a top-level call.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FunctionCallResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub args: CallArgs,
    #[serde(default)]
    pub result: Value,
}

impl FunctionCallResponse {
    pub fn new(id: Option<String>, args: CallArgs, result: Value) -> Self {
        Self { id, args, result }
    }
}

/// Call dispatched to a loader, primed with cached sub-call results.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PluginCallRequest {
    pub id: String,
    pub args: CallArgs,
    #[serde(default)]
    pub result_cache: Vec<ResultCacheEntry>,
}

impl PluginCallRequest {
    pub fn new(id: impl Into<String>, args: CallArgs, result_cache: Vec<ResultCacheEntry>) -> Self {
        Self {
            id: id.into(),
            args,
            result_cache,
        }
    }
}

/// Loader reply to a [`PluginCallRequest`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PluginCallResponse {
    pub id: String,
    #[serde(default)]
    pub result: Value,
}

impl PluginCallResponse {
    pub fn new(id: impl Into<String>, result: Value) -> Self {
        Self {
            id: id.into(),
            result,
        }
    }
}

/// Nested call issued by the loader currently on top of the call stack.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PluginSyncCall {
    pub payload: CallArgs,
}

impl PluginSyncCall {
    pub fn new(payload: CallArgs) -> Self {
        Self { payload }
    }
}

/// Body of [`PreLoadPluginsRequest`].
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreloadPayload {
    pub plugins: Vec<QualifiedPluginId>,
}

/// Application asks for plugins to be warmed up ahead of any call.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreLoadPluginsRequest {
    pub payload: PreloadPayload,
}

impl PreLoadPluginsRequest {
    pub fn new(plugins: Vec<QualifiedPluginId>) -> Self {
        Self {
            payload: PreloadPayload { plugins },
        }
    }
}

/// Supervisor asks a loader to start preparing plugins of its service.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreloadStart {
    pub plugins: Vec<PluginId>,
}

impl PreloadStart {
    pub fn new(plugins: Vec<PluginId>) -> Self {
        Self { plugins }
    }
}

/// Loader finished preparing plugins.
///
/// The payload is free-form. When it carries a `dependencies` array of
/// qualified plugin ids, those are preloaded in turn.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LoaderPreloadComplete {
    #[serde(default)]
    pub payload: Value,
}

impl LoaderPreloadComplete {
    pub fn new(payload: Value) -> Self {
        Self { payload }
    }

    /// Dependencies reported by the loader. Entries that do not parse are skipped.
    pub fn dependencies(&self) -> Vec<QualifiedPluginId> {
        self.payload
            .get("dependencies")
            .and_then(Value::as_array)
            .map(|deps| {
                deps.iter()
                    .filter_map(|d| QualifiedPluginId::deserialize(d).ok())
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// Loader handshake.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoaderInitialized {}

/// Supervisor handshake to its parent.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IFrameInitialized {}

/// Active plugin asks who called it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetCallerRequest {
    pub id: String,
}

/// Answer to [`GetCallerRequest`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetCallerResponse {
    pub id: String,
    pub caller: OriginationData,
}

wire_message!(FunctionCallRequest, msg::FUNCTION_CALL_REQUEST);
wire_message!(FunctionCallResponse, msg::FUNCTION_CALL_RESPONSE);
wire_message!(PluginCallRequest, msg::PLUGIN_CALL_REQUEST);
wire_message!(PluginCallResponse, msg::PLUGIN_CALL_RESPONSE);
wire_message!(PluginSyncCall, msg::PLUGIN_SYNC_CALL);
wire_message!(PreLoadPluginsRequest, msg::PRELOAD_PLUGINS_REQUEST);
wire_message!(PreloadStart, msg::PRELOAD_START);
wire_message!(LoaderPreloadComplete, msg::LOADER_PRELOAD_COMPLETE);
wire_message!(LoaderInitialized, msg::LOADER_INITIALIZED);
wire_message!(IFrameInitialized, msg::IFRAME_INITIALIZED);
wire_message!(GetCallerRequest, msg::GET_CALLER_REQUEST);
wire_message!(GetCallerResponse, msg::GET_CALLER_RESPONSE);

/// Every message kind of the protocol.
#[derive(Clone, Debug, PartialEq)]
pub enum Message {
    FunctionCallRequest(FunctionCallRequest),
    FunctionCallResponse(FunctionCallResponse),
    PluginCallRequest(PluginCallRequest),
    PluginCallResponse(PluginCallResponse),
    PluginSyncCall(PluginSyncCall),
    PreLoadPluginsRequest(PreLoadPluginsRequest),
    PreloadStart(PreloadStart),
    LoaderPreloadComplete(LoaderPreloadComplete),
    LoaderInitialized(LoaderInitialized),
    IFrameInitialized(IFrameInitialized),
    GetCallerRequest(GetCallerRequest),
    GetCallerResponse(GetCallerResponse),
}

impl Message {
    /// Classify a raw inbound value.
    pub fn decode(value: &Value) -> Result<Self, DecodeError> {
        match message_type(value)? {
            msg::FUNCTION_CALL_REQUEST => FunctionCallRequest::decode(value).map(Self::FunctionCallRequest),
            msg::FUNCTION_CALL_RESPONSE => FunctionCallResponse::decode(value).map(Self::FunctionCallResponse),
            msg::PLUGIN_CALL_REQUEST => PluginCallRequest::decode(value).map(Self::PluginCallRequest),
            msg::PLUGIN_CALL_RESPONSE => PluginCallResponse::decode(value).map(Self::PluginCallResponse),
            msg::PLUGIN_SYNC_CALL => PluginSyncCall::decode(value).map(Self::PluginSyncCall),
            msg::PRELOAD_PLUGINS_REQUEST => PreLoadPluginsRequest::decode(value).map(Self::PreLoadPluginsRequest),
            msg::PRELOAD_START => PreloadStart::decode(value).map(Self::PreloadStart),
            msg::LOADER_PRELOAD_COMPLETE => LoaderPreloadComplete::decode(value).map(Self::LoaderPreloadComplete),
            msg::LOADER_INITIALIZED => LoaderInitialized::decode(value).map(Self::LoaderInitialized),
            msg::IFRAME_INITIALIZED => IFrameInitialized::decode(value).map(Self::IFrameInitialized),
            msg::GET_CALLER_REQUEST => GetCallerRequest::decode(value).map(Self::GetCallerRequest),
            msg::GET_CALLER_RESPONSE => GetCallerResponse::decode(value).map(Self::GetCallerResponse),
            other => Err(DecodeError::UnknownType(other.to_string())),
        }
    }

    pub fn encode(&self) -> Result<Value, serde_json::Error> {
        match self {
            Self::FunctionCallRequest(m) => m.encode(),
            Self::FunctionCallResponse(m) => m.encode(),
            Self::PluginCallRequest(m) => m.encode(),
            Self::PluginCallResponse(m) => m.encode(),
            Self::PluginSyncCall(m) => m.encode(),
            Self::PreLoadPluginsRequest(m) => m.encode(),
            Self::PreloadStart(m) => m.encode(),
            Self::LoaderPreloadComplete(m) => m.encode(),
            Self::LoaderInitialized(m) => m.encode(),
            Self::IFrameInitialized(m) => m.encode(),
            Self::GetCallerRequest(m) => m.encode(),
            Self::GetCallerResponse(m) => m.encode(),
        }
    }

    /// The discriminant of this message.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::FunctionCallRequest(_) => msg::FUNCTION_CALL_REQUEST,
            Self::FunctionCallResponse(_) => msg::FUNCTION_CALL_RESPONSE,
            Self::PluginCallRequest(_) => msg::PLUGIN_CALL_REQUEST,
            Self::PluginCallResponse(_) => msg::PLUGIN_CALL_RESPONSE,
            Self::PluginSyncCall(_) => msg::PLUGIN_SYNC_CALL,
            Self::PreLoadPluginsRequest(_) => msg::PRELOAD_PLUGINS_REQUEST,
            Self::PreloadStart(_) => msg::PRELOAD_START,
            Self::LoaderPreloadComplete(_) => msg::LOADER_PRELOAD_COMPLETE,
            Self::LoaderInitialized(_) => msg::LOADER_INITIALIZED,
            Self::IFrameInitialized(_) => msg::IFRAME_INITIALIZED,
            Self::GetCallerRequest(_) => msg::GET_CALLER_REQUEST,
            Self::GetCallerResponse(_) => msg::GET_CALLER_RESPONSE,
        }
    }
}

macro_rules! impl_from_message {
    ($($name:ident),* $(,)?) => {
        $(
            impl From<$name> for Message {
                fn from(m: $name) -> Self {
                    Self::$name(m)
                }
            }
        )*
    };
}

impl_from_message!(
    FunctionCallRequest,
    FunctionCallResponse,
    PluginCallRequest,
    PluginCallResponse,
    PluginSyncCall,
    PreLoadPluginsRequest,
    PreloadStart,
    LoaderPreloadComplete,
    LoaderInitialized,
    IFrameInitialized,
    GetCallerRequest,
    GetCallerResponse,
);
