//! Shared helpers for driving a supervisor over a MockHost.

#![allow(dead_code)]

use serde_json::{json, Value};
use xframe_protocol::{
    CallArgs, FunctionCallRequest, FunctionCallResponse, Message, PluginCallRequest,
    PluginCallResponse, PluginSyncCall, WireMessage,
};
use xframe_supervisor::testing::MockHost;
use xframe_supervisor::{
    frame_id, Outcome, RawMessage, SourceKind, Supervisor, SupervisorConfig, SupervisorEvent,
};

pub const SUPERVISOR: &str = "https://supervisor.example.com";
pub const APP: &str = "https://app.example.com";

pub fn service_origin(service: &str) -> String {
    format!("https://{service}.example.com")
}

/// Config with no system plugins, so preloads only touch what a test names.
pub fn config() -> SupervisorConfig {
    SupervisorConfig {
        system_plugins: Vec::new(),
        ..SupervisorConfig::for_location(SUPERVISOR)
    }
}

pub fn supervisor() -> Supervisor<MockHost> {
    Supervisor::new(MockHost::new(), config()).unwrap()
}

pub fn args(service: &str, method: &str) -> CallArgs {
    CallArgs::new(service, "plugin", "api", method, vec![])
}

pub fn from_app(data: Value) -> SupervisorEvent {
    RawMessage::new(APP, SourceKind::TopAndParent, data).into()
}

pub fn from_loader(service: &str, data: Value) -> SupervisorEvent {
    RawMessage::new(service_origin(service), SourceKind::Child, data).into()
}

pub fn start_call(sup: &mut Supervisor<MockHost>, args: CallArgs) -> Outcome {
    sup.handle(from_app(FunctionCallRequest::new(args).encode().unwrap()))
}

pub fn loader_ready(sup: &mut Supervisor<MockHost>, service: &str) -> Outcome {
    sup.handle(from_loader(service, json!({ "type": "LOADER_INITIALIZED" })))
}

/// Every `PLUGIN_CALL_REQUEST` delivered to the loader of `service`.
pub fn requests_to(sup: &Supervisor<MockHost>, service: &str) -> Vec<PluginCallRequest> {
    sup.host()
        .posts_to(&frame_id(service))
        .iter()
        .filter_map(|m| PluginCallRequest::decode(m).ok())
        .collect()
}

pub fn last_request_to(sup: &Supervisor<MockHost>, service: &str) -> PluginCallRequest {
    requests_to(sup, service)
        .pop()
        .unwrap_or_else(|| panic!("no request delivered to {service}"))
}

/// Reply to the latest request delivered to `service`.
pub fn respond(sup: &mut Supervisor<MockHost>, service: &str, result: Value) -> Outcome {
    let id = last_request_to(sup, service).id;
    sup.handle(from_loader(
        service,
        PluginCallResponse::new(id, result).encode().unwrap(),
    ))
}

pub fn sync_call(sup: &mut Supervisor<MockHost>, from: &str, args: CallArgs) -> Outcome {
    sup.handle(from_loader(from, PluginSyncCall::new(args).encode().unwrap()))
}

/// Start a call on `service` and mark its loader ready.
pub fn call_ready(sup: &mut Supervisor<MockHost>, service: &str, method: &str) {
    assert_eq!(start_call(sup, args(service, method)), Outcome::Handled);
    assert_eq!(loader_ready(sup, service), Outcome::Handled);
}

/// All `FUNCTION_CALL_RESPONSE`s posted to the application.
pub fn final_responses(sup: &Supervisor<MockHost>) -> Vec<FunctionCallResponse> {
    sup.host()
        .parent_posts()
        .iter()
        .filter_map(|post| match Message::decode(&post.message) {
            Ok(Message::FunctionCallResponse(response)) => Some(response),
            _ => None,
        })
        .collect()
}
