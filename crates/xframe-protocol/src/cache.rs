//! Result cache entries shipped to loaders as call primers.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::types::{CallArgs, InterfaceName, MethodName, PluginId, QualifiedPluginId, ServiceId};

/// A previously observed (sub-call signature → result) pairing.
///
/// The entry is scoped to the plugin that was on top of the call stack when
/// the result was recorded (`allowed_service` / `allowed_plugin`). It may only
/// be replayed to that same plugin.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultCacheEntry {
    pub allowed_service: ServiceId,
    #[serde(default)]
    pub allowed_plugin: PluginId,
    pub call_service: ServiceId,
    pub call_plugin: PluginId,
    pub call_intf: InterfaceName,
    pub call_method: MethodName,
    pub args_json: String,
    #[serde(default)]
    pub result: Value,
}

impl ResultCacheEntry {
    /// Record that `call`, made by `allowed`, produced `result`.
    pub fn new(allowed: &QualifiedPluginId, call: &CallArgs, result: Value) -> Self {
        Self {
            allowed_service: allowed.service.clone(),
            allowed_plugin: allowed.plugin.clone(),
            call_service: call.service.clone(),
            call_plugin: call.plugin.clone(),
            call_intf: call.intf.clone(),
            call_method: call.method.clone(),
            args_json: call.params_json(),
            result,
        }
    }

    pub fn key(&self) -> CacheKey {
        CacheKey {
            allowed_service: self.allowed_service.clone(),
            allowed_plugin: self.allowed_plugin.clone(),
            call_service: self.call_service.clone(),
            call_plugin: self.call_plugin.clone(),
            call_intf: self.call_intf.clone(),
            call_method: self.call_method.clone(),
            args_json: self.args_json.clone(),
        }
    }

    /// Whether this entry answers `call`.
    pub fn answers(&self, call: &CallArgs) -> bool {
        self.call_service == call.service
            && self.call_plugin == call.plugin
            && self.call_intf == call.intf
            && self.call_method == call.method
            && self.args_json == call.params_json()
    }

    /// Whether this entry may be handed to `plugin`.
    pub fn is_scoped_to(&self, service: &str, plugin: &str) -> bool {
        self.allowed_service == service && self.allowed_plugin == plugin
    }
}

/// Composite identity of a [`ResultCacheEntry`].
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey {
    pub allowed_service: ServiceId,
    pub allowed_plugin: PluginId,
    pub call_service: ServiceId,
    pub call_plugin: PluginId,
    pub call_intf: InterfaceName,
    pub call_method: MethodName,
    pub args_json: String,
}
