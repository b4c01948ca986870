//! Core identifiers and call arguments.

use core::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Logical service name (also the service's subdomain label).
pub type ServiceId = String;
/// Plugin name within a service.
pub type PluginId = String;
/// Exported interface name within a plugin.
pub type InterfaceName = String;
/// Method name within an interface.
pub type MethodName = String;

/// A web origin, e.g. `https://tokens.example.com`.
///
/// Compared byte-for-byte, the same way `MessageEvent.origin` is compared
/// in the browser.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Origin(String);

impl Origin {
    pub fn new(origin: impl Into<String>) -> Self {
        Self(origin.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Origin {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for Origin {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// A plugin addressed by its service.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct QualifiedPluginId {
    pub service: ServiceId,
    pub plugin: PluginId,
}

impl QualifiedPluginId {
    pub fn new(service: impl Into<ServiceId>, plugin: impl Into<PluginId>) -> Self {
        Self {
            service: service.into(),
            plugin: plugin.into(),
        }
    }
}

impl fmt::Display for QualifiedPluginId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.service, self.plugin)
    }
}

/// One invocation target together with its arguments.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CallArgs {
    pub service: ServiceId,
    pub plugin: PluginId,
    pub intf: InterfaceName,
    pub method: MethodName,
    #[serde(default)]
    pub params: Vec<Value>,
}

impl CallArgs {
    pub fn new(
        service: impl Into<ServiceId>,
        plugin: impl Into<PluginId>,
        intf: impl Into<InterfaceName>,
        method: impl Into<MethodName>,
        params: Vec<Value>,
    ) -> Self {
        Self {
            service: service.into(),
            plugin: plugin.into(),
            intf: intf.into(),
            method: method.into(),
            params,
        }
    }

    /// The plugin this call targets.
    pub fn plugin_id(&self) -> QualifiedPluginId {
        QualifiedPluginId::new(self.service.clone(), self.plugin.clone())
    }

    /// Canonical serialization of the parameters, used as part of cache keys.
    pub fn params_json(&self) -> String {
        Value::Array(self.params.clone()).to_string()
    }
}

impl fmt::Display for CallArgs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}/{}->{}",
            self.service, self.plugin, self.intf, self.method
        )
    }
}

/// Identity of a sender: the origin it posted from and, when the origin is a
/// sibling of the root domain, the service it belongs to.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OriginationData {
    pub app: Option<ServiceId>,
    pub origin: Origin,
}
