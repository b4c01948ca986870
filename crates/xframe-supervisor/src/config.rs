//! Supervisor configuration.
//!
//! Deserialized from camelCase JSON; every field has a default, so `{}` is a
//! valid configuration once `location` is known.

use serde::{Deserialize, Serialize};
use xframe_protocol::{QualifiedPluginId, ServiceId};

use crate::constants::{
    DEFAULT_CALL_TIMEOUT_MS, DEFAULT_HOST_SERVICES, DEFAULT_LOADER_PATH, DEFAULT_MAX_STACK_DEPTH,
    DEFAULT_PLUGIN, DEFAULT_ROOT_APP_NAME,
};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SupervisorConfig {
    /// URL of the supervisor page. Service origins are derived from it.
    ///
    /// The web binding fills this from `window.location` when it is empty.
    pub location: String,
    /// Path of the loader page on each service subdomain.
    pub loader_path: String,
    /// Service name reported for the bare root domain.
    pub root_app_name: ServiceId,
    /// Reject application messages that are not served over https.
    pub require_https: bool,
    /// Deadline for a dispatched call. `None` waits forever.
    pub call_timeout_ms: Option<u64>,
    /// Nested calls that would grow the stack past this abort the chain.
    pub max_stack_depth: usize,
    /// Plugins preloaded alongside every preload request.
    pub system_plugins: Vec<QualifiedPluginId>,
    /// Services provided by the host runtime, never loaded into a frame.
    pub host_services: Vec<ServiceId>,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            location: String::new(),
            loader_path: DEFAULT_LOADER_PATH.to_string(),
            root_app_name: DEFAULT_ROOT_APP_NAME.to_string(),
            require_https: true,
            call_timeout_ms: Some(DEFAULT_CALL_TIMEOUT_MS),
            max_stack_depth: DEFAULT_MAX_STACK_DEPTH,
            system_plugins: default_system_plugins(),
            host_services: DEFAULT_HOST_SERVICES.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl SupervisorConfig {
    /// Default configuration for a supervisor served at `location`.
    pub fn for_location(location: impl Into<String>) -> Self {
        Self {
            location: location.into(),
            ..Self::default()
        }
    }

    /// Parse a JSON configuration, keeping defaults for absent fields.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn is_host_service(&self, service: &str) -> bool {
        self.host_services.iter().any(|s| s == service)
    }
}

/// Plugins every application depends on.
fn default_system_plugins() -> Vec<QualifiedPluginId> {
    ["accounts", "transact", "clientdata"]
        .iter()
        .map(|service| QualifiedPluginId::new(*service, DEFAULT_PLUGIN))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_json_keeps_defaults() {
        let config = SupervisorConfig::from_json("{}").unwrap();
        assert_eq!(config, SupervisorConfig::default());
        assert_eq!(config.loader_path, "/common/wasm-loader");
        assert_eq!(config.call_timeout_ms, Some(30_000));
        assert_eq!(config.max_stack_depth, 64);
        assert!(config.is_host_service("wasi"));
        assert!(config.is_host_service("host"));
        assert!(!config.is_host_service("tokens"));
    }

    #[test]
    fn test_camel_case_overrides() {
        let config = SupervisorConfig::from_json(
            r#"{
                "location": "http://supervisor.localhost:8080/",
                "requireHttps": false,
                "callTimeoutMs": null,
                "systemPlugins": [],
                "rootAppName": "landing",
                "maxStackDepth": 8
            }"#,
        )
        .unwrap();
        assert!(!config.require_https);
        assert_eq!(config.call_timeout_ms, None);
        assert!(config.system_plugins.is_empty());
        assert_eq!(config.root_app_name, "landing");
        assert_eq!(config.max_stack_depth, 8);
        assert_eq!(config.loader_path, DEFAULT_LOADER_PATH);
    }
}
