//! Per-service set of plugins the supervisor has been asked to load.

use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, BTreeSet};

use xframe_protocol::{PluginId, ServiceId};

/// Service → plugins registry.
///
/// A service appears here once any of its plugins has been called or
/// preloaded. Only services listed here are accepted as loader senders.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PluginManagers {
    services: BTreeMap<ServiceId, BTreeSet<PluginId>>,
}

impl PluginManagers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Plugins of `service`, inserting an empty set when the service is new.
    pub fn entry(&mut self, service: &str) -> &mut BTreeSet<PluginId> {
        match self.services.entry(service.to_string()) {
            Entry::Occupied(e) => e.into_mut(),
            Entry::Vacant(e) => e.insert(BTreeSet::new()),
        }
    }

    /// Register `plugin` under `service`. Returns whether it was new.
    pub fn add(&mut self, service: &str, plugin: &str) -> bool {
        self.entry(service).insert(plugin.to_string())
    }

    /// Drop `service` and its plugins. Returns whether it was registered.
    pub fn forget(&mut self, service: &str) -> bool {
        self.services.remove(service).is_some()
    }

    pub fn contains(&self, service: &str, plugin: &str) -> bool {
        self.services
            .get(service)
            .is_some_and(|plugins| plugins.contains(plugin))
    }

    pub fn has_service(&self, service: &str) -> bool {
        self.services.contains_key(service)
    }

    pub fn plugins(&self, service: &str) -> impl Iterator<Item = &PluginId> {
        self.services.get(service).into_iter().flatten()
    }

    pub fn services(&self) -> impl Iterator<Item = &ServiceId> {
        self.services.keys()
    }

    pub fn len(&self) -> usize {
        self.services.values().map(BTreeSet::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }
}
