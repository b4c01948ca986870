//! Preload and loader lifecycle transitions.

use std::collections::BTreeMap;

use xframe_protocol::{
    LoaderPreloadComplete, Origin, PluginId, PreloadStart, QualifiedPluginId, ServiceId,
    WireMessage,
};

use super::Supervisor;
use crate::error::SupervisorResult;
use crate::host::Host;

impl<H: Host> Supervisor<H> {
    /// The application asks for plugins to be warmed up.
    pub(super) fn on_preload_request(
        &mut self,
        plugins: Vec<QualifiedPluginId>,
    ) -> SupervisorResult<bool> {
        self.preload(plugins)?;
        Ok(true)
    }

    /// Create loaders for `plugins` (and the system plugins) and ask each
    /// service to prepare the plugins it has not been asked for before.
    ///
    /// Plugins of host-provided services are skipped.
    pub fn preload(&mut self, plugins: Vec<QualifiedPluginId>) -> SupervisorResult<()> {
        let requested = plugins
            .into_iter()
            .chain(self.config.system_plugins.iter().cloned())
            .filter(|p| !self.config.is_host_service(&p.service))
            .collect::<Vec<_>>();

        let mut fresh: BTreeMap<ServiceId, Vec<PluginId>> = BTreeMap::new();
        for QualifiedPluginId { service, plugin } in requested {
            self.loaders.get_loader(&self.host, &self.policy, &service)?;
            if self.managers.add(&service, &plugin) {
                fresh.entry(service).or_default().push(plugin);
            }
        }

        for (service, plugins) in fresh {
            self.prepare_service_plugins(&service, plugins)?;
        }
        Ok(())
    }

    /// Ask the loader of `service` to start preparing `plugins`.
    pub(super) fn prepare_service_plugins(
        &mut self,
        service: &str,
        plugins: Vec<PluginId>,
    ) -> SupervisorResult<()> {
        self.host.log(&format!(
            "[supervisor] Preloading {service}: {}",
            plugins.join(", ")
        ));
        let message = PreloadStart::new(plugins).encode()?;
        self.loaders.send(&self.host, &self.policy, service, message)
    }

    /// A loader finished preparing its plugins.
    pub(super) fn on_preload_complete(
        &mut self,
        origin: &Origin,
        done: LoaderPreloadComplete,
    ) -> SupervisorResult<bool> {
        let dependencies = done.dependencies();
        self.host.log(&format!(
            "[supervisor] Preload complete from {origin} ({} dependencies)",
            dependencies.len()
        ));
        if !dependencies.is_empty() {
            self.preload(dependencies)?;
        }
        Ok(true)
    }

    /// A loader announced itself; flush what was queued for it.
    pub(super) fn on_loader_initialized(&mut self, origin: &Origin) -> SupervisorResult<bool> {
        let Some(service) = self.loaders.service_for_origin(origin).cloned() else {
            return Ok(false);
        };
        match self.loaders.mark_ready(&self.host, &service)? {
            Some(flushed) => {
                self.host.log(&format!(
                    "[supervisor] Loader {service} ready, flushed {flushed} queued messages"
                ));
                Ok(true)
            }
            None => Ok(false),
        }
    }
}
