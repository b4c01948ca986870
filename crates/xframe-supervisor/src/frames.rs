//! Loader frame registry
//!
//! One hidden iframe per service, created on first use. A loader starts out
//! `Pending`: messages addressed to it are queued until it announces
//! `LOADER_INITIALIZED` from its exact origin, at which point it becomes
//! `Ready` and the queue is flushed in order. Asking for a pending loader
//! again never creates a second frame.

use std::collections::btree_map::Entry;
use std::collections::BTreeMap;

use serde_json::Value;
use xframe_protocol::{Origin, ServiceId};

use crate::error::SupervisorResult;
use crate::host::{FrameInfo, Host, TargetOrigin};
use crate::origin::OriginPolicy;

#[derive(Clone, Debug, PartialEq)]
enum LoaderState {
    Pending(Vec<Value>),
    Ready,
}

/// A loader frame for one service.
#[derive(Clone, Debug)]
pub struct Loader {
    frame: FrameInfo,
    origin: Origin,
    state: LoaderState,
}

impl Loader {
    pub fn frame(&self) -> &FrameInfo {
        &self.frame
    }

    pub fn origin(&self) -> &Origin {
        &self.origin
    }

    pub fn is_ready(&self) -> bool {
        self.state == LoaderState::Ready
    }

    /// Messages waiting for the loader to initialize.
    pub fn queued(&self) -> usize {
        match &self.state {
            LoaderState::Pending(queue) => queue.len(),
            LoaderState::Ready => 0,
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct LoaderRegistry {
    loaders: BTreeMap<ServiceId, Loader>,
}

impl LoaderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The loader for `service`, creating its frame if there is none.
    pub fn get_loader<H: Host>(
        &mut self,
        host: &H,
        policy: &OriginPolicy,
        service: &str,
    ) -> SupervisorResult<&mut Loader> {
        match self.loaders.entry(service.to_string()) {
            Entry::Occupied(e) => Ok(e.into_mut()),
            Entry::Vacant(e) => {
                let origin = policy.compute_service_origin(service)?;
                let frame = FrameInfo::for_service(service, policy.loader_url(service)?);
                host.create_frame(&frame)?;
                host.log(&format!(
                    "[supervisor] Created loader frame {} at {}",
                    frame.id, frame.src
                ));
                Ok(e.insert(Loader {
                    frame,
                    origin,
                    state: LoaderState::Pending(Vec::new()),
                }))
            }
        }
    }

    /// Deliver `message` to the loader of `service`, or queue it until ready.
    pub fn send<H: Host>(
        &mut self,
        host: &H,
        policy: &OriginPolicy,
        service: &str,
        message: Value,
    ) -> SupervisorResult<()> {
        let loader = self.get_loader(host, policy, service)?;
        match &mut loader.state {
            LoaderState::Pending(queue) => {
                queue.push(message);
                Ok(())
            }
            LoaderState::Ready => {
                host.post_to_frame(
                    &loader.frame.id,
                    &message,
                    &TargetOrigin::Exact(loader.origin.clone()),
                )?;
                Ok(())
            }
        }
    }

    /// Mark the loader of `service` ready and flush its queue.
    ///
    /// Returns the number of messages flushed, or `None` when there is no
    /// loader for `service`. A repeated announcement flushes nothing.
    pub fn mark_ready<H: Host>(&mut self, host: &H, service: &str) -> SupervisorResult<Option<usize>> {
        let Some(loader) = self.loaders.get_mut(service) else {
            return Ok(None);
        };
        let queue = match std::mem::replace(&mut loader.state, LoaderState::Ready) {
            LoaderState::Pending(queue) => queue,
            LoaderState::Ready => Vec::new(),
        };
        let target = TargetOrigin::Exact(loader.origin.clone());
        for message in &queue {
            host.post_to_frame(&loader.frame.id, message, &target)?;
        }
        Ok(Some(queue.len()))
    }

    /// Service whose loader is served from `origin`.
    pub fn service_for_origin(&self, origin: &Origin) -> Option<&ServiceId> {
        self.loaders
            .iter()
            .find(|(_, loader)| &loader.origin == origin)
            .map(|(service, _)| service)
    }

    /// Tear down the loader of `service`. The next use creates a fresh frame.
    pub fn discard<H: Host>(&mut self, host: &H, service: &str) -> SupervisorResult<bool> {
        match self.loaders.remove(service) {
            Some(loader) => {
                host.remove_frame(&loader.frame.id)?;
                host.log(&format!("[supervisor] Discarded loader frame {}", loader.frame.id));
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub fn get(&self, service: &str) -> Option<&Loader> {
        self.loaders.get(service)
    }

    pub fn contains(&self, service: &str) -> bool {
        self.loaders.contains_key(service)
    }

    pub fn len(&self) -> usize {
        self.loaders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.loaders.is_empty()
    }
}
