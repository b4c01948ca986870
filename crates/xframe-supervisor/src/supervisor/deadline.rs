//! Dispatch deadlines.
//!
//! Each dispatch records when its loader must have replied. The host
//! schedules a [`SupervisorEvent::Tick`](crate::SupervisorEvent::Tick) for
//! [`Supervisor::next_deadline`]; a tick past the deadline tears down the
//! loader and abandons the chain.

use xframe_protocol::ServiceId;

use super::Supervisor;
use crate::error::{SupervisorError, SupervisorResult};
use crate::host::Host;

/// The dispatch currently awaiting a reply.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InFlight {
    pub id: String,
    pub service: ServiceId,
    /// Host time (ms) after which the call is abandoned
    pub deadline: Option<u64>,
}

impl InFlight {
    pub fn new(id: String, service: ServiceId, deadline: Option<u64>) -> Self {
        Self {
            id,
            service,
            deadline,
        }
    }

    pub fn is_expired(&self, now_ms: u64) -> bool {
        self.deadline.is_some_and(|deadline| now_ms >= deadline)
    }
}

impl<H: Host> Supervisor<H> {
    /// When the host should next deliver a tick, if ever.
    pub fn next_deadline(&self) -> Option<u64> {
        self.in_flight.as_ref().and_then(|f| f.deadline)
    }

    pub(super) fn on_tick(&mut self) -> SupervisorResult<bool> {
        let now = self.host.now_ms();
        let service = match &self.in_flight {
            Some(in_flight) if in_flight.is_expired(now) => in_flight.service.clone(),
            _ => return Ok(false),
        };
        self.in_flight = None;
        self.host.log(&format!(
            "[supervisor] Loader {service} missed its deadline at {now}"
        ));
        self.loaders.discard(&self.host, &service)?;
        // A fresh loader has prepared nothing
        self.managers.forget(&service);
        Err(SupervisorError::Timeout { service })
    }
}
