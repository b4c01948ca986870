//! Supervisor dispatch loop
//!
//! The supervisor owns the call context, the plugin registry, and the loader
//! frames. Every inbound event enters through [`Supervisor::handle`], which
//! runs exactly one transition to completion before returning.
//!
//! ## Trust boundary
//!
//! Inbound messages are classified by sender before anything is decoded:
//!
//! - Application: our top and parent window, on the root domain
//! - Child loader: neither top nor parent, on the origin of a tracked service
//!
//! Anything else is page noise and is ignored.
//!
//! ## Abort policy
//!
//! A transition that fails is logged, the application (when known) receives
//! an unrecoverable error in place of its result, and the context is reset.
//! The supervisor is then ready for the next call.

mod calls;
mod deadline;
mod preload;

pub use deadline::InFlight;

use xframe_protocol::{error_codes, IFrameInitialized, Message, Origin, PluginError, WireMessage};

use crate::config::SupervisorConfig;
use crate::context::CallContext;
use crate::error::{OriginError, SupervisorError, SupervisorResult};
use crate::frames::LoaderRegistry;
use crate::host::{Host, RawMessage, SupervisorEvent, TargetOrigin};
use crate::origin::OriginPolicy;
use crate::plugins::PluginManagers;

/// What [`Supervisor::handle`] did with an event.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Outcome {
    /// Untrusted sender, unknown message, or tolerated duplicate.
    Ignored,
    /// A transition ran to completion.
    Handled,
    /// A transition failed; the chain in flight was abandoned.
    Aborted(SupervisorError),
}

/// Inter-frame plugin call supervisor
///
/// Generic over the [`Host`] that performs side effects, so the whole state
/// machine runs unchanged in the browser and in tests.
pub struct Supervisor<H: Host> {
    host: H,
    config: SupervisorConfig,
    policy: OriginPolicy,
    context: CallContext,
    managers: PluginManagers,
    loaders: LoaderRegistry,
    /// The dispatch currently awaiting a loader reply
    in_flight: Option<InFlight>,
    /// Request id of the top-level call, echoed in its response
    root_request_id: Option<String>,
    next_call_id: u64,
}

impl<H: Host> Supervisor<H> {
    pub fn new(host: H, config: SupervisorConfig) -> Result<Self, OriginError> {
        let policy = OriginPolicy::new(&config)?;
        host.log(&format!(
            "[supervisor] Serving root domain {} from {}",
            policy.root_domain(),
            config.location
        ));
        Ok(Self {
            host,
            config,
            policy,
            context: CallContext::new(),
            managers: PluginManagers::new(),
            loaders: LoaderRegistry::new(),
            in_flight: None,
            root_request_id: None,
            next_call_id: 0,
        })
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn config(&self) -> &SupervisorConfig {
        &self.config
    }

    pub fn policy(&self) -> &OriginPolicy {
        &self.policy
    }

    pub fn context(&self) -> &CallContext {
        &self.context
    }

    pub fn managers(&self) -> &PluginManagers {
        &self.managers
    }

    pub fn loaders(&self) -> &LoaderRegistry {
        &self.loaders
    }

    pub fn in_flight(&self) -> Option<&InFlight> {
        self.in_flight.as_ref()
    }

    /// No call chain is running.
    pub fn is_idle(&self) -> bool {
        self.context.is_idle()
    }

    pub fn stack_depth(&self) -> usize {
        self.context.stack().len()
    }

    /// Tell the parent window we are ready to receive calls.
    pub fn announce(&self) -> SupervisorResult<()> {
        let message = IFrameInitialized {}.encode()?;
        self.host.post_to_parent(&message, &TargetOrigin::Broadcast)?;
        self.host.log("[supervisor] Announced IFRAME_INITIALIZED");
        Ok(())
    }

    /// Run one event through the state machine.
    pub fn handle(&mut self, event: SupervisorEvent) -> Outcome {
        let result = match event {
            SupervisorEvent::Message(raw) => self.on_message(raw),
            SupervisorEvent::Tick => self.on_tick(),
        };
        match result {
            Ok(true) => Outcome::Handled,
            Ok(false) => Outcome::Ignored,
            Err(err) => {
                self.abort(&err);
                Outcome::Aborted(err)
            }
        }
    }

    fn on_message(&mut self, raw: RawMessage) -> SupervisorResult<bool> {
        let RawMessage {
            origin,
            source,
            data,
        } = raw;

        if self.policy.is_from_application(source, &origin) {
            let Some(message) = self.decode_trusted(&origin, &data) else {
                return Ok(false);
            };
            match message {
                Message::FunctionCallRequest(request) => {
                    self.on_function_call_request(&origin, request)
                }
                Message::PreLoadPluginsRequest(request) => {
                    self.on_preload_request(request.payload.plugins)
                }
                _ => Ok(false),
            }
        } else if self
            .policy
            .is_from_known_child_loader(source, &origin, &self.managers)
        {
            let Some(message) = self.decode_trusted(&origin, &data) else {
                return Ok(false);
            };
            match message {
                Message::PluginCallResponse(response) => {
                    self.on_plugin_call_response(&origin, response)
                }
                Message::PluginSyncCall(call) => self.on_plugin_sync_call(&origin, call),
                Message::LoaderPreloadComplete(done) => self.on_preload_complete(&origin, done),
                Message::LoaderInitialized(_) => self.on_loader_initialized(&origin),
                Message::GetCallerRequest(request) => {
                    self.on_get_caller_request(&origin, request)
                }
                _ => Ok(false),
            }
        } else {
            Ok(false)
        }
    }

    /// Decode a message from a trusted sender, logging malformed ones.
    fn decode_trusted(&self, origin: &Origin, data: &serde_json::Value) -> Option<Message> {
        match Message::decode(data) {
            Ok(message) => Some(message),
            Err(err @ xframe_protocol::DecodeError::Malformed { .. }) => {
                self.host
                    .log(&format!("[supervisor] Ignoring message from {origin}: {err}"));
                None
            }
            Err(_) => None,
        }
    }

    /// Abandon the chain in flight after `err`.
    fn abort(&mut self, err: &SupervisorError) {
        self.host
            .log(&format!("[supervisor] Call chain aborted: {err}"));

        let target = self.context.root_app_origin().cloned();
        let bottom = self.context.peek_bottom().map(|frame| frame.args.clone());
        let request_id = self.root_request_id.clone();
        self.reset();

        if let (Some(origin), Some(args)) = (target, bottom) {
            let code = match err {
                SupervisorError::Timeout { .. } => error_codes::TIMEOUT,
                _ => error_codes::PROTOCOL_VIOLATION,
            };
            let result = PluginError::unrecoverable(None, err.to_string())
                .with_code(code)
                .to_result();
            if let Err(e) = self.relay_final(&origin, request_id, args, result) {
                self.host
                    .log(&format!("[supervisor] Failed to report abort to {origin}: {e}"));
            }
        }
    }

    /// Forget the current chain.
    fn reset(&mut self) {
        self.context.reset();
        self.in_flight = None;
        self.root_request_id = None;
    }

    fn fresh_call_id(&mut self) -> String {
        self.next_call_id += 1;
        self.next_call_id.to_string()
    }
}
