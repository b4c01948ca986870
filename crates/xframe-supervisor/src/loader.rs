//! Loader side of the protocol
//!
//! A loader runs inside the hidden iframe of one service. It announces itself
//! with `LOADER_INITIALIZED`, prepares plugins on `PRELOAD_START`, and
//! executes calls on `PLUGIN_CALL_REQUEST`.
//!
//! # Deterministic replay
//!
//! Execution never blocks on a nested call. The executor receives an
//! [`ExecContext`] whose [`ExecContext::call`] answers from the request's
//! result cache. On a miss the executor returns [`ExecError::Pending`], the
//! endpoint emits `PLUGIN_SYNC_CALL` for the missing call, and the
//! supervisor later re-sends the original request with the missing result
//! added. The executor then runs again from the start and gets further.
//!
//! Asking for the caller works the same way. [`ExecContext::caller`] misses
//! until the endpoint has fetched it with `GET_CALLER_REQUEST`; the endpoint
//! replays the call itself once `GET_CALLER_RESPONSE` arrives. A caller is
//! only ever handed to replays of the call it was fetched for.

use serde_json::{json, Value};
use xframe_protocol::{
    CallArgs, GetCallerRequest, GetCallerResponse, LoaderInitialized, LoaderPreloadComplete,
    Message, Origin, OriginationData, PluginCallRequest, PluginCallResponse, PluginError, PluginId,
    PluginSyncCall, QualifiedPluginId, ResultCacheEntry, ServiceId, WireMessage,
};

use crate::error::SupervisorResult;
use crate::host::{Host, TargetOrigin};

/// Why an execution did not produce a value.
#[derive(Clone, Debug, PartialEq)]
pub enum ExecError {
    /// A nested call has no cached result yet.
    Pending,
    /// The plugin failed.
    Failed(PluginError),
}

impl From<PluginError> for ExecError {
    fn from(e: PluginError) -> Self {
        Self::Failed(e)
    }
}

/// What an execution is waiting for.
#[derive(Clone, Debug, PartialEq)]
pub enum Suspension {
    /// Result of a nested call
    Call(CallArgs),
    /// Identity of the caller
    Caller,
}

/// Per-execution view of the result cache.
pub struct ExecContext<'a> {
    primer: &'a [ResultCacheEntry],
    caller: Option<&'a OriginationData>,
    miss: Option<Suspension>,
}

impl<'a> ExecContext<'a> {
    pub fn new(primer: &'a [ResultCacheEntry], caller: Option<&'a OriginationData>) -> Self {
        Self {
            primer,
            caller,
            miss: None,
        }
    }

    /// Result of a nested call, if the supervisor has already resolved it.
    ///
    /// A miss records the call and returns [`ExecError::Pending`], which the
    /// executor should propagate with `?`.
    pub fn call(&mut self, args: CallArgs) -> Result<Value, ExecError> {
        if let Some(entry) = self.primer.iter().find(|entry| entry.answers(&args)) {
            return Ok(entry.result.clone());
        }
        self.suspend(Suspension::Call(args))
    }

    /// Caller of the active call.
    ///
    /// Misses with [`ExecError::Pending`] until the endpoint has fetched it.
    pub fn caller(&mut self) -> Result<&'a OriginationData, ExecError> {
        match self.caller {
            Some(caller) => Ok(caller),
            None => self.suspend(Suspension::Caller),
        }
    }

    /// The first thing the execution missed.
    pub fn take_miss(&mut self) -> Option<Suspension> {
        self.miss.take()
    }

    fn suspend<T>(&mut self, suspension: Suspension) -> Result<T, ExecError> {
        if self.miss.is_none() {
            self.miss = Some(suspension);
        }
        Err(ExecError::Pending)
    }
}

/// Plugin code hosted by a loader.
pub trait PluginExecutor {
    /// Prepare `plugins`; returns plugins they depend on.
    fn preload(&mut self, plugins: &[PluginId]) -> Vec<QualifiedPluginId> {
        let _ = plugins;
        Vec::new()
    }

    /// Run `args` to completion, or until a nested call misses the cache.
    fn execute(&mut self, args: &CallArgs, ctx: &mut ExecContext<'_>) -> Result<Value, ExecError>;
}

/// A call suspended part way through execution.
#[derive(Clone, Debug)]
struct SuspendedCall {
    request: PluginCallRequest,
    caller: Option<OriginationData>,
    /// Id of the outstanding `GET_CALLER_REQUEST`
    awaiting_caller: Option<String>,
}

impl SuspendedCall {
    /// `request` resumes this call rather than starting a new one.
    ///
    /// The supervisor resumes a call by re-sending it with the result it
    /// was missing appended to the cache.
    fn is_resumed_by(&self, request: &PluginCallRequest) -> bool {
        let prior = &self.request.result_cache;
        self.awaiting_caller.is_none()
            && request.args == self.request.args
            && request.result_cache.len() > prior.len()
            && prior.iter().all(|entry| request.result_cache.contains(entry))
    }
}

/// A loader for one service, posting to the supervisor through `H`.
pub struct LoaderEndpoint<E: PluginExecutor, H: Host> {
    service: ServiceId,
    supervisor_origin: Origin,
    executor: E,
    host: H,
    suspended: Option<SuspendedCall>,
    next_request: u64,
}

impl<E: PluginExecutor, H: Host> LoaderEndpoint<E, H> {
    pub fn new(
        service: impl Into<ServiceId>,
        supervisor_origin: impl Into<Origin>,
        executor: E,
        host: H,
    ) -> Self {
        Self {
            service: service.into(),
            supervisor_origin: supervisor_origin.into(),
            executor,
            host,
            suspended: None,
            next_request: 0,
        }
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn executor(&self) -> &E {
        &self.executor
    }

    /// Caller fetched for the suspended call, if any.
    pub fn caller(&self) -> Option<&OriginationData> {
        self.suspended.as_ref().and_then(|call| call.caller.as_ref())
    }

    /// Broadcast `LOADER_INITIALIZED` to the parent.
    pub fn announce(&self) -> SupervisorResult<()> {
        let message = LoaderInitialized {}.encode()?;
        self.host
            .post_to_parent(&message, &TargetOrigin::Broadcast)?;
        self.log("Announced LOADER_INITIALIZED");
        Ok(())
    }

    /// Handle one inbound message. Returns whether it was acted upon.
    ///
    /// Messages not sent by the supervisor are ignored.
    pub fn handle(&mut self, origin: &Origin, data: &Value) -> SupervisorResult<bool> {
        if origin != &self.supervisor_origin {
            return Ok(false);
        }
        match Message::decode(data) {
            Ok(Message::PluginCallRequest(request)) => self.on_call(request),
            Ok(Message::PreloadStart(start)) => {
                let dependencies = self.executor.preload(&start.plugins);
                self.log(&format!(
                    "Prepared {} ({} dependencies)",
                    start.plugins.join(", "),
                    dependencies.len()
                ));
                let payload = json!({ "plugins": start.plugins, "dependencies": dependencies });
                let message = LoaderPreloadComplete::new(payload).encode()?;
                self.post(&message)?;
                Ok(true)
            }
            Ok(Message::GetCallerResponse(response)) => self.on_caller(response),
            _ => Ok(false),
        }
    }

    fn on_call(&mut self, request: PluginCallRequest) -> SupervisorResult<bool> {
        let caller = match self.suspended.take() {
            Some(call) if call.is_resumed_by(&request) => call.caller,
            _ => None,
        };
        self.run(request, caller)
    }

    fn on_caller(&mut self, response: GetCallerResponse) -> SupervisorResult<bool> {
        let awaited = self
            .suspended
            .as_ref()
            .and_then(|call| call.awaiting_caller.as_deref());
        if awaited != Some(response.id.as_str()) {
            return Ok(false);
        }
        let Some(call) = self.suspended.take() else {
            return Ok(false);
        };
        self.run(call.request, Some(response.caller))
    }

    /// Execute `request` and post whatever it produced.
    fn run(
        &mut self,
        request: PluginCallRequest,
        caller: Option<OriginationData>,
    ) -> SupervisorResult<bool> {
        let id = request.id.clone();
        let producer = request.args.plugin_id();

        let mut ctx = ExecContext::new(&request.result_cache, caller.as_ref());
        let outcome = self.executor.execute(&request.args, &mut ctx);
        let miss = ctx.take_miss();

        let message = match (outcome, miss) {
            (Ok(result), _) => PluginCallResponse::new(id, result).encode()?,
            (Err(ExecError::Pending), Some(Suspension::Call(nested))) => {
                self.log(&format!("Call {id} needs {nested}"));
                let message = PluginSyncCall::new(nested).encode()?;
                self.suspended = Some(SuspendedCall {
                    request,
                    caller,
                    awaiting_caller: None,
                });
                message
            }
            (Err(ExecError::Pending), Some(Suspension::Caller)) => {
                self.next_request += 1;
                let query = format!("{}-caller-{}", self.service, self.next_request);
                self.log(&format!("Call {id} needs its caller"));
                let message = GetCallerRequest { id: query.clone() }.encode()?;
                self.suspended = Some(SuspendedCall {
                    request,
                    caller: None,
                    awaiting_caller: Some(query),
                });
                message
            }
            (Err(ExecError::Pending), None) => {
                let err = PluginError::unrecoverable(
                    Some(producer),
                    "execution suspended without a pending call",
                );
                PluginCallResponse::new(id, err.to_result()).encode()?
            }
            (Err(ExecError::Failed(mut err)), _) => {
                if err.producer.is_none() {
                    err.producer = Some(producer);
                }
                PluginCallResponse::new(id, err.to_result()).encode()?
            }
        };
        self.post(&message)?;
        Ok(true)
    }

    fn post(&self, message: &Value) -> SupervisorResult<()> {
        self.host.post_to_parent(
            message,
            &TargetOrigin::Exact(self.supervisor_origin.clone()),
        )?;
        Ok(())
    }

    fn log(&self, line: &str) {
        self.host.log(&format!("[loader:{}] {line}", self.service));
    }
}
