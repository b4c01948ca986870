//! Call chain transitions: top-level calls, dispatch, replies, nested calls.

use serde_json::Value;
use xframe_protocol::{
    is_unrecoverable_result, CallArgs, FunctionCallRequest, FunctionCallResponse,
    GetCallerRequest, GetCallerResponse, Origin, PluginCallRequest, PluginCallResponse,
    PluginError, PluginSyncCall, ResultCacheEntry, WireMessage,
};

use super::{InFlight, Supervisor};
use crate::context::CallFrame;
use crate::error::{ProtocolViolation, SupervisorResult};
use crate::host::{Host, TargetOrigin};

impl<H: Host> Supervisor<H> {
    /// The application starts a call chain.
    pub(super) fn on_function_call_request(
        &mut self,
        origin: &Origin,
        request: FunctionCallRequest,
    ) -> SupervisorResult<bool> {
        let FunctionCallRequest { id, args } = request;
        self.host
            .log(&format!("[supervisor] Function call {args} from {origin}"));
        self.context.begin(CallFrame::new(origin.clone(), args))?;
        self.context.set_root_app_origin_if_unset(origin);
        self.root_request_id = id;
        self.process_top()?;
        Ok(true)
    }

    /// Dispatch the frame on top of the stack to its loader.
    pub(super) fn process_top(&mut self) -> SupervisorResult<()> {
        let Some(top) = self.context.peek() else {
            return Ok(());
        };
        let args = top.args.clone();
        let primer = self
            .context
            .get_cached_results(&args.service, &args.plugin);
        self.managers.add(&args.service, &args.plugin);

        let id = self.fresh_call_id();
        let primed = primer.len();
        let request = PluginCallRequest::new(id.clone(), args.clone(), primer).encode()?;
        self.loaders
            .send(&self.host, &self.policy, &args.service, request)?;

        let deadline = self
            .config
            .call_timeout_ms
            .map(|timeout| self.host.now_ms().saturating_add(timeout));
        self.host.log(&format!(
            "[supervisor] Dispatched call {id} {args} (depth {}, {primed} cached)",
            self.context.stack().len()
        ));
        self.in_flight = Some(InFlight::new(id, args.service, deadline));
        Ok(())
    }

    /// The loader on top of the stack returned a result.
    pub(super) fn on_plugin_call_response(
        &mut self,
        origin: &Origin,
        response: PluginCallResponse,
    ) -> SupervisorResult<bool> {
        let Some(top) = self.context.peek() else {
            return Err(ProtocolViolation::NoCallInFlight.into());
        };
        let expected = self.policy.compute_service_origin(&top.args.service)?;
        if origin != &expected {
            if origin == &top.caller {
                self.host.log(&format!(
                    "[supervisor] Ignoring duplicate response from caller {origin}"
                ));
                return Ok(false);
            }
            return Err(ProtocolViolation::UnexpectedSender {
                expected,
                got: origin.clone(),
            }
            .into());
        }

        let in_flight_id = self.in_flight.as_ref().map(|f| f.id.clone());
        if in_flight_id.as_deref() != Some(response.id.as_str()) {
            if origin == &top.caller {
                self.host.log(&format!(
                    "[supervisor] Ignoring duplicate response {} from caller {origin}",
                    response.id
                ));
                return Ok(false);
            }
            return Err(ProtocolViolation::StaleResponse {
                expected: in_flight_id.unwrap_or_default(),
                got: response.id,
            }
            .into());
        }

        self.in_flight = None;
        let Some(returning) = self.context.pop() else {
            return Err(ProtocolViolation::NoCallInFlight.into());
        };
        let result = response.result;

        if self.context.is_idle() || is_unrecoverable_result(&result) {
            let bottom = match self.context.peek_bottom() {
                Some(frame) => frame.args.clone(),
                None => returning.args,
            };
            self.finish(bottom, result)?;
            return Ok(true);
        }

        if let Some(caller) = self.context.peek() {
            let entry = ResultCacheEntry::new(&caller.args.plugin_id(), &returning.args, result);
            self.host.log(&format!(
                "[supervisor] Cached {} for {}",
                returning.args,
                caller.args.plugin_id()
            ));
            self.context.add_cache_object(entry);
        }
        self.process_top()?;
        Ok(true)
    }

    /// The loader on top of the stack needs the result of another call.
    pub(super) fn on_plugin_sync_call(
        &mut self,
        origin: &Origin,
        call: PluginSyncCall,
    ) -> SupervisorResult<bool> {
        let Some(top) = self.context.peek() else {
            return Err(ProtocolViolation::NoCallInFlight.into());
        };
        let expected = self.policy.compute_service_origin(&top.args.service)?;
        if origin != &expected {
            return Err(ProtocolViolation::UnexpectedSender {
                expected,
                got: origin.clone(),
            }
            .into());
        }

        let limit = self.config.max_stack_depth;
        if self.context.stack().len() >= limit {
            return Err(ProtocolViolation::StackOverflow { limit }.into());
        }

        self.host.log(&format!(
            "[supervisor] Nested call {} from {origin}",
            call.payload
        ));
        self.in_flight = None;
        self.context.push(CallFrame::new(origin.clone(), call.payload));
        self.process_top()?;
        Ok(true)
    }

    /// The loader on top of the stack asks who called it.
    pub(super) fn on_get_caller_request(
        &mut self,
        origin: &Origin,
        request: GetCallerRequest,
    ) -> SupervisorResult<bool> {
        let service = self
            .loaders
            .service_for_origin(origin)
            .cloned()
            .or_else(|| self.policy.service_from_origin(origin))
            .unwrap_or_else(|| origin.to_string());
        let caller = self.context.caller_for(&service)?.clone();
        let response = GetCallerResponse {
            id: request.id,
            caller: self.policy.origination(&caller),
        }
        .encode()?;
        self.loaders
            .send(&self.host, &self.policy, &service, response)?;
        Ok(true)
    }

    /// End the chain and deliver `result` for the top-level call `args`.
    ///
    /// A recoverable error is final at this point and is delivered as
    /// unrecoverable (or as a redirect).
    fn finish(&mut self, args: CallArgs, result: Value) -> SupervisorResult<()> {
        let target = self.context.root_app_origin().cloned();
        let request_id = self.root_request_id.clone();
        self.reset();

        let Some(origin) = target else {
            return Err(ProtocolViolation::NoCallInFlight.into());
        };
        let result = match PluginError::from_result(&result) {
            Some(err) => err.finalized().to_result(),
            None => result,
        };
        self.relay_final(&origin, request_id, args, result)
    }

    /// Post the final `FUNCTION_CALL_RESPONSE` to the application.
    pub(super) fn relay_final(
        &self,
        origin: &Origin,
        id: Option<String>,
        args: CallArgs,
        result: Value,
    ) -> SupervisorResult<()> {
        self.host
            .log(&format!("[supervisor] Call {args} finished, replying to {origin}"));
        let message = FunctionCallResponse::new(id, args, result).encode()?;
        self.host
            .post_to_parent(&message, &TargetOrigin::Exact(origin.clone()))?;
        Ok(())
    }
}
