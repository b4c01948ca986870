//! Call context: the stack, the result cache, and the root application.
//!
//! Lifecycle: the context is empty between call chains. The first top-level
//! call sets the root application origin and pushes the bottom frame; the
//! chain ends when the bottom frame is popped, or on any abort, and
//! [`CallContext::reset`] clears all three parts at once.

mod cache;
mod stack;

pub use cache::ResultCache;
pub use stack::{CallFrame, CallStack};

use xframe_protocol::{Origin, ResultCacheEntry};

use crate::error::ProtocolViolation;

#[derive(Clone, Debug, Default)]
pub struct CallContext {
    stack: CallStack,
    cache: ResultCache,
    root_app_origin: Option<Origin>,
}

impl CallContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stack(&self) -> &CallStack {
        &self.stack
    }

    pub fn cache(&self) -> &ResultCache {
        &self.cache
    }

    pub fn root_app_origin(&self) -> Option<&Origin> {
        self.root_app_origin.as_ref()
    }

    /// Record the application that started the chain, if not already known.
    pub fn set_root_app_origin_if_unset(&mut self, origin: &Origin) {
        if self.root_app_origin.is_none() {
            self.root_app_origin = Some(origin.clone());
        }
    }

    /// Start a chain with its bottom frame.
    pub fn begin(&mut self, frame: CallFrame) -> Result<(), ProtocolViolation> {
        if !self.stack.is_empty() {
            return Err(ProtocolViolation::OverlappingCall);
        }
        self.stack.push(frame);
        Ok(())
    }

    pub fn push(&mut self, frame: CallFrame) {
        self.stack.push(frame);
    }

    pub fn pop(&mut self) -> Option<CallFrame> {
        self.stack.pop()
    }

    pub fn peek(&self) -> Option<&CallFrame> {
        self.stack.peek()
    }

    pub fn peek_bottom(&self) -> Option<&CallFrame> {
        self.stack.peek_bottom()
    }

    pub fn is_idle(&self) -> bool {
        self.stack.is_empty()
    }

    pub fn get_cached_results(&self, allowed_service: &str, allowed_plugin: &str) -> Vec<ResultCacheEntry> {
        self.cache.scoped_to(allowed_service, allowed_plugin)
    }

    pub fn add_cache_object(&mut self, entry: ResultCacheEntry) {
        self.cache.insert(entry);
    }

    /// Caller of the active call, asked for by `service`.
    ///
    /// Only the service on top of the stack may ask.
    pub fn caller_for(&self, service: &str) -> Result<&Origin, ProtocolViolation> {
        match self.stack.peek() {
            Some(top) if top.args.service == service => Ok(&top.caller),
            _ => Err(ProtocolViolation::CallerQueryFromInactive {
                service: service.to_string(),
            }),
        }
    }

    pub fn reset(&mut self) {
        self.stack.clear();
        self.cache.clear();
        self.root_app_origin = None;
    }
}
