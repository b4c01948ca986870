//! LIFO stack of in-flight plugin invocations.

use xframe_protocol::{CallArgs, Origin};

/// One pending invocation: who asked, and what they asked for.
#[derive(Clone, Debug, PartialEq)]
pub struct CallFrame {
    pub caller: Origin,
    pub args: CallArgs,
}

impl CallFrame {
    pub fn new(caller: impl Into<Origin>, args: CallArgs) -> Self {
        Self {
            caller: caller.into(),
            args,
        }
    }
}

/// The call stack.
///
/// The bottom frame is the application's top-level call; the top frame is
/// the call currently executing in a loader.
#[derive(Clone, Debug, Default)]
pub struct CallStack {
    frames: Vec<CallFrame>,
}

impl CallStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, frame: CallFrame) {
        self.frames.push(frame);
    }

    pub fn pop(&mut self) -> Option<CallFrame> {
        self.frames.pop()
    }

    pub fn peek(&self) -> Option<&CallFrame> {
        self.frames.last()
    }

    pub fn peek_bottom(&self) -> Option<&CallFrame> {
        self.frames.first()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub(crate) fn clear(&mut self) {
        self.frames.clear();
    }
}
