//! Mock host for testing the supervisor without a browser.
//!
//! Records every post, frame operation, and log line so tests can assert on
//! them, and exposes a settable clock.

use std::cell::{Cell, RefCell};

use serde_json::Value;

use crate::error::HostError;
use crate::host::{FrameInfo, Host, TargetOrigin};

/// A message posted to the parent window.
#[derive(Clone, Debug, PartialEq)]
pub struct ParentPost {
    pub message: Value,
    pub target: TargetOrigin,
}

/// A message posted to a loader frame.
#[derive(Clone, Debug, PartialEq)]
pub struct FramePost {
    pub frame_id: String,
    pub message: Value,
    pub target: TargetOrigin,
}

/// Mock host for unit testing
#[derive(Debug, Default)]
pub struct MockHost {
    /// Simulated time in milliseconds
    time: Cell<u64>,
    /// Captured log lines
    log: RefCell<Vec<String>>,
    parent_posts: RefCell<Vec<ParentPost>>,
    frame_posts: RefCell<Vec<FramePost>>,
    /// Frames currently present
    frames: RefCell<Vec<FrameInfo>>,
    /// Every frame ever created, in order
    created: RefCell<Vec<FrameInfo>>,
    removed: RefCell<Vec<String>>,
    fail_frames: Cell<bool>,
    fail_posts: Cell<bool>,
}

impl MockHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a mock host with a specific starting time
    pub fn with_time(ms: u64) -> Self {
        let host = Self::new();
        host.time.set(ms);
        host
    }

    pub fn advance_time(&self, ms: u64) {
        self.time.set(self.time.get() + ms);
    }

    pub fn set_time(&self, ms: u64) {
        self.time.set(ms);
    }

    /// Make subsequent `create_frame` calls fail
    pub fn fail_frame_creation(&self, fail: bool) {
        self.fail_frames.set(fail);
    }

    /// Make subsequent posts fail
    pub fn fail_posts(&self, fail: bool) {
        self.fail_posts.set(fail);
    }

    pub fn get_log(&self) -> Vec<String> {
        self.log.borrow().clone()
    }

    /// Check if a specific message was logged
    pub fn has_log_containing(&self, substr: &str) -> bool {
        self.log.borrow().iter().any(|line| line.contains(substr))
    }

    pub fn parent_posts(&self) -> Vec<ParentPost> {
        self.parent_posts.borrow().clone()
    }

    pub fn frame_posts(&self) -> Vec<FramePost> {
        self.frame_posts.borrow().clone()
    }

    /// Posts delivered to the frame `frame_id`
    pub fn posts_to(&self, frame_id: &str) -> Vec<Value> {
        self.frame_posts
            .borrow()
            .iter()
            .filter(|post| post.frame_id == frame_id)
            .map(|post| post.message.clone())
            .collect()
    }

    /// Take and clear all recorded posts to frames
    pub fn drain_frame_posts(&self) -> Vec<FramePost> {
        self.frame_posts.borrow_mut().drain(..).collect()
    }

    /// Take and clear all recorded posts to the parent
    pub fn drain_parent_posts(&self) -> Vec<ParentPost> {
        self.parent_posts.borrow_mut().drain(..).collect()
    }

    pub fn created_frames(&self) -> Vec<FrameInfo> {
        self.created.borrow().clone()
    }

    pub fn removed_frames(&self) -> Vec<String> {
        self.removed.borrow().clone()
    }

    pub fn has_frame(&self, frame_id: &str) -> bool {
        self.frames.borrow().iter().any(|f| f.id == frame_id)
    }
}

impl Host for MockHost {
    fn post_to_parent(&self, message: &Value, target: &TargetOrigin) -> Result<(), HostError> {
        if self.fail_posts.get() {
            return Err(HostError::PostFailed("mock post failure".to_string()));
        }
        self.parent_posts.borrow_mut().push(ParentPost {
            message: message.clone(),
            target: target.clone(),
        });
        Ok(())
    }

    fn post_to_frame(
        &self,
        frame_id: &str,
        message: &Value,
        target: &TargetOrigin,
    ) -> Result<(), HostError> {
        if !self.has_frame(frame_id) {
            return Err(HostError::FrameNotFound(frame_id.to_string()));
        }
        if self.fail_posts.get() {
            return Err(HostError::PostFailed("mock post failure".to_string()));
        }
        self.frame_posts.borrow_mut().push(FramePost {
            frame_id: frame_id.to_string(),
            message: message.clone(),
            target: target.clone(),
        });
        Ok(())
    }

    fn create_frame(&self, frame: &FrameInfo) -> Result<(), HostError> {
        if self.fail_frames.get() {
            return Err(HostError::FrameCreationFailed(frame.id.clone()));
        }
        self.frames.borrow_mut().push(frame.clone());
        self.created.borrow_mut().push(frame.clone());
        Ok(())
    }

    fn remove_frame(&self, frame_id: &str) -> Result<(), HostError> {
        let mut frames = self.frames.borrow_mut();
        let before = frames.len();
        frames.retain(|f| f.id != frame_id);
        if frames.len() == before {
            return Err(HostError::FrameNotFound(frame_id.to_string()));
        }
        self.removed.borrow_mut().push(frame_id.to_string());
        Ok(())
    }

    fn now_ms(&self) -> u64 {
        self.time.get()
    }

    fn log(&self, line: &str) {
        self.log.borrow_mut().push(line.to_string());
    }
}
