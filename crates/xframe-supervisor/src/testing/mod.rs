//! Test doubles for the supervisor core.

mod mock_host;

pub use mock_host::{FramePost, MockHost, ParentPost};
