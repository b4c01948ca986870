//! Inter-frame Plugin Call Supervisor
//!
//! The supervisor lives in a hidden iframe embedded by an application. It
//! accepts top-level plugin calls from the application, runs every plugin in
//! a per-service sandboxed loader iframe, resolves nested calls between
//! plugins with an explicit call stack, and relays the final result back.
//!
//! ## Module Structure
//!
//! - `origin` - Service origin derivation and sender trust checks
//! - `context` - Call stack, result cache, and root application origin
//! - `plugins` - Per-service plugin registry
//! - `frames` - Loader iframes and their initialization queues
//! - `supervisor` - The dispatch state machine
//! - `loader` - Loader side of the protocol, with deterministic replay
//! - `host` - The [`Host`] seam through which all side effects flow
//! - `testing` - [`testing::MockHost`] for driving the core without a browser
//!
//! ## Architecture
//!
//! This crate owns no threads, timers, or windows. The browser binding feeds
//! every `message` event and every deadline timer into
//! [`Supervisor::handle`] and performs the resulting posts through its
//! [`Host`] implementation.

pub mod config;
pub mod constants;
pub mod context;
pub mod error;
pub mod frames;
pub mod host;
pub mod loader;
pub mod origin;
pub mod plugins;
pub mod supervisor;
pub mod testing;

pub use config::SupervisorConfig;
pub use context::{CallContext, CallFrame, CallStack, ResultCache};
pub use error::{HostError, OriginError, ProtocolViolation, SupervisorError, SupervisorResult};
pub use frames::{Loader, LoaderRegistry};
pub use host::{frame_id, FrameInfo, Host, RawMessage, SourceKind, SupervisorEvent, TargetOrigin};
pub use loader::{ExecContext, ExecError, LoaderEndpoint, PluginExecutor, Suspension};
pub use origin::OriginPolicy;
pub use plugins::PluginManagers;
pub use supervisor::{InFlight, Outcome, Supervisor};
