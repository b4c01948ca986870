//! Centralized constants for the supervisor core
//!
//! Paths, names, and timeouts that would otherwise be scattered across the
//! dispatch code live here so they can be audited in one place.

// =============================================================================
// Loader frames
// =============================================================================

/// Path of the loader page on every service subdomain.
pub const DEFAULT_LOADER_PATH: &str = "/common/wasm-loader";

/// Prefix of the DOM id given to each loader iframe.
pub const LOADER_FRAME_ID_PREFIX: &str = "xframe-loader-";

// =============================================================================
// Services
// =============================================================================

/// Service name reported for the bare root domain.
pub const DEFAULT_ROOT_APP_NAME: &str = "homepage";

/// Services implemented by the host runtime rather than by a loader.
///
/// Plugins in these services are never preloaded.
pub const DEFAULT_HOST_SERVICES: &[&str] = &["wasi", "host"];

/// Plugin name used when a system service is preloaded without one.
pub const DEFAULT_PLUGIN: &str = "plugin";

/// Deepest call stack a chain may build through nested calls.
pub const DEFAULT_MAX_STACK_DEPTH: usize = 64;

// =============================================================================
// Timing
// =============================================================================

/// How long a loader may hold a dispatched call before the chain is abandoned.
pub const DEFAULT_CALL_TIMEOUT_MS: u64 = 30_000;
