//! Browser binding for the xframe Supervisor
//!
//! This crate runs in the hidden supervisor iframe. It adapts the
//! transport-independent core in `xframe-supervisor` to the browser.
//!
//! ## Module Structure
//!
//! - `host` - `WebHost`, the `Host` implementation over `web-sys`
//! - `supervisor` - Exported `Supervisor` class, message listener, deadline timer
//! - `util` - Console logging and JSON conversions
//!
//! ## Usage
//!
//! ```js
//! import init, { Supervisor } from "./xframe_supervisor_web.js";
//!
//! await init();
//! const supervisor = new Supervisor(JSON.stringify({ requireHttps: false }));
//! supervisor.start();
//! ```

pub(crate) mod host;
pub(crate) mod supervisor;
pub(crate) mod util;

pub use host::{classify_source, WebHost};
pub use supervisor::Supervisor;
pub use util::{from_js, to_js};
