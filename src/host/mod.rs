//! Headless host: drives the engine over newline-delimited JSON.

pub mod contract;
pub mod providers;
pub mod stdio;

pub use contract::{HostCommand, HostMessage, OutputActivity};
pub use stdio::{HostBridge, run_stdio_bridge};
