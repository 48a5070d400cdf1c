//! Process-level helpers for the `subdash` binary.
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`sig_down`] | Ctrl-C and SIGTERM handling for long-running commands |
//! | [`telemetry`] | Log formatting and optional OpenTelemetry export |

pub mod sig_down;
pub mod telemetry;

pub use sig_down::*;
pub use telemetry::*;
