//! Command-line wiring for the `docustream` binary.
//!
//! - [`config`] - CLI arguments and validated client configuration.
//! - [`telemetry`] - Console logging setup.

pub mod config;
pub mod telemetry;
