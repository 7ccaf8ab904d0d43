//! Server internals for `docustream-server`.
//!
//! - [`config`] - CLI and environment configuration.
//! - [`converter`] - The [`Converter`](converter::Converter) trait and the
//!   LibreOffice implementation.
//! - [`pool`] - Worker pool that runs conversions.
//! - [`streaming`] - Per-stream upload, conversion and response chunking.
//! - [`service`] - The gRPC `Convert` service.
//! - [`telemetry`] - Logging, tracing and metrics setup.

pub mod config;
pub mod converter;
pub mod pool;
pub mod service;
pub mod streaming;
pub mod telemetry;
