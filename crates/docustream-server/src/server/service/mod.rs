//! gRPC service implementation and worker coordination logic.
//!
//! This module contains the client-facing `Convert` service. It accepts
//! `WordToPdf` streams, hands each one to the streaming coordinator and owns
//! the worker pool used for conversions.
//!
//! ## Structure
//!
//! - [`handler`] - gRPC service entry point (`ConvertService`).

pub mod handler;
