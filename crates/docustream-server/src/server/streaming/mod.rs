//! Per-stream conversion pipeline.
//!
//! ## Structure
//!
//! - [`request`] - Messages exchanged between streams and pool workers.
//! - [`upload`] - Reassembles the uploaded document from request frames.
//! - [`processor`] - Runs one conversion inside a worker.
//! - [`coordinator`] - Ties upload, conversion and the chunked response
//!   together for one call.

pub mod coordinator;
pub mod processor;
pub mod request;
pub mod upload;
