//! Conversion worker pool.
//!
//! - [`manager`] - [`WorkerPool`](manager::WorkerPool): round-robin dispatch,
//!   stream accounting and phased shutdown.
//! - [`worker`] - The per-worker receive loop.

pub mod manager;
pub mod worker;
