//! Duplex stream sessions.
//!
//! A session is the open channel for exactly one transfer. The core never
//! touches a transport type directly; it only relies on the capability set
//! below:
//!
//! - [`FrameSink`] - ordered sends plus an explicit close of the send half.
//! - [`FrameSource`] - ordered receives where `Ok(None)` is the clean
//!   end-of-stream, distinct from both data frames and transport errors.
//! - [`StreamSession`] - splits a session into independent halves that can be
//!   driven one after the other or concurrently.
//!
//! ## Implementations
//!
//! - [`grpc::GrpcSession`] - a `Convert/WordToPdf` call over a `tonic`
//!   channel.
//! - [`memory::MemorySession`] - an in-process loopback used by tests and
//!   benchmarks.

pub mod grpc;
pub mod memory;

use core::future::Future;
use docustream_core::{ChunkFrame, Result};

/// Send half of a session.
pub trait FrameSink: Send {
    /// Sends one frame. Blocks until the transport accepts it.
    fn send(&mut self, frame: ChunkFrame) -> impl Future<Output = Result<()>> + Send;

    /// Closes the send half. Any later [`send`](FrameSink::send) fails; the
    /// receive half is unaffected.
    fn close(&mut self) -> impl Future<Output = Result<()>> + Send;
}

/// Receive half of a session.
pub trait FrameSource: Send {
    /// Receives the next frame, `Ok(None)` once the remote ended the stream.
    fn recv(&mut self) -> impl Future<Output = Result<Option<ChunkFrame>>> + Send;
}

/// An open duplex channel for a single transfer.
pub trait StreamSession: Send {
    type Sink: FrameSink;
    type Source: FrameSource;

    /// Consumes the session. Sessions are not reusable after a transfer.
    fn split(self) -> (Self::Sink, Self::Source);
}
