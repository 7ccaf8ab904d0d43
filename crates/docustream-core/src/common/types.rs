//! # Transfer Constants and Type Aliases
//!
//! Both ends of the `WordToPdf` stream agree on these values. The chunk size
//! is not negotiated on the wire: a receiver must accept any chunk length, but
//! well-behaved senders never exceed [`CHUNK_SIZE`].

use bytes::Bytes;

/// An opaque, immutable document payload.
///
/// Inputs are borrowed by reference count and never mutated; outputs are
/// always freshly assembled buffers.
pub type Document = Bytes;

/// Maximum number of bytes carried by a single chunk of a single slot.
pub const CHUNK_SIZE: usize = 1024;

/// Slot that carries the converted document in response frames.
///
/// The service currently returns exactly one output document per call.
pub const OUTPUT_SLOT: usize = 0;

/// Slot that carries the source document in request frames.
pub const INPUT_SLOT: usize = 0;
