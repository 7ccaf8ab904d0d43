#![doc = include_str!("../README.md")]

pub mod assembler;
pub mod client;
pub mod emitter;
pub mod session;
pub mod transfer;

pub use assembler::ResponseAssembler;
pub use client::{ConnectOptions, DocuClient};
pub use docustream_core::{ChunkFrame, Error, Result};
pub use emitter::{ChunkEmitter, EmitSummary};
pub use session::{FrameSink, FrameSource, StreamSession};
pub use transfer::{TransferMode, transfer, transfer_document};
