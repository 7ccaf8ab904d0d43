//! Shared protocol definitions used by both the client driver and the
//! conversion server.
//!
//! ## Submodules
//!
//! - [`error`] - Unified error type and its mapping to gRPC statuses.
//! - [`frame`] - [`ChunkFrame`](frame::ChunkFrame), the slot-aligned unit of
//!   transfer.
//! - [`types`] - Chunk size and slot constants.
//! - [`proto`] - Generated protobuf messages and gRPC service bindings.

pub mod error;
pub mod frame;
pub mod types;

pub use error::{Error, Result};
pub use frame::ChunkFrame;

/// gRPC service and message definitions generated from `proto/convert.proto`
/// and `proto/word.proto`.
///
/// ## Service
///
/// - `Convert/WordToPdf` - bidirectional stream. The client streams
///   [`WordToPdfReq`](proto::WordToPdfReq) frames and closes its send half; the
///   server answers with [`WordToPdfRes`](proto::WordToPdfRes) frames and ends
///   the stream once the converted document has been sent.
///
/// Both messages wrap a [`DocuChunk`](proto::DocuChunk) whose `chunks` entries
/// are index aligned with the transferred document slots.
pub mod proto {
    pub mod word {
        tonic::include_proto!("word");
    }

    pub mod convert {
        tonic::include_proto!("convert");
    }

    pub use convert::{WordToPdfReq, WordToPdfRes, convert_client, convert_server};
    pub use word::DocuChunk;

    pub const FILE_DESCRIPTOR_SET: &[u8] =
        tonic::include_file_descriptor_set!("docustream_descriptor");
}
