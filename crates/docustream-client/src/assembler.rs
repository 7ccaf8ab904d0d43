//! Reassembly of the converted document from response frames.

use crate::session::FrameSource;
use bytes::BytesMut;
use docustream_core::{
    ChunkFrame, Error, Result,
    types::{Document, OUTPUT_SLOT},
};
use tokio_util::sync::CancellationToken;

/// Accumulates one output slot of the response stream.
///
/// Chunks are appended strictly in arrival order. Frames that do not carry
/// the tracked slot contribute nothing.
#[derive(Debug)]
pub struct ResponseAssembler {
    slot: usize,
    output: BytesMut,
    frames: usize,
}

impl Default for ResponseAssembler {
    fn default() -> Self {
        Self::new()
    }
}

impl ResponseAssembler {
    /// Assembler for [`OUTPUT_SLOT`].
    pub fn new() -> Self {
        Self::for_slot(OUTPUT_SLOT)
    }

    pub fn for_slot(slot: usize) -> Self {
        Self {
            slot,
            output: BytesMut::new(),
            frames: 0,
        }
    }

    /// Frames seen so far, including ones that carried no payload.
    pub const fn frames(&self) -> usize {
        self.frames
    }

    /// Bytes accumulated so far.
    pub fn len(&self) -> usize {
        self.output.len()
    }

    pub fn is_empty(&self) -> bool {
        self.output.is_empty()
    }

    /// Appends the tracked slot of `frame`, returning the number of bytes
    /// added.
    pub fn push(&mut self, frame: &ChunkFrame) -> usize {
        self.frames += 1;
        match frame.slot(self.slot) {
            Some(chunk) => {
                self.output.extend_from_slice(chunk);
                chunk.len()
            }
            None => 0,
        }
    }

    pub fn finish(self) -> Document {
        self.output.freeze()
    }

    /// Drains `source` until the remote ends the stream and returns the
    /// assembled document.
    ///
    /// # Errors
    ///
    /// A receive error or cancellation discards everything accumulated so far.
    #[cfg_attr(feature = "tracing", tracing::instrument(skip_all, fields(slot = self.slot)))]
    pub async fn run<S: FrameSource>(
        mut self,
        source: &mut S,
        cancel: &CancellationToken,
    ) -> Result<Document> {
        loop {
            let next = tokio::select! {
                biased;
                () = cancel.cancelled() => return Err(Error::Cancelled),
                received = source.recv() => received?,
            };

            match next {
                Some(frame) => {
                    self.push(&frame);
                }
                None => {
                    #[cfg(feature = "tracing")]
                    tracing::debug!(
                        "Response stream ended after {} frames ({} bytes)",
                        self.frames,
                        self.output.len()
                    );
                    return Ok(self.finish());
                }
            }
        }
    }
}
