//! Slot-aligned chunk frames.
//!
//! A [`ChunkFrame`] is the transport-neutral form of one `WordToPdfReq` or
//! `WordToPdfRes` message. Entry `i` always belongs to document slot `i`; an
//! empty entry means "no bytes for this slot in this tick".

use crate::proto::{DocuChunk, WordToPdfReq, WordToPdfRes};
use bytes::Bytes;

/// One message exchanged on the conversion stream.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ChunkFrame {
    chunks: Vec<Bytes>,
}

impl ChunkFrame {
    /// Builds a frame from per-slot chunks, in slot order.
    pub const fn new(chunks: Vec<Bytes>) -> Self {
        Self { chunks }
    }

    /// Builds a single-slot frame.
    pub fn single(chunk: Bytes) -> Self {
        Self {
            chunks: vec![chunk],
        }
    }

    /// Number of slots carried by this frame.
    pub fn slot_count(&self) -> usize {
        self.chunks.len()
    }

    /// Returns the chunk for `slot`, if the frame carries that slot.
    pub fn slot(&self, slot: usize) -> Option<&Bytes> {
        self.chunks.get(slot)
    }

    pub fn chunks(&self) -> &[Bytes] {
        &self.chunks
    }

    pub fn into_chunks(self) -> Vec<Bytes> {
        self.chunks
    }

    /// Total payload bytes across every slot.
    pub fn payload_len(&self) -> usize {
        self.chunks.iter().map(Bytes::len).sum()
    }

    /// `true` when no slot carries any bytes.
    ///
    /// A request frame for which this holds is the end-of-upload marker.
    pub fn is_terminal(&self) -> bool {
        self.chunks.iter().all(Bytes::is_empty)
    }
}

// A missing `docu` field decodes as a frame with no slots.
fn chunks_of(docu: Option<DocuChunk>) -> Vec<Bytes> {
    docu.map(|d| d.chunks).unwrap_or_default()
}

impl From<WordToPdfReq> for ChunkFrame {
    fn from(req: WordToPdfReq) -> Self {
        Self::new(chunks_of(req.docu))
    }
}

impl From<WordToPdfRes> for ChunkFrame {
    fn from(res: WordToPdfRes) -> Self {
        Self::new(chunks_of(res.docu))
    }
}

impl From<ChunkFrame> for WordToPdfReq {
    fn from(frame: ChunkFrame) -> Self {
        Self {
            docu: Some(DocuChunk {
                chunks: frame.chunks,
            }),
        }
    }
}

impl From<ChunkFrame> for WordToPdfRes {
    fn from(frame: ChunkFrame) -> Self {
        Self {
            docu: Some(DocuChunk {
                chunks: frame.chunks,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prost::Message;

    #[test]
    fn terminal_only_when_every_slot_is_empty() {
        assert!(ChunkFrame::new(vec![Bytes::new(), Bytes::new()]).is_terminal());
        assert!(ChunkFrame::default().is_terminal());
        assert!(!ChunkFrame::new(vec![Bytes::new(), Bytes::from_static(b"x")]).is_terminal());
    }

    #[test]
    fn missing_docu_is_an_empty_frame() {
        let frame = ChunkFrame::from(WordToPdfRes { docu: None });
        assert_eq!(frame.slot_count(), 0);
        assert!(frame.slot(0).is_none());
    }

    #[test]
    fn empty_slots_survive_the_wire() {
        let frame = ChunkFrame::new(vec![
            Bytes::new(),
            Bytes::from_static(b"abc"),
            Bytes::new(),
        ]);

        let encoded = WordToPdfReq::from(frame.clone()).encode_to_vec();
        let decoded = ChunkFrame::from(WordToPdfReq::decode(encoded.as_slice()).unwrap());

        assert_eq!(decoded, frame);
        assert_eq!(decoded.slot_count(), 3);
        assert_eq!(decoded.payload_len(), 3);
    }
}
