//! Chunk emission for the send half of a session.
//!
//! The [`ChunkEmitter`] owns one [`SlotCursor`] per input document, held in a
//! fixed-length slice so that frame entry `i` is always produced by cursor
//! `i`. Every tick reads up to `chunk_size` bytes from each slot and yields
//! one [`ChunkFrame`]. Finished slots stay in the frame as empty entries.
//!
//! The first tick in which no slot yields any bytes produces the terminal
//! frame. [`ChunkEmitter::run`] sends it and then closes the send half, so the
//! remote always sees an all-empty frame as the last request, even for an
//! empty document.

use crate::session::FrameSink;
use bytes::Bytes;
use docustream_core::{
    ChunkFrame, Error, Result,
    types::{CHUNK_SIZE, Document},
};
use std::io::{self, Cursor};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio_util::sync::CancellationToken;

/// Read position of one input slot.
#[derive(Debug)]
pub struct SlotCursor<R> {
    reader: R,
    position: u64,
    exhausted: bool,
}

impl<R: AsyncRead + Unpin> SlotCursor<R> {
    pub const fn new(reader: R) -> Self {
        Self {
            reader,
            position: 0,
            exhausted: false,
        }
    }

    /// Bytes consumed from the reader so far.
    pub const fn position(&self) -> u64 {
        self.position
    }

    /// `true` once the reader reported end-of-input.
    pub const fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    /// Reads the next chunk into `scratch`, filling it unless the reader hits
    /// end-of-input first. Returns an empty chunk once exhausted.
    async fn read_chunk(&mut self, scratch: &mut [u8]) -> io::Result<Bytes> {
        if self.exhausted {
            return Ok(Bytes::new());
        }

        let mut filled = 0;
        while filled < scratch.len() {
            match self.reader.read(&mut scratch[filled..]).await {
                Ok(0) => {
                    self.exhausted = true;
                    break;
                }
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }

        self.position += filled as u64;
        Ok(Bytes::copy_from_slice(&scratch[..filled]))
    }
}

/// Counters reported by a completed [`ChunkEmitter::run`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct EmitSummary {
    /// Frames sent, including the terminal frame.
    pub frames: usize,
    /// Payload bytes sent across all slots.
    pub bytes: u64,
}

/// Produces the ordered request frames for a set of input slots.
#[derive(Debug)]
pub struct ChunkEmitter<R> {
    slots: Box<[SlotCursor<R>]>,
    // Reused across ticks so each chunk costs one copy.
    scratch: Box<[u8]>,
    finished: bool,
}

impl ChunkEmitter<Cursor<Document>> {
    /// Emitter over in-memory documents, one slot per document.
    pub fn from_documents(documents: impl IntoIterator<Item = Document>) -> Self {
        Self::new(documents.into_iter().map(Cursor::new))
    }
}

impl<R: AsyncRead + Unpin + Send> ChunkEmitter<R> {
    /// Emitter over `readers`, in slot order, using [`CHUNK_SIZE`] chunks.
    pub fn new(readers: impl IntoIterator<Item = R>) -> Self {
        Self {
            slots: readers.into_iter().map(SlotCursor::new).collect(),
            scratch: vec![0_u8; CHUNK_SIZE].into_boxed_slice(),
            finished: false,
        }
    }

    /// Overrides the per-slot chunk size. Zero is treated as one byte.
    #[must_use]
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.scratch = vec![0_u8; chunk_size.max(1)].into_boxed_slice();
        self
    }

    pub fn chunk_size(&self) -> usize {
        self.scratch.len()
    }

    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    /// Cursors in slot order.
    pub fn slots(&self) -> &[SlotCursor<R>] {
        &self.slots
    }

    /// `true` once the terminal frame has been produced.
    pub const fn is_finished(&self) -> bool {
        self.finished
    }

    /// Produces the frame for the next tick, `None` after the terminal frame.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Read`] if any slot fails with something other than
    /// end-of-input.
    pub async fn next_frame(&mut self) -> Result<Option<ChunkFrame>> {
        if self.finished {
            return Ok(None);
        }

        let Self { slots, scratch, .. } = self;
        let mut chunks = Vec::with_capacity(slots.len());
        for (slot, cursor) in slots.iter_mut().enumerate() {
            let chunk = cursor
                .read_chunk(scratch)
                .await
                .map_err(|source| Error::Read { slot, source })?;
            chunks.push(chunk);
        }

        let frame = ChunkFrame::new(chunks);
        self.finished = frame.is_terminal();
        Ok(Some(frame))
    }

    /// Sends every frame on `sink`, then closes it.
    ///
    /// Cancellation is observed before each tick and while a send is blocked;
    /// a cancelled run returns [`Error::Cancelled`] and leaves the sink open.
    ///
    /// # Errors
    ///
    /// Any read, send, or close failure aborts the run.
    #[cfg_attr(feature = "tracing", tracing::instrument(skip_all, fields(slots = self.slots.len())))]
    pub async fn run<S: FrameSink>(
        mut self,
        sink: &mut S,
        cancel: &CancellationToken,
    ) -> Result<EmitSummary> {
        let mut summary = EmitSummary::default();

        loop {
            if cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }

            let Some(frame) = self.next_frame().await? else {
                break;
            };
            let payload = frame.payload_len() as u64;

            tokio::select! {
                biased;
                () = cancel.cancelled() => return Err(Error::Cancelled),
                sent = sink.send(frame) => sent?,
            }

            summary.frames += 1;
            summary.bytes += payload;

            if self.finished {
                break;
            }
        }

        sink.close().await?;

        #[cfg(feature = "tracing")]
        tracing::debug!(
            "Sent {} frames ({} bytes), send half closed",
            summary.frames,
            summary.bytes
        );

        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{StreamSession, memory::MemorySession};
    use core::{
        pin::Pin,
        task::{Context, Poll},
    };
    use rand::{Rng, SeedableRng, rngs::StdRng};
    use tokio::io::ReadBuf;

    fn random_document(len: usize, seed: u64) -> Bytes {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut buf = vec![0_u8; len];
        rng.fill(&mut buf[..]);
        Bytes::from(buf)
    }

    async fn emit_all(emitter: ChunkEmitter<Cursor<Bytes>>) -> (Vec<ChunkFrame>, bool) {
        let (session, mut remote) = MemorySession::pair();
        let (mut sink, _source) = session.split();
        emitter
            .run(&mut sink, &CancellationToken::new())
            .await
            .unwrap();
        let frames = remote.collect_requests().await;
        (frames, sink.is_closed())
    }

    #[tokio::test]
    async fn concatenated_chunks_reproduce_the_input() {
        for (seed, len) in [0, 1, 1023, 1024, 1025, 4096, 10_000, 65_537]
            .into_iter()
            .enumerate()
        {
            let document = random_document(len, seed as u64);
            let (frames, _) = emit_all(ChunkEmitter::from_documents([document.clone()])).await;

            let mut rebuilt = Vec::with_capacity(len);
            for frame in &frames {
                assert_eq!(frame.slot_count(), 1);
                assert!(frame.slot(0).unwrap().len() <= CHUNK_SIZE);
                rebuilt.extend_from_slice(frame.slot(0).unwrap());
            }
            assert_eq!(rebuilt, document, "length {len}");
        }
    }

    #[tokio::test]
    async fn exactly_one_terminal_frame_and_it_is_last() {
        let document = random_document(3 * CHUNK_SIZE + 17, 7);
        let (frames, closed) = emit_all(ChunkEmitter::from_documents([document])).await;

        assert!(closed);
        // Three full chunks, one short chunk, one terminal frame.
        assert_eq!(frames.len(), 5);
        let terminal: Vec<_> = frames.iter().filter(|f| f.is_terminal()).collect();
        assert_eq!(terminal.len(), 1);
        assert!(frames.last().unwrap().is_terminal());
        assert_eq!(frames[3].slot(0).unwrap().len(), 17);
    }

    #[tokio::test]
    async fn exact_multiple_still_ends_with_an_empty_frame() {
        let (frames, _) =
            emit_all(ChunkEmitter::from_documents([random_document(2 * CHUNK_SIZE, 3)])).await;
        assert_eq!(frames.len(), 3);
        assert_eq!(frames[1].slot(0).unwrap().len(), CHUNK_SIZE);
        assert!(frames[2].is_terminal());
    }

    #[tokio::test]
    async fn empty_input_sends_a_single_empty_frame() {
        let (frames, closed) = emit_all(ChunkEmitter::from_documents([Bytes::new()])).await;

        assert!(closed);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].slot_count(), 1);
        assert!(frames[0].slot(0).unwrap().is_empty());
    }

    #[tokio::test]
    async fn slots_stay_index_aligned() {
        let short = random_document(100, 1);
        let long = random_document(2500, 2);
        let (frames, _) =
            emit_all(ChunkEmitter::from_documents([short.clone(), long.clone()])).await;

        // long needs three chunks, then one all-empty tick.
        assert_eq!(frames.len(), 4);
        for frame in &frames {
            assert_eq!(frame.slot_count(), 2);
        }
        assert_eq!(frames[0].slot(0).unwrap(), &short);
        assert!(frames[1].slot(0).unwrap().is_empty());
        assert!(frames[2].slot(0).unwrap().is_empty());
        assert_eq!(frames[2].slot(1).unwrap().len(), 2500 - 2 * CHUNK_SIZE);
        assert!(frames[3].is_terminal());

        let rebuilt: Vec<u8> = frames
            .iter()
            .flat_map(|f| f.slot(1).unwrap().iter().copied())
            .collect();
        assert_eq!(rebuilt, long);
    }

    #[tokio::test]
    async fn custom_chunk_size_bounds_every_chunk() {
        let document = random_document(1000, 11);
        let emitter = ChunkEmitter::from_documents([document.clone()]).with_chunk_size(64);
        assert_eq!(emitter.chunk_size(), 64);

        let (frames, _) = emit_all(emitter).await;
        assert_eq!(frames.len(), 1000usize.div_ceil(64) + 1);
        assert!(frames.iter().all(|f| f.slot(0).unwrap().len() <= 64));
    }

    #[tokio::test]
    async fn next_frame_returns_none_after_terminal() {
        let mut emitter = ChunkEmitter::from_documents([Bytes::from_static(b"abc")]);
        assert_eq!(
            emitter.next_frame().await.unwrap().unwrap().slot(0).unwrap(),
            &Bytes::from_static(b"abc")
        );
        assert!(emitter.slots()[0].is_exhausted());
        assert_eq!(emitter.slots()[0].position(), 3);
        assert!(emitter.next_frame().await.unwrap().unwrap().is_terminal());
        assert!(emitter.is_finished());
        assert!(emitter.next_frame().await.unwrap().is_none());
    }

    /// Yields `good` bytes one at a time, then fails.
    struct FailingReader {
        good: usize,
    }

    impl AsyncRead for FailingReader {
        fn poll_read(
            mut self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            buf: &mut ReadBuf<'_>,
        ) -> Poll<io::Result<()>> {
            if self.good == 0 {
                return Poll::Ready(Err(io::Error::other("disk on fire")));
            }
            self.good -= 1;
            buf.put_slice(&[0xAB]);
            Poll::Ready(Ok(()))
        }
    }

    #[tokio::test]
    async fn read_error_aborts_without_closing() {
        let (session, mut remote) = MemorySession::pair();
        let (mut sink, _source) = session.split();

        let emitter = ChunkEmitter::new([FailingReader { good: 1500 }]);
        let err = emitter
            .run(&mut sink, &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Read { slot: 0, .. }));
        assert!(!sink.is_closed());

        // The first full chunk made it out before the failure.
        drop(sink);
        let frames = remote.collect_requests().await;
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].slot(0).unwrap().len(), CHUNK_SIZE);
    }

    #[tokio::test]
    async fn send_failure_is_fatal() {
        let (session, remote) = MemorySession::pair();
        let (mut sink, _source) = session.split();
        drop(remote);

        let err = ChunkEmitter::from_documents([random_document(10, 5)])
            .run(&mut sink, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Send { .. }));
    }

    #[tokio::test]
    async fn cancelled_before_first_tick() {
        let (session, mut remote) = MemorySession::pair();
        let (mut sink, _source) = session.split();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = ChunkEmitter::from_documents([random_document(10, 5)])
            .run(&mut sink, &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Cancelled));

        drop(sink);
        assert!(remote.collect_requests().await.is_empty());
    }

    #[tokio::test]
    async fn summary_counts_frames_and_bytes() {
        let (session, _remote) = MemorySession::pair();
        let (mut sink, _source) = session.split();
        let summary = ChunkEmitter::from_documents([random_document(2048, 9)])
            .run(&mut sink, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(
            summary,
            EmitSummary {
                frames: 3,
                bytes: 2048
            }
        );
    }
}
