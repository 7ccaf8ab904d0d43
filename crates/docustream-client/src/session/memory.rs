//! In-process loopback session.
//!
//! [`MemorySession::pair`] returns the client-side session together with a
//! [`MemoryRemote`] that plays the service: it observes every request frame in
//! send order, sees the close of the send half, and decides which response
//! frames, errors, or end-of-stream the client receives. Channels are
//! unbounded so a remote that answers only after the upload never stalls a
//! sequential transfer.

use super::{FrameSink, FrameSource, StreamSession};
use bytes::{Bytes, BytesMut};
use docustream_core::{ChunkFrame, Error, Result, types::INPUT_SLOT};
use tokio::{sync::mpsc, task::JoinHandle};
use tonic::Status;

type Response = core::result::Result<ChunkFrame, Status>;

/// Client side of a loopback session.
pub struct MemorySession {
    sink: MemorySink,
    source: MemorySource,
}

impl MemorySession {
    /// Creates a connected session/remote pair.
    pub fn pair() -> (Self, MemoryRemote) {
        let (req_tx, req_rx) = mpsc::unbounded_channel();
        let (res_tx, res_rx) = mpsc::unbounded_channel();

        let session = Self {
            sink: MemorySink {
                tx: Some(req_tx),
                closed: false,
            },
            source: MemorySource { rx: res_rx },
        };
        let remote = MemoryRemote {
            requests: req_rx,
            responses: Some(res_tx),
        };
        (session, remote)
    }
}

impl StreamSession for MemorySession {
    type Sink = MemorySink;
    type Source = MemorySource;

    fn split(self) -> (MemorySink, MemorySource) {
        (self.sink, self.source)
    }
}

pub struct MemorySink {
    tx: Option<mpsc::UnboundedSender<ChunkFrame>>,
    closed: bool,
}

impl MemorySink {
    /// `true` once [`FrameSink::close`] has been called.
    pub const fn is_closed(&self) -> bool {
        self.closed
    }
}

impl FrameSink for MemorySink {
    async fn send(&mut self, frame: ChunkFrame) -> Result<()> {
        let Some(tx) = self.tx.as_ref() else {
            return Err(Error::Send {
                context: "send half already closed".to_string(),
            });
        };
        tx.send(frame).map_err(|_| Error::Send {
            context: "remote dropped the request stream".to_string(),
        })
    }

    async fn close(&mut self) -> Result<()> {
        self.tx.take();
        self.closed = true;
        Ok(())
    }
}

pub struct MemorySource {
    rx: mpsc::UnboundedReceiver<Response>,
}

impl FrameSource for MemorySource {
    async fn recv(&mut self) -> Result<Option<ChunkFrame>> {
        match self.rx.recv().await {
            Some(Ok(frame)) => Ok(Some(frame)),
            Some(Err(status)) => Err(Error::Receive(status)),
            None => Ok(None),
        }
    }
}

/// Service side of a loopback session.
pub struct MemoryRemote {
    requests: mpsc::UnboundedReceiver<ChunkFrame>,
    responses: Option<mpsc::UnboundedSender<Response>>,
}

impl MemoryRemote {
    /// Next request frame, `None` once the client closed (or dropped) its send
    /// half and every queued frame was consumed.
    pub async fn next_request(&mut self) -> Option<ChunkFrame> {
        self.requests.recv().await
    }

    /// Drains request frames until the send half is closed.
    pub async fn collect_requests(&mut self) -> Vec<ChunkFrame> {
        let mut frames = Vec::new();
        while let Some(frame) = self.requests.recv().await {
            frames.push(frame);
        }
        frames
    }

    /// Stops accepting request frames; later client sends fail as if the
    /// transport dropped the request stream.
    pub fn close_requests(&mut self) {
        self.requests.close();
    }

    /// Queues a response frame. Returns `false` if the client is gone or the
    /// stream was already ended.
    pub fn respond(&self, frame: ChunkFrame) -> bool {
        self.responses
            .as_ref()
            .is_some_and(|tx| tx.send(Ok(frame)).is_ok())
    }

    /// Queues a transport error.
    pub fn fail(&self, status: Status) -> bool {
        self.responses
            .as_ref()
            .is_some_and(|tx| tx.send(Err(status)).is_ok())
    }

    /// Ends the response stream. Frames queued before this call are still
    /// delivered.
    pub fn finish(&mut self) {
        self.responses.take();
    }

    /// Plays a deterministic service on a background task: collects slot
    /// [`INPUT_SLOT`] of the upload, applies `convert` and answers with
    /// single-slot frames of at most `chunk_size` bytes before ending the
    /// stream.
    pub fn serve<F>(mut self, chunk_size: usize, convert: F) -> JoinHandle<()>
    where
        F: FnOnce(Bytes) -> Bytes + Send + 'static,
    {
        tokio::spawn(async move {
            let mut upload = BytesMut::new();
            while let Some(frame) = self.next_request().await {
                if let Some(chunk) = frame.slot(INPUT_SLOT) {
                    upload.extend_from_slice(chunk);
                }
            }

            let output = convert(upload.freeze());
            let mut offset = 0;
            while offset < output.len() {
                let end = (offset + chunk_size.max(1)).min(output.len());
                if !self.respond(ChunkFrame::single(output.slice(offset..end))) {
                    return;
                }
                offset = end;
            }
            self.finish();
        })
    }
}
