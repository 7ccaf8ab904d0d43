//! `tonic` implementation of the session traits.
//!
//! Opening a session starts the `WordToPdf` call on a background task that
//! owns the request stream. This lets callers push every frame before awaiting
//! the response headers, which matters for servers that only answer once the
//! whole upload has arrived.

use super::{FrameSink, FrameSource, StreamSession};
use docustream_core::{
    ChunkFrame, Error, Result,
    proto::{WordToPdfReq, WordToPdfRes, convert_client::ConvertClient},
};
use tokio::{sync::mpsc, task::JoinHandle};
use tokio_stream::wrappers::ReceiverStream;
use tonic::{Status, Streaming, transport::Channel};

type PendingCall = JoinHandle<core::result::Result<Streaming<WordToPdfRes>, Status>>;

/// A single `WordToPdf` call.
pub struct GrpcSession {
    sink: GrpcSink,
    source: GrpcSource,
}

impl GrpcSession {
    /// Starts a `WordToPdf` call on `client`.
    ///
    /// `request_buffer` bounds how many frames may be queued ahead of the
    /// transport. Must be called from within a Tokio runtime.
    pub fn open(client: &ConvertClient<Channel>, request_buffer: usize) -> Self {
        let (tx, rx) = mpsc::channel::<WordToPdfReq>(request_buffer.max(1));
        let mut client = client.clone();

        let call = tokio::spawn(async move {
            client
                .word_to_pdf(ReceiverStream::new(rx))
                .await
                .map(tonic::Response::into_inner)
        });

        Self {
            sink: GrpcSink { tx: Some(tx) },
            source: GrpcSource {
                inbound: Inbound::Pending(call),
            },
        }
    }
}

impl StreamSession for GrpcSession {
    type Sink = GrpcSink;
    type Source = GrpcSource;

    fn split(self) -> (GrpcSink, GrpcSource) {
        (self.sink, self.source)
    }
}

/// Request half of a [`GrpcSession`].
pub struct GrpcSink {
    tx: Option<mpsc::Sender<WordToPdfReq>>,
}

impl FrameSink for GrpcSink {
    async fn send(&mut self, frame: ChunkFrame) -> Result<()> {
        let Some(tx) = self.tx.as_ref() else {
            return Err(Error::Send {
                context: "send half already closed".to_string(),
            });
        };

        tx.send(frame.into()).await.map_err(|_| Error::Send {
            context: "request stream dropped by transport".to_string(),
        })
    }

    async fn close(&mut self) -> Result<()> {
        // Dropping the sender ends the request body.
        self.tx.take();
        Ok(())
    }
}

enum Inbound {
    Pending(PendingCall),
    Open(Streaming<WordToPdfRes>),
    Finished,
}

/// Response half of a [`GrpcSession`].
pub struct GrpcSource {
    inbound: Inbound,
}

impl FrameSource for GrpcSource {
    async fn recv(&mut self) -> Result<Option<ChunkFrame>> {
        loop {
            match &mut self.inbound {
                Inbound::Pending(call) => {
                    let joined = call.await;
                    match joined {
                        Ok(Ok(stream)) => self.inbound = Inbound::Open(stream),
                        Ok(Err(status)) => {
                            self.inbound = Inbound::Finished;
                            return Err(Error::Receive(status));
                        }
                        Err(e) => {
                            self.inbound = Inbound::Finished;
                            return Err(Error::ChannelError {
                                context: format!("WordToPdf call task failed: {e}"),
                            });
                        }
                    }
                }
                Inbound::Open(stream) => {
                    return match stream.message().await {
                        Ok(Some(res)) => Ok(Some(res.into())),
                        Ok(None) => {
                            self.inbound = Inbound::Finished;
                            Ok(None)
                        }
                        Err(status) => {
                            self.inbound = Inbound::Finished;
                            Err(Error::Receive(status))
                        }
                    };
                }
                Inbound::Finished => return Ok(None),
            }
        }
    }
}

impl Drop for GrpcSource {
    fn drop(&mut self) {
        if let Inbound::Pending(call) = &self.inbound {
            call.abort();
        }
    }
}
