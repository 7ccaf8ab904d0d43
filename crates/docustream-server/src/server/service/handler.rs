//! gRPC service implementation for streamed document conversion.
//!
//! This module defines [`ConvertService`], the concrete implementation of the
//! [`Convert`] gRPC service. A `WordToPdf` call uploads one document as a
//! stream of chunk frames; once the client closes its send half the document
//! is converted by a pool worker and streamed back in bounded chunks.
//!
//! ## Responsibilities
//!
//! - Spawn and manage a background worker pool, one converter per worker.
//! - Refuse new streams during shutdown.
//! - Dispatch each stream to [`serve_conversion`].
//! - Record stream metrics.

use crate::server::{
    config::ServerConfig,
    converter::Converter,
    pool::{manager::WorkerPool, worker::worker_loop},
    streaming::coordinator::serve_conversion,
    telemetry::{
        increment_bytes_sent, increment_requests, increment_stream_errors,
        record_stream_duration,
    },
};
use bytes::Bytes;
use core::pin::Pin;
use docustream_core::{
    Error,
    proto::{
        WordToPdfReq, WordToPdfRes,
        convert_server::{Convert, ConvertServer},
    },
};
use futures::TryStreamExt;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_stream::{Stream, wrappers::ReceiverStream};
use tokio_util::sync::CancellationToken;
use tonic::{Request, Response, Status, Streaming, codec::CompressionEncoding};

/// gRPC service converting streamed documents to PDF.
///
/// Cloning is cheap; clones share the worker pool.
#[derive(Clone)]
pub struct ConvertService {
    config: ServerConfig,
    worker_pool: Arc<WorkerPool>,
}

impl ConvertService {
    /// Creates a new `ConvertService` and spawns `config.num_workers` worker
    /// tasks, each owning the converter built by `make_converter(worker_id)`.
    ///
    /// Each worker has a single-slot request channel: a worker busy with a
    /// conversion makes the next stream routed to it wait, which bounds the
    /// number of documents held in memory.
    pub fn new<C, F>(config: ServerConfig, mut make_converter: F) -> Self
    where
        C: Converter,
        F: FnMut(usize) -> C,
    {
        let mut workers = Vec::with_capacity(config.num_workers);
        let shutdown_token = CancellationToken::new();

        for worker_id in 0..config.num_workers {
            let (tx, rx) = mpsc::channel(1);
            workers.push(tx);

            tokio::spawn(worker_loop(
                worker_id,
                rx,
                make_converter(worker_id),
                shutdown_token.clone(),
            ));
        }

        let worker_pool = WorkerPool::new(workers, shutdown_token, config.shutdown_timeout);

        Self {
            config,
            worker_pool: Arc::new(worker_pool),
        }
    }

    /// Initiates a graceful shutdown of the worker pool.
    ///
    /// New streams are refused, open streams get `shutdown_timeout` to finish
    /// and whatever is still running afterwards is cancelled.
    pub async fn shutdown(&self) -> Result<(), Error> {
        self.worker_pool.shutdown().await
    }

    /// Wraps the service in a [`ConvertServer`] accepting and sending zstd,
    /// gzip and deflate.
    pub fn into_server(self) -> ConvertServer<Self> {
        ConvertServer::new(self)
            .send_compressed(CompressionEncoding::Zstd)
            .send_compressed(CompressionEncoding::Gzip)
            .send_compressed(CompressionEncoding::Deflate)
            .accept_compressed(CompressionEncoding::Zstd)
            .accept_compressed(CompressionEncoding::Gzip)
            .accept_compressed(CompressionEncoding::Deflate)
    }
}

#[tonic::async_trait]
impl Convert for ConvertService {
    type WordToPdfStream = Pin<Box<dyn Stream<Item = Result<WordToPdfRes, Status>> + Send>>;

    /// Handles one `WordToPdf` stream.
    ///
    /// The response stream is returned immediately; the upload, conversion
    /// and download run on a spawned task that holds a stream guard for its
    /// whole lifetime.
    ///
    /// If `metrics` is enabled, emits telemetry for request rate, concurrent
    /// streams, stream duration, bytes sent and stream errors.
    #[cfg_attr(feature = "tracing", tracing::instrument(skip_all))]
    async fn word_to_pdf(
        &self,
        req: Request<Streaming<WordToPdfReq>>,
    ) -> Result<Response<Self::WordToPdfStream>, Status> {
        let start = std::time::Instant::now();

        let guard = match self.worker_pool.begin_stream() {
            Ok(guard) => guard,
            Err(e) => {
                increment_stream_errors();
                return Err(e.into());
            }
        };
        increment_requests();

        let upload = req.into_inner();
        let (resp_tx, resp_rx) =
            mpsc::channel::<Result<WordToPdfRes, Status>>(self.config.stream_buffer_size);

        let worker_pool = Arc::clone(&self.worker_pool);
        let config = self.config.clone();

        let fut = async move {
            let _guard = guard;
            match serve_conversion(upload, worker_pool, resp_tx, config).await {
                Ok(_sent) => {
                    record_stream_duration(start.elapsed().as_secs_f64() * 1000.0);
                    #[cfg(feature = "tracing")]
                    tracing::debug!("Sent {_sent} bytes");
                }
                Err(_status) => {
                    increment_stream_errors();
                    #[cfg(feature = "tracing")]
                    tracing::warn!("Error: {}", _status.message());
                }
            }
        };
        #[cfg(feature = "tracing")]
        let fut = {
            use tracing::Instrument;
            fut.instrument(tracing::info_span!("streaming"))
        };

        tokio::spawn(fut);

        let stream = ReceiverStream::new(resp_rx).inspect_ok(|res| {
            let sent = res
                .docu
                .as_ref()
                .map_or(0, |docu| docu.chunks.iter().map(Bytes::len).sum::<usize>());
            increment_bytes_sent(sent as u64);
        });

        Ok(Response::new(Box::pin(stream)))
    }
}
