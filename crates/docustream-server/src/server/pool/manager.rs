//! Asynchronous worker pool for document conversion.
//!
//! This module defines the [`WorkerPool`] struct, which manages a set of
//! asynchronous workers, each owning one converter. It distributes
//! conversions using round-robin scheduling, tracks open streams and supports
//! coordinated shutdown via a shared [`CancellationToken`].
//!
//! Each worker listens on its own bounded [`mpsc::Receiver`] and converts one
//! document at a time.

use crate::server::{
    streaming::request::WorkRequest,
    telemetry::{decrement_streams_inflight, increment_streams_inflight},
};
use bytes::Bytes;
use core::time::Duration;
use docustream_core::{Error, Result};
use portable_atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::{
    sync::{mpsc, oneshot},
    time::{sleep, timeout},
};
use tokio_util::sync::CancellationToken;

/// A cooperative pool of asynchronous workers that process [`WorkRequest`]s.
///
/// Workers receive requests over bounded MPSC channels. Work is distributed in
/// round-robin fashion and the pool supports graceful, cancellable shutdown.
pub struct WorkerPool {
    workers: Vec<mpsc::Sender<WorkRequest>>,
    next_worker: AtomicUsize,
    streams_inflight: AtomicUsize,
    refusing: AtomicBool,
    shutdown_token: CancellationToken,
    shutdown_timeout: Duration,
}

impl WorkerPool {
    /// Constructs a new [`WorkerPool`] from initialized worker channels and a
    /// shared cancellation token.
    pub const fn new(
        workers: Vec<mpsc::Sender<WorkRequest>>,
        shutdown_token: CancellationToken,
        shutdown_timeout: Duration,
    ) -> Self {
        Self {
            workers,
            next_worker: AtomicUsize::new(0),
            streams_inflight: AtomicUsize::new(0),
            refusing: AtomicBool::new(false),
            shutdown_token,
            shutdown_timeout,
        }
    }

    /// Returns the index of the next worker to receive work (round-robin).
    pub fn next_worker_index(&self) -> usize {
        self.next_worker.fetch_add(1, Ordering::Relaxed) % self.workers.len()
    }

    /// Number of streams currently holding a [`StreamGuard`].
    pub fn streams_inflight(&self) -> usize {
        self.streams_inflight.load(Ordering::Acquire)
    }

    /// `true` once [`WorkerPool::shutdown`] has started.
    pub fn is_shutting_down(&self) -> bool {
        self.refusing.load(Ordering::Acquire) || self.shutdown_token.is_cancelled()
    }

    /// Registers a new stream. The returned guard keeps the stream counted
    /// until dropped.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ServiceShutdown`] once shutdown has started.
    pub fn begin_stream(self: &Arc<Self>) -> Result<StreamGuard> {
        if self.is_shutting_down() {
            return Err(Error::ServiceShutdown);
        }
        self.streams_inflight.fetch_add(1, Ordering::AcqRel);
        increment_streams_inflight();
        Ok(StreamGuard {
            pool: Arc::clone(self),
        })
    }

    /// Sends a [`WorkRequest`] to the next worker in the pool.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The service is shutting down (`shutdown_token` was cancelled).
    /// - The worker's channel is closed.
    pub async fn send_to_next_worker(&self, request: WorkRequest) -> Result<()> {
        if self.shutdown_token.is_cancelled() {
            return Err(Error::ServiceShutdown);
        }

        let worker_idx = self.next_worker_index();
        let worker = &self.workers[worker_idx];

        // A full channel means the worker is busy; waiting here is the
        // backpressure for new uploads.
        let sent = tokio::select! {
            biased;
            () = self.shutdown_token.cancelled() => return Err(Error::ServiceShutdown),
            sent = worker.send(request) => sent,
        };

        sent.map_err(|_| Error::ChannelError {
            context: format!("Worker {worker_idx} channel closed"),
        })
    }

    /// Converts `input` on the next worker and waits for the result.
    ///
    /// # Errors
    ///
    /// Propagates the converter's error, [`Error::ServiceShutdown`] when the
    /// pool stops first, or [`Error::ChannelError`] if the worker is gone.
    pub async fn convert(&self, input: Bytes) -> Result<Bytes> {
        let (respond, rx) = oneshot::channel();
        self.send_to_next_worker(WorkRequest::Convert { input, respond })
            .await?;

        match rx.await {
            Ok(result) => result,
            Err(_) if self.shutdown_token.is_cancelled() => Err(Error::ServiceShutdown),
            Err(_) => Err(Error::ChannelError {
                context: "worker dropped the conversion".to_string(),
            }),
        }
    }

    /// Gracefully shuts down all workers in the pool.
    ///
    /// - Refuses new streams.
    /// - Waits up to the configured timeout for open streams to finish.
    /// - Cancels the shared [`CancellationToken`], aborting running
    ///   conversions.
    /// - Sends a [`WorkRequest::Shutdown`] to each worker and waits (up to 3
    ///   seconds per worker) for acknowledgements.
    pub async fn shutdown(&self) -> Result<()> {
        // === Phase 0: Stop accepting new streams ===
        #[cfg(feature = "tracing")]
        tracing::info!("Refusing new streams");
        self.refusing.store(true, Ordering::Release);

        // === Phase 1: Wait for in-flight streams to drain ===
        #[cfg(feature = "tracing")]
        tracing::info!(
            "Draining in-flight streams ({} active)",
            self.streams_inflight()
        );
        let drain_result = timeout(self.shutdown_timeout, async {
            while self.streams_inflight() > 0 {
                sleep(Duration::from_millis(100)).await;
            }
        })
        .await;

        match drain_result {
            Ok(()) => {
                #[cfg(feature = "tracing")]
                tracing::debug!("All in-flight streams drained successfully");
            }
            Err(_) => {
                #[cfg(feature = "tracing")]
                tracing::warn!(
                    "Graceful drain timed out ({} streams still active)",
                    self.streams_inflight()
                );
            }
        }

        // === Phase 2: Cancel any remaining work ===
        #[cfg(feature = "tracing")]
        tracing::debug!("Cancelling remaining work via shutdown token");
        self.shutdown_token.cancel();

        // === Phase 3: Notify workers to shut down ===
        #[cfg(feature = "tracing")]
        tracing::debug!("Notifying all workers to shut down");
        let mut shutdown_handles = Vec::with_capacity(self.workers.len());

        for (i, worker) in self.workers.iter().enumerate() {
            let (tx, rx) = oneshot::channel();
            if let Err(_e) = worker.send(WorkRequest::Shutdown { response: tx }).await {
                #[cfg(feature = "tracing")]
                tracing::error!("Failed to send shutdown to worker {i}: {_e}");
            } else {
                shutdown_handles.push((i, rx));
            }
        }

        let timeout_futures = shutdown_handles.into_iter().map(|(_i, rx)| async move {
            match timeout(Duration::from_secs(3), rx).await {
                Ok(Ok(())) => {
                    #[cfg(feature = "tracing")]
                    tracing::trace!("Worker {_i} shutdown acknowledged");
                }
                Ok(Err(_e)) => {
                    #[cfg(feature = "tracing")]
                    tracing::error!("Worker {_i} returned error: {_e}");
                }
                Err(_) => {
                    #[cfg(feature = "tracing")]
                    tracing::warn!("Worker {_i} shutdown timed out");
                }
            }
        });

        futures::future::join_all(timeout_futures).await;

        #[cfg(feature = "tracing")]
        tracing::info!("Worker pool shutdown complete");

        Ok(())
    }
}

/// Keeps one stream counted as in flight.
pub struct StreamGuard {
    pool: Arc<WorkerPool>,
}

impl Drop for StreamGuard {
    fn drop(&mut self) {
        self.pool.streams_inflight.fetch_sub(1, Ordering::AcqRel);
        decrement_streams_inflight();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::pool::worker::worker_loop;
    use crate::server::converter::Converter;

    struct Upper;

    impl Converter for Upper {
        async fn convert(&self, input: Bytes) -> Result<Bytes> {
            Ok(Bytes::from(input.to_ascii_uppercase()))
        }
    }

    struct Stall;

    impl Converter for Stall {
        async fn convert(&self, _input: Bytes) -> Result<Bytes> {
            core::future::pending().await
        }
    }

    fn pool<C: Converter>(workers: usize, make: impl Fn() -> C) -> Arc<WorkerPool> {
        let token = CancellationToken::new();
        let senders = (0..workers)
            .map(|id| {
                let (tx, rx) = mpsc::channel(1);
                tokio::spawn(worker_loop(id, rx, make(), token.clone()));
                tx
            })
            .collect();
        Arc::new(WorkerPool::new(senders, token, Duration::from_millis(200)))
    }

    #[tokio::test]
    async fn converts_round_robin() {
        let pool = pool(3, || Upper);
        assert_eq!(
            (0..6).map(|_| pool.next_worker_index()).collect::<Vec<_>>(),
            [0, 1, 2, 0, 1, 2]
        );
        let out = pool.convert(Bytes::from_static(b"abc")).await.unwrap();
        assert_eq!(out, Bytes::from_static(b"ABC"));
    }

    #[tokio::test]
    async fn guards_track_streams() {
        let pool = pool(1, || Upper);
        let a = pool.begin_stream().unwrap();
        let b = pool.begin_stream().unwrap();
        assert_eq!(pool.streams_inflight(), 2);
        drop(a);
        assert_eq!(pool.streams_inflight(), 1);
        drop(b);
        assert_eq!(pool.streams_inflight(), 0);
    }

    #[tokio::test]
    async fn shutdown_refuses_and_aborts_work() {
        let pool = pool(1, || Stall);
        let guard = pool.begin_stream().unwrap();

        let stalled = {
            let pool = Arc::clone(&pool);
            tokio::spawn(async move { pool.convert(Bytes::from_static(b"x")).await })
        };
        tokio::task::yield_now().await;

        // The open stream outlives the drain timeout, so its conversion is
        // cancelled.
        pool.shutdown().await.unwrap();
        assert!(matches!(pool.begin_stream(), Err(Error::ServiceShutdown)));
        assert!(matches!(
            stalled.await.unwrap(),
            Err(Error::ServiceShutdown)
        ));
        assert!(matches!(
            pool.convert(Bytes::from_static(b"y")).await,
            Err(Error::ServiceShutdown)
        ));
        drop(guard);
    }
}
