use crate::server::{
    converter::Converter,
    streaming::{processor::handle_convert_request, request::WorkRequest},
};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Worker task responsible for processing [`WorkRequest`] messages.
///
/// Each worker owns its own [`Converter`] and runs one conversion at a time.
/// The worker listens on an MPSC channel and processes requests until a
/// shutdown signal is received or every sender is gone.
///
/// # Arguments
///
/// - `worker_id`: Unique numeric identifier for this worker (used for
///   logs/tracing).
/// - `rx`: Receiver through which [`WorkRequest`]s are received.
/// - `converter`: The converter owned by this worker.
/// - `shutdown`: Pool-wide token that aborts a running conversion.
///
/// # Request Types
///
/// - [`WorkRequest::Convert`] - Converts one document via
///   [`handle_convert_request`].
/// - [`WorkRequest::Shutdown`] - Signals the worker to stop and acknowledge
///   shutdown.
pub async fn worker_loop<C: Converter>(
    worker_id: usize,
    mut rx: mpsc::Receiver<WorkRequest>,
    converter: C,
    shutdown: CancellationToken,
) {
    #[cfg(feature = "tracing")]
    tracing::trace!("Worker {worker_id} started");

    while let Some(work) = rx.recv().await {
        match work {
            WorkRequest::Convert { input, respond } => {
                handle_convert_request(worker_id, &converter, input, respond, &shutdown).await;
            }
            WorkRequest::Shutdown { response } => {
                #[cfg(feature = "tracing")]
                tracing::debug!("Worker {worker_id} received shutdown signal");

                if response.send(()).is_err() {
                    #[cfg(feature = "tracing")]
                    tracing::error!("Worker {worker_id} failed to acknowledge shutdown");
                }
                break;
            }
        }
    }

    #[cfg(feature = "tracing")]
    tracing::trace!("Worker {worker_id} stopped");
}
