use crate::server::{converter::Converter, telemetry::record_conversion_duration};
use bytes::Bytes;
use docustream_core::{Error, Result};
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

/// Runs a single conversion within a worker.
///
/// The conversion is abandoned as soon as the requesting stream goes away
/// (`respond` closed) or the pool is cancelled; dropping the converter future
/// releases the external process and its scratch files.
///
/// # Arguments
///
/// - `_worker_id`: Identifier for this worker, used in logs and tracing.
/// - `converter`: The worker's converter.
/// - `input`: The complete uploaded document.
/// - `respond`: Channel receiving the converted document or the failure.
/// - `shutdown`: Pool-wide cancellation token.
#[allow(clippy::used_underscore_binding)]
pub async fn handle_convert_request<C: Converter>(
    _worker_id: usize,
    converter: &C,
    input: Bytes,
    mut respond: oneshot::Sender<Result<Bytes>>,
    shutdown: &CancellationToken,
) {
    if respond.is_closed() {
        #[cfg(feature = "tracing")]
        tracing::debug!("Worker {_worker_id} skipping conversion for a closed stream");
        return;
    }

    let start = std::time::Instant::now();
    let result = tokio::select! {
        biased;
        () = shutdown.cancelled() => Err(Error::ServiceShutdown),
        () = respond.closed() => {
            #[cfg(feature = "tracing")]
            tracing::debug!("Worker {_worker_id} abandoning conversion, stream closed");
            return;
        }
        result = converter.convert(input) => result,
    };
    record_conversion_duration(start.elapsed().as_secs_f64() * 1000.0);

    if let Err(_e) = &result {
        #[cfg(feature = "tracing")]
        tracing::warn!("Worker {_worker_id} conversion failed: {_e}");
    }

    if respond.send(result).is_err() {
        #[cfg(feature = "tracing")]
        tracing::debug!("Worker {_worker_id} finished after the stream closed");
    }
}
