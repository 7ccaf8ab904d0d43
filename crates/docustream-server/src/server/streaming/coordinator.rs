use super::upload::collect_upload;
use crate::server::{
    config::ServerConfig, pool::manager::WorkerPool, telemetry::increment_bytes_received,
};
use bytes::Bytes;
use docustream_core::{
    ChunkFrame, Error,
    proto::{WordToPdfReq, WordToPdfRes},
};
use futures::Stream;
use std::sync::Arc;
use tokio::sync::mpsc;
use tonic::Status;

/// Serves one `WordToPdf` call end to end.
///
/// Collects the upload, hands it to the next pool worker and streams the
/// converted document back as single-chunk frames of at most
/// `config.chunk_bytes` bytes. An empty result is answered with no frames.
///
/// Any failure before the first response frame is forwarded to the client as
/// the stream's closing status; the same status is returned for logging.
///
/// # Returns
///
/// The number of document bytes sent to the client.
pub async fn serve_conversion<S>(
    upload: S,
    worker_pool: Arc<WorkerPool>,
    resp_tx: mpsc::Sender<Result<WordToPdfRes, Status>>,
    config: ServerConfig,
) -> Result<u64, Status>
where
    S: Stream<Item = Result<WordToPdfReq, Status>> + Unpin,
{
    let converted = match collect_upload(upload, config.max_upload_bytes).await {
        Ok(input) => {
            increment_bytes_received(input.len() as u64);
            worker_pool.convert(input).await
        }
        Err(e) => Err(e),
    };

    let output = match converted {
        Ok(output) => output,
        Err(e) => {
            let status = Status::from(e);
            // Best effort: the client may already be gone.
            if let Err(_e) = resp_tx.send(Err(status.clone())).await {
                #[cfg(feature = "tracing")]
                tracing::warn!("Failed to forward err: {}", _e);
            }
            return Err(status);
        }
    };

    send_chunked(output, &resp_tx, config.chunk_bytes).await
}

async fn send_chunked(
    output: Bytes,
    resp_tx: &mpsc::Sender<Result<WordToPdfRes, Status>>,
    chunk_bytes: usize,
) -> Result<u64, Status> {
    let mut sent = 0;
    for start in (0..output.len()).step_by(chunk_bytes.max(1)) {
        let end = (start + chunk_bytes).min(output.len());
        let frame = ChunkFrame::single(output.slice(start..end));

        if let Err(e) = resp_tx.send(Ok(frame.into())).await {
            return Err(Error::ChannelError {
                context: format!("Failed to forward chunk: {e}"),
            }
            .into());
        }
        sent += (end - start) as u64;
    }
    Ok(sent)
}
