use bytes::Bytes;
use docustream_core::Result;
use tokio::sync::oneshot;

/// Work items sent to pool workers.
#[derive(Debug)]
pub enum WorkRequest {
    /// Convert `input` and answer on `respond`. A closed `respond` means the
    /// stream is gone and the conversion may be abandoned.
    Convert {
        input: Bytes,
        respond: oneshot::Sender<Result<Bytes>>,
    },
    /// Stop the worker after acknowledging on `response`.
    Shutdown { response: oneshot::Sender<()> },
}
