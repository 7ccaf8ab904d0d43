//! Error types for the document conversion stream.
//!
//! This module defines the central `Error` enum shared by the client driver
//! and the conversion server. It implements `From<Error>` for `tonic::Status`
//! so server-side failures propagate to clients with appropriate status codes.
//!
//! ## Error Cases
//! - `Connection`: The gRPC channel could not be established.
//! - `Read`: An input document could not be read for a reason other than
//!   exhaustion.
//! - `Send`: A frame was rejected because the request stream is gone.
//! - `Receive`: The response stream failed with something other than a clean
//!   end-of-stream.
//! - `Cancelled`: The transfer was cancelled by its caller.
//! - `ChannelError`: An internal communication failure between tasks or
//!   workers.
//! - `Conversion`: The external converter failed or timed out.
//! - `InvalidRequest`: The upload was malformed or exceeded bounds.
//! - `ServiceShutdown`: A request arrived while the service was shutting down.

use tonic::Status;

pub type Result<T> = core::result::Result<T, Error>;

/// Unified error type for the conversion stream.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// The channel to the conversion service could not be established.
    #[error("Connection error: {0}")]
    Connection(#[from] tonic::transport::Error),

    /// Reading the document in `slot` failed.
    #[error("Read error on slot {slot}: {source}")]
    Read {
        slot: usize,
        #[source]
        source: std::io::Error,
    },

    /// The transport refused a frame or the send half was already closed.
    #[error("Send error: {context}")]
    Send { context: String },

    /// The remote ended the response stream with an error status.
    #[error("Receive error: {0}")]
    Receive(#[from] Status),

    /// The caller cancelled the transfer.
    #[error("Transfer cancelled")]
    Cancelled,

    /// Internal channel send/receive failure (e.g., closed or full channel).
    #[error("Channel error: {context}")]
    ChannelError { context: String },

    /// The converter process failed to produce a document.
    #[error("Conversion failed: {reason}")]
    Conversion { reason: String },

    /// The upload was invalid or exceeded constraints.
    #[error("Invalid request: {reason}")]
    InvalidRequest { reason: String },

    /// The service is in the process of shutting down.
    #[error("Service is shutting down")]
    ServiceShutdown,
}

impl From<Error> for Status {
    fn from(err: Error) -> Self {
        match err {
            Error::Connection(e) => Status::unavailable(format!("Connection error: {e}")),
            Error::Read { slot, source } => {
                Status::internal(format!("Read error on slot {slot}: {source}"))
            }
            Error::Send { context } => Status::unavailable(format!("Send error: {context}")),
            Error::Receive(status) => status,
            Error::Cancelled => Status::cancelled("Request was cancelled"),
            Error::ChannelError { context } => {
                Status::internal(format!("Channel error: {context}"))
            }
            Error::Conversion { reason } => {
                Status::internal(format!("Conversion failed: {reason}"))
            }
            Error::InvalidRequest { reason } => Status::invalid_argument(reason),
            Error::ServiceShutdown => Status::unavailable("Service is shutting down"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tonic::Code;

    #[test]
    fn maps_errors_to_status_codes() {
        let cases = [
            (Error::Cancelled, Code::Cancelled),
            (Error::ServiceShutdown, Code::Unavailable),
            (
                Error::InvalidRequest {
                    reason: "empty upload".to_string(),
                },
                Code::InvalidArgument,
            ),
            (
                Error::Conversion {
                    reason: "exit status 77".to_string(),
                },
                Code::Internal,
            ),
            (
                Error::Send {
                    context: "request stream closed".to_string(),
                },
                Code::Unavailable,
            ),
        ];

        for (err, code) in cases {
            assert_eq!(Status::from(err).code(), code);
        }
    }

    #[test]
    fn receive_error_keeps_remote_status() {
        let status = Status::resource_exhausted("too large");
        let mapped = Status::from(Error::Receive(status));
        assert_eq!(mapped.code(), Code::ResourceExhausted);
        assert_eq!(mapped.message(), "too large");
    }

    #[test]
    fn invalid_request_reason_is_the_status_message() {
        let status = Status::from(Error::InvalidRequest {
            reason: "slot 1 carries data".to_string(),
        });
        assert_eq!(status.message(), "slot 1 carries data");
    }
}
