//! Channel acquisition and the high-level conversion client.

use crate::{
    session::grpc::GrpcSession,
    transfer::{TransferMode, transfer_document},
};
use core::time::Duration;
use docustream_core::{Result, proto::convert_client::ConvertClient, types::Document};
use tokio_util::sync::CancellationToken;
use tonic::{
    codec::CompressionEncoding,
    transport::{Channel, Endpoint},
};

/// Default number of request frames queued ahead of the transport.
pub const DEFAULT_REQUEST_BUFFER: usize = 16;

/// How to reach the conversion service and how to run transfers on it.
#[derive(Clone, Debug)]
pub struct ConnectOptions {
    /// `host:port`, or a full `http://` / `https://` URI.
    pub server_addr: String,
    pub connect_timeout: Option<Duration>,
    /// Compression for both request and response messages.
    pub compression: Option<CompressionEncoding>,
    pub mode: TransferMode,
    pub request_buffer: usize,
}

impl ConnectOptions {
    pub fn new(server_addr: impl Into<String>) -> Self {
        Self {
            server_addr: server_addr.into(),
            connect_timeout: None,
            compression: None,
            mode: TransferMode::default(),
            request_buffer: DEFAULT_REQUEST_BUFFER,
        }
    }

    /// The endpoint URI, defaulting to plaintext `http` when no scheme is
    /// given.
    pub fn uri(&self) -> String {
        if self.server_addr.contains("://") {
            self.server_addr.clone()
        } else {
            format!("http://{}", self.server_addr)
        }
    }
}

/// Client for the `Convert` service.
///
/// Cheap to clone; every conversion opens its own session on the shared
/// channel and carries no state over to the next one.
#[derive(Clone, Debug)]
pub struct DocuClient {
    inner: ConvertClient<Channel>,
    mode: TransferMode,
    request_buffer: usize,
}

impl DocuClient {
    /// Connects eagerly so that an unreachable service fails here rather than
    /// on the first transfer.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Connection`](docustream_core::Error::Connection) for an
    /// invalid address, a timeout, or a refused connection.
    pub async fn connect(options: &ConnectOptions) -> Result<Self> {
        let mut endpoint = Endpoint::from_shared(options.uri())?;
        if let Some(timeout) = options.connect_timeout {
            endpoint = endpoint.connect_timeout(timeout);
        }

        #[cfg(feature = "tracing")]
        tracing::debug!("Connecting to {}", options.uri());

        let channel = endpoint.connect().await?;
        Ok(Self::with_channel(channel, options))
    }

    /// Wraps an established channel.
    pub fn with_channel(channel: Channel, options: &ConnectOptions) -> Self {
        let mut inner = ConvertClient::new(channel);
        if let Some(encoding) = options.compression {
            inner = inner.send_compressed(encoding).accept_compressed(encoding);
        }

        Self {
            inner,
            mode: options.mode,
            request_buffer: options.request_buffer,
        }
    }

    /// Opens a fresh `WordToPdf` session.
    pub fn open_session(&self) -> GrpcSession {
        GrpcSession::open(&self.inner, self.request_buffer)
    }

    /// Converts `document` and returns the converted bytes.
    pub async fn word_to_pdf(&self, document: Document) -> Result<Document> {
        self.word_to_pdf_with_cancel(document, &CancellationToken::new())
            .await
    }

    /// Like [`word_to_pdf`](Self::word_to_pdf), aborting with
    /// [`Error::Cancelled`](docustream_core::Error::Cancelled) once `cancel`
    /// fires.
    #[cfg_attr(feature = "tracing", tracing::instrument(skip_all, fields(input_bytes = document.len(), mode = ?self.mode)))]
    pub async fn word_to_pdf_with_cancel(
        &self,
        document: Document,
        cancel: &CancellationToken,
    ) -> Result<Document> {
        let output = transfer_document(self.open_session(), document, self.mode, cancel).await?;

        #[cfg(feature = "tracing")]
        tracing::info!("Received {} converted bytes", output.len());

        Ok(output)
    }
}
