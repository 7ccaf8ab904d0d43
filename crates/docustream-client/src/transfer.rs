//! Drives a full transfer over one session.
//!
//! The emitter owns the send half and its cursors, the assembler owns the
//! receive half and its buffer. Nothing else is shared, so the two sides can
//! be run back to back or polled concurrently without coordination.

use crate::{
    assembler::ResponseAssembler,
    emitter::ChunkEmitter,
    session::{FrameSource, StreamSession},
};
use docustream_core::{Error, Result, types::Document};
use tokio::io::AsyncRead;
use tokio_util::sync::CancellationToken;

/// How the send and receive halves are scheduled.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TransferMode {
    /// Send every frame and close, then drain the responses.
    #[default]
    Sequential,
    /// Send and drain concurrently on the current task. The first failure on
    /// either side aborts the other.
    Pipelined,
}

/// Runs `emitter` against `session` and returns the assembled output slot.
///
/// When a send fails because the remote already ended the call, the receive
/// half is drained for the status the remote ended it with and that status is
/// returned instead of the bare send error.
///
/// # Errors
///
/// Fails on the first read, send, receive or cancellation error. Partial
/// output is never returned.
pub async fn transfer<S, R>(
    session: S,
    emitter: ChunkEmitter<R>,
    mode: TransferMode,
    cancel: &CancellationToken,
) -> Result<Document>
where
    S: StreamSession,
    R: AsyncRead + Unpin + Send,
{
    let (mut sink, mut source) = session.split();
    let assembler = ResponseAssembler::new();

    let result = match mode {
        TransferMode::Sequential => match emitter.run(&mut sink, cancel).await {
            Ok(_) => assembler.run(&mut source, cancel).await,
            Err(e) => Err(e),
        },
        TransferMode::Pipelined => tokio::try_join!(
            emitter.run(&mut sink, cancel),
            assembler.run(&mut source, cancel),
        )
        .map(|(_, output)| output),
    };

    match result {
        Err(Error::Send { context }) => Err(remote_status(&mut source, cancel)
            .await
            .unwrap_or(Error::Send { context })),
        other => other,
    }
}

// Discards remaining frames until the remote's closing error, if any.
async fn remote_status<S: FrameSource>(
    source: &mut S,
    cancel: &CancellationToken,
) -> Option<Error> {
    loop {
        let received = tokio::select! {
            biased;
            () = cancel.cancelled() => return None,
            received = source.recv() => received,
        };
        match received {
            Ok(Some(_)) => continue,
            Ok(None) => return None,
            Err(e) => return Some(e),
        }
    }
}

/// Transfers a single in-memory document.
pub async fn transfer_document<S: StreamSession>(
    session: S,
    document: Document,
    mode: TransferMode,
    cancel: &CancellationToken,
) -> Result<Document> {
    transfer(
        session,
        ChunkEmitter::from_documents([document]),
        mode,
        cancel,
    )
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use crate::session::memory::MemorySession;
    use docustream_core::{ChunkFrame, types::CHUNK_SIZE};
    use tonic::Status;

    const MODES: [TransferMode; 2] = [TransferMode::Sequential, TransferMode::Pipelined];

    fn reverse(input: Bytes) -> Bytes {
        let mut out = input.to_vec();
        out.reverse();
        Bytes::from(out)
    }

    fn sample(len: usize) -> Bytes {
        (0..len).map(|i| (i % 251) as u8).collect::<Vec<_>>().into()
    }

    #[tokio::test]
    async fn round_trips_through_a_deterministic_remote() {
        for mode in MODES {
            for len in [0, 1, CHUNK_SIZE, 5 * CHUNK_SIZE + 3] {
                let input = sample(len);
                let (session, remote) = MemorySession::pair();
                let server = remote.serve(CHUNK_SIZE, reverse);

                let output =
                    transfer_document(session, input.clone(), mode, &CancellationToken::new())
                        .await
                        .unwrap();
                server.await.unwrap();

                assert_eq!(output, reverse(input), "{mode:?} / {len}");
            }
        }
    }

    #[tokio::test]
    async fn repeated_transfers_are_identical() {
        let input = sample(10_000);
        let mut outputs = Vec::new();
        for mode in MODES {
            for _ in 0..2 {
                let (session, remote) = MemorySession::pair();
                let server = remote.serve(700, reverse);
                outputs.push(
                    transfer_document(session, input.clone(), mode, &CancellationToken::new())
                        .await
                        .unwrap(),
                );
                server.await.unwrap();
            }
        }
        assert!(outputs.windows(2).all(|w| w[0] == w[1]));
    }

    #[tokio::test]
    async fn remote_error_fails_the_whole_transfer() {
        for mode in MODES {
            let (session, mut remote) = MemorySession::pair();
            let server = tokio::spawn(async move {
                let _ = remote.collect_requests().await;
                remote.respond(ChunkFrame::single(Bytes::from_static(b"%PDF")));
                remote.fail(Status::internal("soffice exited with 81"));
                remote.finish();
            });

            let err = transfer_document(session, sample(3000), mode, &CancellationToken::new())
                .await
                .unwrap_err();
            server.await.unwrap();
            assert!(matches!(err, Error::Receive(_)), "{mode:?}");
        }
    }

    #[tokio::test]
    async fn rejected_upload_reports_the_remote_status() {
        for mode in MODES {
            let (session, mut remote) = MemorySession::pair();
            remote.fail(Status::invalid_argument("upload too large"));
            remote.close_requests();
            remote.finish();

            let err = transfer_document(session, sample(3000), mode, &CancellationToken::new())
                .await
                .unwrap_err();
            match err {
                Error::Receive(status) => assert_eq!(status.message(), "upload too large"),
                other => panic!("{mode:?}: unexpected error {other:?}"),
            }
        }
    }

    #[tokio::test]
    async fn send_failure_without_status_stays_a_send_error() {
        let (session, remote) = MemorySession::pair();
        drop(remote);

        let err = transfer_document(
            session,
            sample(10),
            TransferMode::Sequential,
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, Error::Send { .. }));
    }

    #[tokio::test]
    async fn pipelined_receives_while_sending() {
        // The remote answers every request frame immediately, before the
        // client has closed its send half.
        let (session, mut remote) = MemorySession::pair();
        let server = tokio::spawn(async move {
            while let Some(frame) = remote.next_request().await {
                if !frame.is_terminal() {
                    remote.respond(frame);
                }
            }
            remote.finish();
        });

        let input = sample(4 * CHUNK_SIZE + 1);
        let output = transfer_document(
            session,
            input.clone(),
            TransferMode::Pipelined,
            &CancellationToken::new(),
        )
        .await
        .unwrap();
        server.await.unwrap();
        assert_eq!(output, input);
    }

    #[tokio::test]
    async fn cancellation_never_returns_partial_output() {
        for mode in MODES {
            let (session, mut remote) = MemorySession::pair();
            let cancel = CancellationToken::new();

            // Sends one payload frame, then stalls until cancelled.
            let trigger = cancel.clone();
            let server = tokio::spawn(async move {
                let _ = remote.collect_requests().await;
                remote.respond(ChunkFrame::single(Bytes::from_static(b"partial")));
                trigger.cancel();
                remote
            });

            let err = transfer_document(session, sample(100), mode, &cancel)
                .await
                .unwrap_err();
            drop(server.await.unwrap());
            assert!(matches!(err, Error::Cancelled), "{mode:?}");
        }
    }
}
