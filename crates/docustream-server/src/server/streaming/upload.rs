use bytes::{Bytes, BytesMut};
use docustream_core::{ChunkFrame, Error, Result, proto::WordToPdfReq, types::INPUT_SLOT};
use futures::{Stream, TryStreamExt};
use tonic::Status;

/// Reads request frames until the client closes its send half and returns the
/// document carried in [`INPUT_SLOT`].
///
/// Frames with an empty chunk list and the terminal all-empty frame add
/// nothing. The call carries a single document, so payload in any other slot
/// is rejected, as is an upload larger than `max_bytes`.
///
/// # Errors
///
/// - [`Error::InvalidRequest`] for a second document or an oversized upload.
/// - [`Error::Receive`] when the request stream fails.
pub async fn collect_upload<S>(mut stream: S, max_bytes: usize) -> Result<Bytes>
where
    S: Stream<Item = core::result::Result<WordToPdfReq, Status>> + Unpin,
{
    let mut upload = BytesMut::new();

    while let Some(req) = stream.try_next().await? {
        let frame = ChunkFrame::from(req);

        if let Some((slot, _)) = frame
            .chunks()
            .iter()
            .enumerate()
            .find(|(slot, chunk)| *slot != INPUT_SLOT && !chunk.is_empty())
        {
            return Err(Error::InvalidRequest {
                reason: format!("unexpected payload in slot {slot}: one document per call"),
            });
        }

        let Some(chunk) = frame.slot(INPUT_SLOT) else {
            continue;
        };
        if upload.len() + chunk.len() > max_bytes {
            return Err(Error::InvalidRequest {
                reason: format!("upload exceeds maximum allowed size ({max_bytes} bytes)"),
            });
        }
        upload.extend_from_slice(chunk);
    }

    #[cfg(feature = "tracing")]
    tracing::debug!("Upload complete: {} bytes", upload.len());

    Ok(upload.freeze())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn req(chunks: &[&'static [u8]]) -> core::result::Result<WordToPdfReq, Status> {
        Ok(ChunkFrame::new(chunks.iter().map(|c| Bytes::from_static(c)).collect()).into())
    }

    #[tokio::test]
    async fn concatenates_input_slot_in_order() {
        let frames = futures::stream::iter(vec![
            req(&[b"he"]),
            req(&[]),
            req(&[b"llo"]),
            req(&[b""]),
        ]);
        let upload = collect_upload(frames, 1024).await.unwrap();
        assert_eq!(upload, Bytes::from_static(b"hello"));
    }

    #[tokio::test]
    async fn empty_upload_is_passed_through() {
        let frames = futures::stream::iter(vec![req(&[b""])]);
        assert!(collect_upload(frames, 1024).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn finished_slots_are_tolerated() {
        let frames = futures::stream::iter(vec![req(&[b"a", b""]), req(&[b"", b""])]);
        assert_eq!(
            collect_upload(frames, 1024).await.unwrap(),
            Bytes::from_static(b"a")
        );
    }

    #[tokio::test]
    async fn second_document_is_rejected() {
        let frames = futures::stream::iter(vec![req(&[b"a", b"b"])]);
        let err = collect_upload(frames, 1024).await.unwrap_err();
        assert!(matches!(err, Error::InvalidRequest { .. }));
    }

    #[tokio::test]
    async fn oversized_upload_is_rejected() {
        let frames = futures::stream::iter(vec![req(&[b"1234"]), req(&[b"5"])]);
        let err = collect_upload(frames, 4).await.unwrap_err();
        assert!(matches!(err, Error::InvalidRequest { .. }));
    }

    #[tokio::test]
    async fn stream_failure_is_a_receive_error() {
        let frames = futures::stream::iter(vec![req(&[b"a"]), Err(Status::aborted("reset"))]);
        let err = collect_upload(frames, 1024).await.unwrap_err();
        assert!(matches!(err, Error::Receive(_)));
    }
}
