//! ZIP sniffing over streamed response bodies.

use std::pin::Pin;

use bytes::{Bytes, BytesMut};
use futures::{Stream, StreamExt, stream};
use ricotta_housekeeper::ZIP_MAGIC;

use crate::error::{DownloadError, DownloadResult};

/// A boxed stream of archive bytes, magic included.
pub type ArchiveStream = Pin<Box<dyn Stream<Item = DownloadResult<Bytes>> + Send>>;

/// Validate that `body` starts with the ZIP magic and hand back the whole
/// body as a stream.
///
/// Chunks are buffered until four bytes are available, so a short first read
/// cannot misclassify a valid archive. The buffered head is chained back in
/// front of the remainder; nothing is lost.
pub async fn sniff_zip<S, E>(mut body: S) -> DownloadResult<ArchiveStream>
where
    S: Stream<Item = Result<Bytes, E>> + Send + Unpin + 'static,
    E: Into<DownloadError>,
{
    let mut head = BytesMut::new();
    while head.len() < ZIP_MAGIC.len() {
        match body.next().await {
            Some(Ok(chunk)) => head.extend_from_slice(&chunk),
            Some(Err(error)) => return Err(error.into()),
            // Body ended before four bytes: whatever this is, not a zip.
            None => return Err(DownloadError::NotAZip),
        }
    }
    if head[..ZIP_MAGIC.len()] != ZIP_MAGIC {
        return Err(DownloadError::NotAZip);
    }

    let rest = body.map(|chunk| chunk.map_err(Into::into));
    Ok(Box::pin(stream::once(async move { Ok(head.freeze()) }).chain(rest)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::TryStreamExt;

    fn body_of(chunks: Vec<&'static [u8]>) -> impl Stream<Item = Result<Bytes, DownloadError>> + Unpin {
        stream::iter(
            chunks
                .into_iter()
                .map(|chunk| Ok(Bytes::from_static(chunk))),
        )
    }

    async fn collect(stream: ArchiveStream) -> Vec<u8> {
        stream
            .try_fold(Vec::new(), |mut acc, chunk| async move {
                acc.extend_from_slice(&chunk);
                Ok(acc)
            })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn accepts_zip_and_preserves_bytes() {
        let body = body_of(vec![b"PK\x03\x04", b"archive contents"]);
        let stream = sniff_zip(body).await.unwrap();
        assert_eq!(collect(stream).await, b"PK\x03\x04archive contents");
    }

    #[tokio::test]
    async fn magic_split_across_chunks() {
        let body = body_of(vec![b"P", b"K", b"\x03", b"\x04tail"]);
        let stream = sniff_zip(body).await.unwrap();
        assert_eq!(collect(stream).await, b"PK\x03\x04tail");
    }

    #[tokio::test]
    async fn rejects_non_zip() {
        let body = body_of(vec![b"<html>you must log in</html>"]);
        assert!(matches!(
            sniff_zip(body).await,
            Err(DownloadError::NotAZip)
        ));
    }

    #[tokio::test]
    async fn rejects_short_body() {
        let body = body_of(vec![b"PK"]);
        assert!(matches!(
            sniff_zip(body).await,
            Err(DownloadError::NotAZip)
        ));
    }

    #[tokio::test]
    async fn propagates_body_errors() {
        let body = stream::iter(vec![Err::<Bytes, _>(DownloadError::Io(
            std::io::Error::from(std::io::ErrorKind::ConnectionReset),
        ))]);
        assert!(matches!(
            sniff_zip(body).await,
            Err(DownloadError::Io(_))
        ));
    }
}
