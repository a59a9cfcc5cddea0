//! Binary-to-text image codec
//!
//! Converts image bytes to the base64 form carried on the wire and back.
//! Neither direction inspects pixel data.

use crate::mime::MediaType;
use crate::models::{EncodedImage, ImageAsset, SourceFile};
use crate::Result;
use base64::Engine as _;
use tokio::io::{AsyncRead, AsyncReadExt};

/// Encodes bytes that are already in memory.
pub fn encode(bytes: &[u8], declared_media_type: Option<&str>) -> EncodedImage {
    EncodedImage {
        data: base64::engine::general_purpose::STANDARD.encode(bytes),
        media_type: MediaType::resolve(declared_media_type, bytes),
    }
}

/// Reads `reader` to the end, then encodes. Any read failure is an
/// [`Error::Io`](crate::Error::Io); a partial read is never encoded.
pub async fn encode_reader<R>(
    mut reader: R,
    declared_media_type: Option<&str>,
) -> Result<EncodedImage>
where
    R: AsyncRead + Unpin,
{
    let mut bytes = Vec::new();
    reader.read_to_end(&mut bytes).await?;
    Ok(encode(&bytes, declared_media_type))
}

pub async fn encode_file(source: &SourceFile) -> Result<EncodedImage> {
    let file = tokio::fs::File::open(&source.path).await.map_err(|e| {
        tracing::error!("Failed to open {}: {}", source.path.display(), e);
        e
    })?;
    let encoded = encode_reader(file, source.declared_media_type.as_deref()).await?;
    tracing::debug!(
        "Encoded {} as {} ({} base64 chars)",
        source.path.display(),
        encoded.media_type,
        encoded.data.len()
    );
    Ok(encoded)
}

/// Decodes the wire form. Malformed base64 is reported as
/// [`Error::Decode`](crate::Error::Decode); callers decide what that means for them.
///
/// Rendering never goes through here: [`EncodedImage::data_url`] embeds the
/// text as-is.
pub fn decode(encoded: &EncodedImage) -> Result<ImageAsset> {
    let bytes = base64::engine::general_purpose::STANDARD.decode(encoded.data.trim())?;
    Ok(ImageAsset::new(bytes, encoded.media_type.clone()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;
    use std::io::Write;
    use std::pin::Pin;
    use std::task::{Context, Poll};

    const PNG_HEADER: [u8; 8] = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];

    struct FailingReader;

    impl AsyncRead for FailingReader {
        fn poll_read(
            self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            _buf: &mut tokio::io::ReadBuf<'_>,
        ) -> Poll<std::io::Result<()>> {
            Poll::Ready(Err(std::io::Error::other("corrupted handle")))
        }
    }

    #[test]
    fn test_round_trip_keeps_declared_media_type() {
        let bytes = b"\xFF\xD8\xFF\xE0 not really a jpeg".to_vec();
        let encoded = encode(&bytes, Some("image/jpeg"));
        assert_eq!(encoded.media_type.as_str(), "image/jpeg");

        let decoded = decode(&encoded).unwrap();
        assert_eq!(decoded.bytes(), bytes.as_slice());
        assert_eq!(decoded.media_type().as_str(), "image/jpeg");
    }

    #[test]
    fn test_encode_sniffs_when_undeclared() {
        let encoded = encode(&PNG_HEADER, None);
        assert_eq!(encoded.media_type.as_str(), "image/png");
        assert_eq!(encoded.data, "iVBORw0KGgo=");
    }

    #[test]
    fn test_decode_reports_malformed_text() {
        let encoded = EncodedImage {
            data: "!!!invalid-base64!!!".to_string(),
            media_type: MediaType::fallback(),
        };
        let err = decode(&encoded).unwrap_err();
        assert!(matches!(err, Error::Decode(_)));
    }

    #[tokio::test]
    async fn test_encode_reader_failure_is_io_error() {
        let err = encode_reader(FailingReader, Some("image/png"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }

    #[tokio::test]
    async fn test_encode_file_reads_entire_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        let mut contents = PNG_HEADER.to_vec();
        contents.extend(std::iter::repeat(0xAB).take(64 * 1024));
        file.write_all(&contents).unwrap();

        let encoded = encode_file(&SourceFile::new(file.path())).await.unwrap();
        let decoded = decode(&encoded).unwrap();
        assert_eq!(decoded.bytes().len(), contents.len());
        assert_eq!(decoded.media_type().as_str(), "image/png");
    }

    #[tokio::test]
    async fn test_encode_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let source = SourceFile::new(dir.path().join("missing.png"));
        let err = encode_file(&source).await.unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Io);
    }
}
