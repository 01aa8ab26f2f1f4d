//! Content transforms for versioned records

use crate::entry::ContentEncoding;
use crate::error::{GraphError, GraphResult, RecordError};
use flate2::Compression;
use flate2::read::{ZlibDecoder, ZlibEncoder};
use std::io::Read;

/// Maximum decoded content size (1 GiB)
///
/// Applies to every compressed record, so a hostile size header or a
/// decompression bomb fails the record instead of exhausting memory.
pub const MAX_DECOMPRESSED_SIZE: usize = 1024 * 1024 * 1024;

/// Width of the LZ4 decompressed size prefix
const LZ4_SIZE_PREFIX: usize = 8;

/// Largest output an LZ4 block can produce per input byte
const LZ4_MAX_EXPANSION: usize = 255;

/// Encode content for storage
pub fn encode(data: &[u8], encoding: ContentEncoding) -> GraphResult<Vec<u8>> {
    match encoding {
        ContentEncoding::Raw => Ok(data.to_vec()),
        ContentEncoding::Zlib => {
            let mut encoder = ZlibEncoder::new(data, Compression::default());
            let mut compressed = Vec::new();
            encoder.read_to_end(&mut compressed)?;
            Ok(compressed)
        }
        ContentEncoding::Lz4 => {
            let block = lz4_flex::block::compress(data);
            let mut result = Vec::with_capacity(LZ4_SIZE_PREFIX + block.len());
            result.extend_from_slice(&(data.len() as u64).to_le_bytes());
            result.extend_from_slice(&block);
            Ok(result)
        }
        ContentEncoding::Unknown(flag) => Err(GraphError::Unsupported(format!(
            "cannot encode with unknown encoding flag {flag}"
        ))),
    }
}

/// Decode stored content
pub fn decode(data: &[u8], encoding: ContentEncoding) -> Result<Vec<u8>, RecordError> {
    match encoding {
        ContentEncoding::Raw => Ok(data.to_vec()),
        ContentEncoding::Zlib => decode_zlib(data),
        ContentEncoding::Lz4 => decode_lz4(data),
        ContentEncoding::Unknown(flag) => Err(RecordError::UnknownEncoding(flag)),
    }
}

fn decode_zlib(data: &[u8]) -> Result<Vec<u8>, RecordError> {
    let mut decoder = ZlibDecoder::new(data);
    let mut decompressed = Vec::new();

    let mut buffer = [0u8; 8192];
    loop {
        let bytes_read = decoder
            .read(&mut buffer)
            .map_err(|e| RecordError::decode_failed(ContentEncoding::Zlib, e.to_string()))?;

        if bytes_read == 0 {
            break;
        }

        if decompressed.len() + bytes_read > MAX_DECOMPRESSED_SIZE {
            return Err(RecordError::decode_failed(
                ContentEncoding::Zlib,
                format!("output exceeds limit of {MAX_DECOMPRESSED_SIZE} bytes"),
            ));
        }

        decompressed.extend_from_slice(&buffer[..bytes_read]);
    }

    Ok(decompressed)
}

fn decode_lz4(data: &[u8]) -> Result<Vec<u8>, RecordError> {
    let Some((prefix, block)) = data.split_first_chunk::<LZ4_SIZE_PREFIX>() else {
        return Err(RecordError::decode_failed(
            ContentEncoding::Lz4,
            "missing size prefix",
        ));
    };

    let declared = u64::from_le_bytes(*prefix);
    let size = usize::try_from(declared)
        .ok()
        .filter(|&size| size <= MAX_DECOMPRESSED_SIZE)
        .ok_or_else(|| {
            RecordError::decode_failed(
                ContentEncoding::Lz4,
                format!("declared size {declared} exceeds limit of {MAX_DECOMPRESSED_SIZE} bytes"),
            )
        })?;

    let max_output = block.len().saturating_mul(LZ4_MAX_EXPANSION);
    if size > max_output {
        return Err(RecordError::decode_failed(
            ContentEncoding::Lz4,
            format!(
                "declared size {size} is more than a {}-byte block can expand to",
                block.len()
            ),
        ));
    }

    let decompressed = lz4_flex::block::decompress(block, size)
        .map_err(|e| RecordError::decode_failed(ContentEncoding::Lz4, e.to_string()))?;

    if decompressed.len() != size {
        return Err(RecordError::decode_failed(
            ContentEncoding::Lz4,
            format!(
                "size mismatch: expected {size}, got {}",
                decompressed.len()
            ),
        ));
    }

    Ok(decompressed)
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;

    const SAMPLE: &[u8] = b"export const greeting = 'hello'; export const greeting2 = 'hello';";

    #[test]
    fn test_raw_is_verbatim() {
        assert_eq!(encode(SAMPLE, ContentEncoding::Raw).unwrap(), SAMPLE);
        assert_eq!(decode(SAMPLE, ContentEncoding::Raw).unwrap(), SAMPLE);
    }

    #[test]
    fn test_zlib() {
        let compressed = encode(SAMPLE, ContentEncoding::Zlib).unwrap();
        assert_ne!(compressed, SAMPLE);
        assert_eq!(decode(&compressed, ContentEncoding::Zlib).unwrap(), SAMPLE);
    }

    #[test]
    fn test_lz4_has_size_prefix() {
        let compressed = encode(SAMPLE, ContentEncoding::Lz4).unwrap();
        assert_eq!(&compressed[..8], &(SAMPLE.len() as u64).to_le_bytes());
        assert_eq!(decode(&compressed, ContentEncoding::Lz4).unwrap(), SAMPLE);
    }

    #[test]
    fn test_corrupt_zlib() {
        let err = decode(b"definitely not deflate", ContentEncoding::Zlib).unwrap_err();
        assert!(matches!(
            err,
            RecordError::DecodeTransformFailed {
                encoding: ContentEncoding::Zlib,
                ..
            }
        ));
    }

    #[test]
    fn test_lz4_short_prefix() {
        let err = decode(&[1, 2, 3], ContentEncoding::Lz4).unwrap_err();
        assert_eq!(
            err,
            RecordError::decode_failed(ContentEncoding::Lz4, "missing size prefix")
        );
    }

    #[test]
    fn test_lz4_size_cap() {
        let mut data = u64::MAX.to_le_bytes().to_vec();
        data.extend_from_slice(&[0u8; 4]);
        let err = decode(&data, ContentEncoding::Lz4).unwrap_err();
        assert!(err.to_string().contains("exceeds limit"));
    }

    #[test]
    fn test_lz4_declared_size_beyond_block_expansion() {
        let mut data = (64u64 * 1024 * 1024).to_le_bytes().to_vec();
        data.extend_from_slice(&[0x1F, b'a', 1, 0]);
        let err = decode(&data, ContentEncoding::Lz4).unwrap_err();
        assert_eq!(
            err,
            RecordError::decode_failed(
                ContentEncoding::Lz4,
                "declared size 67108864 is more than a 4-byte block can expand to"
            )
        );
    }

    #[test]
    fn test_lz4_highly_compressible_content() {
        let content = vec![b'x'; 64 * 1024];
        let compressed = encode(&content, ContentEncoding::Lz4).unwrap();
        assert!(compressed.len() - 8 < content.len() / 100);
        assert_eq!(decode(&compressed, ContentEncoding::Lz4).unwrap(), content);
    }

    #[test]
    fn test_lz4_size_mismatch() {
        let mut compressed = encode(SAMPLE, ContentEncoding::Lz4).unwrap();
        let wrong = (SAMPLE.len() as u64 + 10).to_le_bytes();
        compressed[..8].copy_from_slice(&wrong);
        assert!(decode(&compressed, ContentEncoding::Lz4).is_err());
    }

    #[test]
    fn test_unknown_encoding() {
        assert_eq!(
            decode(SAMPLE, ContentEncoding::Unknown(7)).unwrap_err(),
            RecordError::UnknownEncoding(7)
        );
        assert!(matches!(
            encode(SAMPLE, ContentEncoding::Unknown(7)).unwrap_err(),
            GraphError::Unsupported(_)
        ));
    }
}
