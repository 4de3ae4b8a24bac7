//! Value compression in the secret store's framed layout.
//!
//! A compressed value is one canary byte naming the algorithm followed by
//! the compressed stream. A value whose first byte is not a known canary is
//! stored uncompressed.

use crate::error::{ConvertError, Result};
use std::io::{Read, Write};

const CANARY_GZIP: u8 = b'G';
const CANARY_LZW: u8 = b'L';
const CANARY_SNAPPY: u8 = b'S';
const CANARY_LZ4: u8 = b'4';

/// Algorithms this crate can write
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Compression {
    #[default]
    Gzip,
    Lz4,
}

impl std::str::FromStr for Compression {
    type Err = ConvertError;
    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "gzip" => Ok(Self::Gzip),
            "lz4" => Ok(Self::Lz4),
            _ => Err(ConvertError::InvalidConfig(format!("compression: {}", s))),
        }
    }
}

/// Compress `data` and prepend the canary byte for `algorithm`
pub fn compress(data: &[u8], algorithm: Compression) -> Result<Vec<u8>> {
    match algorithm {
        Compression::Gzip => compress_gzip(data),
        Compression::Lz4 => compress_lz4(data),
    }
}

/// Decompress a framed value.
///
/// Returns `Ok(None)` when the value carries no compression canary.
pub fn decompress(data: &[u8]) -> Result<Option<Vec<u8>>> {
    let Some((&canary, body)) = data.split_first() else {
        return Err(ConvertError::DecompressionError("value is empty".into()));
    };
    match canary {
        CANARY_GZIP => decompress_gzip(body).map(Some),
        CANARY_LZ4 => decompress_lz4(body).map(Some),
        CANARY_LZW => Err(ConvertError::DecompressionError("lzw is not supported".into())),
        CANARY_SNAPPY => Err(ConvertError::DecompressionError("snappy is not supported".into())),
        _ => Ok(None),
    }
}

fn compress_gzip(data: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = flate2::write::GzEncoder::new(vec![CANARY_GZIP], flate2::Compression::best());
    encoder
        .write_all(data)
        .map_err(|e| ConvertError::CompressionError(format!("gzip: {}", e)))?;
    encoder
        .finish()
        .map_err(|e| ConvertError::CompressionError(format!("gzip: {}", e)))
}

fn decompress_gzip(body: &[u8]) -> Result<Vec<u8>> {
    let mut output = Vec::new();
    flate2::read::GzDecoder::new(body)
        .read_to_end(&mut output)
        .map_err(|e| ConvertError::DecompressionError(format!("gzip: {}", e)))?;
    Ok(output)
}

fn compress_lz4(data: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = lz4_flex::frame::FrameEncoder::new(vec![CANARY_LZ4]);
    encoder
        .write_all(data)
        .map_err(|e| ConvertError::CompressionError(format!("lz4: {}", e)))?;
    encoder
        .finish()
        .map_err(|e| ConvertError::CompressionError(format!("lz4: {}", e)))
}

fn decompress_lz4(body: &[u8]) -> Result<Vec<u8>> {
    let mut output = Vec::new();
    lz4_flex::frame::FrameDecoder::new(body)
        .read_to_end(&mut output)
        .map_err(|e| ConvertError::DecompressionError(format!("lz4: {}", e)))?;
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn test_roundtrip(algorithm: Compression, data: &[u8]) {
        let compressed = compress(data, algorithm).unwrap();
        let decompressed = decompress(&compressed).unwrap().unwrap();
        assert_eq!(data, &decompressed[..]);
    }

    #[test]
    fn test_gzip_roundtrip() {
        test_roundtrip(Compression::Gzip, b"{\"type\":\"shamir\",\"secret_shares\":5}");
    }

    #[test]
    fn test_lz4_roundtrip() {
        test_roundtrip(Compression::Lz4, b"{\"type\":\"shamir\",\"secret_shares\":5}");
    }

    #[test]
    fn test_canary_bytes() {
        assert_eq!(compress(b"x", Compression::Gzip).unwrap()[0], b'G');
        assert_eq!(compress(b"x", Compression::Lz4).unwrap()[0], b'4');
    }

    #[test]
    fn test_plain_value_is_not_compressed() {
        assert_eq!(decompress(b"{\"plain\":true}").unwrap(), None);
    }

    #[test]
    fn test_unsupported_and_corrupt_values() {
        assert_eq!(decompress(b"Sabc").unwrap_err().kind(), ErrorKind::Format);
        assert_eq!(decompress(b"Gnot gzip").unwrap_err().kind(), ErrorKind::Format);
        assert!(decompress(b"").is_err());
    }

    #[test]
    fn test_large_data() {
        let data: Vec<u8> = (0..100_000).map(|i| (i % 251) as u8).collect();
        for alg in [Compression::Gzip, Compression::Lz4] {
            test_roundtrip(alg, &data);
        }
    }

    #[test]
    fn test_compression_from_str() {
        assert_eq!("GZIP".parse::<Compression>().unwrap(), Compression::Gzip);
        assert_eq!("lz4".parse::<Compression>().unwrap(), Compression::Lz4);
        assert!("zstd".parse::<Compression>().is_err());
    }
}
