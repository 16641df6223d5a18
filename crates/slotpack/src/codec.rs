use super::error::SaveError;

use lz4_flex::{compress_prepend_size, decompress_size_prepended};

/// Compression capability applied to object state before it enters the
/// container. The container never inspects the compressed bytes; it only
/// frames them.
pub trait Compressor {
    fn compress(&self, raw: &[u8]) -> Vec<u8>;

    /// Fails with [`SaveError::DecompressionFailed`] when the payload was not
    /// produced by the matching `compress`.
    fn decompress(&self, compressed: &[u8]) -> Result<Vec<u8>, SaveError>;
}

/// LZ4 with a prepended uncompressed-size word.
#[derive(Debug, Default, Clone, Copy)]
pub struct Lz4Compressor;

impl Compressor for Lz4Compressor {
    fn compress(&self, raw: &[u8]) -> Vec<u8> {
        compress_prepend_size(raw)
    }

    fn decompress(&self, compressed: &[u8]) -> Result<Vec<u8>, SaveError> {
        decompress_size_prepended(compressed).map_err(|_| SaveError::DecompressionFailed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compress_roundtrip() {
        let raw = b"the quick brown fox jumps over the lazy dog".repeat(8);

        let compressed = Lz4Compressor.compress(&raw);
        let restored = Lz4Compressor.decompress(&compressed).unwrap();

        assert_eq!(restored, raw);
        assert!(compressed.len() < raw.len());
    }

    #[test]
    fn test_uncompressed_bytes_rejected() {
        let result = Lz4Compressor.decompress(&[0xFF; 64]);
        assert!(matches!(result, Err(SaveError::DecompressionFailed)));
    }
}
