use crate::error::{HoardError, Result};

/// Zstd compression level used for payloads.
const ZSTD_LEVEL: i32 = 3;

/// Upper bound on a single decompressed payload (256 MiB). Zstd needs an
/// allocation cap up front; LZ4 carries the exact size in its frame.
const DECOMPRESS_LIMIT: usize = 256 * 1024 * 1024;

/// Compression applied to payloads before they enter a segment.
///
/// The method is store configuration, not file metadata: every payload in
/// a store is written and read under the same method. Slot reclamation is
/// only active under `None`, where the stored length of a payload is a
/// pure function of its input length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionMethod {
    /// Store payloads as given.
    None,
    /// LZ4 block compression with a length prefix.
    Lz4,
    /// Zstd at a fixed mid-level.
    Zstd,
}

impl CompressionMethod {
    pub fn is_enabled(&self) -> bool {
        !matches!(self, CompressionMethod::None)
    }
}

/// Compress a payload under the given method.
pub fn compress(data: &[u8], method: CompressionMethod) -> Result<Vec<u8>> {
    match method {
        CompressionMethod::None => Ok(data.to_vec()),
        CompressionMethod::Lz4 => Ok(lz4_flex::compress_prepend_size(data)),
        CompressionMethod::Zstd => zstd::bulk::compress(data, ZSTD_LEVEL)
            .map_err(|e| HoardError::Compression(format!("zstd compress: {}", e))),
    }
}

/// Decompress a stored payload under the given method.
pub fn decompress(data: &[u8], method: CompressionMethod) -> Result<Vec<u8>> {
    match method {
        CompressionMethod::None => Ok(data.to_vec()),
        CompressionMethod::Lz4 => lz4_flex::decompress_size_prepended(data)
            .map_err(|e| HoardError::Compression(format!("lz4 decompress: {}", e))),
        CompressionMethod::Zstd => zstd::bulk::decompress(data, DECOMPRESS_LIMIT)
            .map_err(|e| HoardError::Compression(format!("zstd decompress: {}", e))),
    }
}
