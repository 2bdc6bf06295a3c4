//! Gzip detection, inflation and deflation for `.nii.gz` buffers.
//!
//! Decoding goes through [`CompressionGate`] so the image layer only sees a
//! sniff/decompress/compress triple. [`Gzip`] decompresses single-shot with
//! libdeflate into a buffer sized from the gzip trailer, and falls back to a
//! streaming flate2 decoder unless that first member provably spans the whole
//! input (multi-member, mis-sized or corrupt streams).

use crate::error::{Error, Result};
use flate2::bufread::MultiGzDecoder;
use libdeflater::{crc32, CompressionLvl, Compressor, Decompressor};
use log::debug;
use std::io::{BufReader, Read};

/// Gzip member magic (RFC 1952).
pub const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Deflate cannot expand data by more than roughly this factor.
const MAX_DEFLATE_RATIO: usize = 1032;

const GZIP_BUFFER_SIZE: usize = 256 * 1024;

thread_local! {
    static DECOMPRESSOR: std::cell::RefCell<Decompressor> = std::cell::RefCell::new(Decompressor::new());
}

/// Opaque compression primitive used by the image layer.
pub trait CompressionGate {
    /// Whether `bytes` look compressed by this codec.
    fn is_compressed(&self, bytes: &[u8]) -> bool;

    /// Inflate a complete compressed buffer.
    fn decompress(&self, bytes: &[u8]) -> Result<Vec<u8>>;

    /// Deflate a complete buffer.
    fn compress(&self, bytes: &[u8]) -> Result<Vec<u8>>;
}

/// Gzip gate backed by libdeflate with a flate2 fallback.
#[derive(Debug, Clone, Copy)]
pub struct Gzip {
    level: i32,
}

impl Default for Gzip {
    fn default() -> Self {
        Self { level: 1 }
    }
}

impl Gzip {
    /// Gate compressing at the fastest level.
    pub fn new() -> Self {
        Self::default()
    }

    /// Gate compressing at `level` (1-12).
    pub fn with_level(level: i32) -> Result<Self> {
        CompressionLvl::new(level)
            .map_err(|_| Error::Compression(format!("invalid compression level {level}")))?;
        Ok(Self { level })
    }

    fn compression_level(&self) -> CompressionLvl {
        CompressionLvl::new(self.level).unwrap_or_else(|_| CompressionLvl::fastest())
    }
}

/// `ISIZE` trailer (RFC 1952): uncompressed size of the last member mod 2^32.
fn trailer_size(compressed: &[u8]) -> Option<usize> {
    let trailer = compressed.get(compressed.len().checked_sub(4)?..)?;
    Some(u32::from_le_bytes([trailer[0], trailer[1], trailer[2], trailer[3]]) as usize)
}

/// Output capacity to reserve up front; never trusts a trailer beyond what
/// deflate can actually produce from `compressed`.
fn initial_capacity(compressed: &[u8], claimed: usize) -> usize {
    claimed
        .min(compressed.len().saturating_mul(MAX_DEFLATE_RATIO))
        .max(super::header::NiftiHeader::SIZE)
}

/// Whether `member` (the output of the first gzip member) accounts for the
/// whole stream.
///
/// The first member ends in `CRC32 || ISIZE` of its own output. That pattern
/// must be the stream's last 8 bytes and must not occur earlier, otherwise a
/// further member may follow.
fn is_whole_stream(compressed: &[u8], member: &[u8]) -> bool {
    let mut trailer = [0u8; 8];
    trailer[..4].copy_from_slice(&crc32(member).to_le_bytes());
    trailer[4..].copy_from_slice(&(member.len() as u32).to_le_bytes());
    let last = compressed.len().checked_sub(8);
    last.is_some() && compressed.windows(8).position(|w| w == trailer) == last
}

fn decompress_streaming(compressed: &[u8]) -> Result<Vec<u8>> {
    let mut decoder = MultiGzDecoder::new(BufReader::with_capacity(GZIP_BUFFER_SIZE, compressed));
    let claimed = trailer_size(compressed).unwrap_or(0);
    let mut output = Vec::with_capacity(initial_capacity(compressed, claimed));
    decoder
        .read_to_end(&mut output)
        .map_err(|e| Error::Decompression(format!("gzip stream decode failed: {e}")))?;
    Ok(output)
}

impl CompressionGate for Gzip {
    fn is_compressed(&self, bytes: &[u8]) -> bool {
        bytes.starts_with(&GZIP_MAGIC)
    }

    fn decompress(&self, bytes: &[u8]) -> Result<Vec<u8>> {
        let Some(expected) = trailer_size(bytes) else {
            return Err(Error::Decompression(format!(
                "gzip stream too short ({} bytes)",
                bytes.len()
            )));
        };

        let mut output = vec![0u8; initial_capacity(bytes, expected)];

        let result = DECOMPRESSOR.with(|d| d.borrow_mut().gzip_decompress(bytes, &mut output));
        match result {
            // libdeflate stops after the first member and ignores what follows.
            Ok(written) if written == expected && is_whole_stream(bytes, &output[..written]) => {
                output.truncate(written);
                debug!("gzip: {} -> {} bytes (single shot)", bytes.len(), written);
                return Ok(output);
            }
            Ok(written) => {
                debug!("gzip: first member gave {written} bytes of {expected}, more members follow");
            }
            Err(e) => debug!("gzip: single-shot decode failed ({e})"),
        }

        drop(output);
        let output = decompress_streaming(bytes)?;
        debug!("gzip: {} -> {} bytes (streaming)", bytes.len(), output.len());
        Ok(output)
    }

    fn compress(&self, bytes: &[u8]) -> Result<Vec<u8>> {
        let mut compressor = Compressor::new(self.compression_level());
        let bound = compressor.gzip_compress_bound(bytes.len());
        let mut compressed = vec![0u8; bound];
        let written = compressor
            .gzip_compress(bytes, &mut compressed)
            .map_err(|e| Error::Compression(format!("{e:?}")))?;
        compressed.truncate(written);
        debug!("gzip: compressed {} -> {} bytes", bytes.len(), written);
        Ok(compressed)
    }
}

/// Pass-through gate for callers that only handle raw `.nii` buffers.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCompression;

impl CompressionGate for NoCompression {
    fn is_compressed(&self, _bytes: &[u8]) -> bool {
        false
    }

    fn decompress(&self, bytes: &[u8]) -> Result<Vec<u8>> {
        Ok(bytes.to_vec())
    }

    fn compress(&self, bytes: &[u8]) -> Result<Vec<u8>> {
        Ok(bytes.to_vec())
    }
}
