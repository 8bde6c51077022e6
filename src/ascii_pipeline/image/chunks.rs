//! Bounded chunked transfer format.
//!
//! The host-side transport that feeds the compute backend carries at
//! most [`MAX_CHUNK_LEN`] bytes per chunk, so any image larger than one
//! chunk is sent as a sequence terminated by a final-chunk flag.
//! Concatenating the chunks in order, up to and including the one
//! marked final, reconstructs the original buffer exactly. Streams may
//! pack several images back to back (the glyph library does); the
//! loader stops at each final flag and reports how many chunks it
//! consumed so the caller can keep a cursor into the stream.

use tracing::trace;

use crate::ascii_pipeline::backend::compute::{BufferId, ComputeBackend};
use crate::ascii_pipeline::common::error::{ConversionError, Result};

/// Maximum payload of a single transfer chunk in bytes.
pub const MAX_CHUNK_LEN: usize = 65536 - 17;

/// One bounded slice of an image buffer in transit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageChunk {
    /// Chunk payload, at most [`MAX_CHUNK_LEN`] bytes
    pub bytes: Vec<u8>,
    /// Set on the last chunk of one image
    pub last: bool,
}

/// Splits a buffer into transfer chunks.
///
/// Every chunk except possibly the last carries exactly
/// [`MAX_CHUNK_LEN`] bytes; the last chunk carries the remainder and
/// the final flag.
pub fn chunk_bytes(data: &[u8]) -> Vec<ImageChunk> {
    let mut out = Vec::with_capacity(data.len() / MAX_CHUNK_LEN + 1);
    let mut rest = data;
    loop {
        let take = rest.len().min(MAX_CHUNK_LEN);
        let (head, tail) = rest.split_at(take);
        out.push(ImageChunk {
            bytes: head.to_vec(),
            last: tail.is_empty(),
        });
        if tail.is_empty() {
            break;
        }
        rest = tail;
    }
    out
}

/// Uploads chunks into a backend buffer starting at `offset`, stopping
/// after the first chunk marked final.
///
/// Returns the number of chunks consumed, so callers walking a
/// multi-image stream can advance their cursor past the image just
/// loaded.
///
/// # Errors
///
/// Fails with [`ConversionError::TransferError`] if the stream runs out
/// before a final chunk, or if any backend upload fails.
pub fn load_chunks<B: ComputeBackend>(
    backend: &mut B,
    dst: BufferId,
    chunks: &[ImageChunk],
    mut offset: usize,
) -> Result<usize> {
    for (i, chunk) in chunks.iter().enumerate() {
        backend.upload(dst, &chunk.bytes, offset)?;
        offset += chunk.bytes.len();
        if chunk.last {
            trace!(chunks = i + 1, bytes = offset, "chunk stream loaded");
            return Ok(i + 1);
        }
    }
    Err(ConversionError::TransferError(
        "chunk stream ended without a final chunk".to_string(),
    ))
}
