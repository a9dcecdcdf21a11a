//! Raw DEFLATE decompression of gateway payloads
//!
//! Compressed response fields arrive base64-encoded with no zlib or gzip
//! framing. Output is accumulated in fixed-size steps until the stream ends
//! or a step makes no progress. No size limit is applied here; callers that
//! need a bound must enforce it around this call.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use flate2::{Decompress, FlushDecompress, Status};

use crate::error::InflateError;

pub const INFLATE_CHUNK_SIZE: usize = 1024;

/// Base64-decode `data` and inflate the raw DEFLATE stream inside it
pub fn inflate(data: &str) -> Result<Vec<u8>, InflateError> {
    let compressed = BASE64.decode(data.trim())?;
    inflate_bytes(&compressed)
}

pub fn inflate_bytes(compressed: &[u8]) -> Result<Vec<u8>, InflateError> {
    let mut inflater = Decompress::new(false);
    let mut chunk = [0u8; INFLATE_CHUNK_SIZE];
    let mut output = Vec::new();
    let mut offset = 0;

    loop {
        let in_before = inflater.total_in();
        let out_before = inflater.total_out();
        let status = inflater.decompress(&compressed[offset..], &mut chunk, FlushDecompress::None)?;
        let consumed = (inflater.total_in() - in_before) as usize;
        let produced = (inflater.total_out() - out_before) as usize;

        offset += consumed;
        output.extend_from_slice(&chunk[..produced]);

        if status == Status::StreamEnd {
            break;
        }
        // No progress: input exhausted or stream truncated
        if produced == 0 && consumed == 0 {
            break;
        }
    }

    Ok(output)
}
