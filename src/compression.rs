//! Gzip helpers for backup documents.

use std::io::{Read, Write};

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;

use crate::error::LabResult;

/// Gzip magic bytes: 0x1f 0x8b.
pub fn is_gzipped(data: &[u8]) -> bool {
    data.len() >= 2 && data[0] == 0x1f && data[1] == 0x8b
}

/// Inflates gzip input; anything else is returned unchanged.
pub fn maybe_decompress(data: Vec<u8>) -> LabResult<Vec<u8>> {
    if !is_gzipped(&data) {
        return Ok(data);
    }
    let mut decoder = GzDecoder::new(&data[..]);
    let mut out = Vec::new();
    decoder.read_to_end(&mut out)?;
    Ok(out)
}

pub fn compress(data: &[u8]) -> LabResult<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data)?;
    Ok(encoder.finish()?)
}
