//! Inflation of `.deflate` blobs.
//!
//! The benchmark's text files were written with Hadoop's default codec,
//! which produces a zlib-wrapped deflate stream per file.

use crate::{Error, Result};
use flate2::read::ZlibDecoder;
use std::io::{self, Read, Write};

/// Inflate a whole blob into text.
///
/// Invalid UTF-8 sequences are replaced rather than rejected; the crawl
/// dataset contains arbitrary scraped HTML.
pub fn inflate(deflated: &[u8]) -> Result<String> {
    let mut buf = Vec::with_capacity(deflated.len().saturating_mul(4));
    ZlibDecoder::new(deflated)
        .read_to_end(&mut buf)
        .map_err(Error::Inflate)?;

    Ok(match String::from_utf8(buf) {
        Ok(text) => text,
        Err(e) => String::from_utf8_lossy(e.as_bytes()).into_owned(),
    })
}

/// Stream-inflate `reader` into `writer`, returning the inflated byte count.
pub fn inflate_to<R: Read, W: Write>(reader: R, writer: &mut W) -> Result<u64> {
    let mut decoder = ZlibDecoder::new(io::BufReader::new(reader));
    io::copy(&mut decoder, writer).map_err(Error::Inflate)
}
