use std::io::{Cursor, Read, Write};

use flate2::read::GzDecoder;
use flate2::{Compression, GzBuilder};
use zstd::stream::{decode_all, encode_all};

/// Gzip level used for distributed streams.
pub const GZIP_LEVEL: u32 = 9;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];
const ZSTD_MAGIC: [u8; 4] = [0x28, 0xb5, 0x2f, 0xfd];

/// Outer wrapping of a distributed stream.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Wrap {
    Raw,
    Gzip,
    Zstd,
}

impl Wrap {
    /// Detect by magic bytes. A raw stream starts with a big-endian frame length,
    /// which never collides with either magic for payloads below 256 MiB.
    pub fn detect(bytes: &[u8]) -> Self {
        if bytes.starts_with(&GZIP_MAGIC) {
            Wrap::Gzip
        } else if bytes.starts_with(&ZSTD_MAGIC) {
            Wrap::Zstd
        } else {
            Wrap::Raw
        }
    }
}

/// Gzip with a zeroed header timestamp, so output depends only on input and level.
pub fn gzip_compress(input: &[u8], level: u32) -> std::io::Result<Vec<u8>> {
    let mut encoder = GzBuilder::new()
        .mtime(0)
        .write(Vec::new(), Compression::new(level));
    encoder.write_all(input)?;
    encoder.finish()
}

pub fn gzip_decompress(input: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut out = Vec::new();
    GzDecoder::new(input).read_to_end(&mut out)?;
    Ok(out)
}

/// Compress data using zstd
pub fn zstd_compress(input: &[u8], level: i32) -> std::io::Result<Vec<u8>> {
    encode_all(Cursor::new(input), level)
}

/// Decompress data using zstd
pub fn zstd_decompress(input: &[u8]) -> std::io::Result<Vec<u8>> {
    decode_all(Cursor::new(input))
}

/// Strip whatever wrapping `bytes` carries.
pub fn unwrap_any(bytes: &[u8]) -> std::io::Result<Vec<u8>> {
    match Wrap::detect(bytes) {
        Wrap::Raw => Ok(bytes.to_vec()),
        Wrap::Gzip => gzip_decompress(bytes),
        Wrap::Zstd => zstd_decompress(bytes),
    }
}
