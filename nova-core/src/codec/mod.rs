use crate::error::Result;
use std::io::{Read, Write};

#[repr(u8)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum CodecId {
    Store = 0,
    Zlib = 1,
}

/// Level used for every payload and text chunk the crate writes.
pub const ZLIB_LEVEL: u32 = 9;

pub trait Compressor: Send + Sync {
    fn id(&self) -> CodecId;
    fn compress(&self, src: &mut dyn Read, dst: &mut dyn Write, level: u32) -> Result<u64>;
    fn decompress(&self, src: &mut dyn Read, dst: &mut dyn Write) -> Result<u64>;
}

/// Pass-through codec for payloads kept uncompressed in the container.
pub struct Store;

impl Compressor for Store {
    fn id(&self) -> CodecId {
        CodecId::Store
    }

    fn compress(&self, src: &mut dyn Read, dst: &mut dyn Write, _level: u32) -> Result<u64> {
        Ok(std::io::copy(src, dst)?)
    }

    fn decompress(&self, src: &mut dyn Read, dst: &mut dyn Write) -> Result<u64> {
        Ok(std::io::copy(src, dst)?)
    }
}

pub fn for_id(id: CodecId) -> &'static dyn Compressor {
    match id {
        CodecId::Store => &Store,
        CodecId::Zlib => &zlib::ZlibCompressor,
    }
}

/// Compresses a whole buffer with zlib at [`ZLIB_LEVEL`].
pub fn deflate(data: &[u8]) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(data.len() / 2 + 16);
    zlib::ZlibCompressor.compress(&mut &data[..], &mut out, ZLIB_LEVEL)?;
    Ok(out)
}

/// Inflates a zlib stream; `expected` sizes the output buffer and, when
/// non-zero, must match the inflated length.
pub fn inflate(data: &[u8], expected: usize) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(expected);
    let n = zlib::ZlibCompressor.decompress(&mut &data[..], &mut out)?;
    if expected != 0 && n as usize != expected {
        return Err(crate::error::NovaError::Format(format!(
            "zlib stream inflated to {n} bytes, expected {expected}"
        )));
    }
    Ok(out)
}

pub mod zlib;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inflate_checks_length() {
        let packed = deflate(b"hello hello hello").unwrap();
        assert_eq!(inflate(&packed, 17).unwrap(), b"hello hello hello");
        assert!(inflate(&packed, 16).is_err());
        assert!(inflate(b"not zlib", 0).is_err());
    }

    #[test]
    fn store_passes_bytes_through() {
        let mut out = Vec::new();
        let codec = for_id(CodecId::Store);
        assert_eq!(codec.id(), CodecId::Store);
        codec.compress(&mut &b"abc"[..], &mut out, ZLIB_LEVEL).unwrap();
        assert_eq!(out, b"abc");
    }
}
