use super::filelist::{Placement, SECTOR};
use crate::codec::{CodecId, deflate, for_id};
use crate::error::{NovaError, Result};
use crate::util::bytes::align_up;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

/// Random-access reader over a container file.
pub struct ContainerReader {
    file: File,
    len: u64,
}

impl ContainerReader {
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        let len = file.metadata()?.len();
        Ok(Self { file, len })
    }

    /// Bytes exactly as stored, compressed or not.
    pub fn read_stored(&mut self, p: &Placement) -> Result<Vec<u8>> {
        let off = p.offset();
        let n = p.stored_len();
        if off.checked_add(n).is_none_or(|end| end > self.len) {
            return Err(NovaError::Format(format!(
                "payload at sector {:#x} ({n} bytes) runs past the container end ({} bytes)",
                p.sector, self.len
            )));
        }
        self.file.seek(SeekFrom::Start(off))?;
        let mut buf = vec![0u8; n as usize];
        self.file.read_exact(&mut buf)?;
        Ok(buf)
    }

    pub fn read_payload(&mut self, p: &Placement) -> Result<Vec<u8>> {
        let stored = self.read_stored(p)?;
        decode_payload(p, stored)
    }
}

pub fn decode_payload(p: &Placement, stored: Vec<u8>) -> Result<Vec<u8>> {
    let codec = if p.is_compressed() {
        CodecId::Zlib
    } else {
        CodecId::Store
    };
    let mut out = Vec::with_capacity(p.uncompressed_size as usize);
    let n = for_id(codec).decompress(&mut stored.as_slice(), &mut out)?;
    if n != u64::from(p.uncompressed_size) {
        return Err(NovaError::Format(format!(
            "payload at sector {:#x} decoded to {n} bytes, filelist says {}",
            p.sector, p.uncompressed_size
        )));
    }
    Ok(out)
}

/// Compresses a fresh payload, keeping it raw unless zlib actually shrinks it.
/// The returned placement has no sector yet.
pub fn encode_payload(data: &[u8]) -> Result<(Placement, Vec<u8>)> {
    let uncompressed_size = u32::try_from(data.len())
        .map_err(|_| NovaError::InvalidArgument("payload exceeds 4 GiB".into()))?;
    let packed = deflate(data)?;
    let (codec, stored) = if packed.len() < data.len() {
        (CodecId::Zlib, packed)
    } else {
        (CodecId::Store, data.to_vec())
    };
    tracing::trace!(
        "encoded payload with {codec:?}: {} -> {} bytes",
        data.len(),
        stored.len()
    );
    Ok((
        Placement {
            sector: 0,
            uncompressed_size,
            compressed_size: stored.len() as u32,
        },
        stored,
    ))
}

/// Appends payloads on sector boundaries, zero-filling the gaps.
pub struct ContainerWriter<'a, W: Write> {
    inner: &'a mut W,
    n: u64,
}

impl<'a, W: Write> ContainerWriter<'a, W> {
    pub fn new(inner: &'a mut W) -> Self {
        Self { inner, n: 0 }
    }

    /// Writes `stored` at the next sector and returns that sector.
    pub fn append(&mut self, stored: &[u8]) -> Result<u32> {
        let at = align_up(self.n, SECTOR);
        let pad = (at - self.n) as usize;
        if pad > 0 {
            self.inner.write_all(&vec![0u8; pad])?;
        }
        let sector = u32::try_from(at / SECTOR)
            .map_err(|_| NovaError::Format("container grew past the sector range".into()))?;
        self.inner.write_all(stored)?;
        self.n = at + stored.len() as u64;
        Ok(sector)
    }

    pub fn written(&self) -> u64 {
        self.n
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payloads_start_on_sectors() {
        let mut out = Vec::new();
        let mut w = ContainerWriter::new(&mut out);
        assert_eq!(w.append(&[1u8; 10]).unwrap(), 0);
        assert_eq!(w.append(&[2u8; 2049]).unwrap(), 1);
        assert_eq!(w.append(&[3u8; 1]).unwrap(), 3);
        assert_eq!(w.written(), 3 * 2048 + 1);
        assert_eq!(out.len(), 3 * 2048 + 1);
        assert!(out[10..2048].iter().all(|&b| b == 0));
    }

    #[test]
    fn incompressible_payloads_stay_raw() {
        let (p, stored) = encode_payload(&[0x5A]).unwrap();
        assert!(!p.is_compressed());
        assert_eq!(stored, [0x5A]);

        let text = b"ABABABABABABABABABABABABABABABABABABAB".repeat(20);
        let (p, stored) = encode_payload(&text).unwrap();
        assert!(p.is_compressed());
        assert_eq!(decode_payload(&p, stored).unwrap(), text);
    }
}
