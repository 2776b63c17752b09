//! Filelist encryption used by ff132 releases.
//!
//! ```text
//! 0   seed header   16 bytes, kept verbatim
//! 16  body size     u32 BE, plain body length (multiple of 8)
//! 20  marker        u32 LE 0x1DE03478
//! 24  zero          8 bytes
//! 32  body          plain filelist, zero-padded to 8
//!     size          u32 LE, same as the header field
//!     checksum      u32 LE, sum of every 4th body byte
//!     zero          8 bytes, not encrypted
//! ```
//!
//! Everything from the body through the checksum is enciphered in 8-byte
//! blocks keyed by a table derived from four bytes of the seed header.

use crate::error::{NovaError, Result};
use serde::{Deserialize, Serialize};

pub const MARKER: u32 = 0x1DE0_3478;
pub const MARKER_OFFSET: usize = 20;
pub const PREFIX_LEN: usize = 32;
pub const SEED_LEN: usize = 16;
const BLOCK: usize = 8;
const TRAILER_LEN: usize = 16;
const TABLE_LEN: usize = 264;
const KEY_BIAS: u64 = 0xA165_2347;

/// The seed header of an encrypted filelist, reused when it is written back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Seal(#[serde(with = "hex_seed")] pub [u8; SEED_LEN]);

mod hex_seed {
    use super::SEED_LEN;
    use serde::{Deserialize, Deserializer, Serializer, de::Error};

    pub fn serialize<S: Serializer>(seed: &[u8; SEED_LEN], s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&hex::encode(seed))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<[u8; SEED_LEN], D::Error> {
        let text = String::deserialize(d)?;
        let bytes = hex::decode(&text).map_err(D::Error::custom)?;
        bytes
            .try_into()
            .map_err(|_| D::Error::custom(format!("seal must be {SEED_LEN} bytes")))
    }
}

impl Seal {
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn from_hex(text: &str) -> Result<Self> {
        let bytes = hex::decode(text.trim())
            .map_err(|e| NovaError::Format(format!("filelist seal: {e}")))?;
        let seed = bytes
            .try_into()
            .map_err(|_| NovaError::Format(format!("filelist seal must be {SEED_LEN} bytes")))?;
        Ok(Seal(seed))
    }

    fn table(&self) -> [u8; TABLE_LEN] {
        let h = &self.0;
        let seed = i32::from_be_bytes([h[9], h[12], h[2], h[0]]) as i64 as u64;
        key_table(seed.to_be_bytes())
    }
}

/// True when `data` starts with an encrypted filelist prefix.
pub fn is_sealed(data: &[u8]) -> bool {
    data.get(MARKER_OFFSET..MARKER_OFFSET + 4)
        .is_some_and(|b| u32::from_le_bytes([b[0], b[1], b[2], b[3]]) == MARKER)
}

/// Splits off the prefix and deciphers the body. The returned bytes hold
/// only the plain filelist, padding included.
pub fn open(data: &[u8]) -> Result<(Seal, Vec<u8>)> {
    if data.len() < PREFIX_LEN {
        return Err(NovaError::Format("encrypted filelist prefix is truncated".into()));
    }
    let mut seed = [0u8; SEED_LEN];
    seed.copy_from_slice(&data[..SEED_LEN]);
    let seal = Seal(seed);
    let size = u32::from_be_bytes([data[16], data[17], data[18], data[19]]) as usize;
    if size % BLOCK != 0 {
        return Err(NovaError::Format(format!(
            "encrypted filelist body size {size} is not a multiple of {BLOCK}"
        )));
    }
    let end = PREFIX_LEN + size + BLOCK;
    let mut body = data
        .get(PREFIX_LEN..end)
        .ok_or_else(|| {
            NovaError::Format(format!(
                "encrypted filelist declares {size} body bytes but holds {}",
                data.len().saturating_sub(PREFIX_LEN)
            ))
        })?
        .to_vec();

    if trailer_size(&body, size) == Some(size as u32) {
        tracing::info!("filelist body is already plain; skipping decryption");
    } else {
        let table = seal.table();
        for (index, block) in body.chunks_exact_mut(BLOCK).enumerate() {
            decipher(&table, index as u32, block);
        }
        if trailer_size(&body, size) != Some(size as u32) {
            return Err(NovaError::Format(
                "encrypted filelist does not decrypt with its seed header".into(),
            ));
        }
    }

    let stored = u32::from_le_bytes([body[size + 4], body[size + 5], body[size + 6], body[size + 7]]);
    let expected = checksum(&body[..size]);
    if stored != expected {
        tracing::warn!("filelist checksum {stored:#010x} does not match {expected:#010x}");
    }
    body.truncate(size);
    Ok((seal, body))
}

/// Pads `plain`, appends the size and checksum, enciphers and prefixes it.
pub fn seal(seal: &Seal, plain: &[u8]) -> Result<Vec<u8>> {
    let size = plain.len().next_multiple_of(BLOCK);
    let size_field = u32::try_from(size)
        .map_err(|_| NovaError::Format("filelist is too large to encrypt".into()))?;

    let mut body = Vec::with_capacity(size + TRAILER_LEN);
    body.extend_from_slice(plain);
    body.resize(size, 0);
    let sum = checksum(&body);
    body.extend_from_slice(&size_field.to_le_bytes());
    body.extend_from_slice(&sum.to_le_bytes());

    let table = seal.table();
    for (index, block) in body.chunks_exact_mut(BLOCK).enumerate() {
        encipher(&table, index as u32, block);
    }
    body.extend_from_slice(&[0; BLOCK]);

    let mut out = Vec::with_capacity(PREFIX_LEN + body.len());
    out.extend_from_slice(&seal.0);
    out.extend_from_slice(&size_field.to_be_bytes());
    out.extend_from_slice(&MARKER.to_le_bytes());
    out.extend_from_slice(&[0; 8]);
    out.extend_from_slice(&body);
    Ok(out)
}

fn trailer_size(body: &[u8], size: usize) -> Option<u32> {
    let b = body.get(size..size + 4)?;
    Some(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
}

pub fn checksum(body: &[u8]) -> u32 {
    body.iter()
        .step_by(4)
        .fold(0u32, |sum, &b| sum.wrapping_add(u32::from(b)))
}

/// 33 eight-byte blocks; each block is the previous one times five.
fn key_table(seed: [u8; 8]) -> [u8; TABLE_LEN] {
    let a = u32::from_le_bytes([seed[0], seed[1], seed[2], seed[3]]).rotate_left(8);
    let b = u32::from_le_bytes([seed[4], seed[5], seed[6], seed[7]]).rotate_right(16);
    let mut first = [0u8; BLOCK];
    first[..4].copy_from_slice(&b.to_le_bytes());
    first[4..].copy_from_slice(&a.to_le_bytes());
    first[0] = first[0].wrapping_add(0x45);
    for i in 1..BLOCK {
        let prev = first[i - 1];
        first[i] = (first[i].wrapping_add(0xD4).wrapping_add(prev) ^ (prev << 2)) ^ 0x45;
    }

    let mut table = [0u8; TABLE_LEN];
    let mut block = u64::from_le_bytes(first);
    for chunk in table.chunks_exact_mut(BLOCK) {
        chunk.copy_from_slice(&block.to_le_bytes());
        block = block.wrapping_mul(5);
    }
    table
}

struct BlockKey {
    /// Added to every byte on the way in, subtracted on the way out.
    shift: u8,
    /// Seeds the byte chain of the block.
    chain: u8,
    table: u64,
    key: u64,
}

impl BlockKey {
    fn new(table: &[u8; TABLE_LEN], index: u32) -> Self {
        let counter = index.wrapping_mul(BLOCK as u32);
        let at = (counter & 0xF8) as usize;
        let window = &table[at..at + BLOCK];
        let sum = window.iter().fold(0u8, |s, &b| s.wrapping_add(b));
        let c = u64::from(counter);
        let spread = (c << 30) | (c << 20) | (c << 10) | c;
        let mut word = [0u8; BLOCK];
        word.copy_from_slice(window);
        BlockKey {
            shift: sum.wrapping_sub(0xC0),
            chain: (index as u8) ^ 0x45,
            table: u64::from_le_bytes(word),
            key: spread.wrapping_add(KEY_BIAS),
        }
    }
}

fn decipher(table: &[u8; TABLE_LEN], index: u32, block: &mut [u8]) {
    let k = BlockKey::new(table, index);
    let mut mixed = [0u8; BLOCK];
    let mut prev = k.chain;
    for (out, &c) in mixed.iter_mut().zip(block.iter()) {
        *out = (prev ^ c).wrapping_sub(k.shift);
        prev = c;
    }
    let v = u64::from_le_bytes(mixed).wrapping_sub(k.table) ^ k.key ^ k.table;
    block[..4].copy_from_slice(&((v >> 32) as u32).to_le_bytes());
    block[4..].copy_from_slice(&(v as u32).to_le_bytes());
}

fn encipher(table: &[u8; TABLE_LEN], index: u32, block: &mut [u8]) {
    let k = BlockKey::new(table, index);
    let hi = u32::from_le_bytes([block[0], block[1], block[2], block[3]]);
    let lo = u32::from_le_bytes([block[4], block[5], block[6], block[7]]);
    let v = (((u64::from(hi) << 32) | u64::from(lo)) ^ k.table ^ k.key).wrapping_add(k.table);
    let mut prev = k.chain;
    for (out, b) in block.iter_mut().zip(v.to_le_bytes()) {
        *out = prev ^ b.wrapping_add(k.shift);
        prev = *out;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SEED: Seal = Seal([
        0x3c, 0x11, 0x9a, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0xe1, 0x00, 0x00, 0x57, 0x00, 0x00,
        0x00,
    ]);

    #[test]
    fn table_blocks_step_by_five() {
        let t = SEED.table();
        let first = u64::from_le_bytes(t[..8].try_into().unwrap());
        let second = u64::from_le_bytes(t[8..16].try_into().unwrap());
        assert_eq!(second, first.wrapping_mul(5));
    }

    #[test]
    fn blocks_decipher_to_what_was_enciphered() {
        let table = SEED.table();
        for index in [0u32, 1, 31, 32, 700] {
            let plain = *b"\x01\x02\x03\x04\xfd\xfe\xff\x00";
            let mut block = plain;
            encipher(&table, index, &mut block);
            assert_ne!(block, plain);
            decipher(&table, index, &mut block);
            assert_eq!(block, plain, "block {index}");
        }
    }

    #[test]
    fn sealed_body_has_prefix_and_trailer() {
        let plain = b"0123456789abc".to_vec();
        let bytes = seal(&SEED, &plain).unwrap();
        assert!(is_sealed(&bytes));
        assert_eq!(&bytes[..16], &SEED.0);
        assert_eq!(&bytes[16..20], &16u32.to_be_bytes());
        assert_eq!(bytes.len(), PREFIX_LEN + 16 + TRAILER_LEN);
        assert_eq!(&bytes[bytes.len() - 8..], &[0; 8]);

        let (seal_back, body) = open(&bytes).unwrap();
        assert_eq!(seal_back, SEED);
        assert_eq!(&body[..13], &plain[..]);
        assert_eq!(&body[13..], &[0, 0, 0]);
    }

    #[test]
    fn wrong_seed_or_short_body_is_malformed() {
        let mut bytes = seal(&SEED, b"filelist").unwrap();
        bytes[9] ^= 0xFF;
        assert_eq!(open(&bytes).unwrap_err().code(), 1);
        let bytes = seal(&SEED, b"filelist").unwrap();
        assert_eq!(open(&bytes[..40]).unwrap_err().code(), 1);
    }

    #[test]
    fn seal_round_trips_through_hex() {
        let text = SEED.to_hex();
        assert_eq!(Seal::from_hex(&text).unwrap(), SEED);
        assert!(Seal::from_hex("abcd").is_err());
    }
}
