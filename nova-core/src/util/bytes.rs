//! Bounds-checked cursor over an in-memory buffer.

use crate::error::{NovaError, Result};

#[derive(Debug, Clone)]
pub struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    pub fn at(data: &'a [u8], pos: usize, context: &'static str) -> Result<Self> {
        if pos > data.len() {
            return Err(eof(context, pos, data.len()));
        }
        Ok(Self { data, pos })
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn remaining_len(&self) -> usize {
        self.data.len() - self.pos
    }

    pub fn is_empty(&self) -> bool {
        self.pos >= self.data.len()
    }

    #[inline]
    pub fn read_u8(&mut self, context: &'static str) -> Result<u8> {
        let b = *self
            .data
            .get(self.pos)
            .ok_or_else(|| eof(context, self.pos, self.data.len()))?;
        self.pos += 1;
        Ok(b)
    }

    pub fn read_bytes(&mut self, n: usize, context: &'static str) -> Result<&'a [u8]> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|&end| end <= self.data.len())
            .ok_or_else(|| eof(context, self.pos, self.data.len()))?;
        let out = &self.data[self.pos..end];
        self.pos = end;
        Ok(out)
    }

    fn read_array<const N: usize>(&mut self, context: &'static str) -> Result<[u8; N]> {
        let mut buf = [0u8; N];
        buf.copy_from_slice(self.read_bytes(N, context)?);
        Ok(buf)
    }

    pub fn read_u16_le(&mut self, context: &'static str) -> Result<u16> {
        Ok(u16::from_le_bytes(self.read_array(context)?))
    }

    pub fn read_u32_le(&mut self, context: &'static str) -> Result<u32> {
        Ok(u32::from_le_bytes(self.read_array(context)?))
    }

    pub fn read_u16_be(&mut self, context: &'static str) -> Result<u16> {
        Ok(u16::from_be_bytes(self.read_array(context)?))
    }

    pub fn read_u32_be(&mut self, context: &'static str) -> Result<u32> {
        Ok(u32::from_be_bytes(self.read_array(context)?))
    }

    pub fn read_u64_be(&mut self, context: &'static str) -> Result<u64> {
        Ok(u64::from_be_bytes(self.read_array(context)?))
    }
}

fn eof(context: &'static str, pos: usize, len: usize) -> NovaError {
    NovaError::Format(format!(
        "unexpected end of input while reading {context} (offset {pos}, length {len})"
    ))
}

/// Rounds `n` up to the next multiple of `align` (a power of two).
#[inline]
pub fn align_up(n: u64, align: u64) -> u64 {
    (n + align - 1) & !(align - 1)
}
