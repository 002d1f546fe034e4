//! Sequential reader over raw transaction bytes

use crate::{Error, Result};

/// Forward-only cursor over a byte buffer.
///
/// Every read checks the remaining length first and fails with
/// [`Error::TruncatedInput`] instead of returning partial data.
#[derive(Debug, Clone)]
pub struct ByteCursor<'a> {
    data: &'a [u8],
    offset: usize,
}

impl<'a> ByteCursor<'a> {
    /// Create a cursor positioned at the start of `data`
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, offset: 0 }
    }

    /// Current byte offset
    pub fn position(&self) -> usize {
        self.offset
    }

    /// Bytes left to read
    pub fn remaining(&self) -> usize {
        self.data.len() - self.offset
    }

    /// Whether every byte has been consumed
    pub fn is_exhausted(&self) -> bool {
        self.offset == self.data.len()
    }

    fn truncated(&self, needed: u64) -> Error {
        Error::TruncatedInput {
            offset: self.offset,
            needed,
            remaining: self.remaining(),
        }
    }

    /// Read `n` bytes
    pub fn read_bytes(&mut self, n: usize) -> Result<&'a [u8]> {
        if n > self.remaining() {
            return Err(self.truncated(n as u64));
        }
        let slice = &self.data[self.offset..self.offset + n];
        self.offset += n;
        Ok(slice)
    }

    fn read_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.read_bytes(N)?);
        Ok(out)
    }

    /// Read one byte
    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.read_array::<1>()?[0])
    }

    /// Read a little-endian u16
    pub fn read_u16(&mut self) -> Result<u16> {
        self.read_array().map(u16::from_le_bytes)
    }

    /// Read a little-endian u32
    pub fn read_u32(&mut self) -> Result<u32> {
        self.read_array().map(u32::from_le_bytes)
    }

    /// Read a little-endian u64
    pub fn read_u64(&mut self) -> Result<u64> {
        self.read_array().map(u64::from_le_bytes)
    }

    /// Read a little-endian two's-complement i64
    pub fn read_i64(&mut self) -> Result<i64> {
        self.read_array().map(i64::from_le_bytes)
    }

    /// Read a Bitcoin-style compact size.
    ///
    /// `< 0xfd` is the value itself; `0xfd`, `0xfe` and `0xff` are followed by
    /// a u16, u32 or u64 respectively. Non-canonical encodings are accepted.
    pub fn read_compact_size(&mut self) -> Result<u64> {
        match self.read_u8()? {
            0xfd => self.read_u16().map(u64::from),
            0xfe => self.read_u32().map(u64::from),
            0xff => self.read_u64(),
            n => Ok(u64::from(n)),
        }
    }

    /// Read a 32-byte hash and reverse it into display order
    pub fn read_hash(&mut self) -> Result<[u8; 32]> {
        let mut hash = self.read_array::<32>()?;
        hash.reverse();
        Ok(hash)
    }

    /// Read a compact-size length followed by that many bytes
    pub fn read_var_bytes(&mut self) -> Result<&'a [u8]> {
        let start = self.offset;
        let len = self.read_compact_size()?;
        if len > self.remaining() as u64 {
            let err = self.truncated(len);
            self.offset = start;
            return Err(err);
        }
        self.read_bytes(len as usize)
    }

    /// Advance past `n` bytes
    pub fn skip(&mut self, n: u64) -> Result<()> {
        if n > self.remaining() as u64 {
            return Err(self.truncated(n));
        }
        self.offset += n as usize;
        Ok(())
    }

    /// Advance past `count` fixed-size items of `size` bytes each
    pub fn skip_items(&mut self, count: u64, size: u64) -> Result<()> {
        match count.checked_mul(size) {
            Some(total) => self.skip(total),
            None => Err(self.truncated(u64::MAX)),
        }
    }
}

/// Decode a hex string (either case) into bytes
pub fn decode_hex(input: &str) -> Result<Vec<u8>> {
    Ok(hex::decode(input.trim())?)
}
