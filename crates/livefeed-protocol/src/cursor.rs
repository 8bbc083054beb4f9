//! Bounds-checked big-endian reads over a byte slice.
//!
//! All gateway integers are big-endian. Every read validates remaining
//! length first, so malformed frames surface as [`ProtocolError::Truncated`]
//! instead of panicking.

use crate::error::{ProtocolError, ProtocolResult};

/// Sequential reader over a borrowed byte slice.
#[derive(Debug)]
pub struct ByteReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    /// Creates a reader positioned at the start of `data`.
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Bytes left to read.
    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    /// Current offset from the start of the slice.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Reads a big-endian u16.
    pub fn read_u16(&mut self) -> ProtocolResult<u16> {
        let bytes = self.read_bytes(2)?;
        Ok(u16::from_be_bytes([bytes[0], bytes[1]]))
    }

    /// Reads a big-endian u32.
    pub fn read_u32(&mut self) -> ProtocolResult<u32> {
        let bytes = self.read_bytes(4)?;
        Ok(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    /// Reads `len` bytes, advancing the cursor.
    pub fn read_bytes(&mut self, len: usize) -> ProtocolResult<&'a [u8]> {
        if self.remaining() < len {
            return Err(ProtocolError::Truncated {
                needed: len,
                available: self.remaining(),
            });
        }
        let bytes = &self.data[self.pos..self.pos + len];
        self.pos += len;
        Ok(bytes)
    }

    /// Advances the cursor without reading.
    pub fn skip(&mut self, len: usize) -> ProtocolResult<()> {
        self.read_bytes(len)?;
        Ok(())
    }
}
