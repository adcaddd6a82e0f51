use byteorder::{BigEndian, ByteOrder};

use crate::error::DecodeError;

/// Upper bound for a single buffer window. A corrupt length field can ask
/// for arbitrarily large allocations; anything above this is rejected.
pub const MAXIMUM_BUFFER_SIZE: usize = 10 * 1024 * 1024;

const MAX_VBE_BYTES_U32: usize = 5;
const MAX_VBE_BYTES_U64: usize = 9;

/// Bounds-checked cursor over one finite byte window (the file header, an
/// index page or a single tile block).
///
/// All fixed-width integers are big-endian. Variable-byte encoded values
/// ("VBE") use continuation-bit groups of 7 bits, least significant group
/// first; the signed variant carries 6 payload bits plus a sign bit in its
/// terminal byte. Every read fails with a [`DecodeError`] instead of
/// reading past the end of the window.
pub struct ByteCursor {
    data: Vec<u8>,
    position: usize,
}

impl ByteCursor {
    pub fn new(data: Vec<u8>) -> Result<Self, DecodeError> {
        if data.len() > MAXIMUM_BUFFER_SIZE {
            return Err(DecodeError::OversizedBuffer(data.len(), MAXIMUM_BUFFER_SIZE));
        }
        Ok(Self { data, position: 0 })
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.position
    }

    pub fn set_position(&mut self, position: usize) -> Result<(), DecodeError> {
        if position > self.data.len() {
            return Err(DecodeError::BufferOverrun {
                wanted: position,
                remaining: self.data.len(),
            });
        }
        self.position = position;
        Ok(())
    }

    pub fn skip(&mut self, bytes: usize) -> Result<(), DecodeError> {
        self.require(bytes)?;
        self.position += bytes;
        Ok(())
    }

    fn require(&self, bytes: usize) -> Result<(), DecodeError> {
        if self.position + bytes > self.data.len() {
            return Err(DecodeError::BufferOverrun {
                wanted: bytes,
                remaining: self.remaining(),
            });
        }
        Ok(())
    }

    pub fn read_u8(&mut self) -> Result<u8, DecodeError> {
        self.require(1)?;
        let byte = self.data[self.position];
        self.position += 1;
        Ok(byte)
    }

    pub fn read_i16(&mut self) -> Result<i16, DecodeError> {
        self.require(2)?;
        let value = BigEndian::read_i16(&self.data[self.position..]);
        self.position += 2;
        Ok(value)
    }

    pub fn read_u16(&mut self) -> Result<u16, DecodeError> {
        self.require(2)?;
        let value = BigEndian::read_u16(&self.data[self.position..]);
        self.position += 2;
        Ok(value)
    }

    pub fn read_i32(&mut self) -> Result<i32, DecodeError> {
        self.require(4)?;
        let value = BigEndian::read_i32(&self.data[self.position..]);
        self.position += 4;
        Ok(value)
    }

    pub fn read_i64(&mut self) -> Result<i64, DecodeError> {
        self.require(8)?;
        let value = BigEndian::read_i64(&self.data[self.position..]);
        self.position += 8;
        Ok(value)
    }

    /// Reads an unsigned VBE integer of at most 5 bytes.
    pub fn read_vbe_u32(&mut self) -> Result<u32, DecodeError> {
        let mut value: u32 = 0;
        let mut shift = 0u32;
        loop {
            let byte = self.read_u8()?;
            if byte & 0x80 == 0 {
                return Ok(value | (u32::from(byte) << shift));
            }
            value |= u32::from(byte & 0x7f) << shift;
            shift += 7;
            if shift > 28 {
                return Err(DecodeError::VarintTooLong(MAX_VBE_BYTES_U32));
            }
        }
    }

    /// Reads an unsigned VBE integer of at most 9 bytes (file addresses).
    pub fn read_vbe_u64(&mut self) -> Result<u64, DecodeError> {
        let mut value: u64 = 0;
        let mut shift = 0u32;
        loop {
            let byte = self.read_u8()?;
            if byte & 0x80 == 0 {
                return Ok(value | (u64::from(byte) << shift));
            }
            value |= u64::from(byte & 0x7f) << shift;
            shift += 7;
            if shift > 56 {
                return Err(DecodeError::VarintTooLong(MAX_VBE_BYTES_U64));
            }
        }
    }

    /// Reads a signed VBE integer of at most 5 bytes. The terminal byte
    /// carries 6 payload bits; its 0x40 bit selects the sign.
    pub fn read_vbe_s32(&mut self) -> Result<i32, DecodeError> {
        let mut value: i32 = 0;
        let mut shift = 0u32;
        loop {
            let byte = self.read_u8()?;
            if byte & 0x80 == 0 {
                value |= i32::from(byte & 0x3f) << shift;
                return Ok(if byte & 0x40 != 0 { -value } else { value });
            }
            value |= i32::from(byte & 0x7f) << shift;
            shift += 7;
            if shift > 28 {
                return Err(DecodeError::VarintTooLong(MAX_VBE_BYTES_U32));
            }
        }
    }

    /// Reads a string with a VBE-U length prefix. A zero length yields an
    /// empty string; writers emit those for optional fields left blank.
    pub fn read_utf8(&mut self) -> Result<String, DecodeError> {
        let length = self.read_vbe_u32()? as usize;
        self.read_utf8_fixed(length)
    }

    /// Reads a string of a known byte length (magic bytes, debug signatures).
    pub fn read_utf8_fixed(&mut self, length: usize) -> Result<String, DecodeError> {
        self.require(length)?;
        let bytes = self.data[self.position..self.position + length].to_vec();
        self.position += length;
        Ok(String::from_utf8(bytes)?)
    }
}
