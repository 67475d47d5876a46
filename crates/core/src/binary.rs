//! Sequential binary reader and writer
//!
//! All multi-byte integers and floats are big-endian. Lengths and counts use
//! LEB128 variable-length integers.
//!
//! ```text
//! varint  : 1-5 bytes, 7 data bits per byte, high bit = continuation
//! varlong : 1-10 bytes, same scheme for u64
//! bytes   : [len: varint][raw bytes]
//! string  : [len: varint][UTF-8 bytes]
//! uuid    : 16 raw bytes
//! ```
//!
//! Reads never panic: short or malformed input yields a [`DecodeError`].

use byteorder::{BigEndian, ByteOrder};
use uuid::Uuid;

use crate::error::{DecodeError, Error, Result};

/// Result type for reader operations
pub type DecodeResult<T> = std::result::Result<T, DecodeError>;

/// Append-only binary writer
#[derive(Debug, Clone, Default)]
pub struct BinaryWriter {
    buf: Vec<u8>,
}

impl BinaryWriter {
    /// Create an empty writer
    pub fn new() -> Self {
        Self { buf: Vec::new() }
    }

    /// Create a writer with pre-allocated capacity
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: Vec::with_capacity(capacity),
        }
    }

    /// Bytes written so far
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Whether nothing has been written
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Borrow the written bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    /// Consume the writer, returning its bytes
    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    /// Write a single byte
    pub fn write_u8(&mut self, value: u8) {
        self.buf.push(value);
    }

    /// Write a boolean as one byte, 0 or 1
    pub fn write_bool(&mut self, value: bool) {
        self.buf.push(value as u8);
    }

    /// Write a big-endian i16
    pub fn write_i16(&mut self, value: i16) {
        let mut b = [0u8; 2];
        BigEndian::write_i16(&mut b, value);
        self.buf.extend_from_slice(&b);
    }

    /// Write a big-endian u16
    pub fn write_u16(&mut self, value: u16) {
        let mut b = [0u8; 2];
        BigEndian::write_u16(&mut b, value);
        self.buf.extend_from_slice(&b);
    }

    /// Write a big-endian i32
    pub fn write_i32(&mut self, value: i32) {
        let mut b = [0u8; 4];
        BigEndian::write_i32(&mut b, value);
        self.buf.extend_from_slice(&b);
    }

    /// Write a big-endian i64
    pub fn write_i64(&mut self, value: i64) {
        let mut b = [0u8; 8];
        BigEndian::write_i64(&mut b, value);
        self.buf.extend_from_slice(&b);
    }

    /// Write a big-endian f32
    pub fn write_f32(&mut self, value: f32) {
        let mut b = [0u8; 4];
        BigEndian::write_f32(&mut b, value);
        self.buf.extend_from_slice(&b);
    }

    /// Write a big-endian f64
    pub fn write_f64(&mut self, value: f64) {
        let mut b = [0u8; 8];
        BigEndian::write_f64(&mut b, value);
        self.buf.extend_from_slice(&b);
    }

    /// Write a u32 as a LEB128 variable-length integer
    pub fn write_varint(&mut self, mut value: u32) {
        loop {
            let mut byte = (value & 0x7F) as u8;
            value >>= 7;
            if value != 0 {
                byte |= 0x80;
            }
            self.buf.push(byte);
            if value == 0 {
                break;
            }
        }
    }

    /// Write a u64 as a LEB128 variable-length integer
    pub fn write_varlong(&mut self, mut value: u64) {
        loop {
            let mut byte = (value & 0x7F) as u8;
            value >>= 7;
            if value != 0 {
                byte |= 0x80;
            }
            self.buf.push(byte);
            if value == 0 {
                break;
            }
        }
    }

    /// Write a collection length
    ///
    /// # Errors
    ///
    /// Returns `LengthOverflow` for lengths above `u32::MAX`. Nothing is
    /// written in that case.
    pub fn write_len(&mut self, len: usize) -> Result<()> {
        self.write_varint(encodable_len(len)?);
        Ok(())
    }

    /// Write length-prefixed raw bytes
    pub fn write_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        self.write_len(bytes.len())?;
        self.buf.extend_from_slice(bytes);
        Ok(())
    }

    /// Write raw bytes with no prefix
    pub fn write_raw(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Write a length-prefixed UTF-8 string
    pub fn write_string(&mut self, value: &str) -> Result<()> {
        self.write_bytes(value.as_bytes())
    }

    /// Write a uuid as 16 raw bytes
    pub fn write_uuid(&mut self, value: &Uuid) {
        self.buf.extend_from_slice(value.as_bytes());
    }
}

fn encodable_len(len: usize) -> Result<u32> {
    u32::try_from(len).map_err(|_| Error::LengthOverflow { len })
}

/// Cursor over a borrowed byte slice
#[derive(Debug, Clone)]
pub struct BinaryReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> BinaryReader<'a> {
    /// Create a reader positioned at the start of `data`
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Bytes not yet consumed
    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    /// Whether every byte has been consumed
    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    /// Current offset from the start of the input
    pub fn position(&self) -> usize {
        self.pos
    }

    fn take(&mut self, n: usize) -> DecodeResult<&'a [u8]> {
        if self.remaining() < n {
            return Err(DecodeError::Truncated {
                needed: n,
                remaining: self.remaining(),
            });
        }
        let slice = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    /// Read a single byte
    pub fn read_u8(&mut self) -> DecodeResult<u8> {
        Ok(self.take(1)?[0])
    }

    /// Read a boolean, rejecting bytes other than 0 and 1
    pub fn read_bool(&mut self) -> DecodeResult<bool> {
        match self.read_u8()? {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(DecodeError::Invalid(format!(
                "boolean byte must be 0 or 1, got {}",
                other
            ))),
        }
    }

    /// Read a big-endian i16
    pub fn read_i16(&mut self) -> DecodeResult<i16> {
        Ok(BigEndian::read_i16(self.take(2)?))
    }

    /// Read a big-endian u16
    pub fn read_u16(&mut self) -> DecodeResult<u16> {
        Ok(BigEndian::read_u16(self.take(2)?))
    }

    /// Read a big-endian i32
    pub fn read_i32(&mut self) -> DecodeResult<i32> {
        Ok(BigEndian::read_i32(self.take(4)?))
    }

    /// Read a big-endian i64
    pub fn read_i64(&mut self) -> DecodeResult<i64> {
        Ok(BigEndian::read_i64(self.take(8)?))
    }

    /// Read a big-endian f32
    pub fn read_f32(&mut self) -> DecodeResult<f32> {
        Ok(BigEndian::read_f32(self.take(4)?))
    }

    /// Read a big-endian f64
    pub fn read_f64(&mut self) -> DecodeResult<f64> {
        Ok(BigEndian::read_f64(self.take(8)?))
    }

    /// Read a LEB128 u32
    pub fn read_varint(&mut self) -> DecodeResult<u32> {
        let mut value: u32 = 0;
        let mut shift = 0;
        loop {
            let byte = self.read_u8()?;
            // The fifth byte only has room for the top 4 bits
            if shift == 28 && byte & 0x70 != 0 {
                return Err(DecodeError::VarIntTooLong);
            }
            value |= ((byte & 0x7F) as u32) << shift;
            if byte & 0x80 == 0 {
                return Ok(value);
            }
            shift += 7;
            if shift >= 35 {
                return Err(DecodeError::VarIntTooLong);
            }
        }
    }

    /// Read a LEB128 u64
    pub fn read_varlong(&mut self) -> DecodeResult<u64> {
        let mut value: u64 = 0;
        let mut shift = 0;
        loop {
            let byte = self.read_u8()?;
            // The tenth byte only has room for the top bit
            if shift == 63 && byte & 0x7E != 0 {
                return Err(DecodeError::VarIntTooLong);
            }
            value |= ((byte & 0x7F) as u64) << shift;
            if byte & 0x80 == 0 {
                return Ok(value);
            }
            shift += 7;
            if shift >= 70 {
                return Err(DecodeError::VarIntTooLong);
            }
        }
    }

    /// Read a collection length
    pub fn read_len(&mut self) -> DecodeResult<usize> {
        Ok(self.read_varint()? as usize)
    }

    /// Read length-prefixed bytes, borrowing from the input
    pub fn read_bytes(&mut self) -> DecodeResult<&'a [u8]> {
        let len = self.read_len()?;
        self.take(len)
    }

    /// Read exactly `n` raw bytes
    pub fn read_raw(&mut self, n: usize) -> DecodeResult<&'a [u8]> {
        self.take(n)
    }

    /// Read a length-prefixed UTF-8 string
    pub fn read_string(&mut self) -> DecodeResult<String> {
        let bytes = self.read_bytes()?;
        std::str::from_utf8(bytes)
            .map(str::to_string)
            .map_err(|_| DecodeError::InvalidUtf8)
    }

    /// Read a uuid from 16 raw bytes
    pub fn read_uuid(&mut self) -> DecodeResult<Uuid> {
        let bytes = self.take(16)?;
        let mut raw = [0u8; 16];
        raw.copy_from_slice(bytes);
        Ok(Uuid::from_bytes(raw))
    }
}
