use byteorder::{LE, ReadBytesExt, WriteBytesExt};
use encoding::all::ISO_8859_1;
use encoding::{DecoderTrap, EncoderTrap, Encoding};
use std::io::{Cursor, Read, Seek, SeekFrom, Write};

use crate::error::{FormatError, Result};

/// Positionable, growable little-endian byte buffer.
///
/// Reads check the remaining length up front so a short buffer reports the
/// offset it failed at instead of a bare EOF.
#[derive(Debug, Default, Clone)]
pub struct ByteCursor {
    inner: Cursor<Vec<u8>>,
}

impl ByteCursor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            inner: Cursor::new(Vec::with_capacity(capacity)),
        }
    }

    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self {
            inner: Cursor::new(bytes),
        }
    }

    pub fn position(&self) -> u64 {
        self.inner.position()
    }

    pub fn set_position(&mut self, position: u64) {
        self.inner.set_position(position);
    }

    pub fn len(&self) -> usize {
        self.inner.get_ref().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.get_ref().is_empty()
    }

    pub fn remaining(&self) -> usize {
        self.len().saturating_sub(self.position() as usize)
    }

    pub fn as_slice(&self) -> &[u8] {
        self.inner.get_ref()
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.inner.into_inner()
    }

    fn ensure(&self, needed: usize) -> Result<()> {
        let available = self.remaining();
        if available < needed {
            return Err(FormatError::UnexpectedEof {
                offset: self.position(),
                needed,
                available,
            });
        }
        Ok(())
    }

    pub fn skip(&mut self, count: usize) -> Result<()> {
        self.ensure(count)?;
        self.inner.seek(SeekFrom::Current(count as i64))?;
        Ok(())
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        self.ensure(1)?;
        Ok(self.inner.read_u8()?)
    }

    pub fn read_i8(&mut self) -> Result<i8> {
        self.ensure(1)?;
        Ok(self.inner.read_i8()?)
    }

    pub fn read_u16(&mut self) -> Result<u16> {
        self.ensure(2)?;
        Ok(self.inner.read_u16::<LE>()?)
    }

    pub fn read_i16(&mut self) -> Result<i16> {
        self.ensure(2)?;
        Ok(self.inner.read_i16::<LE>()?)
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        self.ensure(4)?;
        Ok(self.inner.read_u32::<LE>()?)
    }

    pub fn read_i32(&mut self) -> Result<i32> {
        self.ensure(4)?;
        Ok(self.inner.read_i32::<LE>()?)
    }

    pub fn read_bytes(&mut self, count: usize) -> Result<Vec<u8>> {
        self.ensure(count)?;
        let mut buf = vec![0u8; count];
        self.inner.read_exact(&mut buf)?;
        Ok(buf)
    }

    /// Reads a u16 length-prefixed Latin-1 string.
    pub fn read_string(&mut self) -> Result<String> {
        let len = self.read_u16()? as usize;
        let bytes = self.read_bytes(len)?;
        ISO_8859_1
            .decode(&bytes, DecoderTrap::Replace)
            .map_err(|e| FormatError::InvalidString(e.into_owned()))
    }

    pub fn write_u8(&mut self, value: u8) {
        // Writes into a Vec-backed cursor cannot fail.
        let _ = self.inner.write_u8(value);
    }

    pub fn write_i8(&mut self, value: i8) {
        let _ = self.inner.write_i8(value);
    }

    pub fn write_u16(&mut self, value: u16) {
        let _ = self.inner.write_u16::<LE>(value);
    }

    pub fn write_i16(&mut self, value: i16) {
        let _ = self.inner.write_i16::<LE>(value);
    }

    pub fn write_u32(&mut self, value: u32) {
        let _ = self.inner.write_u32::<LE>(value);
    }

    pub fn write_i32(&mut self, value: i32) {
        let _ = self.inner.write_i32::<LE>(value);
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) {
        let _ = self.inner.write_all(bytes);
    }

    /// Writes a u16 length-prefixed Latin-1 string.
    pub fn write_string(&mut self, value: &str) -> Result<()> {
        let bytes = ISO_8859_1
            .encode(value, EncoderTrap::Strict)
            .map_err(|e| FormatError::InvalidString(e.into_owned()))?;
        if bytes.len() > u16::MAX as usize {
            return Err(FormatError::InvalidString(format!(
                "string of {} bytes exceeds the u16 length prefix",
                bytes.len()
            )));
        }
        self.write_u16(bytes.len() as u16);
        self.write_bytes(&bytes);
        Ok(())
    }
}
