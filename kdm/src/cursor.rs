//! Little-endian cursors over container bytes.
//!
//! [Reader] walks a borrowed byte slice and reports its absolute position so callers can record
//! where pointers and sections live. [Writer] appends to a growable buffer and can overwrite a
//! previously written word once its final value is known.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use thiserror::Error;

/// Error returned when a read runs past the end of the input.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("end of buffer at {offset:#x}: need {need} bytes, have {have}")]
    EndOfBuffer {
        offset: usize,
        need: usize,
        have: usize,
    },
}

/// Reads little-endian values from a byte slice while tracking the absolute offset.
#[derive(Clone, Debug)]
pub struct Reader<'a> {
    data: &'a [u8],
    buf: &'a [u8],
}

impl<'a> Reader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, buf: data }
    }

    /// Absolute offset of the next byte to be read.
    pub fn position(&self) -> usize {
        self.data.len() - self.buf.len()
    }

    pub fn remaining(&self) -> usize {
        self.buf.remaining()
    }

    pub fn is_empty(&self) -> bool {
        !self.buf.has_remaining()
    }

    /// Moves the cursor to an absolute offset.
    pub fn seek(&mut self, offset: usize) -> Result<(), Error> {
        if offset > self.data.len() {
            return Err(Error::EndOfBuffer {
                offset: self.position(),
                need: offset - self.position(),
                have: self.remaining(),
            });
        }
        self.buf = &self.data[offset..];
        Ok(())
    }

    fn ensure(&self, need: usize) -> Result<(), Error> {
        if self.buf.remaining() < need {
            return Err(Error::EndOfBuffer {
                offset: self.position(),
                need,
                have: self.buf.remaining(),
            });
        }
        Ok(())
    }

    pub fn skip(&mut self, len: usize) -> Result<(), Error> {
        self.ensure(len)?;
        self.buf.advance(len);
        Ok(())
    }

    pub fn read_u8(&mut self) -> Result<u8, Error> {
        self.ensure(1)?;
        Ok(self.buf.get_u8())
    }

    pub fn read_u16(&mut self) -> Result<u16, Error> {
        self.ensure(2)?;
        Ok(self.buf.get_u16_le())
    }

    pub fn read_i16(&mut self) -> Result<i16, Error> {
        self.ensure(2)?;
        Ok(self.buf.get_i16_le())
    }

    pub fn read_u32(&mut self) -> Result<u32, Error> {
        self.ensure(4)?;
        Ok(self.buf.get_u32_le())
    }

    pub fn read_i32(&mut self) -> Result<i32, Error> {
        self.ensure(4)?;
        Ok(self.buf.get_i32_le())
    }

    pub fn read_f32(&mut self) -> Result<f32, Error> {
        self.ensure(4)?;
        Ok(self.buf.get_f32_le())
    }

    pub fn read_bytes(&mut self, len: usize) -> Result<&'a [u8], Error> {
        self.ensure(len)?;
        let (bytes, rest) = self.buf.split_at(len);
        self.buf = rest;
        Ok(bytes)
    }

    /// Reads bytes up to (and consumes) the next NUL. The terminator is not returned.
    pub fn read_cstring(&mut self) -> Result<&'a [u8], Error> {
        let end = self
            .buf
            .iter()
            .position(|&b| b == 0)
            .ok_or(Error::EndOfBuffer {
                offset: self.position(),
                need: self.buf.len() + 1,
                have: self.buf.len(),
            })?;
        let bytes = &self.buf[..end];
        self.buf = &self.buf[end + 1..];
        Ok(bytes)
    }
}

/// Appends little-endian values to a growable buffer.
#[derive(Debug, Default)]
pub struct Writer {
    buf: BytesMut,
}

impl Writer {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: BytesMut::with_capacity(capacity),
        }
    }

    /// Offset at which the next value will be written.
    pub fn position(&self) -> usize {
        self.buf.len()
    }

    pub fn write_u8(&mut self, value: u8) {
        self.buf.put_u8(value);
    }

    pub fn write_u16(&mut self, value: u16) {
        self.buf.put_u16_le(value);
    }

    pub fn write_i16(&mut self, value: i16) {
        self.buf.put_i16_le(value);
    }

    pub fn write_u32(&mut self, value: u32) {
        self.buf.put_u32_le(value);
    }

    pub fn write_i32(&mut self, value: i32) {
        self.buf.put_i32_le(value);
    }

    pub fn write_f32(&mut self, value: f32) {
        self.buf.put_f32_le(value);
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.buf.put_slice(bytes);
    }

    /// Pads with zeros until the position is a multiple of `alignment`.
    pub fn align(&mut self, alignment: usize) {
        let padding = (alignment - self.position() % alignment) % alignment;
        self.buf.put_bytes(0, padding);
    }

    /// Overwrites a word that was already written at `offset`.
    ///
    /// Panics if the word lies outside of what has been written so far.
    pub fn patch_u32(&mut self, offset: usize, value: u32) {
        self.buf[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
    }

    pub fn freeze(self) -> Bytes {
        self.buf.freeze()
    }
}
