//! Payload readers and writers.
//!
//! All integers are little-endian. Strings are a one-byte length followed by
//! UTF-8 bytes. The reader is bounded to one payload: asking for more bytes
//! than remain yields [`DecodeError::Truncated`], never a read of adjacent
//! memory or a panic.

use bytes::{Buf, BufMut, BytesMut};

use crate::constants::MAX_STRING_LEN;
use crate::error::{DecodeError, EncodeError};

/// Bounded little-endian reader over one message payload.
#[derive(Debug, Clone)]
pub struct MessageReader<'a> {
    buf: &'a [u8],
    consumed: usize,
}

impl<'a> MessageReader<'a> {
    /// Create a reader over a payload.
    pub fn new(payload: &'a [u8]) -> Self {
        MessageReader {
            buf: payload,
            consumed: 0,
        }
    }

    /// Bytes not yet read.
    pub fn remaining(&self) -> usize {
        self.buf.remaining()
    }

    /// Whether every byte has been read.
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Bytes read so far.
    pub fn position(&self) -> usize {
        self.consumed
    }

    /// The unread tail, without consuming it.
    pub fn peek_rest(&self) -> &'a [u8] {
        self.buf
    }

    fn ensure(&self, needed: usize) -> Result<(), DecodeError> {
        if self.buf.remaining() < needed {
            return Err(DecodeError::Truncated {
                needed,
                remaining: self.buf.remaining(),
            });
        }
        Ok(())
    }

    /// Read one byte.
    pub fn read_u8(&mut self) -> Result<u8, DecodeError> {
        self.ensure(1)?;
        self.consumed += 1;
        Ok(self.buf.get_u8())
    }

    /// Read a boolean encoded as one byte (non-zero is true).
    pub fn read_bool(&mut self) -> Result<bool, DecodeError> {
        Ok(self.read_u8()? != 0)
    }

    /// Read a 2-byte integer.
    pub fn read_u16(&mut self) -> Result<u16, DecodeError> {
        self.ensure(2)?;
        self.consumed += 2;
        Ok(self.buf.get_u16_le())
    }

    /// Read a 4-byte integer.
    pub fn read_u32(&mut self) -> Result<u32, DecodeError> {
        self.ensure(4)?;
        self.consumed += 4;
        Ok(self.buf.get_u32_le())
    }

    /// Read a signed 4-byte integer.
    pub fn read_i32(&mut self) -> Result<i32, DecodeError> {
        self.ensure(4)?;
        self.consumed += 4;
        Ok(self.buf.get_i32_le())
    }

    /// Read an 8-byte integer.
    pub fn read_u64(&mut self) -> Result<u64, DecodeError> {
        self.ensure(8)?;
        self.consumed += 8;
        Ok(self.buf.get_u64_le())
    }

    /// Read `len` raw bytes.
    pub fn read_bytes(&mut self, len: usize) -> Result<Vec<u8>, DecodeError> {
        self.ensure(len)?;
        let (head, tail) = self.buf.split_at(len);
        self.buf = tail;
        self.consumed += len;
        Ok(head.to_vec())
    }

    /// Read every remaining byte.
    pub fn read_rest(&mut self) -> Vec<u8> {
        let rest = self.buf.to_vec();
        self.consumed += rest.len();
        self.buf = &[];
        rest
    }

    /// Read a length-prefixed UTF-8 string.
    pub fn read_string(&mut self) -> Result<String, DecodeError> {
        let len = self.read_u8()? as usize;
        self.read_utf8(len)
    }

    /// Read `len` bytes as UTF-8.
    pub fn read_utf8(&mut self, len: usize) -> Result<String, DecodeError> {
        let bytes = self.read_bytes(len)?;
        String::from_utf8(bytes).map_err(|_| DecodeError::InvalidUtf8)
    }
}

/// Little-endian writer for one message payload.
#[derive(Debug, Default)]
pub struct MessageWriter {
    buf: BytesMut,
}

impl MessageWriter {
    /// Create an empty writer.
    pub fn new() -> Self {
        MessageWriter {
            buf: BytesMut::with_capacity(64),
        }
    }

    /// Bytes written so far.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Whether nothing has been written.
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Write one byte.
    pub fn write_u8(&mut self, value: u8) {
        self.buf.put_u8(value);
    }

    /// Write a boolean as one byte.
    pub fn write_bool(&mut self, value: bool) {
        self.buf.put_u8(u8::from(value));
    }

    /// Write a 2-byte integer.
    pub fn write_u16(&mut self, value: u16) {
        self.buf.put_u16_le(value);
    }

    /// Write a 4-byte integer.
    pub fn write_u32(&mut self, value: u32) {
        self.buf.put_u32_le(value);
    }

    /// Write a signed 4-byte integer.
    pub fn write_i32(&mut self, value: i32) {
        self.buf.put_i32_le(value);
    }

    /// Write an 8-byte integer.
    pub fn write_u64(&mut self, value: u64) {
        self.buf.put_u64_le(value);
    }

    /// Write raw bytes.
    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.buf.put_slice(bytes);
    }

    /// Write a length-prefixed UTF-8 string. Rejects strings over 255 bytes.
    pub fn write_string(&mut self, value: &str) -> Result<(), EncodeError> {
        let bytes = value.as_bytes();
        if bytes.len() > MAX_STRING_LEN {
            return Err(EncodeError::StringTooLong { len: bytes.len() });
        }
        self.buf.put_u8(bytes.len() as u8);
        self.buf.put_slice(bytes);
        Ok(())
    }

    /// Write a one-byte count, rejecting lists longer than 255.
    pub fn write_count(&mut self, count: usize) -> Result<(), EncodeError> {
        let count = u8::try_from(count).map_err(|_| EncodeError::TooManyEntries {
            count,
            max: u8::MAX as usize,
        })?;
        self.buf.put_u8(count);
        Ok(())
    }

    /// Finish and return the payload.
    pub fn into_bytes(self) -> Vec<u8> {
        self.buf.to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reader_little_endian() {
        let data = [0x01, 0x34, 0x12, 0x78, 0x56, 0x34, 0x12];
        let mut reader = MessageReader::new(&data);
        assert_eq!(reader.read_u8().unwrap(), 0x01);
        assert_eq!(reader.read_u16().unwrap(), 0x1234);
        assert_eq!(reader.read_u32().unwrap(), 0x12345678);
        assert!(reader.is_empty());
        assert_eq!(reader.position(), 7);
    }

    #[test]
    fn test_reader_fails_fast_past_boundary() {
        let data = [0x01, 0x02, 0x03];
        let mut reader = MessageReader::new(&data);
        assert_eq!(
            reader.read_u32(),
            Err(DecodeError::Truncated {
                needed: 4,
                remaining: 3
            })
        );
        // A failed read consumes nothing.
        assert_eq!(reader.remaining(), 3);
        assert_eq!(reader.read_u16().unwrap(), 0x0201);
    }

    #[test]
    fn test_string_declared_longer_than_payload() {
        let data = [0x05, b'a', b'b'];
        let mut reader = MessageReader::new(&data);
        assert!(matches!(
            reader.read_string(),
            Err(DecodeError::Truncated { needed: 5, .. })
        ));
    }

    #[test]
    fn test_invalid_utf8() {
        let data = [0x02, 0xC3, 0x28];
        let mut reader = MessageReader::new(&data);
        assert_eq!(reader.read_string(), Err(DecodeError::InvalidUtf8));
    }

    #[test]
    fn test_writer_string_limit() {
        let mut writer = MessageWriter::new();
        writer.write_string("EN_US").unwrap();
        assert_eq!(writer.into_bytes(), vec![5, b'E', b'N', b'_', b'U', b'S']);

        let mut writer = MessageWriter::new();
        let long = "x".repeat(256);
        assert_eq!(
            writer.write_string(&long),
            Err(EncodeError::StringTooLong { len: 256 })
        );
        assert!(writer.is_empty());
    }

    #[test]
    fn test_writer_count_limit() {
        let mut writer = MessageWriter::new();
        assert!(writer.write_count(255).is_ok());
        assert!(matches!(
            writer.write_count(256),
            Err(EncodeError::TooManyEntries { count: 256, .. })
        ));
    }
}
