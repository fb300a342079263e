use paste::paste;
use std::mem::size_of;

use crate::error::{ErrorCode, Result};

/// Bounds checked little endian cursor over a borrowed slice.
///
/// Every read either succeeds in full or fails with
/// [`ErrorCode::InvalidData`] without moving the cursor.
pub(crate) struct Reader<'a> {
    buffer: &'a [u8],
    index: usize,
}

macro_rules! read_byte_impl {
    ($($t:ty),*) => {
        $(paste! {
            pub fn [<read_ $t>] (&mut self) -> Result<$t> {
                let mut a = [0u8; size_of::<$t>()];
                a.copy_from_slice(self.read_bytes(size_of::<$t>())?);
                Ok(<$t>::from_le_bytes(a))
            }
        })*
    };
}

impl<'a> Reader<'a> {
    pub fn new(buffer: &'a [u8]) -> Self {
        Reader { buffer, index: 0 }
    }

    /// Bytes consumed so far.
    pub fn position(&self) -> usize {
        self.index
    }

    pub fn remaining(&self) -> usize {
        self.buffer.len() - self.index
    }

    read_byte_impl!(u8, i32, u32, i64, f64);

    pub fn read_bytes(&mut self, length: usize) -> Result<&'a [u8]> {
        if length > self.remaining() {
            fail!(ErrorCode::InvalidData);
        }
        let bytes = &self.buffer[self.index..self.index + length];
        self.index += length;
        Ok(bytes)
    }

    pub fn read_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut a = [0u8; N];
        a.copy_from_slice(self.read_bytes(N)?);
        Ok(a)
    }

    /// Reads a sequence of bytes until find a '\0' then return it as str
    pub fn read_cstring(&mut self) -> Result<&'a str> {
        let rest = &self.buffer[self.index..];
        let end = match memchr::memchr(0, rest) {
            Some(end) => end,
            None => fail!(ErrorCode::InvalidData),
        };
        let s = utf8(&rest[..end])?;
        self.index += end + 1;
        Ok(s)
    }

    /// Reads an `int32` length prefixed, nul terminated string.
    pub fn read_string(&mut self) -> Result<&'a str> {
        let start = self.index;
        let s = self.read_string_inner();
        if s.is_err() {
            self.index = start;
        }
        s
    }

    fn read_string_inner(&mut self) -> Result<&'a str> {
        let size = self.read_i32()?;
        if size < 1 {
            fail!(ErrorCode::InvalidData);
        }
        let bytes = self.read_bytes(size as usize)?;
        let (last, bytes) = match bytes.split_last() {
            Some(split) => split,
            None => fail!(ErrorCode::InvalidData),
        };
        if *last != 0 {
            fail!(ErrorCode::InvalidData);
        }
        utf8(bytes)
    }
}

pub(crate) fn utf8(bytes: &[u8]) -> Result<&str> {
    match simdutf8::basic::from_utf8(bytes) {
        Ok(s) => Ok(s),
        Err(_) => fail!(ErrorCode::InvalidData),
    }
}

/// Little endian `int32` at the start of `bytes`, if there are enough of them.
pub(crate) fn peek_i32(bytes: &[u8]) -> Option<i32> {
    let mut a = [0u8; 4];
    a.copy_from_slice(bytes.get(..4)?);
    Some(i32::from_le_bytes(a))
}

/// Size in bytes of the payload of an element tagged `tag` that starts at the
/// beginning of `data`.
///
/// Self described sizes are checked against the available bytes and against
/// their own framing (terminators, minimum lengths).
pub(crate) fn value_len(tag: u8, data: &[u8]) -> Result<usize> {
    let len = match tag {
        0x06 | 0x0A | 0x7F | 0xFF => 0,
        0x08 => 1,
        0x10 => 4,
        0x01 | 0x09 | 0x11 | 0x12 => 8,
        0x07 => 12,
        0x13 => 16,
        0x02 | 0x0D | 0x0E => {
            let mut r = Reader::new(data);
            r.read_string()?;
            r.position()
        }
        0x03 | 0x04 => document_len(data)?,
        0x05 => {
            let size = match peek_i32(data) {
                Some(size) if size >= 0 => size as usize,
                _ => fail!(ErrorCode::InvalidData),
            };
            if data.len() < 5 {
                fail!(ErrorCode::InvalidData);
            }
            // The old binary subtype repeats the length inside the payload
            if data[4] == 0x02 {
                match peek_i32(&data[5..]) {
                    Some(inner) if inner >= 0 && inner as usize + 4 == size => {}
                    _ => fail!(ErrorCode::InvalidData),
                }
            }
            5 + size
        }
        0x0B => {
            let mut r = Reader::new(data);
            r.read_cstring()?;
            r.read_cstring()?;
            r.position()
        }
        0x0C => {
            let mut r = Reader::new(data);
            r.read_string()?;
            r.read_bytes(12)?;
            r.position()
        }
        0x0F => {
            let size = match peek_i32(data) {
                Some(size) if size >= 14 => size as usize,
                _ => fail!(ErrorCode::InvalidData),
            };
            if size > data.len() {
                fail!(ErrorCode::InvalidData);
            }
            let mut r = Reader::new(&data[4..size]);
            r.read_string()?;
            let scope = document_len(&data[4 + r.position()..size])?;
            if 4 + r.position() + scope != size {
                fail!(ErrorCode::InvalidData);
            }
            size
        }
        _ => fail!(ErrorCode::InvalidData),
    };

    if len > data.len() {
        fail!(ErrorCode::InvalidData);
    }
    Ok(len)
}

/// Declared length of the embedded document at the start of `data`, checked
/// for a minimum of 5 bytes, fitting in `data` and ending with '\0'.
pub(crate) fn document_len(data: &[u8]) -> Result<usize> {
    match peek_i32(data) {
        Some(size) if size >= 5 && size as usize <= data.len() && data[size as usize - 1] == 0 => {
            Ok(size as usize)
        }
        _ => fail!(ErrorCode::InvalidData),
    }
}
