//! Binary vectors: packed arrays of numbers stored as binary subtype `0x09`.
//!
//! The payload starts with a format byte and a padding byte, followed by the
//! elements back to back:
//!
//! - [`Int8`] (`0x03`): one signed byte per element.
//! - [`Float32`] (`0x27`): little endian `f32`s.
//! - [`PackedBit`] (`0x10`): one bit per element, most significant bit first.
//!   The padding byte counts the unused low bits of the last byte, which must
//!   be zero.
//!
//! ```rust
//! use bsonbuf::vector::{Float32, PackedBit};
//! use bsonbuf::Core;
//!
//! let mut core = Core::new(false);
//! core.key_view("embedding")?.append_vector_from::<Float32>(&[0.5, -1.0])?;
//! core.key_view("flags")?;
//! let mut flags = core.append_vector::<PackedBit>(3)?;
//! flags.set(0, true)?;
//! flags.set(2, true)?;
//!
//! let doc = core.extract_document()?;
//! let flags = doc.view().get("flags")?.get_vector::<PackedBit>()?;
//! assert_eq!(flags.iter().collect::<Vec<_>>(), [true, false, true]);
//! assert_eq!(doc.view().get("embedding")?.get_vector::<Float32>()?.get(1)?, -1.0);
//! # Ok::<(), Box<dyn std::error::Error + Send + Sync>>(())
//! ```

use std::fmt;
use std::iter::FusedIterator;
use std::marker::PhantomData;

use crate::builder::Core;
use crate::error::{ErrorCode, Result};
use crate::types::{Binary, BinarySubtype, ElementType};

/// Size of the format and padding bytes.
const HEADER_LEN: usize = 2;

/// Element encoding of a vector.
pub trait Format: Copy + fmt::Debug {
    type Element: Copy + fmt::Debug;

    /// Format byte of the header.
    const HEADER: u8;

    const NAME: &'static str;

    /// Number of elements held by `data`, the bytes after the header, or
    /// `None` if `data` and `padding` do not describe a valid vector.
    fn count(data: &[u8], padding: u8) -> Option<usize>;

    /// Bytes after the header and padding byte needed for `count` elements.
    fn layout(count: usize) -> Option<(usize, u8)>;

    fn read(data: &[u8], index: usize) -> Self::Element;

    fn write(data: &mut [u8], index: usize, value: Self::Element);
}

/// Signed bytes.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Int8;

/// Little endian single precision floats.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Float32;

/// Single bits, most significant bit of each byte first.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct PackedBit;

impl Format for Int8 {
    type Element = i8;
    const HEADER: u8 = 0x03;
    const NAME: &'static str = "int8";

    fn count(data: &[u8], padding: u8) -> Option<usize> {
        (padding == 0).then_some(data.len())
    }

    fn layout(count: usize) -> Option<(usize, u8)> {
        Some((count, 0))
    }

    fn read(data: &[u8], index: usize) -> i8 {
        data[index] as i8
    }

    fn write(data: &mut [u8], index: usize, value: i8) {
        data[index] = value as u8;
    }
}

impl Format for Float32 {
    type Element = f32;
    const HEADER: u8 = 0x27;
    const NAME: &'static str = "float32";

    fn count(data: &[u8], padding: u8) -> Option<usize> {
        (padding == 0 && data.len() % 4 == 0).then_some(data.len() / 4)
    }

    fn layout(count: usize) -> Option<(usize, u8)> {
        Some((count.checked_mul(4)?, 0))
    }

    fn read(data: &[u8], index: usize) -> f32 {
        let mut b = [0u8; 4];
        b.copy_from_slice(&data[index * 4..index * 4 + 4]);
        f32::from_le_bytes(b)
    }

    fn write(data: &mut [u8], index: usize, value: f32) {
        data[index * 4..index * 4 + 4].copy_from_slice(&value.to_le_bytes());
    }
}

impl Format for PackedBit {
    type Element = bool;
    const HEADER: u8 = 0x10;
    const NAME: &'static str = "packed_bit";

    fn count(data: &[u8], padding: u8) -> Option<usize> {
        if padding > 7 {
            return None;
        }
        match data.last() {
            None => (padding == 0).then_some(0),
            Some(last) => {
                let unused = !(0xFFu8 << padding);
                (last & unused == 0).then(|| data.len() * 8 - padding as usize)
            }
        }
    }

    fn layout(count: usize) -> Option<(usize, u8)> {
        let bytes = count / 8 + (count % 8 != 0) as usize;
        Some((bytes, ((8 - count % 8) % 8) as u8))
    }

    fn read(data: &[u8], index: usize) -> bool {
        data[index / 8] & (0x80 >> (index % 8)) != 0
    }

    fn write(data: &mut [u8], index: usize, value: bool) {
        let bit = 0x80 >> (index % 8);
        if value {
            data[index / 8] |= bit;
        } else {
            data[index / 8] &= !bit;
        }
    }
}

/// Element count of a vector payload, header included.
fn element_count<F: Format>(bytes: &[u8]) -> Result<usize> {
    if bytes.len() < HEADER_LEN || bytes[0] != F::HEADER {
        log::debug!("expected {} vector header, got {:02x?}", F::NAME, bytes.get(..HEADER_LEN));
        fail!(ErrorCode::InvalidVector);
    }
    match F::count(&bytes[HEADER_LEN..], bytes[1]) {
        Some(len) => Ok(len),
        None => fail!(ErrorCode::InvalidVector),
    }
}

/// Read-only typed view over the payload of a binary vector.
#[derive(Copy, Clone)]
pub struct View<'a, F: Format> {
    data: &'a [u8],
    len: usize,
    format: PhantomData<F>,
}

impl<'a, F: Format> View<'a, F> {
    /// Checks that `binary` is a well-formed vector of format `F`.
    ///
    /// Fails with [`InvalidVector`](ErrorCode::InvalidVector) if the subtype
    /// is not [`BinarySubtype::Vector`], the header names another format or
    /// the payload does not fit the format.
    pub fn new(binary: Binary<'a>) -> Result<Self> {
        if binary.subtype != BinarySubtype::Vector {
            fail!(ErrorCode::InvalidVector);
        }
        Self::from_payload(binary.bytes)
    }

    /// Like [`new`](View::new) over the bytes of a binary value, header
    /// included.
    pub fn from_payload(bytes: &'a [u8]) -> Result<Self> {
        let len = element_count::<F>(bytes)?;
        Ok(View {
            data: &bytes[HEADER_LEN..],
            len,
            format: PhantomData,
        })
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn get(&self, index: usize) -> Result<F::Element> {
        if index >= self.len {
            fail!(ErrorCode::VectorOutOfRange);
        }
        Ok(F::read(self.data, index))
    }

    pub fn iter(&self) -> Iter<'a, F> {
        Iter {
            view: *self,
            index: 0,
        }
    }
}

impl<'a, F: Format> fmt::Debug for View<'a, F> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

impl<'a, F: Format> IntoIterator for View<'a, F> {
    type Item = F::Element;
    type IntoIter = Iter<'a, F>;

    fn into_iter(self) -> Iter<'a, F> {
        self.iter()
    }
}

pub struct Iter<'a, F: Format> {
    view: View<'a, F>,
    index: usize,
}

impl<'a, F: Format> Iterator for Iter<'a, F> {
    type Item = F::Element;

    fn next(&mut self) -> Option<F::Element> {
        if self.index >= self.view.len {
            return None;
        }
        let value = F::read(self.view.data, self.index);
        self.index += 1;
        Some(value)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = self.view.len - self.index;
        (n, Some(n))
    }
}

impl<'a, F: Format> ExactSizeIterator for Iter<'a, F> {}

impl<'a, F: Format> FusedIterator for Iter<'a, F> {}

/// Writable typed view over a vector payload, such as the one lent out by
/// [`Core::append_vector`].
pub struct ViewMut<'a, F: Format> {
    data: &'a mut [u8],
    len: usize,
    format: PhantomData<F>,
}

impl<'a, F: Format> ViewMut<'a, F> {
    /// Checks the header and payload like [`View::from_payload`].
    pub fn from_payload(bytes: &'a mut [u8]) -> Result<Self> {
        let len = element_count::<F>(bytes)?;
        Ok(ViewMut {
            data: &mut bytes[HEADER_LEN..],
            len,
            format: PhantomData,
        })
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn get(&self, index: usize) -> Result<F::Element> {
        self.as_view().get(index)
    }

    /// Overwrites element `index`. Padding bits are never touched.
    pub fn set(&mut self, index: usize, value: F::Element) -> Result<()> {
        if index >= self.len {
            fail!(ErrorCode::VectorOutOfRange);
        }
        F::write(self.data, index, value);
        Ok(())
    }

    pub fn as_view(&self) -> View<'_, F> {
        View {
            data: &self.data[..],
            len: self.len,
            format: PhantomData,
        }
    }
}

impl<'k> Core<'k> {
    /// Appends a vector of `len` zeroed elements and lends it out to be
    /// filled in place.
    pub fn append_vector<F: Format>(&mut self, len: usize) -> Result<ViewMut<'_, F>> {
        let (size, padding) = match F::layout(len).and_then(|(n, p)| Some((n.checked_add(HEADER_LEN)?, p))) {
            Some(layout) => layout,
            None => fail!(ErrorCode::CannotAppend(ElementType::Binary)),
        };

        let bytes = self.append_binary_uninit(BinarySubtype::Vector, size)?;
        bytes[0] = F::HEADER;
        bytes[1] = padding;
        Ok(ViewMut {
            data: &mut bytes[HEADER_LEN..],
            len,
            format: PhantomData,
        })
    }

    /// Appends a vector holding a copy of `values`.
    pub fn append_vector_from<F: Format>(&mut self, values: &[F::Element]) -> Result<&mut Self> {
        let mut vector = self.append_vector::<F>(values.len())?;
        for (i, value) in values.iter().enumerate() {
            vector.set(i, *value)?;
        }
        Ok(self)
    }
}
