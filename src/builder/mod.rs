//! Incremental construction of BSON documents and arrays.
//!
//! [`Core`] writes straight into a single [`Buffer`], keeping a stack of the
//! documents and arrays still open. Each frame remembers where its length
//! prefix lives; the prefix is written as a placeholder when the frame opens
//! and patched in place when it closes.
//!
//! ```rust
//! use bsonbuf::builder::Core;
//!
//! let mut core = Core::new(false);
//! core.key_view("x")?.append(1)?;
//! core.key_view("y")?.open_array()?.append("a")?.append("b")?.close_array()?;
//!
//! let doc = core.extract_document()?;
//! assert_eq!(doc.view().get("x")?.get_int32()?, 1);
//! assert_eq!(doc.view().get("y")?.at(1)?.get_utf8()?, "b");
//! # Ok::<(), Box<dyn std::error::Error + Send + Sync>>(())
//! ```

use std::borrow::Cow;

use crate::array;
use crate::buffer::Buffer;
use crate::document;
use crate::error::{ErrorCode, Result};
use crate::owned::OwnedBytes;
use crate::reader;
use crate::types::{BinarySubtype, BsonRef, ElementType};

pub mod stream;

/// An open document or array and the offset of its length prefix.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Layer {
    Document(usize),
    Array(usize, u32),
}

/// Runtime checked BSON builder.
///
/// Every operation either succeeds or fails with an [`ErrorCode`] and no
/// effect at all, so a builder that reported an error can keep being used.
///
/// Keys set with [`key_view`](Core::key_view) are borrowed for `'k` and only
/// read when the paired value is written.
pub struct Core<'k> {
    buffer: Buffer,
    top: Layer,
    parents: Vec<Layer>,
    key: Option<Cow<'k, str>>,
    root_is_array: bool,
    sealed: bool,
}

impl<'k> Core<'k> {
    /// Starts an empty document, or an empty array when `is_array`.
    pub fn new(is_array: bool) -> Self {
        Self::with_capacity(is_array, 0)
    }

    /// Like [`new`](Core::new) with room for `bytes` bytes up front.
    pub fn with_capacity(is_array: bool, bytes: usize) -> Self {
        let mut core = Core {
            buffer: Buffer::with_capacity(bytes.max(5)),
            top: Layer::Document(0),
            parents: vec![],
            key: None,
            root_is_array: is_array,
            sealed: false,
        };
        core.reinit();
        core
    }

    fn reinit(&mut self) {
        self.buffer.clear();
        self.buffer.write_i32(0);
        self.top = if self.root_is_array {
            Layer::Array(0, 0)
        } else {
            Layer::Document(0)
        };
        self.parents.clear();
        self.key = None;
        self.sealed = false;
    }

    /// Whether the root is an array.
    pub fn is_array(&self) -> bool {
        self.root_is_array
    }

    /// Number of open frames, the root included.
    pub fn depth(&self) -> usize {
        self.parents.len() + 1
    }

    /// Bytes written so far.
    pub fn len(&self) -> usize {
        if self.sealed {
            self.buffer.len() - 1
        } else {
            self.buffer.len()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 4
    }

    /// Whether a key is waiting for its value.
    pub fn has_key(&self) -> bool {
        self.key.is_some()
    }

    /// Sets the key of the next element, borrowing it until that element is
    /// written.
    pub fn key_view(&mut self, key: &'k str) -> Result<&mut Self> {
        self.set_key(Cow::Borrowed(key))
    }

    /// Sets the key of the next element, copying it.
    pub fn key_owned(&mut self, key: impl Into<String>) -> Result<&mut Self> {
        self.set_key(Cow::Owned(key.into()))
    }

    fn set_key(&mut self, key: Cow<'k, str>) -> Result<&mut Self> {
        if let Layer::Array(..) = self.top {
            fail!(ErrorCode::CannotAppendKeyInSubArray);
        }
        if self.key.is_some() {
            fail!(ErrorCode::UnmatchedKeyInBuilder);
        }
        self.key = Some(key);
        Ok(self)
    }

    /// Writes `value` under the pending key, or under the next index inside an
    /// array.
    pub fn append<'v>(&mut self, value: impl Into<BsonRef<'v>>) -> Result<&mut Self> {
        let value = value.into();
        let ty = value.element_type();
        self.check_key(ty)?;

        self.unseal();
        let mark = self.buffer.len();
        self.write_header(ty);
        if let Err(e) = write_value(&mut self.buffer, &value) {
            self.buffer.truncate(mark);
            return Err(e);
        }
        self.commit();
        Ok(self)
    }

    /// Appends a binary value of `len` zero bytes and lends them out so the
    /// payload can be written in place.
    pub fn append_binary_uninit(&mut self, subtype: BinarySubtype, len: usize) -> Result<&mut [u8]> {
        let ty = ElementType::Binary;
        self.check_key(ty)?;

        self.unseal();
        let mark = self.buffer.len();
        self.write_header(ty);
        if let Err(e) = write_binary_header(&mut self.buffer, subtype, len) {
            self.buffer.truncate(mark);
            return Err(e);
        }
        let start = self.buffer.len();
        self.buffer.extend_zeroed(len);
        self.commit();
        Ok(&mut self.buffer.as_mut_slice()[start..])
    }

    pub fn open_document(&mut self) -> Result<&mut Self> {
        let start = self.open(ElementType::Document)?;
        self.top = Layer::Document(start);
        Ok(self)
    }

    pub fn open_array(&mut self) -> Result<&mut Self> {
        let start = self.open(ElementType::Array)?;
        self.top = Layer::Array(start, 0);
        Ok(self)
    }

    fn open(&mut self, ty: ElementType) -> Result<usize> {
        self.check_key(ty)?;
        self.unseal();
        self.write_header(ty);
        let start = self.buffer.len();
        self.buffer.write_i32(0);
        self.commit();
        self.parents.push(self.top);
        Ok(start)
    }

    pub fn close_document(&mut self) -> Result<&mut Self> {
        let start = match self.top {
            Layer::Array(..) => fail!(ErrorCode::CannotCloseDocumentInSubArray),
            Layer::Document(start) => start,
        };
        self.close(start, ErrorCode::NoDocumentToClose)
    }

    pub fn close_array(&mut self) -> Result<&mut Self> {
        let start = match self.top {
            Layer::Document(_) => fail!(ErrorCode::CannotCloseArrayInSubDocument),
            Layer::Array(start, _) => start,
        };
        self.close(start, ErrorCode::NoArrayToClose)
    }

    fn close(&mut self, start: usize, at_root: ErrorCode) -> Result<&mut Self> {
        let parent = match self.parents.last() {
            Some(parent) => *parent,
            None => fail!(at_root),
        };
        if self.key.is_some() {
            fail!(ErrorCode::UnmatchedKeyInBuilder);
        }
        self.unseal();
        self.finish(start);
        self.parents.pop();
        self.top = parent;
        Ok(self)
    }

    /// Appends every element of `view` to the innermost frame. Inside an
    /// array the elements are renumbered.
    pub fn concatenate(&mut self, view: document::View) -> Result<&mut Self> {
        if self.key.is_some() {
            fail!(ErrorCode::UnmatchedKeyInBuilder);
        }

        let mut elements = Vec::new();
        for element in view.iter() {
            match element {
                Ok(element) => elements.push(element),
                Err(_) => fail!(ErrorCode::CannotAppend(ElementType::Document)),
            }
        }

        self.unseal();
        match self.top {
            Layer::Document(_) => {
                if let Some(len) = reader::peek_i32(view.data()) {
                    self.buffer.extend_from_slice(&view.data()[4..len as usize - 1]);
                }
            }
            Layer::Array(start, index) => {
                for (i, element) in elements.iter().enumerate() {
                    let raw = element.raw_value()?;
                    self.buffer.write_u8(element.raw()[element.offset()]);
                    self.buffer.write_cstr(itoa::Buffer::new().format(index + i as u32));
                    self.buffer.extend_from_slice(raw);
                }
                self.top = Layer::Array(start, index + elements.len() as u32);
            }
        }
        Ok(self)
    }

    /// Borrows the document built so far. Only possible with no frame above
    /// the root open and no key pending; appending may continue afterwards.
    pub fn view_document(&mut self) -> Result<document::View<'_>> {
        self.check_viewable()?;
        if self.root_is_array {
            fail!(ErrorCode::CannotPerformDocumentOperationOnArray);
        }
        self.seal();
        Ok(document::View::new(self.buffer.as_slice()))
    }

    /// Borrows the array built so far, see [`view_document`](Core::view_document).
    pub fn view_array(&mut self) -> Result<array::View<'_>> {
        self.check_viewable()?;
        if !self.root_is_array {
            fail!(ErrorCode::CannotPerformArrayOperationOnDocument);
        }
        self.seal();
        Ok(array::View::new(self.buffer.as_slice()))
    }

    /// Finishes the root document and hands over its buffer. The builder is
    /// left empty, ready for a new document.
    pub fn extract_document(&mut self) -> Result<document::Value> {
        self.check_viewable()?;
        if self.root_is_array {
            fail!(ErrorCode::CannotPerformDocumentOperationOnArray);
        }
        Ok(document::Value::from_owned(self.steal()))
    }

    /// Finishes the root array and hands over its buffer.
    pub fn extract_array(&mut self) -> Result<array::Value> {
        self.check_viewable()?;
        if !self.root_is_array {
            fail!(ErrorCode::CannotPerformArrayOperationOnDocument);
        }
        Ok(array::Value::from_owned(self.steal()))
    }

    /// Drops everything written, keeping the allocation.
    pub fn clear(&mut self) {
        log::trace!("clearing builder of {} bytes", self.len());
        self.reinit();
    }

    fn steal(&mut self) -> OwnedBytes {
        self.seal();
        let capacity = self.buffer.capacity();
        let buffer = std::mem::replace(&mut self.buffer, Buffer::with_capacity(capacity.min(64)));
        log::trace!("extracting {} bytes", buffer.len());
        self.reinit();
        OwnedBytes::from_buffer(buffer)
    }

    fn check_viewable(&self) -> Result<()> {
        if !self.parents.is_empty() || self.key.is_some() {
            fail!(ErrorCode::UnmatchedKeyInBuilder);
        }
        Ok(())
    }

    fn check_key(&self, ty: ElementType) -> Result<()> {
        if let Layer::Document(_) = self.top {
            match &self.key {
                None => fail!(ErrorCode::NeedKey),
                Some(key) if memchr::memchr(0, key.as_bytes()).is_some() => {
                    fail!(ErrorCode::CannotAppend(ty))
                }
                Some(_) => {}
            }
        }
        Ok(())
    }

    fn write_header(&mut self, ty: ElementType) {
        self.buffer.write_u8(ty as u8);
        match self.top {
            Layer::Array(_, index) => self.buffer.write_cstr(itoa::Buffer::new().format(index)),
            Layer::Document(_) => self.buffer.write_cstr(self.key.as_deref().unwrap_or_default()),
        }
    }

    fn commit(&mut self) {
        match &mut self.top {
            Layer::Array(_, index) => *index += 1,
            Layer::Document(_) => self.key = None,
        }
    }

    // End frame starting at some index
    fn finish(&mut self, start: usize) {
        self.buffer.write_u8(0x00);
        let len = self.buffer.len() - start;
        self.buffer.patch_i32(start, len as i32);
    }

    fn seal(&mut self) {
        if !self.sealed {
            self.finish(0);
            self.sealed = true;
        }
    }

    fn unseal(&mut self) {
        if self.sealed {
            let len = self.buffer.len() - 1;
            self.buffer.truncate(len);
            self.sealed = false;
        }
    }
}

impl<'k> Default for Core<'k> {
    fn default() -> Self {
        Core::new(false)
    }
}

fn write_i32_len(buffer: &mut Buffer, len: usize, ty: ElementType) -> Result<()> {
    if len > i32::MAX as usize {
        fail!(ErrorCode::CannotAppend(ty));
    }
    buffer.write_i32(len as i32);
    Ok(())
}

/// Length prefix and subtype of a binary payload of `len` bytes. The old
/// binary subtype repeats the length inside the payload.
fn write_binary_header(buffer: &mut Buffer, subtype: BinarySubtype, len: usize) -> Result<()> {
    let ty = ElementType::Binary;
    if subtype == BinarySubtype::BinaryOld {
        write_i32_len(buffer, len + 4, ty)?;
        buffer.write_u8(subtype.into());
        buffer.write_i32(len as i32);
    } else {
        write_i32_len(buffer, len, ty)?;
        buffer.write_u8(subtype.into());
    }
    Ok(())
}

fn write_string(buffer: &mut Buffer, s: &str, ty: ElementType) -> Result<()> {
    write_i32_len(buffer, s.len() + 1, ty)?;
    buffer.write_cstr(s);
    Ok(())
}

fn write_cstring(buffer: &mut Buffer, s: &str, ty: ElementType) -> Result<()> {
    if memchr::memchr(0, s.as_bytes()).is_some() {
        fail!(ErrorCode::CannotAppend(ty));
    }
    buffer.write_cstr(s);
    Ok(())
}

/// Bytes of the embedded document `data` starts with. An empty slice stands
/// for the empty document.
fn embedded(data: &[u8], ty: ElementType) -> Result<&[u8]> {
    const EMPTY: &[u8] = &[5, 0, 0, 0, 0];

    if data.is_empty() {
        return Ok(EMPTY);
    }
    match reader::document_len(data) {
        Ok(len) => Ok(&data[..len]),
        Err(_) => fail!(ErrorCode::CannotAppend(ty)),
    }
}

fn write_value(buffer: &mut Buffer, value: &BsonRef) -> Result<()> {
    let ty = value.element_type();

    match *value {
        BsonRef::Double(n) => buffer.write_f64(n),
        BsonRef::String(s) | BsonRef::JavaScriptCode(s) | BsonRef::Symbol(s) => {
            write_string(buffer, s, ty)?
        }
        BsonRef::Document(view) => buffer.extend_from_slice(embedded(view.data(), ty)?),
        BsonRef::Array(view) => buffer.extend_from_slice(embedded(view.data(), ty)?),
        BsonRef::Binary(b) => {
            write_binary_header(buffer, b.subtype, b.bytes.len())?;
            buffer.extend_from_slice(b.bytes);
        }
        BsonRef::Undefined | BsonRef::Null | BsonRef::MaxKey | BsonRef::MinKey => {}
        BsonRef::ObjectId(id) => buffer.extend_from_slice(id.bytes()),
        BsonRef::Boolean(b) => buffer.write_u8(b as u8),
        BsonRef::DateTime(dt) => buffer.write_i64(dt.timestamp_millis()),
        BsonRef::Regex(regex) => {
            write_cstring(buffer, regex.pattern, ty)?;
            if !regex.options.is_ascii() {
                fail!(ErrorCode::CannotAppend(ty));
            }
            // Options are stored sorted
            let start = buffer.len();
            write_cstring(buffer, regex.options, ty)?;
            let end = buffer.len() - 1;
            buffer.as_mut_slice()[start..end].sort_unstable();
        }
        BsonRef::DbPointer(p) => {
            write_string(buffer, p.collection, ty)?;
            buffer.extend_from_slice(p.id.bytes());
        }
        BsonRef::JavaScriptCodeWithScope(c) => {
            let scope = embedded(c.scope.data(), ty)?;
            write_i32_len(buffer, 4 + 4 + c.code.len() + 1 + scope.len(), ty)?;
            write_string(buffer, c.code, ty)?;
            buffer.extend_from_slice(scope);
        }
        BsonRef::Int32(n) => buffer.write_i32(n),
        BsonRef::Timestamp(ts) => {
            buffer.write_u32(ts.increment);
            buffer.write_u32(ts.timestamp);
        }
        BsonRef::Int64(n) => buffer.write_i64(n),
        BsonRef::Decimal128(d) => buffer.extend_from_slice(&d.to_bytes()),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::error_code;
    use crate::types::{Binary, Regex};

    fn prefix(bytes: &[u8]) -> usize {
        reader::peek_i32(bytes).unwrap() as usize
    }

    #[test]
    fn empty_document() {
        let mut core = Core::new(false);
        let doc = core.extract_document().unwrap();
        assert_eq!(doc.data(), &[5, 0, 0, 0, 0]);
    }

    #[test]
    fn nested_length_prefixes() {
        let mut core = Core::new(false);
        core.key_view("a").unwrap().open_document().unwrap();
        core.key_view("b").unwrap().open_array().unwrap();
        core.append(1).unwrap().append(true).unwrap();
        core.close_array().unwrap().close_document().unwrap();
        assert_eq!(core.depth(), 1);

        let doc = core.extract_document().unwrap();
        let bytes = doc.data();
        assert_eq!(prefix(bytes), bytes.len());
        assert_eq!(*bytes.last().unwrap(), 0);

        let a = doc.view().get("a").unwrap().get_document().unwrap();
        assert_eq!(prefix(a.data()), a.length());
        let b = a.get("b").unwrap().get_array().unwrap();
        assert_eq!(prefix(b.data()), b.length());
        assert_eq!(b.get(0).unwrap().get_int32().unwrap(), 1);
        assert!(b.get(1).unwrap().get_bool().unwrap());
    }

    #[test]
    fn keys_follow_the_protocol() {
        let mut core = Core::new(false);
        assert_eq!(error_code(&core.append(1)), Some(ErrorCode::NeedKey));
        core.key_view("a").unwrap();
        assert_eq!(
            error_code(&core.key_view("b")),
            Some(ErrorCode::UnmatchedKeyInBuilder)
        );
        core.append(1).unwrap();

        core.key_owned(String::from("arr")).unwrap().open_array().unwrap();
        assert_eq!(
            error_code(&core.key_view("x")),
            Some(ErrorCode::CannotAppendKeyInSubArray)
        );
        core.append("v").unwrap().close_array().unwrap();
    }

    #[test]
    fn failed_operations_have_no_effect() {
        let mut core = Core::new(false);
        core.key_view("a").unwrap().open_array().unwrap();
        let (depth, len) = (core.depth(), core.len());

        assert_eq!(
            error_code(&core.close_document()),
            Some(ErrorCode::CannotCloseDocumentInSubArray)
        );
        assert_eq!((core.depth(), core.len()), (depth, len));

        core.close_array().unwrap();
        assert_eq!(error_code(&core.close_array()), Some(ErrorCode::CannotCloseArrayInSubDocument));
        assert_eq!(error_code(&core.close_document()), Some(ErrorCode::NoDocumentToClose));

        let len = core.len();
        core.key_view("bad\0key").unwrap();
        assert_eq!(
            error_code(&core.append(1)),
            Some(ErrorCode::CannotAppend(ElementType::Int32))
        );
        assert_eq!(core.len(), len);
        assert!(core.has_key());
    }

    #[test]
    fn failed_payload_is_rolled_back() {
        let mut core = Core::new(false);
        let len = core.len();
        core.key_view("r").unwrap();
        let bad = Regex {
            pattern: "a\0b",
            options: "",
        };
        assert_eq!(
            error_code(&core.append(bad)),
            Some(ErrorCode::CannotAppend(ElementType::Regex))
        );
        assert_eq!(core.len(), len);
        assert!(core.has_key());

        // Malformed embedded document
        let garbage = [9u8, 0, 0];
        assert!(core.append(document::View::new(&garbage)).is_err());
        assert_eq!(core.len(), len);
    }

    #[test]
    fn root_kind_is_checked() {
        let mut core = Core::new(true);
        assert_eq!(
            error_code(&core.extract_document()),
            Some(ErrorCode::CannotPerformDocumentOperationOnArray)
        );
        assert_eq!(error_code(&core.close_array()), Some(ErrorCode::NoArrayToClose));
        core.append(1).unwrap();
        let arr = core.extract_array().unwrap();
        assert_eq!(arr.view().get(0).unwrap().get_int32().unwrap(), 1);

        let mut core = Core::new(false);
        assert_eq!(
            error_code(&core.extract_array()),
            Some(ErrorCode::CannotPerformArrayOperationOnDocument)
        );
    }

    #[test]
    fn extract_requires_closed_frames() {
        let mut core = Core::new(false);
        core.key_view("a").unwrap();
        assert_eq!(
            error_code(&core.extract_document()),
            Some(ErrorCode::UnmatchedKeyInBuilder)
        );
        core.open_document().unwrap();
        assert_eq!(
            error_code(&core.extract_document()),
            Some(ErrorCode::UnmatchedKeyInBuilder)
        );
        core.close_document().unwrap();
        assert!(core.extract_document().is_ok());
    }

    #[test]
    fn view_then_keep_appending() {
        let mut core = Core::new(false);
        core.key_view("a").unwrap().append(1).unwrap();
        assert_eq!(core.view_document().unwrap().iter().count(), 1);

        core.key_view("b").unwrap().append(2).unwrap();
        let view = core.view_document().unwrap();
        assert_eq!(prefix(view.data()), view.length());
        assert_eq!(view.get("b").unwrap().get_int32().unwrap(), 2);

        let doc = core.extract_document().unwrap();
        assert_eq!(doc.view().iter().count(), 2);
    }

    #[test]
    fn clear_resets() {
        let mut core = Core::with_capacity(false, 256);
        core.key_view("a").unwrap().open_document().unwrap();
        core.clear();
        assert_eq!(core.depth(), 1);
        assert!(core.is_empty());
        assert!(!core.has_key());
        assert_eq!(core.extract_document().unwrap().data(), &[5, 0, 0, 0, 0]);
    }

    #[test]
    fn concatenate_renumbers_in_arrays() {
        let mut src = Core::new(false);
        src.key_view("x").unwrap().append("a").unwrap();
        src.key_view("y").unwrap().append("b").unwrap();
        let src = src.extract_document().unwrap();

        let mut core = Core::new(true);
        core.append(0).unwrap();
        core.concatenate(src.view()).unwrap();
        let arr = core.extract_array().unwrap();
        let keys: Vec<_> = arr.view().iter().map(|e| e.unwrap().key().unwrap().to_owned()).collect();
        assert_eq!(keys, ["0", "1", "2"]);
        assert_eq!(arr.view().get(2).unwrap().get_utf8().unwrap(), "b");

        let mut core = Core::new(false);
        core.concatenate(src.view()).unwrap();
        assert_eq!(core.extract_document().unwrap(), src);
    }

    #[test]
    fn regex_options_are_sorted() {
        let mut core = Core::new(false);
        core.key_view("r").unwrap();
        core.append(Regex {
            pattern: "^a",
            options: "xmi",
        })
        .unwrap();
        core.key_view("u").unwrap();
        assert_eq!(
            error_code(&core.append(Regex {
                pattern: "b",
                options: "é",
            })),
            Some(ErrorCode::CannotAppend(ElementType::Regex))
        );
        core.append(Regex {
            pattern: "b",
            options: "",
        })
        .unwrap();

        let doc = core.extract_document().unwrap();
        let r = doc.view().get("r").unwrap();
        assert_eq!(r.raw_value().unwrap(), b"^a\0imx\0");
        assert_eq!(r.get_regex().unwrap().options, "imx");
        assert_eq!(doc.view().get("u").unwrap().get_regex().unwrap().options, "");
    }

    #[test]
    fn binary_filled_in_place() {
        let mut core = Core::new(false);
        core.key_view("b").unwrap();
        let bytes = core.append_binary_uninit(BinarySubtype::Generic, 3).unwrap();
        assert_eq!(bytes, &[0, 0, 0]);
        bytes.copy_from_slice(&[7, 8, 9]);
        assert!(!core.has_key());

        core.key_view("old").unwrap();
        core.append_binary_uninit(BinarySubtype::BinaryOld, 1).unwrap()[0] = 4;
        core.key_view("empty").unwrap();
        assert!(core.append_binary_uninit(BinarySubtype::Vector, 0).unwrap().is_empty());

        let doc = core.extract_document().unwrap();
        let b = doc.view().get("b").unwrap().get_binary().unwrap();
        assert_eq!((b.subtype, b.bytes), (BinarySubtype::Generic, &[7u8, 8, 9][..]));
        let old = doc.view().get("old").unwrap();
        assert_eq!(old.raw_value().unwrap(), &[5, 0, 0, 0, 2, 1, 0, 0, 0, 4]);
        let empty = doc.view().get("empty").unwrap().get_binary().unwrap();
        assert_eq!((empty.subtype, empty.bytes.len()), (BinarySubtype::Vector, 0));
    }

    #[test]
    fn binary_fill_follows_the_protocol() {
        let mut core = Core::new(false);
        assert_eq!(
            error_code(&core.append_binary_uninit(BinarySubtype::Generic, 2)),
            Some(ErrorCode::NeedKey)
        );

        core.key_view("big").unwrap();
        let len = core.len();
        assert_eq!(
            error_code(&core.append_binary_uninit(BinarySubtype::Generic, i32::MAX as usize + 1)),
            Some(ErrorCode::CannotAppend(ElementType::Binary))
        );
        assert_eq!(core.len(), len);
        assert!(core.has_key());

        let mut core = Core::new(true);
        core.append_binary_uninit(BinarySubtype::Generic, 1).unwrap()[0] = 1;
        core.append_binary_uninit(BinarySubtype::Generic, 1).unwrap()[0] = 2;
        let arr = core.extract_array().unwrap();
        assert_eq!(arr.view().get(1).unwrap().get_binary().unwrap().bytes, &[2]);
    }

    #[test]
    fn old_binary_subtype_carries_inner_length() {
        let mut core = Core::new(false);
        core.key_view("b").unwrap();
        core.append(Binary {
            subtype: BinarySubtype::BinaryOld,
            bytes: &[1, 2, 3],
        })
        .unwrap();
        let doc = core.extract_document().unwrap();
        let e = doc.view().get("b").unwrap();
        assert_eq!(e.raw_value().unwrap(), &[7, 0, 0, 0, 2, 3, 0, 0, 0, 1, 2, 3]);
        assert_eq!(e.get_binary().unwrap().bytes, &[1, 2, 3]);
    }
}
