use std::fmt;
use std::str;

use crate::array;
use crate::decimal128::Decimal128;
use crate::document::View;
use crate::error::{ErrorCode, Result};
use crate::oid::ObjectId;
use crate::reader::Reader;
use crate::types::{
    Binary, BinarySubtype, Bson, BsonRef, CodeWithScope, DateTime, DbPointer, ElementType, Regex,
    Timestamp,
};
use crate::vector;

/// One decoded field of a document or array.
///
/// Only the offsets are decoded up front; the type and payload are read on
/// access. A default element is *unset*: it stands for a field that does not
/// exist, which is not the same as a field holding `null`.
#[derive(Copy, Clone, Default)]
pub struct Element<'a> {
    raw: &'a [u8],
    offset: usize,
    key_len: usize,
    value_len: usize,
}

macro_rules! get_impl {
    ($($name:ident => $variant:ident: $t:ty),*) => {
        $(
            pub fn $name(&self) -> Result<$t> {
                self.expect_type(ElementType::$variant)?;
                match self.value()? {
                    BsonRef::$variant(v) => Ok(v),
                    _ => fail!(ErrorCode::InvalidData),
                }
            }
        )*
    };
}

macro_rules! get_unit_impl {
    ($($name:ident => $variant:ident),*) => {
        $(
            pub fn $name(&self) -> Result<()> {
                self.expect_type(ElementType::$variant)
            }
        )*
    };
}

impl<'a> Element<'a> {
    pub(crate) fn new(raw: &'a [u8], offset: usize, key_len: usize, value_len: usize) -> Self {
        Element {
            raw,
            offset,
            key_len,
            value_len,
        }
    }

    /// `false` for the element standing for a missing field.
    pub fn is_set(&self) -> bool {
        !self.raw.is_empty()
    }

    /// Bytes of the whole document or array this element was read from.
    pub fn raw(&self) -> &'a [u8] {
        self.raw
    }

    /// Offset of the type tag inside [`raw`](Element::raw).
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Size of the encoded element: tag, key and payload.
    pub fn length(&self) -> usize {
        if self.is_set() {
            self.key_len + self.value_len + 2
        } else {
            0
        }
    }

    pub(crate) fn key_bytes(&self) -> &'a [u8] {
        let start = self.offset + 1;
        &self.raw[start..start + self.key_len]
    }

    pub fn key(&self) -> Result<&'a str> {
        self.check_set()?;
        // Validated when the element was decoded
        Ok(unsafe { str::from_utf8_unchecked(self.key_bytes()) })
    }

    pub fn element_type(&self) -> Result<ElementType> {
        self.check_set()?;
        match ElementType::from_u8(self.raw[self.offset]) {
            Some(t) => Ok(t),
            None => fail!(ErrorCode::InvalidData),
        }
    }

    /// Payload bytes following the key.
    pub fn raw_value(&self) -> Result<&'a [u8]> {
        self.check_set()?;
        let start = self.offset + self.key_len + 2;
        Ok(&self.raw[start..start + self.value_len])
    }

    /// Decodes the payload.
    pub fn value(&self) -> Result<BsonRef<'a>> {
        let ty = self.element_type()?;
        let data = self.raw_value()?;
        let mut r = Reader::new(data);

        Ok(match ty {
            ElementType::Double => BsonRef::Double(r.read_f64()?),
            ElementType::String => BsonRef::String(r.read_string()?),
            ElementType::Document => BsonRef::Document(View::new(data)),
            ElementType::Array => BsonRef::Array(array::View::new(data)),
            ElementType::Binary => {
                let size = r.read_i32()? as usize;
                let subtype = BinarySubtype::from(r.read_u8()?);
                let bytes = if subtype == BinarySubtype::BinaryOld {
                    r.read_i32()?;
                    match size.checked_sub(4) {
                        Some(size) => r.read_bytes(size)?,
                        None => fail!(ErrorCode::InvalidData),
                    }
                } else {
                    r.read_bytes(size)?
                };
                BsonRef::Binary(Binary { subtype, bytes })
            }
            ElementType::Undefined => BsonRef::Undefined,
            ElementType::ObjectId => BsonRef::ObjectId(ObjectId::from_bytes(r.read_array()?)),
            ElementType::Boolean => match r.read_u8()? {
                0 => BsonRef::Boolean(false),
                1 => BsonRef::Boolean(true),
                _ => fail!(ErrorCode::InvalidData),
            },
            ElementType::DateTime => BsonRef::DateTime(DateTime(r.read_i64()?)),
            ElementType::Null => BsonRef::Null,
            ElementType::Regex => BsonRef::Regex(Regex {
                pattern: r.read_cstring()?,
                options: r.read_cstring()?,
            }),
            ElementType::DbPointer => BsonRef::DbPointer(DbPointer {
                collection: r.read_string()?,
                id: ObjectId::from_bytes(r.read_array()?),
            }),
            ElementType::JavaScriptCode => BsonRef::JavaScriptCode(r.read_string()?),
            ElementType::Symbol => BsonRef::Symbol(r.read_string()?),
            ElementType::JavaScriptCodeWithScope => {
                r.read_i32()?;
                let code = r.read_string()?;
                let scope = View::new(&data[r.position()..]);
                BsonRef::JavaScriptCodeWithScope(CodeWithScope { code, scope })
            }
            ElementType::Int32 => BsonRef::Int32(r.read_i32()?),
            ElementType::Timestamp => {
                let increment = r.read_u32()?;
                let timestamp = r.read_u32()?;
                BsonRef::Timestamp(Timestamp {
                    timestamp,
                    increment,
                })
            }
            ElementType::Int64 => BsonRef::Int64(r.read_i64()?),
            ElementType::Decimal128 => BsonRef::Decimal128(Decimal128::from_bytes(r.read_array()?)),
            ElementType::MaxKey => BsonRef::MaxKey,
            ElementType::MinKey => BsonRef::MinKey,
        })
    }

    get_impl!(
        get_double => Double: f64,
        get_utf8 => String: &'a str,
        get_document => Document: View<'a>,
        get_array => Array: array::View<'a>,
        get_binary => Binary: Binary<'a>,
        get_oid => ObjectId: ObjectId,
        get_bool => Boolean: bool,
        get_date => DateTime: DateTime,
        get_regex => Regex: Regex<'a>,
        get_dbpointer => DbPointer: DbPointer<'a>,
        get_code => JavaScriptCode: &'a str,
        get_symbol => Symbol: &'a str,
        get_codewscope => JavaScriptCodeWithScope: CodeWithScope<'a>,
        get_int32 => Int32: i32,
        get_timestamp => Timestamp: Timestamp,
        get_int64 => Int64: i64,
        get_decimal128 => Decimal128: Decimal128
    );

    get_unit_impl!(
        get_undefined => Undefined,
        get_null => Null,
        get_maxkey => MaxKey,
        get_minkey => MinKey
    );

    /// Copies the value out, so that it outlives the underlying buffer.
    pub fn to_bson(&self) -> Result<Bson> {
        Ok(self.value()?.into())
    }

    /// Typed view over a binary vector of format `F`.
    pub fn get_vector<F: vector::Format>(&self) -> Result<vector::View<'a, F>> {
        vector::View::new(self.get_binary()?)
    }

    /// Field `key` of an embedded document. Unset if this element is unset or
    /// not a document, or if the field is missing.
    pub fn get(&self, key: &str) -> Result<Element<'a>> {
        if !self.is_set() || self.element_type()? != ElementType::Document {
            return Ok(Element::default());
        }
        self.get_document()?.get(key)
    }

    /// Entry `index` of an embedded array. Unset if this element is unset or
    /// not an array, or if the index is out of range.
    pub fn at(&self, index: u32) -> Result<Element<'a>> {
        if !self.is_set() || self.element_type()? != ElementType::Array {
            return Ok(Element::default());
        }
        self.get_array()?.get(index)
    }

    fn check_set(&self) -> Result<()> {
        if !self.is_set() {
            fail!(ErrorCode::UnsetElement);
        }
        Ok(())
    }

    fn expect_type(&self, expected: ElementType) -> Result<()> {
        if self.element_type()? != expected {
            fail!(ErrorCode::NeedElementType(expected));
        }
        Ok(())
    }
}

impl<'a> fmt::Debug for Element<'a> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if !self.is_set() {
            return f.write_str("Element(unset)");
        }
        match (self.key(), self.value()) {
            (Ok(key), Ok(value)) => write!(f, "Element({:?}: {:?})", key, value),
            _ => f.write_str("Element(<invalid>)"),
        }
    }
}
