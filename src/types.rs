//! BSON element types and borrowed values.

use std::convert::TryFrom;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::array;
use crate::decimal128::Decimal128;
use crate::document;
use crate::error::{Error, ErrorCode};
use crate::oid::ObjectId;

/// Type tag written before every element key.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ElementType {
    Double = 0x01,
    String = 0x02,
    Document = 0x03,
    Array = 0x04,
    Binary = 0x05,
    Undefined = 0x06,
    ObjectId = 0x07,
    Boolean = 0x08,
    DateTime = 0x09,
    Null = 0x0A,
    Regex = 0x0B,
    DbPointer = 0x0C,
    JavaScriptCode = 0x0D,
    Symbol = 0x0E,
    JavaScriptCodeWithScope = 0x0F,
    Int32 = 0x10,
    Timestamp = 0x11,
    Int64 = 0x12,
    Decimal128 = 0x13,
    MaxKey = 0x7F,
    MinKey = 0xFF,
}

impl ElementType {
    pub fn from_u8(tag: u8) -> Option<ElementType> {
        use ElementType::*;

        Some(match tag {
            0x01 => Double,
            0x02 => String,
            0x03 => Document,
            0x04 => Array,
            0x05 => Binary,
            0x06 => Undefined,
            0x07 => ObjectId,
            0x08 => Boolean,
            0x09 => DateTime,
            0x0A => Null,
            0x0B => Regex,
            0x0C => DbPointer,
            0x0D => JavaScriptCode,
            0x0E => Symbol,
            0x0F => JavaScriptCodeWithScope,
            0x10 => Int32,
            0x11 => Timestamp,
            0x12 => Int64,
            0x13 => Decimal128,
            0x7F => MaxKey,
            0xFF => MinKey,
            _ => return None,
        })
    }
}

impl TryFrom<u8> for ElementType {
    type Error = Error;

    fn try_from(tag: u8) -> std::result::Result<Self, Error> {
        ElementType::from_u8(tag).ok_or_else(|| ErrorCode::InvalidBsonTypeId.into())
    }
}

/// Subtype byte of a binary element.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum BinarySubtype {
    Generic,
    Function,
    /// Deprecated; carries a redundant inner length on the wire.
    BinaryOld,
    UuidOld,
    Uuid,
    Md5,
    Encrypted,
    Column,
    Sensitive,
    Vector,
    UserDefined(u8),
}

impl From<u8> for BinarySubtype {
    fn from(byte: u8) -> Self {
        use BinarySubtype::*;

        match byte {
            0x00 => Generic,
            0x01 => Function,
            0x02 => BinaryOld,
            0x03 => UuidOld,
            0x04 => Uuid,
            0x05 => Md5,
            0x06 => Encrypted,
            0x07 => Column,
            0x08 => Sensitive,
            0x09 => Vector,
            n => UserDefined(n),
        }
    }
}

impl From<BinarySubtype> for u8 {
    fn from(subtype: BinarySubtype) -> u8 {
        use BinarySubtype::*;

        match subtype {
            Generic => 0x00,
            Function => 0x01,
            BinaryOld => 0x02,
            UuidOld => 0x03,
            Uuid => 0x04,
            Md5 => 0x05,
            Encrypted => 0x06,
            Column => 0x07,
            Sensitive => 0x08,
            Vector => 0x09,
            UserDefined(n) => n,
        }
    }
}

/// Internal MongoDB timestamp: seconds since the epoch plus an ordinal.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp {
    pub timestamp: u32,
    pub increment: u32,
}

/// Milliseconds since the Unix epoch.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DateTime(pub i64);

impl DateTime {
    pub fn from_millis(ms: i64) -> Self {
        DateTime(ms)
    }

    pub fn now() -> Self {
        DateTime::from(SystemTime::now())
    }

    pub fn timestamp_millis(&self) -> i64 {
        self.0
    }
}

impl From<SystemTime> for DateTime {
    fn from(time: SystemTime) -> Self {
        match time.duration_since(UNIX_EPOCH) {
            Ok(d) => DateTime(d.as_millis() as i64),
            Err(e) => DateTime(-(e.duration().as_millis() as i64)),
        }
    }
}

impl From<DateTime> for SystemTime {
    fn from(dt: DateTime) -> Self {
        if dt.0 >= 0 {
            UNIX_EPOCH + Duration::from_millis(dt.0 as u64)
        } else {
            UNIX_EPOCH - Duration::from_millis(dt.0.unsigned_abs())
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Binary<'a> {
    pub subtype: BinarySubtype,
    pub bytes: &'a [u8],
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Regex<'a> {
    pub pattern: &'a str,
    pub options: &'a str,
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct DbPointer<'a> {
    pub collection: &'a str,
    pub id: ObjectId,
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct CodeWithScope<'a> {
    pub code: &'a str,
    pub scope: document::View<'a>,
}

/// A BSON value borrowing its payload.
///
/// Produced by [`Element::value`](crate::document::Element::value) and accepted
/// by [`Core::append`](crate::builder::Core::append).
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum BsonRef<'a> {
    Double(f64),
    String(&'a str),
    Document(document::View<'a>),
    Array(array::View<'a>),
    Binary(Binary<'a>),
    Undefined,
    ObjectId(ObjectId),
    Boolean(bool),
    DateTime(DateTime),
    Null,
    Regex(Regex<'a>),
    DbPointer(DbPointer<'a>),
    JavaScriptCode(&'a str),
    Symbol(&'a str),
    JavaScriptCodeWithScope(CodeWithScope<'a>),
    Int32(i32),
    Timestamp(Timestamp),
    Int64(i64),
    Decimal128(Decimal128),
    MaxKey,
    MinKey,
}

impl<'a> BsonRef<'a> {
    pub fn element_type(&self) -> ElementType {
        match self {
            BsonRef::Double(_) => ElementType::Double,
            BsonRef::String(_) => ElementType::String,
            BsonRef::Document(_) => ElementType::Document,
            BsonRef::Array(_) => ElementType::Array,
            BsonRef::Binary(_) => ElementType::Binary,
            BsonRef::Undefined => ElementType::Undefined,
            BsonRef::ObjectId(_) => ElementType::ObjectId,
            BsonRef::Boolean(_) => ElementType::Boolean,
            BsonRef::DateTime(_) => ElementType::DateTime,
            BsonRef::Null => ElementType::Null,
            BsonRef::Regex(_) => ElementType::Regex,
            BsonRef::DbPointer(_) => ElementType::DbPointer,
            BsonRef::JavaScriptCode(_) => ElementType::JavaScriptCode,
            BsonRef::Symbol(_) => ElementType::Symbol,
            BsonRef::JavaScriptCodeWithScope(_) => ElementType::JavaScriptCodeWithScope,
            BsonRef::Int32(_) => ElementType::Int32,
            BsonRef::Timestamp(_) => ElementType::Timestamp,
            BsonRef::Int64(_) => ElementType::Int64,
            BsonRef::Decimal128(_) => ElementType::Decimal128,
            BsonRef::MaxKey => ElementType::MaxKey,
            BsonRef::MinKey => ElementType::MinKey,
        }
    }
}

macro_rules! from_impl {
    ($($t:ty => $variant:ident),*) => {
        $(impl<'a> From<$t> for BsonRef<'a> {
            fn from(v: $t) -> Self {
                BsonRef::$variant(v)
            }
        })*
    };
}

from_impl!(
    f64 => Double,
    &'a str => String,
    document::View<'a> => Document,
    array::View<'a> => Array,
    Binary<'a> => Binary,
    ObjectId => ObjectId,
    bool => Boolean,
    DateTime => DateTime,
    Regex<'a> => Regex,
    DbPointer<'a> => DbPointer,
    CodeWithScope<'a> => JavaScriptCodeWithScope,
    i32 => Int32,
    Timestamp => Timestamp,
    i64 => Int64,
    Decimal128 => Decimal128
);

impl<'a> From<&'a String> for BsonRef<'a> {
    fn from(s: &'a String) -> Self {
        BsonRef::String(s.as_str())
    }
}

impl<'a> From<&'a document::Value> for BsonRef<'a> {
    fn from(v: &'a document::Value) -> Self {
        BsonRef::Document(v.view())
    }
}

impl<'a> From<&'a array::Value> for BsonRef<'a> {
    fn from(v: &'a array::Value) -> Self {
        BsonRef::Array(v.view())
    }
}

impl<'a> From<()> for BsonRef<'a> {
    fn from(_: ()) -> Self {
        BsonRef::Null
    }
}

impl<'a, T: Into<BsonRef<'a>>> From<Option<T>> for BsonRef<'a> {
    fn from(v: Option<T>) -> Self {
        v.map_or(BsonRef::Null, Into::into)
    }
}

/// A BSON value owning its payload.
///
/// The owning counterpart of [`BsonRef`]: it is copied out of an element with
/// [`Element::to_bson`](crate::document::Element::to_bson) and stays valid
/// after the source buffer is gone. [`Core::append`](crate::builder::Core::append)
/// accepts `&Bson`.
#[derive(Clone, Debug, PartialEq)]
pub enum Bson {
    Double(f64),
    String(String),
    Document(document::Value),
    Array(array::Value),
    Binary { subtype: BinarySubtype, bytes: Vec<u8> },
    Undefined,
    ObjectId(ObjectId),
    Boolean(bool),
    DateTime(DateTime),
    Null,
    Regex { pattern: String, options: String },
    DbPointer { collection: String, id: ObjectId },
    JavaScriptCode(String),
    Symbol(String),
    JavaScriptCodeWithScope { code: String, scope: document::Value },
    Int32(i32),
    Timestamp(Timestamp),
    Int64(i64),
    Decimal128(Decimal128),
    MaxKey,
    MinKey,
}

impl Bson {
    /// Borrows the value.
    pub fn view(&self) -> BsonRef<'_> {
        match self {
            Bson::Double(n) => BsonRef::Double(*n),
            Bson::String(s) => BsonRef::String(s),
            Bson::Document(v) => BsonRef::Document(v.view()),
            Bson::Array(v) => BsonRef::Array(v.view()),
            Bson::Binary { subtype, bytes } => BsonRef::Binary(Binary {
                subtype: *subtype,
                bytes,
            }),
            Bson::Undefined => BsonRef::Undefined,
            Bson::ObjectId(id) => BsonRef::ObjectId(*id),
            Bson::Boolean(b) => BsonRef::Boolean(*b),
            Bson::DateTime(dt) => BsonRef::DateTime(*dt),
            Bson::Null => BsonRef::Null,
            Bson::Regex { pattern, options } => BsonRef::Regex(Regex { pattern, options }),
            Bson::DbPointer { collection, id } => BsonRef::DbPointer(DbPointer {
                collection,
                id: *id,
            }),
            Bson::JavaScriptCode(code) => BsonRef::JavaScriptCode(code),
            Bson::Symbol(s) => BsonRef::Symbol(s),
            Bson::JavaScriptCodeWithScope { code, scope } => {
                BsonRef::JavaScriptCodeWithScope(CodeWithScope {
                    code,
                    scope: scope.view(),
                })
            }
            Bson::Int32(n) => BsonRef::Int32(*n),
            Bson::Timestamp(ts) => BsonRef::Timestamp(*ts),
            Bson::Int64(n) => BsonRef::Int64(*n),
            Bson::Decimal128(d) => BsonRef::Decimal128(*d),
            Bson::MaxKey => BsonRef::MaxKey,
            Bson::MinKey => BsonRef::MinKey,
        }
    }

    pub fn element_type(&self) -> ElementType {
        self.view().element_type()
    }
}

impl<'a> From<BsonRef<'a>> for Bson {
    fn from(value: BsonRef<'a>) -> Self {
        match value {
            BsonRef::Double(n) => Bson::Double(n),
            BsonRef::String(s) => Bson::String(s.to_owned()),
            BsonRef::Document(view) => Bson::Document(view.into()),
            BsonRef::Array(view) => Bson::Array(view.into()),
            BsonRef::Binary(b) => Bson::Binary {
                subtype: b.subtype,
                bytes: b.bytes.to_vec(),
            },
            BsonRef::Undefined => Bson::Undefined,
            BsonRef::ObjectId(id) => Bson::ObjectId(id),
            BsonRef::Boolean(b) => Bson::Boolean(b),
            BsonRef::DateTime(dt) => Bson::DateTime(dt),
            BsonRef::Null => Bson::Null,
            BsonRef::Regex(r) => Bson::Regex {
                pattern: r.pattern.to_owned(),
                options: r.options.to_owned(),
            },
            BsonRef::DbPointer(p) => Bson::DbPointer {
                collection: p.collection.to_owned(),
                id: p.id,
            },
            BsonRef::JavaScriptCode(code) => Bson::JavaScriptCode(code.to_owned()),
            BsonRef::Symbol(s) => Bson::Symbol(s.to_owned()),
            BsonRef::JavaScriptCodeWithScope(c) => Bson::JavaScriptCodeWithScope {
                code: c.code.to_owned(),
                scope: c.scope.into(),
            },
            BsonRef::Int32(n) => Bson::Int32(n),
            BsonRef::Timestamp(ts) => Bson::Timestamp(ts),
            BsonRef::Int64(n) => Bson::Int64(n),
            BsonRef::Decimal128(d) => Bson::Decimal128(d),
            BsonRef::MaxKey => Bson::MaxKey,
            BsonRef::MinKey => Bson::MinKey,
        }
    }
}

impl<'a> From<&'a Bson> for BsonRef<'a> {
    fn from(value: &'a Bson) -> Self {
        value.view()
    }
}

impl<'a> PartialEq<BsonRef<'a>> for Bson {
    fn eq(&self, other: &BsonRef<'a>) -> bool {
        self.view() == *other
    }
}

impl<'a> PartialEq<Bson> for BsonRef<'a> {
    fn eq(&self, other: &Bson) -> bool {
        *self == other.view()
    }
}

macro_rules! bson_from_impl {
    ($($t:ty => $variant:ident),*) => {
        $(impl From<$t> for Bson {
            fn from(v: $t) -> Self {
                Bson::$variant(v)
            }
        })*
    };
}

bson_from_impl!(
    f64 => Double,
    String => String,
    document::Value => Document,
    array::Value => Array,
    ObjectId => ObjectId,
    bool => Boolean,
    DateTime => DateTime,
    i32 => Int32,
    Timestamp => Timestamp,
    i64 => Int64,
    Decimal128 => Decimal128
);

impl From<&str> for Bson {
    fn from(s: &str) -> Self {
        Bson::String(s.to_owned())
    }
}
