use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;

use super::Mode;
use crate::array;
use crate::document;
use crate::error::{ErrorCode, Result};
use crate::types::{BsonRef, DateTime};

/// Largest date rendered as an ISO-8601 string in relaxed mode,
/// 9999-12-31T23:59:59.999Z.
const MAX_RELAXED_DATE: i64 = 253_402_300_799_999;

/// Deepest nesting of documents and arrays that can be rendered.
pub const MAX_DEPTH: usize = 100;

/// Renders a document as Extended JSON.
///
/// Fails with [`InvalidData`](crate::ErrorCode::InvalidData) if the bytes are
/// malformed, and with
/// [`FailedConvertingBsonToJson`](crate::ErrorCode::FailedConvertingBsonToJson)
/// if containers nest deeper than [`MAX_DEPTH`].
pub fn to_json(view: document::View, mode: Mode) -> Result<String> {
    let mut json = JsonSer { out: vec![], mode };
    json.document(view, 0)?;
    Ok(json.done())
}

/// Renders an array as Extended JSON.
pub fn array_to_json(view: array::View, mode: Mode) -> Result<String> {
    let mut json = JsonSer { out: vec![], mode };
    json.array(view, 0)?;
    Ok(json.done())
}

struct JsonSer {
    out: Vec<u8>,
    mode: Mode,
}

impl JsonSer {
    #[inline]
    fn push(&mut self, c: u8) {
        self.out.push(c)
    }

    fn push_str(&mut self, s: &str) {
        self.out.extend_from_slice(s.as_bytes())
    }

    fn push_str_escaped(&mut self, value: &str) {
        self.out.push(b'"');

        let bytes = value.as_bytes();
        let mut start = 0;

        for (i, &byte) in bytes.iter().enumerate() {
            let escape = ESCAPE[byte as usize];
            if escape == 0 {
                continue;
            }

            if start < i {
                self.push_str(&value[start..i]);
            }

            match escape {
                self::BB => self.push_str("\\b"),
                self::TT => self.push_str("\\t"),
                self::NN => self.push_str("\\n"),
                self::FF => self.push_str("\\f"),
                self::RR => self.push_str("\\r"),
                self::QU => self.push_str("\\\""),
                self::BS => self.push_str("\\\\"),
                _ => {
                    static HEX_DIGITS: [u8; 16] = *b"0123456789abcdef";
                    self.push_str("\\u00");
                    self.push(HEX_DIGITS[(byte >> 4) as usize]);
                    self.push(HEX_DIGITS[(byte & 0xF) as usize]);
                }
            }

            start = i + 1;
        }

        if start != bytes.len() {
            self.push_str(&value[start..]);
        }

        self.push(b'"');
    }

    fn done(self) -> String {
        // Only whole `str`s and ASCII were pushed
        String::from_utf8(self.out).unwrap_or_default()
    }

    fn enter(depth: usize) -> Result<usize> {
        if depth >= MAX_DEPTH {
            log::debug!("stopped rendering JSON at depth {}", depth);
            fail!(ErrorCode::FailedConvertingBsonToJson);
        }
        Ok(depth + 1)
    }

    fn document(&mut self, view: document::View, depth: usize) -> Result<()> {
        let depth = Self::enter(depth)?;
        let mut first = true;
        self.push(b'{');
        for element in view.iter() {
            let element = element?;
            self.push_str(if first { " " } else { ", " });
            first = false;
            self.push_str_escaped(element.key()?);
            self.push_str(" : ");
            self.value(element.value()?, depth)?;
        }
        self.push_str(" }");
        Ok(())
    }

    fn array(&mut self, view: array::View, depth: usize) -> Result<()> {
        let depth = Self::enter(depth)?;
        let mut first = true;
        self.push(b'[');
        for element in view.iter() {
            let element = element?;
            self.push_str(if first { " " } else { ", " });
            first = false;
            self.value(element.value()?, depth)?;
        }
        self.push_str(" ]");
        Ok(())
    }

    /// `{ "$name" : "text" }`
    fn wrapped_str(&mut self, name: &str, text: &str) {
        self.push_str("{ \"");
        self.push_str(name);
        self.push_str("\" : ");
        self.push_str_escaped(text);
        self.push_str(" }");
    }

    fn long(&mut self, n: i64) {
        self.push_str(itoa::Buffer::new().format(n));
    }

    fn double(&mut self, n: f64) {
        if n.is_nan() {
            self.wrapped_str("$numberDouble", "NaN");
        } else if n.is_infinite() {
            self.wrapped_str("$numberDouble", if n > 0.0 { "Infinity" } else { "-Infinity" });
        } else if self.mode == Mode::Canonical {
            self.wrapped_str("$numberDouble", ryu::Buffer::new().format_finite(n));
        } else {
            self.push_str(ryu::Buffer::new().format_finite(n));
        }
    }

    fn date(&mut self, dt: DateTime) {
        let ms = dt.timestamp_millis();
        if self.mode == Mode::Relaxed && (0..=MAX_RELAXED_DATE).contains(&ms) {
            if let Some(date) = chrono::DateTime::<chrono::Utc>::from_timestamp_millis(ms) {
                let format = if ms % 1000 == 0 {
                    "%Y-%m-%dT%H:%M:%SZ"
                } else {
                    "%Y-%m-%dT%H:%M:%S%.3fZ"
                };
                self.wrapped_str("$date", &date.format(format).to_string());
                return;
            }
        }
        self.push_str("{ \"$date\" : ");
        self.wrapped_str("$numberLong", itoa::Buffer::new().format(ms));
        self.push_str(" }");
    }

    fn value(&mut self, value: BsonRef, depth: usize) -> Result<()> {
        match value {
            BsonRef::Double(n) => self.double(n),
            BsonRef::String(s) => self.push_str_escaped(s),
            BsonRef::Document(view) => self.document(view, depth)?,
            BsonRef::Array(view) => self.array(view, depth)?,
            BsonRef::Binary(b) => {
                self.push_str("{ \"$binary\" : { \"base64\" : ");
                self.push_str_escaped(&STANDARD.encode(b.bytes));
                self.push_str(", \"subType\" : \"");
                let subtype: u8 = b.subtype.into();
                self.push_str(&format!("{:02x}", subtype));
                self.push_str("\" } }");
            }
            BsonRef::Undefined => self.push_str("{ \"$undefined\" : true }"),
            BsonRef::ObjectId(id) => self.wrapped_str("$oid", &id.to_hex()),
            BsonRef::Boolean(b) => self.push_str(if b { "true" } else { "false" }),
            BsonRef::DateTime(dt) => self.date(dt),
            BsonRef::Null => self.push_str("null"),
            BsonRef::Regex(regex) => {
                self.push_str("{ \"$regularExpression\" : { \"pattern\" : ");
                self.push_str_escaped(regex.pattern);
                self.push_str(", \"options\" : ");
                self.push_str_escaped(regex.options);
                self.push_str(" } }");
            }
            BsonRef::DbPointer(p) => {
                self.push_str("{ \"$dbPointer\" : { \"$ref\" : ");
                self.push_str_escaped(p.collection);
                self.push_str(", \"$id\" : ");
                self.wrapped_str("$oid", &p.id.to_hex());
                self.push_str(" } }");
            }
            BsonRef::JavaScriptCode(code) => self.wrapped_str("$code", code),
            BsonRef::Symbol(s) => self.wrapped_str("$symbol", s),
            BsonRef::JavaScriptCodeWithScope(c) => {
                self.push_str("{ \"$code\" : ");
                self.push_str_escaped(c.code);
                self.push_str(", \"$scope\" : ");
                self.document(c.scope, depth)?;
                self.push_str(" }");
            }
            BsonRef::Int32(n) => {
                if self.mode == Mode::Canonical {
                    self.wrapped_str("$numberInt", itoa::Buffer::new().format(n));
                } else {
                    self.long(n as i64);
                }
            }
            BsonRef::Timestamp(ts) => {
                self.push_str("{ \"$timestamp\" : { \"t\" : ");
                self.long(ts.timestamp as i64);
                self.push_str(", \"i\" : ");
                self.long(ts.increment as i64);
                self.push_str(" } }");
            }
            BsonRef::Int64(n) => {
                if self.mode == Mode::Canonical {
                    self.wrapped_str("$numberLong", itoa::Buffer::new().format(n));
                } else {
                    self.long(n);
                }
            }
            BsonRef::Decimal128(d) => self.wrapped_str("$numberDecimal", &d.to_string()),
            BsonRef::MaxKey => self.push_str("{ \"$maxKey\" : 1 }"),
            BsonRef::MinKey => self.push_str("{ \"$minKey\" : 1 }"),
        }
        Ok(())
    }
}

const BB: u8 = b'b'; // \x08
const TT: u8 = b't'; // \x09
const NN: u8 = b'n'; // \x0A
const FF: u8 = b'f'; // \x0C
const RR: u8 = b'r'; // \x0D
const QU: u8 = b'"'; // \x22
const BS: u8 = b'\\'; // \x5C
const U: u8 = b'u'; // \x00...\x1F except the ones above

// Lookup table of escape sequences. A value of b'x' at index i means that byte
// i is escaped as "\x" in JSON. A value of 0 means that byte i is not escaped.
#[rustfmt::skip]
static ESCAPE: [u8; 256] = [
    //  1   2   3   4   5   6   7   8   9   A   B   C   D   E   F
    U,  U,  U,  U,  U,  U,  U,  U, BB, TT, NN,  U, FF, RR,  U,  U, // 0
    U,  U,  U,  U,  U,  U,  U,  U,  U,  U,  U,  U,  U,  U,  U,  U, // 1
    0,  0, QU,  0,  0,  0,  0,  0,  0,  0,  0,  0,  0,  0,  0,  0, // 2
    0,  0,  0,  0,  0,  0,  0,  0,  0,  0,  0,  0,  0,  0,  0,  0, // 3
    0,  0,  0,  0,  0,  0,  0,  0,  0,  0,  0,  0,  0,  0,  0,  0, // 4
    0,  0,  0,  0,  0,  0,  0,  0,  0,  0,  0,  0, BS,  0,  0,  0, // 5
    0,  0,  0,  0,  0,  0,  0,  0,  0,  0,  0,  0,  0,  0,  0,  0, // 6
    0,  0,  0,  0,  0,  0,  0,  0,  0,  0,  0,  0,  0,  0,  0,  0, // 7
    0,  0,  0,  0,  0,  0,  0,  0,  0,  0,  0,  0,  0,  0,  0,  0, // 8
    0,  0,  0,  0,  0,  0,  0,  0,  0,  0,  0,  0,  0,  0,  0,  0, // 9
    0,  0,  0,  0,  0,  0,  0,  0,  0,  0,  0,  0,  0,  0,  0,  0, // A
    0,  0,  0,  0,  0,  0,  0,  0,  0,  0,  0,  0,  0,  0,  0,  0, // B
    0,  0,  0,  0,  0,  0,  0,  0,  0,  0,  0,  0,  0,  0,  0,  0, // C
    0,  0,  0,  0,  0,  0,  0,  0,  0,  0,  0,  0,  0,  0,  0,  0, // D
    0,  0,  0,  0,  0,  0,  0,  0,  0,  0,  0,  0,  0,  0,  0,  0, // E
    0,  0,  0,  0,  0,  0,  0,  0,  0,  0,  0,  0,  0,  0,  0,  0, // F
];
