use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde_json::{Map, Number, Value as Json};
use std::convert::TryFrom;

use crate::builder::Core;
use crate::decimal128::Decimal128;
use crate::document;
use crate::error::{ErrorCode, Result};
use crate::oid::ObjectId;
use crate::types::{Binary, BsonRef, CodeWithScope, DateTime, DbPointer, Regex, Timestamp};

/// Parses a relaxed or canonical Extended JSON object into a document.
///
/// Integers become `Int32` when they fit and `Int64` otherwise; any other
/// number becomes a `Double`. Objects made of a single known `$` wrapper are
/// decoded into the type they stand for; other objects are kept as plain
/// embedded documents.
pub fn from_json(json: &str) -> Result<document::Value> {
    let parsed: Json = match serde_json::from_str(json) {
        Ok(parsed) => parsed,
        Err(e) => {
            log::debug!("rejecting JSON: {}", e);
            fail!(ErrorCode::JsonParseFailure);
        }
    };

    match &parsed {
        Json::Object(map) => document_from_map(map),
        _ => fail!(ErrorCode::JsonParseFailure),
    }
}

fn document_from_map(map: &Map<String, Json>) -> Result<document::Value> {
    let mut core = Core::new(false);
    for (key, value) in map {
        core.key_view(key)?;
        append(&mut core, value)?;
    }
    core.extract_document()
}

fn append<'k>(core: &mut Core<'k>, value: &'k Json) -> Result<()> {
    match value {
        Json::Null => {
            core.append(())?;
        }
        Json::Bool(b) => {
            core.append(*b)?;
        }
        Json::Number(n) => {
            core.append(number(n)?)?;
        }
        Json::String(s) => {
            core.append(s.as_str())?;
        }
        Json::Array(items) => {
            core.open_array()?;
            for item in items {
                append(core, item)?;
            }
            core.close_array()?;
        }
        Json::Object(map) => {
            if !append_extended(core, map)? {
                core.open_document()?;
                for (key, value) in map {
                    core.key_view(key)?;
                    append(core, value)?;
                }
                core.close_document()?;
            }
        }
    }
    Ok(())
}

fn number(n: &Number) -> Result<BsonRef<'static>> {
    if let Some(i) = n.as_i64() {
        return Ok(match i32::try_from(i) {
            Ok(i) => BsonRef::Int32(i),
            Err(_) => BsonRef::Int64(i),
        });
    }
    match n.as_f64() {
        Some(f) => Ok(BsonRef::Double(f)),
        None => fail!(ErrorCode::JsonParseFailure),
    }
}

fn parsed<T, E>(result: std::result::Result<T, E>) -> Result<T> {
    match result {
        Ok(v) => Ok(v),
        Err(_) => fail!(ErrorCode::JsonParseFailure),
    }
}

fn string(value: &Json) -> Result<&str> {
    match value {
        Json::String(s) => Ok(s),
        _ => fail!(ErrorCode::JsonParseFailure),
    }
}

fn field<'a>(value: &'a Json, name: &str) -> Result<&'a Json> {
    match value.get(name) {
        Some(v) => Ok(v),
        None => fail!(ErrorCode::JsonParseFailure),
    }
}

fn uint32(value: &Json) -> Result<u32> {
    parsed(u32::try_from(value.as_u64().unwrap_or(u64::MAX)))
}

fn date_millis(value: &Json) -> Result<i64> {
    match value {
        Json::String(s) => Ok(parsed(chrono::DateTime::parse_from_rfc3339(s))?.timestamp_millis()),
        Json::Number(n) => parsed(n.as_i64().ok_or(())),
        Json::Object(_) => parsed(string(field(value, "$numberLong")?)?.parse()),
        _ => fail!(ErrorCode::JsonParseFailure),
    }
}

/// Appends `map` as the type its `$` wrapper names. Returns `false`, having
/// appended nothing, if it is not a known wrapper.
fn append_extended(core: &mut Core, map: &Map<String, Json>) -> Result<bool> {
    let name = match map.keys().next() {
        Some(name) if name.starts_with('$') => name.as_str(),
        _ => return Ok(false),
    };
    let value = &map[name];

    match (name, map.len()) {
        ("$oid", 1) => {
            core.append(parsed(ObjectId::parse_str(string(value)?))?)?;
        }
        ("$numberInt", 1) => {
            core.append(parsed(string(value)?.parse::<i32>())?)?;
        }
        ("$numberLong", 1) => {
            core.append(parsed(string(value)?.parse::<i64>())?)?;
        }
        ("$numberDouble", 1) => {
            let n = match string(value)? {
                "Infinity" => f64::INFINITY,
                "-Infinity" => f64::NEG_INFINITY,
                "NaN" => f64::NAN,
                s => parsed(s.parse::<f64>())?,
            };
            core.append(n)?;
        }
        ("$numberDecimal", 1) => {
            core.append(parsed(string(value)?.parse::<Decimal128>())?)?;
        }
        ("$date", 1) => {
            core.append(DateTime(date_millis(value)?))?;
        }
        ("$binary", 1) => {
            let bytes = parsed(STANDARD.decode(string(field(value, "base64")?)?))?;
            let subtype = string(field(value, "subType")?)?;
            if subtype.is_empty() || subtype.len() > 2 {
                fail!(ErrorCode::JsonParseFailure);
            }
            let subtype = parsed(u8::from_str_radix(subtype, 16))?;
            core.append(Binary {
                subtype: subtype.into(),
                bytes: &bytes,
            })?;
        }
        ("$timestamp", 1) => {
            core.append(Timestamp {
                timestamp: uint32(field(value, "t")?)?,
                increment: uint32(field(value, "i")?)?,
            })?;
        }
        ("$regularExpression", 1) => {
            core.append(Regex {
                pattern: string(field(value, "pattern")?)?,
                options: string(field(value, "options")?)?,
            })?;
        }
        ("$dbPointer", 1) => {
            let id = string(field(field(value, "$id")?, "$oid")?)?;
            core.append(DbPointer {
                collection: string(field(value, "$ref")?)?,
                id: parsed(ObjectId::parse_str(id))?,
            })?;
        }
        ("$symbol", 1) => {
            core.append(BsonRef::Symbol(string(value)?))?;
        }
        ("$code", 1) => {
            core.append(BsonRef::JavaScriptCode(string(value)?))?;
        }
        ("$code", 2) | ("$scope", 2) => {
            let code = match map.get("$code") {
                Some(code) => string(code)?,
                None => return Ok(false),
            };
            let scope = match map.get("$scope") {
                Some(Json::Object(scope)) => document_from_map(scope)?,
                _ => fail!(ErrorCode::JsonParseFailure),
            };
            core.append(CodeWithScope {
                code,
                scope: scope.view(),
            })?;
        }
        ("$undefined", 1) => {
            core.append(BsonRef::Undefined)?;
        }
        ("$minKey", 1) => {
            core.append(BsonRef::MinKey)?;
        }
        ("$maxKey", 1) => {
            core.append(BsonRef::MaxKey)?;
        }
        _ => return Ok(false),
    }
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::error_code;
    use crate::json::{to_json, Mode};
    use crate::types::{BinarySubtype, ElementType};

    fn round_trip(json: &str, mode: Mode) -> String {
        to_json(from_json(json).unwrap().view(), mode).unwrap()
    }

    #[test]
    fn numbers_pick_the_narrowest_type() {
        let doc = from_json(r#"{"a": 1, "b": 3000000000, "c": 1.0, "d": -2147483648}"#).unwrap();
        let view = doc.view();
        assert_eq!(view.get("a").unwrap().element_type().unwrap(), ElementType::Int32);
        assert_eq!(view.get("b").unwrap().get_int64().unwrap(), 3_000_000_000);
        assert_eq!(view.get("c").unwrap().get_double().unwrap(), 1.0);
        assert_eq!(view.get("d").unwrap().get_int32().unwrap(), i32::MIN);
    }

    #[test]
    fn key_order_is_kept() {
        let doc = from_json(r#"{"z": 1, "a": 2, "m": 3}"#).unwrap();
        let keys: Vec<_> = doc.view().iter().map(|e| e.unwrap().key().unwrap().to_owned()).collect();
        assert_eq!(keys, ["z", "a", "m"]);
    }

    #[test]
    fn canonical_wrappers_round_trip() {
        let json = r#"{ "i" : { "$numberInt" : "7" }, "l" : { "$numberLong" : "7" }, "d" : { "$numberDouble" : "NaN" }, "o" : { "$oid" : "507f1f77bcf86cd799439011" }, "t" : { "$date" : { "$numberLong" : "1500" } }, "x" : { "$numberDecimal" : "1.5" } }"#;
        assert_eq!(round_trip(json, Mode::Canonical), json);
    }

    #[test]
    fn relaxed_wrappers_round_trip() {
        let json = r#"{ "b" : { "$binary" : { "base64" : "AQID", "subType" : "80" } }, "r" : { "$regularExpression" : { "pattern" : "^a", "options" : "im" } }, "c" : { "$code" : "f()", "$scope" : { "x" : 1 } }, "p" : { "$dbPointer" : { "$ref" : "c", "$id" : { "$oid" : "507f1f77bcf86cd799439011" } } }, "u" : { "$undefined" : true }, "k" : { "$maxKey" : 1 }, "s" : { "$symbol" : "sym" }, "ts" : { "$timestamp" : { "t" : 1, "i" : 2 } }, "dt" : { "$date" : "2020-01-02T03:04:05.678Z" } }"#;
        assert_eq!(round_trip(json, Mode::Relaxed), json);

        let doc = from_json(json).unwrap();
        let b = doc.view().get("b").unwrap().get_binary().unwrap();
        assert_eq!(b.subtype, BinarySubtype::UserDefined(0x80));
        assert_eq!(b.bytes, &[1, 2, 3]);
    }

    #[test]
    fn unknown_dollar_keys_stay_documents() {
        let doc = from_json(r#"{"q": {"$set": {"a": 1}}}"#).unwrap();
        let q = doc.view().get("q").unwrap();
        assert_eq!(q.get("$set").unwrap().get("a").unwrap().get_int32().unwrap(), 1);
    }

    #[test]
    fn rejects_non_objects_and_bad_wrappers() {
        assert_eq!(error_code(&from_json("[1, 2]")), Some(ErrorCode::JsonParseFailure));
        assert_eq!(error_code(&from_json("{")), Some(ErrorCode::JsonParseFailure));
        assert_eq!(
            error_code(&from_json(r#"{"o": {"$oid": "zz"}}"#)),
            Some(ErrorCode::JsonParseFailure)
        );
        assert_eq!(
            error_code(&from_json(r#"{"n": {"$numberInt": "3000000000"}}"#)),
            Some(ErrorCode::JsonParseFailure)
        );
    }
}
