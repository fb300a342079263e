//! Read-only views over BSON documents.
//!
//! A [`View`] is a borrowed window over bytes owned by someone else; it never
//! allocates and never inspects the bytes until it is iterated. Iteration is
//! lazy and restartable: each call to [`View::iter`] scans from the start.
//!
//! ```rust
//! use bsonbuf::document::View;
//!
//! // { "a" : null }
//! let bytes = [8, 0, 0, 0, 0x0A, b'a', 0, 0];
//! let view = View::new(&bytes);
//!
//! assert!(view.get("a")?.is_set());
//! assert!(!view.get("b")?.is_set());
//! # Ok::<(), Box<dyn std::error::Error + Send + Sync>>(())
//! ```

use std::fmt;
use std::iter::FusedIterator;

use crate::array;
use crate::error::{Error, ErrorCode, Result};
use crate::reader;
use crate::types::BsonRef;

mod element;
mod value;

pub use self::element::Element;
pub use self::value::Value;

/// Non-owning view over a BSON document.
///
/// Equality is byte-for-byte over the viewed slice.
#[derive(Copy, Clone, Default, PartialEq, Eq, Hash)]
pub struct View<'a> {
    data: &'a [u8],
}

impl<'a> View<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        View { data }
    }

    pub fn data(&self) -> &'a [u8] {
        self.data
    }

    pub fn length(&self) -> usize {
        self.data.len()
    }

    pub fn iter(&self) -> Iter<'a> {
        Iter::new(self.data)
    }

    /// Scans for the first element named `key`.
    pub fn find(&self, key: &str) -> Result<Option<Element<'a>>> {
        for element in self.iter() {
            let element = element?;
            if element.key_bytes() == key.as_bytes() {
                return Ok(Some(element));
            }
        }
        Ok(None)
    }

    /// Like [`find`](View::find) but yields an unset [`Element`] when the key
    /// is missing.
    pub fn get(&self, key: &str) -> Result<Element<'a>> {
        Ok(self.find(key)?.unwrap_or_default())
    }

    /// Copies the viewed bytes into an owned [`Value`].
    pub fn to_value(&self) -> Value {
        Value::from(*self)
    }
}

impl<'a> IntoIterator for View<'a> {
    type Item = Result<Element<'a>>;
    type IntoIter = Iter<'a>;

    fn into_iter(self) -> Iter<'a> {
        self.iter()
    }
}

impl<'a, 'b> IntoIterator for &'b View<'a> {
    type Item = Result<Element<'a>>;
    type IntoIter = Iter<'a>;

    fn into_iter(self) -> Iter<'a> {
        self.iter()
    }
}

impl<'a> From<&'a [u8]> for View<'a> {
    fn from(data: &'a [u8]) -> Self {
        View::new(data)
    }
}

impl<'a> fmt::Debug for View<'a> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        debug_document(*self, 0, f)
    }
}

/// Nesting level past which `Debug` output stops descending.
const MAX_DEBUG_DEPTH: usize = 100;

/// A value printed at a known nesting level.
struct Nested<'a> {
    value: BsonRef<'a>,
    depth: usize,
}

impl<'a> fmt::Debug for Nested<'a> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let depth = self.depth;
        match self.value {
            BsonRef::Document(view) => f
                .debug_tuple("Document")
                .field(&printer(move |f| debug_document(view, depth, f)))
                .finish(),
            BsonRef::Array(view) => f
                .debug_tuple("Array")
                .field(&printer(move |f| debug_array(view, depth, f)))
                .finish(),
            BsonRef::JavaScriptCodeWithScope(c) => {
                let scope = printer(move |f| debug_document(c.scope, depth, f));
                let code = printer(|f| {
                    f.debug_struct("CodeWithScope")
                        .field("code", &c.code)
                        .field("scope", &scope)
                        .finish()
                });
                f.debug_tuple("JavaScriptCodeWithScope").field(&code).finish()
            }
            value => fmt::Debug::fmt(&value, f),
        }
    }
}

fn printer<F>(print: F) -> impl fmt::Debug
where
    F: Fn(&mut fmt::Formatter) -> fmt::Result,
{
    struct Printer<F>(F);

    impl<F: Fn(&mut fmt::Formatter) -> fmt::Result> fmt::Debug for Printer<F> {
        fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
            (self.0)(f)
        }
    }

    Printer(print)
}

fn debug_document(view: View, depth: usize, f: &mut fmt::Formatter) -> fmt::Result {
    if depth > MAX_DEBUG_DEPTH {
        return f.write_str("<too deep>");
    }

    let mut map = f.debug_map();
    for element in view.iter() {
        match element.and_then(|e| Ok((e.key()?, e.value()?))) {
            Ok((key, value)) => map.entry(&key, &Nested { value, depth: depth + 1 }),
            Err(_) => map.entry(&"<invalid>", &view.data.len()),
        };
    }
    map.finish()
}

pub(crate) fn debug_array(view: array::View, depth: usize, f: &mut fmt::Formatter) -> fmt::Result {
    if depth > MAX_DEBUG_DEPTH {
        return f.write_str("<too deep>");
    }

    let mut list = f.debug_list();
    for element in view.iter() {
        match element.and_then(|e| e.value()) {
            Ok(value) => list.entry(&Nested { value, depth: depth + 1 }),
            Err(_) => list.entry(&"<invalid>"),
        };
    }
    list.finish()
}

/// Forward iterator over the elements of a document or array.
///
/// Yields an error once if the bytes are malformed, then stops.
#[derive(Clone)]
pub struct Iter<'a> {
    data: &'a [u8],
    offset: usize,
    end: usize,
    done: bool,
}

impl<'a> Iter<'a> {
    fn new(data: &'a [u8]) -> Self {
        Iter {
            data,
            offset: 0,
            end: 0,
            // An empty view has no elements
            done: data.is_empty(),
        }
    }

    fn fail(&mut self) -> Option<Result<Element<'a>>> {
        log::debug!("invalid BSON at offset {} of {}", self.offset, self.data.len());
        self.done = true;
        Some(Err(Error::from(ErrorCode::InvalidData).into()))
    }
}

impl<'a> Iterator for Iter<'a> {
    type Item = Result<Element<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        if self.offset == 0 {
            match reader::document_len(self.data) {
                Ok(len) => {
                    self.offset = 4;
                    self.end = len - 1;
                }
                Err(_) => return self.fail(),
            }
        }

        if self.offset >= self.end {
            self.done = true;
            return None;
        }

        let tag = self.data[self.offset];
        if tag == 0 {
            return self.fail();
        }

        let key_start = self.offset + 1;
        let key_len = match memchr::memchr(0, &self.data[key_start..self.end]) {
            Some(len) => len,
            None => return self.fail(),
        };
        if reader::utf8(&self.data[key_start..key_start + key_len]).is_err() {
            return self.fail();
        }

        let value_start = key_start + key_len + 1;
        let value_len = match reader::value_len(tag, &self.data[value_start..self.end]) {
            Ok(len) => len,
            Err(_) => return self.fail(),
        };

        let element = Element::new(self.data, self.offset, key_len, value_len);
        self.offset = value_start + value_len;
        Some(Ok(element))
    }
}

impl<'a> FusedIterator for Iter<'a> {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::error_code;
    use crate::types::ElementType;

    // { "a" : 1, "b" : "hi" }
    const DOC: &[u8] = &[
        0x16, 0, 0, 0, //
        0x10, b'a', 0, 1, 0, 0, 0, //
        0x02, b'b', 0, 3, 0, 0, 0, b'h', b'i', 0, //
        0,
    ];

    #[test]
    fn iterate_elements() {
        let view = View::new(DOC);
        let keys: Vec<_> = view.iter().map(|e| e.unwrap().key().unwrap()).collect();
        assert_eq!(keys, ["a", "b"]);

        // Restartable
        assert_eq!(view.iter().count(), 2);
        assert_eq!(view.get("b").unwrap().get_utf8().unwrap(), "hi");
        assert_eq!(view.find("a").unwrap().unwrap().element_type().unwrap(), ElementType::Int32);
        assert!(view.find("c").unwrap().is_none());
    }

    #[test]
    fn debug_stops_descending() {
        assert_eq!(format!("{:?}", View::new(DOC)), r#"{"a": Int32(1), "b": String("hi")}"#);

        let mut core = crate::builder::Core::new(false);
        for _ in 0..5_000 {
            core.key_view("a").unwrap().open_document().unwrap();
        }
        for _ in 0..5_000 {
            core.close_document().unwrap();
        }
        let doc = core.extract_document().unwrap();

        let text = format!("{:?}", doc.view());
        assert!(text.starts_with(r#"{"a": Document({"a": Document({"#));
        assert!(text.contains("Document(<too deep>)"));
        assert_eq!(text.matches("Document(").count(), MAX_DEBUG_DEPTH + 1);
    }

    #[test]
    fn empty_views() {
        assert_eq!(View::default().iter().count(), 0);
        assert_eq!(View::new(&[5, 0, 0, 0, 0]).iter().count(), 0);
        assert!(!View::default().get("a").unwrap().is_set());
    }

    #[test]
    fn malformed_data_is_reported_once() {
        let truncated = &DOC[..DOC.len() - 3];
        let mut iter = View::new(truncated).iter();
        assert_eq!(error_code(&iter.next().unwrap()), Some(ErrorCode::InvalidData));
        assert!(iter.next().is_none());

        // String length runs past the document
        let mut bad = DOC.to_vec();
        bad[14] = 0x40;
        let results: Vec<_> = View::new(&bad).iter().collect();
        assert_eq!(results.len(), 2);
        assert!(results[0].is_ok());
        assert_eq!(error_code(&results[1]), Some(ErrorCode::InvalidData));

        // Unknown type tag
        let mut bad = DOC.to_vec();
        bad[4] = 0x42;
        assert_eq!(error_code(&View::new(&bad).find("z")), Some(ErrorCode::InvalidData));
    }

    #[test]
    fn equality_is_by_bytes() {
        let copy = DOC.to_vec();
        assert_eq!(View::new(DOC), View::new(&copy));
        assert_ne!(View::new(DOC), View::default());
    }
}
