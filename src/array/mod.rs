//! Read-only views over BSON arrays.
//!
//! An array is encoded as a document whose keys are the decimal indexes
//! `"0"`, `"1"`, ... in order. Indexed lookup formats the index the same way
//! the builder does, so iteration and lookup always agree.

use std::fmt;

use crate::document::{self, Element, Iter};
use crate::error::Result;

mod value;

pub use self::value::Value;

/// Non-owning view over a BSON array.
#[derive(Copy, Clone, Default, PartialEq, Eq, Hash)]
pub struct View<'a> {
    inner: document::View<'a>,
}

impl<'a> View<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        View {
            inner: document::View::new(data),
        }
    }

    pub fn data(&self) -> &'a [u8] {
        self.inner.data()
    }

    pub fn length(&self) -> usize {
        self.inner.length()
    }

    pub fn iter(&self) -> Iter<'a> {
        self.inner.iter()
    }

    /// Scans for the element stored at `index`.
    pub fn find(&self, index: u32) -> Result<Option<Element<'a>>> {
        self.inner.find(itoa::Buffer::new().format(index))
    }

    /// Like [`find`](View::find) but yields an unset [`Element`] when out of
    /// range.
    pub fn get(&self, index: u32) -> Result<Element<'a>> {
        Ok(self.find(index)?.unwrap_or_default())
    }

    /// The same bytes seen as a document keyed by index strings.
    pub fn as_document(&self) -> document::View<'a> {
        self.inner
    }

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
        document::debug_array(*self, 0, f)
    }
}
