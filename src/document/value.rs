use crate::document::View;
use crate::owned::{value_impl, OwnedBytes};

/// An owned, finalized BSON document.
///
/// Produced by [`Core::extract_document`](crate::builder::Core::extract_document)
/// or by copying a [`View`]. The buffer is released by its deleter exactly
/// once, when the value is dropped. Cloning copies the bytes.
#[derive(Clone)]
pub struct Value {
    bytes: OwnedBytes,
}

value_impl!(Value, View);
