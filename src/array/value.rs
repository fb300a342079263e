use crate::array::View;
use crate::owned::{value_impl, OwnedBytes};

/// An owned, finalized BSON array.
#[derive(Clone)]
pub struct Value {
    bytes: OwnedBytes,
}

value_impl!(Value, View);
