//! Statically checked builder.
//!
//! Each state of the key/value protocol is a distinct type exposing only the
//! operations legal in that state: a [`KeyContext`] (inside a document,
//! awaiting a key), a [`ValueContext`] (a key was given, awaiting its value)
//! and an [`ArrayContext`] (inside an array). Opening a frame nests the
//! current context as the type parameter, closing it hands the parent back,
//! and `finalize` only exists on the root.
//!
//! ```rust
//! use bsonbuf::builder::stream;
//!
//! let mut doc = stream::Document::new();
//! let value = doc
//!     .root()
//!     .key("x").value(1)
//!     .key("y").open_array().value("a").value("b").close_array()
//!     .finalize()?;
//!
//! assert_eq!(value.view().get("y")?.at(0)?.get_utf8()?, "a");
//! # Ok::<(), Box<dyn std::error::Error + Send + Sync>>(())
//! ```
//!
//! The grammar is enforced by the types; what can still fail at runtime
//! (a key with an embedded '\0', a malformed embedded view) is held back and
//! returned by `finalize`, and every operation after it is skipped.

use std::marker::PhantomData;

use crate::array;
use crate::builder::Core;
use crate::document;
use crate::error::Result;
use crate::types::BsonRef;

#[doc(hidden)]
pub struct State<'k> {
    core: Core<'k>,
    deferred: Result<()>,
}

impl<'k> State<'k> {
    fn new(is_array: bool) -> Self {
        State {
            core: Core::new(is_array),
            deferred: Ok(()),
        }
    }

    fn apply<F>(&mut self, op: F)
    where
        F: FnOnce(&mut Core<'k>) -> Result<()>,
    {
        if self.deferred.is_ok() {
            if let Err(e) = op(&mut self.core) {
                self.deferred = Err(e);
            }
        }
    }

    /// Drops frames and keys left behind by a context that was abandoned
    /// before it returned to the root.
    fn rewind(&mut self) {
        if self.core.depth() > 1 || self.core.has_key() {
            log::trace!("discarding {} unfinished frames", self.core.depth() - 1);
            self.core.clear();
            self.deferred = Ok(());
        }
    }

    fn take_deferred(&mut self) -> Result<()> {
        let deferred = std::mem::replace(&mut self.deferred, Ok(()));
        if deferred.is_err() {
            log::trace!("discarding poisoned builder");
            self.core.clear();
        }
        deferred
    }
}

/// Marker for the root frame; there is nothing to close back to.
pub struct Closed;

/// A context that can be resumed once a nested frame or a value completes.
pub trait Frame<'c, 'k>: Sized {
    #[doc(hidden)]
    fn resume(state: &'c mut State<'k>) -> Self;
}

/// Inside a document, awaiting the next key.
pub struct KeyContext<'c, 'k, B> {
    state: &'c mut State<'k>,
    parent: PhantomData<B>,
}

/// A key was set, awaiting its value. `P` is the document context the value
/// returns to.
pub struct ValueContext<'c, 'k, P> {
    state: &'c mut State<'k>,
    parent: PhantomData<P>,
}

/// Inside an array, values take the next index.
pub struct ArrayContext<'c, 'k, B> {
    state: &'c mut State<'k>,
    parent: PhantomData<B>,
}

impl<'c, 'k, B> Frame<'c, 'k> for KeyContext<'c, 'k, B> {
    fn resume(state: &'c mut State<'k>) -> Self {
        KeyContext {
            state,
            parent: PhantomData,
        }
    }
}

impl<'c, 'k, B> Frame<'c, 'k> for ArrayContext<'c, 'k, B> {
    fn resume(state: &'c mut State<'k>) -> Self {
        ArrayContext {
            state,
            parent: PhantomData,
        }
    }
}

impl<'c, 'k, B> KeyContext<'c, 'k, B> {
    pub fn key(self, key: &'k str) -> ValueContext<'c, 'k, Self> {
        self.state.apply(|core| core.key_view(key).map(drop));
        ValueContext {
            state: self.state,
            parent: PhantomData,
        }
    }

    pub fn key_owned(self, key: impl Into<String>) -> ValueContext<'c, 'k, Self> {
        self.state.apply(|core| core.key_owned(key).map(drop));
        ValueContext {
            state: self.state,
            parent: PhantomData,
        }
    }

    /// Appends every element of `view` to this document.
    pub fn concatenate(self, view: document::View) -> Self {
        self.state.apply(|core| core.concatenate(view).map(drop));
        self
    }
}

impl<'c, 'k, B: Frame<'c, 'k>> KeyContext<'c, 'k, B> {
    pub fn close_document(self) -> B {
        self.state.apply(|core| core.close_document().map(drop));
        B::resume(self.state)
    }
}

impl<'c, 'k> KeyContext<'c, 'k, Closed> {
    /// Finishes the root document, or returns the first error met while
    /// building it. Either way the builder is ready for a new document.
    pub fn finalize(self) -> Result<document::Value> {
        self.state.take_deferred()?;
        self.state.core.extract_document()
    }
}

impl<'c, 'k, P: Frame<'c, 'k>> ValueContext<'c, 'k, P> {
    pub fn value<'v>(self, value: impl Into<BsonRef<'v>>) -> P {
        self.state.apply(|core| core.append(value).map(drop));
        P::resume(self.state)
    }

    pub fn open_document(self) -> KeyContext<'c, 'k, P> {
        self.state.apply(|core| core.open_document().map(drop));
        KeyContext::resume(self.state)
    }

    pub fn open_array(self) -> ArrayContext<'c, 'k, P> {
        self.state.apply(|core| core.open_array().map(drop));
        ArrayContext::resume(self.state)
    }
}

impl<'c, 'k, B> ArrayContext<'c, 'k, B> {
    pub fn value<'v>(self, value: impl Into<BsonRef<'v>>) -> Self {
        self.state.apply(|core| core.append(value).map(drop));
        self
    }

    pub fn open_document(self) -> KeyContext<'c, 'k, Self> {
        self.state.apply(|core| core.open_document().map(drop));
        KeyContext::resume(self.state)
    }

    pub fn open_array(self) -> ArrayContext<'c, 'k, Self> {
        self.state.apply(|core| core.open_array().map(drop));
        ArrayContext::resume(self.state)
    }

    /// Appends every element of `view`, renumbered.
    pub fn concatenate(self, view: document::View) -> Self {
        self.state.apply(|core| core.concatenate(view).map(drop));
        self
    }
}

impl<'c, 'k, B: Frame<'c, 'k>> ArrayContext<'c, 'k, B> {
    pub fn close_array(self) -> B {
        self.state.apply(|core| core.close_array().map(drop));
        B::resume(self.state)
    }
}

impl<'c, 'k> ArrayContext<'c, 'k, Closed> {
    /// Finishes the root array, see [`KeyContext::finalize`].
    pub fn finalize(self) -> Result<array::Value> {
        self.state.take_deferred()?;
        self.state.core.extract_array()
    }
}

/// Owns the builder behind a statically checked document.
pub struct Document<'k> {
    state: State<'k>,
}

impl<'k> Document<'k> {
    pub fn new() -> Self {
        Document {
            state: State::new(false),
        }
    }

    /// Context of the root document. Frames left open by an earlier context
    /// that was dropped midway are discarded.
    pub fn root(&mut self) -> KeyContext<'_, 'k, Closed> {
        self.state.rewind();
        KeyContext {
            state: &mut self.state,
            parent: PhantomData,
        }
    }
}

impl<'k> Default for Document<'k> {
    fn default() -> Self {
        Document::new()
    }
}

/// Owns the builder behind a statically checked array.
pub struct Array<'k> {
    state: State<'k>,
}

impl<'k> Array<'k> {
    pub fn new() -> Self {
        Array {
            state: State::new(true),
        }
    }

    /// Context of the root array.
    pub fn root(&mut self) -> ArrayContext<'_, 'k, Closed> {
        self.state.rewind();
        ArrayContext {
            state: &mut self.state,
            parent: PhantomData,
        }
    }
}

impl<'k> Default for Array<'k> {
    fn default() -> Self {
        Array::new()
    }
}
