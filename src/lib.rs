//! BSON documents built in place and read without copying.
//!
//! [`Core`] appends keys and values straight into a growable buffer, keeping a
//! stack of open documents and arrays and back-patching each length prefix
//! when its frame closes. Finished bytes are read through borrowed
//! [`document::View`]s and [`array::View`]s, or extracted as owning
//! [`document::Value`]s whose memory can be handed across an ownership
//! boundary with the [`owned`] transfer rules.
//!
//! # Builder
//!
//! ```rust
//! use bsonbuf::{Core, ElementType};
//!
//! let mut core = Core::new(false);
//! core.key_view("name")?.append("bson")?;
//! core.key_view("tags")?.open_array()?.append(1)?.append(2.5)?.close_array()?;
//!
//! let doc = core.extract_document()?;
//! let tags = doc.view().get("tags")?;
//! assert_eq!(tags.at(1)?.element_type()?, ElementType::Double);
//! assert!(doc.view().get("missing")?.get_null().is_err());
//! # Ok::<(), Box<dyn std::error::Error + Send + Sync>>(())
//! ```
//!
//! # Stream
//!
//! The [`builder::stream`] types encode the key/value protocol in the type
//! system, so a value without a key or an unbalanced close does not compile.
//!
//! # Values and vectors
//!
//! [`BsonRef`] borrows a decoded value from its buffer and [`Bson`] owns one.
//! Binary vectors of `int8`, `float32` or packed bits are read and written
//! through the [`vector`] module.
//!
//! # Features
//!
//! - `json` (default): Extended JSON through the [`json`] module.
//! - `error`: fallible operations return [`anyhow::Result`]; the code is
//!   still reachable with [`error_code`].

#![doc(html_root_url = "https://docs.rs/bsonbuf/0.1.0")]

#[macro_use]
mod error;

pub mod buffer;
mod reader;

pub mod array;
pub mod builder;
pub mod decimal128;
pub mod document;
pub mod oid;
pub mod owned;
pub mod types;
pub mod vector;

#[cfg(feature = "json")]
pub mod json;

pub use crate::builder::Core;
pub use crate::decimal128::Decimal128;
pub use crate::error::{error_code, Error, ErrorCode, Result};
pub use crate::oid::ObjectId;
#[doc(inline)]
pub use crate::types::*;

#[cfg(target_endian = "big")]
#[allow(unused)]
pub fn check_endianness() {
    compile_error!("BSON is little endian on the wire and values are read and patched in place");
}
