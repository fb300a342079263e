//! MongoDB Extended JSON.
//!
//! Rendering follows the spacing of the C driver,
//! `{ "x" : 1, "y" : [ "a", "b" ] }`, in either of the two modes:
//!
//! - [`Mode::Relaxed`] prints numbers natively and dates as ISO-8601 strings
//!   when they fall within years 1970 to 9999.
//! - [`Mode::Canonical`] wraps every number in `$numberInt`, `$numberLong` or
//!   `$numberDouble` so the exact BSON type survives a round trip.
//!
//! Parsing accepts either mode.
//!
//! ```rust
//! use bsonbuf::json::{self, Mode};
//!
//! let doc = json::from_json(r#"{ "x" : 1, "y" : [ "a", "b" ] }"#)?;
//! assert_eq!(json::to_json(doc.view(), Mode::Relaxed)?, r#"{ "x" : 1, "y" : [ "a", "b" ] }"#);
//! assert_eq!(json::to_json(doc.view(), Mode::Canonical)?, r#"{ "x" : { "$numberInt" : "1" }, "y" : [ "a", "b" ] }"#);
//! # Ok::<(), Box<dyn std::error::Error + Send + Sync>>(())
//! ```

mod de;
pub use self::de::from_json;

mod ser;
pub use self::ser::{array_to_json, to_json, MAX_DEPTH};

/// Extended JSON flavour to render.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Default)]
pub enum Mode {
    #[default]
    Relaxed,
    Canonical,
}
