use std::fmt::{self, Display};

use crate::types::ElementType;

/// Reason an operation on a builder, view or element failed.
///
/// Every failure is local and synchronous; the object that reported it is left
/// exactly as it was before the call.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// A key was set while the innermost open frame is an array.
    CannotAppendKeyInSubArray,
    /// An array was closed while the innermost open frame is a document.
    CannotCloseArrayInSubDocument,
    /// A document was closed while the innermost open frame is an array.
    CannotCloseDocumentInSubArray,
    /// An array operation was performed on a document root.
    CannotPerformArrayOperationOnDocument,
    /// A document operation was performed on an array root.
    CannotPerformDocumentOperationOnArray,
    /// A value was appended to a document with no pending key.
    NeedKey,
    /// `close_array` was called with only the root frame open.
    NoArrayToClose,
    /// `close_document` was called with only the root frame open.
    NoDocumentToClose,
    /// A key is still waiting for its value, or frames above the root are open.
    UnmatchedKeyInBuilder,
    /// The element does not hold the requested type.
    NeedElementType(ElementType),
    /// An unset element was accessed.
    UnsetElement,
    /// The bytes are not well-formed BSON.
    InvalidData,
    /// The key or value could not be encoded as the given type.
    CannotAppend(ElementType),
    /// Not a valid ObjectId.
    InvalidOid,
    /// Not a valid Decimal128.
    InvalidDecimal128,
    /// Unknown element type tag.
    InvalidBsonTypeId,
    /// A JSON document failed to parse.
    JsonParseFailure,
    /// The value is nested too deeply to be rendered as JSON.
    FailedConvertingBsonToJson,
    /// A binary value is not a well-formed vector of the requested format.
    InvalidVector,
    /// Vector index past the last element.
    VectorOutOfRange,
}

impl ErrorCode {
    fn message(&self) -> &'static str {
        use ErrorCode::*;

        match self {
            CannotAppendKeyInSubArray => "a key cannot be appended inside an array",
            CannotCloseArrayInSubDocument => "an array cannot be closed while a document is open",
            CannotCloseDocumentInSubArray => "a document cannot be closed while an array is open",
            CannotPerformArrayOperationOnDocument => "an array operation was used on a document",
            CannotPerformDocumentOperationOnArray => "a document operation was used on an array",
            NeedKey => "a key is required before appending a value to a document",
            NoArrayToClose => "no array is open",
            NoDocumentToClose => "no document is open",
            UnmatchedKeyInBuilder => "a key or sub-document is still awaiting completion",
            NeedElementType(_) => "element has a different type",
            UnsetElement => "element is unset",
            InvalidData => "data is invalid",
            CannotAppend(_) => "value cannot be appended",
            InvalidOid => "invalid ObjectId",
            InvalidDecimal128 => "invalid Decimal128",
            InvalidBsonTypeId => "invalid element type",
            JsonParseFailure => "failed to parse JSON",
            FailedConvertingBsonToJson => "nesting is too deep to convert to JSON",
            InvalidVector => "invalid vector",
            VectorOutOfRange => "vector index out of range",
        }
    }
}

/// Error type returned when building or traversing BSON fails.
///
/// Carries only the [`ErrorCode`]; there is nothing transient to retry.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Error {
    code: ErrorCode,
}

impl Error {
    pub fn code(&self) -> ErrorCode {
        self.code
    }
}

impl From<ErrorCode> for Error {
    fn from(code: ErrorCode) -> Self {
        Error { code }
    }
}

/// Result type returned by fallible operations.
#[cfg(not(feature = "error"))]
pub type Result<T> = std::result::Result<T, Error>;

/// Result type returned by fallible operations.
#[cfg(feature = "error")]
pub type Result<T> = anyhow::Result<T>;

/// Error code of a failed result, whichever `Result` flavour is enabled.
#[cfg(not(feature = "error"))]
pub fn error_code<T>(result: &Result<T>) -> Option<ErrorCode> {
    result.as_ref().err().map(Error::code)
}

/// Error code of a failed result, whichever `Result` flavour is enabled.
#[cfg(feature = "error")]
pub fn error_code<T>(result: &Result<T>) -> Option<ErrorCode> {
    result
        .as_ref()
        .err()
        .and_then(|e| e.downcast_ref::<Error>())
        .map(Error::code)
}

impl Display for Error {
    fn fmt(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        match self.code {
            ErrorCode::NeedElementType(t) | ErrorCode::CannotAppend(t) => {
                write!(formatter, "{} ({:?})", self.code.message(), t)
            }
            _ => formatter.write_str(self.code.message()),
        }
    }
}

impl std::error::Error for Error {}

/// Returns early with the given [`ErrorCode`].
macro_rules! fail {
    ($code:expr) => {
        return Err($crate::error::Error::from($code).into())
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_names_type() {
        let e = Error::from(ErrorCode::NeedElementType(ElementType::Int32));
        assert_eq!(e.to_string(), "element has a different type (Int32)");
        assert_eq!(Error::from(ErrorCode::NeedKey).code(), ErrorCode::NeedKey);
    }

    #[test]
    fn code_of_result() {
        let ok: Result<()> = Ok(());
        assert_eq!(error_code(&ok), None);

        let err: Result<()> = Err(Error::from(ErrorCode::InvalidData).into());
        assert_eq!(error_code(&err), Some(ErrorCode::InvalidData));
    }
}
