//! Document codec error types.

use thiserror::Error;

use crate::tag::ElementTag;

/// Errors surfaced while decoding or projecting a document.
///
/// Encoding preconditions (appending to a finished builder, closing an
/// unfinished child, invalid ObjectId) are programmer errors and panic at
/// the call site instead of returning one of these.
#[derive(Debug, Error)]
pub enum BsonError {
    #[error("invalid element tag: {0:#04x}")]
    InvalidTag(u8),

    #[error("invalid type: expected {expected:?}, got {actual:?}")]
    UnexpectedTag {
        expected: ElementTag,
        actual: ElementTag,
    },

    #[error("document truncated while reading {0}")]
    Truncated(&'static str),

    #[error("invalid document length: declared {declared}, actual {actual}")]
    InvalidLength { declared: i64, actual: usize },

    #[error("missing document terminator")]
    MissingTerminator,

    #[error("unfinished document")]
    Unfinished,

    #[error("element name is not valid UTF-8")]
    InvalidName,

    #[error("string value is not valid UTF-8")]
    InvalidUtf8,

    #[error("invalid ObjectId: {0}")]
    InvalidObjectId(String),

    #[error("missing field: {0}")]
    MissingField(&'static str),

    #[error("cannot convert {actual} value into {expected}")]
    UnexpectedValue {
        expected: &'static str,
        actual: &'static str,
    },
}
