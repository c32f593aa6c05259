//! # redwood-bson
//!
//! Binary document codec for redwood.
//!
//! This crate provides:
//! - An incremental document builder with nested sub-document and array builders
//! - A forward iterator over finished document bytes
//! - A generic value bridge with fixed integer-narrowing rules
//! - Ordered (`Doc`) and unordered (`Map`) projections of a finished document
//!
//! The on-wire document layout is length-prefixed and self-describing; every
//! multi-byte field of a document is little-endian regardless of host order.
//! The [`ByteOrder`] codecs also cover big-endian because the wire protocol
//! negotiates frame byte order at connection time.

pub mod array;
pub mod byteorder;
pub mod document;
pub mod error;
pub mod iter;
mod render;
pub mod tag;
pub mod types;
pub mod value;
pub mod view;

pub use array::BsonArray;
pub use byteorder::{swap_i32, ByteOrder};
pub use document::Bson;
pub use error::BsonError;
pub use iter::{BsonIter, Element};
pub use tag::ElementTag;
pub use types::{Binary, Date, ObjectId, OrderKey, RegEx, Timestamp};
pub use value::{BsonRecord, BsonValue, ToBson};
pub use view::{Doc, DocElement, Map};

/// End-of-document terminator byte.
pub const EOD: u8 = 0x00;

/// Initial capacity of a document builder's buffer.
pub const INITIAL_BUFFER_SIZE: usize = 64;

/// Smallest legal document: the length prefix plus the terminator.
pub const MIN_DOCUMENT_SIZE: usize = 5;
