//! Incremental document builder.
//!
//! Document layout:
//!
//! ```text
//! +--------------+--------------------------------------------+------+
//! | total_length | element*                                   | 0x00 |
//! | int32 LE     | tag (1 byte) + name cstring + payload      |      |
//! +--------------+--------------------------------------------+------+
//! ```
//!
//! `total_length` counts the whole document including itself and the
//! terminator. Every multi-byte field is little-endian.

use std::fmt;
use std::mem;

use bytes::{BufMut, BytesMut};

use crate::array::BsonArray;
use crate::byteorder::ByteOrder;
use crate::error::BsonError;
use crate::iter::BsonIter;
use crate::render;
use crate::tag::ElementTag;
use crate::types::{Binary, Date, ObjectId, RegEx, Timestamp};
use crate::value::{BsonRecord, ToBson};
use crate::view::{Doc, Map};
use crate::{EOD, INITIAL_BUFFER_SIZE};

const LE: ByteOrder = ByteOrder::Little;

/// An append-only binary document.
///
/// A builder starts empty, grows through `append_*` calls, and becomes
/// immutable once [`finish`](Bson::finish) backpatches the length prefix.
/// A nested builder takes the buffer over for its lifetime; the parent
/// resumes when the finished child is handed back to
/// [`append_document_end`](Bson::append_document_end) or
/// [`append_array_end`](Bson::append_array_end).
///
/// Appending to a finished builder, appending while a child is open, and
/// closing an unfinished child are caller bugs and panic.
#[derive(Debug, Clone)]
pub struct Bson {
    raw: BytesMut,
    offset: usize,
    in_child: bool,
    finished: bool,
}

impl Bson {
    /// Creates an empty builder with the length prefix reserved.
    pub fn new() -> Self {
        let mut bson = Bson {
            raw: BytesMut::with_capacity(INITIAL_BUFFER_SIZE),
            offset: 0,
            in_child: false,
            finished: false,
        };
        bson.reserve_length();
        bson
    }

    /// Wraps the bytes of an already finished document.
    pub fn from_bytes(raw: &[u8]) -> Self {
        Bson {
            raw: BytesMut::from(raw),
            offset: 0,
            in_child: false,
            finished: true,
        }
    }

    /// A finished empty document: the five bytes `05 00 00 00 00`.
    pub fn empty() -> Self {
        let mut bson = Bson::new();
        bson.finish();
        bson
    }

    fn reserve_length(&mut self) {
        self.raw.put_i32_le(0);
    }

    fn check_can_append(&self) {
        assert!(!self.finished, "document is finished");
        assert!(!self.in_child, "a child builder is open");
    }

    fn put_cstring(&mut self, s: &str) {
        assert!(
            !s.as_bytes().contains(&0),
            "cstring contains an interior NUL"
        );
        self.raw.extend_from_slice(s.as_bytes());
        self.raw.put_u8(0);
    }

    fn put_element_header(&mut self, tag: ElementTag, name: &str) {
        self.raw.put_u8(tag as u8);
        self.put_cstring(name);
    }

    /// Appends a 64-bit float element.
    pub fn append_f64(&mut self, name: &str, value: f64) {
        self.check_can_append();
        self.put_element_header(ElementTag::Float64, name);
        LE.put_f64(&mut self.raw, value);
    }

    /// Appends a UTF-8 string element.
    pub fn append_str(&mut self, name: &str, value: &str) {
        self.check_can_append();
        self.put_element_header(ElementTag::String, name);
        LE.put_i32(&mut self.raw, value.len() as i32 + 1);
        self.raw.extend_from_slice(value.as_bytes());
        self.raw.put_u8(0);
    }

    /// Appends a finished document as a nested element.
    pub fn append_bson(&mut self, name: &str, value: &Bson) {
        self.check_can_append();
        self.put_element_header(ElementTag::Document, name);
        self.raw.extend_from_slice(value.raw());
    }

    /// Opens a nested document element. The child holds the buffer until it
    /// is finished and handed back to [`append_document_end`](Bson::append_document_end).
    pub fn append_document_start(&mut self, name: &str) -> Bson {
        self.check_can_append();
        self.put_element_header(ElementTag::Document, name);
        let offset = self.raw.len();
        let mut child = Bson {
            raw: mem::take(&mut self.raw),
            offset,
            in_child: false,
            finished: false,
        };
        child.reserve_length();
        self.in_child = true;
        child
    }

    /// Closes the child opened by [`append_document_start`](Bson::append_document_start).
    pub fn append_document_end(&mut self, child: Bson) {
        assert!(self.in_child, "no child builder is open");
        assert!(!self.finished, "document is finished");
        assert!(
            child.finished && child.raw.last() == Some(&EOD),
            "child document is not finished"
        );
        self.raw = child.raw;
        self.in_child = false;
    }

    /// Appends a finished array as a nested element.
    pub fn append_array(&mut self, name: &str, value: &BsonArray) {
        self.check_can_append();
        self.put_element_header(ElementTag::Array, name);
        self.raw.extend_from_slice(value.raw());
    }

    /// Opens a nested array element, symmetric to
    /// [`append_document_start`](Bson::append_document_start).
    pub fn append_array_start(&mut self, name: &str) -> BsonArray {
        self.check_can_append();
        self.put_element_header(ElementTag::Array, name);
        let offset = self.raw.len();
        let mut child = Bson {
            raw: mem::take(&mut self.raw),
            offset,
            in_child: false,
            finished: false,
        };
        child.reserve_length();
        self.in_child = true;
        BsonArray::wrap(child)
    }

    /// Closes the child opened by [`append_array_start`](Bson::append_array_start).
    pub fn append_array_end(&mut self, child: BsonArray) {
        let child = child.into_inner();
        assert!(self.in_child, "no child builder is open");
        assert!(!self.finished, "document is finished");
        assert!(
            child.finished && child.raw.last() == Some(&EOD),
            "child array is not finished"
        );
        self.raw = child.raw;
        self.in_child = false;
    }

    /// Appends a binary element: int32 length, subtype byte, payload.
    pub fn append_binary(&mut self, name: &str, value: &Binary) {
        self.check_can_append();
        self.put_element_header(ElementTag::Binary, name);
        LE.put_i32(&mut self.raw, value.data.len() as i32);
        self.raw.put_u8(value.subtype);
        self.raw.extend_from_slice(&value.data);
    }

    /// Appends an object-id element. The all-zero id is rejected.
    pub fn append_object_id(&mut self, name: &str, value: ObjectId) {
        self.check_can_append();
        assert!(value.is_valid(), "invalid ObjectId: {value}");
        self.put_element_header(ElementTag::ObjectId, name);
        self.raw.extend_from_slice(value.bytes());
    }

    pub fn append_bool(&mut self, name: &str, value: bool) {
        self.check_can_append();
        self.put_element_header(ElementTag::Bool, name);
        self.raw.put_u8(value as u8);
    }

    pub fn append_date(&mut self, name: &str, value: Date) {
        self.check_can_append();
        self.put_element_header(ElementTag::Date, name);
        LE.put_i64(&mut self.raw, value.millis());
    }

    pub fn append_null(&mut self, name: &str) {
        self.check_can_append();
        self.put_element_header(ElementTag::Null, name);
    }

    /// Appends a regex element: pattern cstring, options cstring.
    pub fn append_regex(&mut self, name: &str, value: &RegEx) {
        self.check_can_append();
        self.put_element_header(ElementTag::RegEx, name);
        self.put_cstring(&value.pattern);
        self.put_cstring(&value.options);
    }

    pub fn append_i32(&mut self, name: &str, value: i32) {
        self.check_can_append();
        self.put_element_header(ElementTag::Int32, name);
        LE.put_i32(&mut self.raw, value);
    }

    /// Appends a timestamp element: increment first, then second.
    pub fn append_timestamp(&mut self, name: &str, value: Timestamp) {
        self.check_can_append();
        self.put_element_header(ElementTag::Timestamp, name);
        LE.put_i32(&mut self.raw, value.increment);
        LE.put_i32(&mut self.raw, value.second);
    }

    pub fn append_i64(&mut self, name: &str, value: i64) {
        self.check_can_append();
        self.put_element_header(ElementTag::Int64, name);
        LE.put_i64(&mut self.raw, value);
    }

    pub fn append_min_key(&mut self, name: &str) {
        self.check_can_append();
        self.put_element_header(ElementTag::MinKey, name);
    }

    pub fn append_max_key(&mut self, name: &str) {
        self.check_can_append();
        self.put_element_header(ElementTag::MaxKey, name);
    }

    /// Appends any bridgeable value, applying the integer narrowing rules
    /// of [`ToBson`].
    pub fn append(&mut self, name: &str, value: impl ToBson) {
        value.append_to(self, name);
    }

    /// Appends a record as a sub-document element, fields in declaration
    /// order.
    pub fn append_record<R: BsonRecord>(&mut self, name: &str, record: &R) {
        let mut child = self.append_document_start(name);
        record.append_fields(&mut child);
        child.finish();
        self.append_document_end(child);
    }

    /// Terminates the document and backpatches its length prefix.
    pub fn finish(&mut self) {
        self.check_can_append();
        self.raw.put_u8(EOD);
        let len = (self.raw.len() - self.offset) as i32;
        LE.set_i32(&mut self.raw, self.offset, len);
        self.finished = true;
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// The finished document's bytes. Panics on an unfinished builder.
    pub fn raw(&self) -> &[u8] {
        assert!(self.finished, "document is unfinished");
        &self.raw[self.offset..]
    }

    /// The declared total length from the prefix. Panics on an unfinished
    /// builder.
    pub fn len_prefix(&self) -> i32 {
        assert!(self.finished, "document is unfinished");
        LE.read_i32(&self.raw[self.offset..])
    }

    /// Walks the whole document, surfacing malformed structure as an error.
    pub fn validate(&self) -> Result<(), BsonError> {
        if !self.finished {
            return Err(BsonError::Unfinished);
        }
        let mut it = self.iter()?;
        while let Some(element) = it.try_next()? {
            element.value()?;
        }
        Ok(())
    }

    /// A cursor over the finished document's elements.
    pub fn iter(&self) -> Result<BsonIter<'_>, BsonError> {
        BsonIter::new(self.raw())
    }

    /// Unordered projection; nested documents become nested maps.
    pub fn to_map(&self) -> Result<Map, BsonError> {
        Map::from_raw(self.raw())
    }

    /// Ordered projection preserving element order.
    pub fn to_doc(&self) -> Result<Doc, BsonError> {
        Doc::from_raw(self.raw())
    }

    /// The JSON-like diagnostic form, failing on malformed bytes.
    pub fn render(&self) -> Result<String, BsonError> {
        let mut out = String::new();
        render::render_document(self.raw(), &mut out)?;
        Ok(out)
    }
}

impl Default for Bson {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for Bson {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.finished {
            return write!(f, "<unfinished document>");
        }
        match self.render() {
            Ok(s) => f.write_str(&s),
            Err(e) => write!(f, "<invalid document: {e}>"),
        }
    }
}
