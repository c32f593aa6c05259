//! Array builder.
//!
//! An array is encoded as a document whose element names are the decimal
//! indices "0", "1", … in order, with no gaps.

use std::fmt;

use crate::document::Bson;
use crate::error::BsonError;
use crate::iter::BsonIter;
use crate::render;
use crate::types::{Binary, Date, ObjectId, RegEx, Timestamp};
use crate::value::{BsonRecord, BsonValue, ToBson};
use crate::view;

/// An append-only array over the document encoding.
///
/// The builder keeps the running index and names each pushed element with
/// it; everything else defers to the inner [`Bson`] builder, including the
/// panics on misuse.
#[derive(Debug, Clone)]
pub struct BsonArray {
    bson: Bson,
    index: usize,
}

impl BsonArray {
    pub fn new() -> Self {
        BsonArray {
            bson: Bson::new(),
            index: 0,
        }
    }

    /// Wraps the bytes of an already finished array.
    pub fn from_bytes(raw: &[u8]) -> Self {
        BsonArray {
            bson: Bson::from_bytes(raw),
            index: 0,
        }
    }

    pub(crate) fn wrap(bson: Bson) -> Self {
        BsonArray { bson, index: 0 }
    }

    pub(crate) fn into_inner(self) -> Bson {
        self.bson
    }

    fn next_name(&mut self) -> String {
        let name = self.index.to_string();
        self.index += 1;
        name
    }

    pub fn push_f64(&mut self, value: f64) {
        let name = self.next_name();
        self.bson.append_f64(&name, value);
    }

    pub fn push_str(&mut self, value: &str) {
        let name = self.next_name();
        self.bson.append_str(&name, value);
    }

    pub fn push_bson(&mut self, value: &Bson) {
        let name = self.next_name();
        self.bson.append_bson(&name, value);
    }

    pub fn push_array(&mut self, value: &BsonArray) {
        let name = self.next_name();
        self.bson.append_array(&name, value);
    }

    pub fn push_binary(&mut self, value: &Binary) {
        let name = self.next_name();
        self.bson.append_binary(&name, value);
    }

    pub fn push_object_id(&mut self, value: ObjectId) {
        let name = self.next_name();
        self.bson.append_object_id(&name, value);
    }

    pub fn push_bool(&mut self, value: bool) {
        let name = self.next_name();
        self.bson.append_bool(&name, value);
    }

    pub fn push_date(&mut self, value: Date) {
        let name = self.next_name();
        self.bson.append_date(&name, value);
    }

    pub fn push_null(&mut self) {
        let name = self.next_name();
        self.bson.append_null(&name);
    }

    pub fn push_regex(&mut self, value: &RegEx) {
        let name = self.next_name();
        self.bson.append_regex(&name, value);
    }

    pub fn push_i32(&mut self, value: i32) {
        let name = self.next_name();
        self.bson.append_i32(&name, value);
    }

    pub fn push_timestamp(&mut self, value: Timestamp) {
        let name = self.next_name();
        self.bson.append_timestamp(&name, value);
    }

    pub fn push_i64(&mut self, value: i64) {
        let name = self.next_name();
        self.bson.append_i64(&name, value);
    }

    pub fn push_min_key(&mut self) {
        let name = self.next_name();
        self.bson.append_min_key(&name);
    }

    pub fn push_max_key(&mut self) {
        let name = self.next_name();
        self.bson.append_max_key(&name);
    }

    /// Pushes any bridgeable value, applying the [`ToBson`] narrowing rules.
    pub fn push(&mut self, value: impl ToBson) {
        let name = self.next_name();
        self.bson.append(&name, value);
    }

    /// Pushes a record as a sub-document element.
    pub fn push_record<R: BsonRecord>(&mut self, record: &R) {
        let name = self.next_name();
        self.bson.append_record(&name, record);
    }

    /// Opens a nested document element.
    pub fn start_document(&mut self) -> Bson {
        let name = self.next_name();
        self.bson.append_document_start(&name)
    }

    pub fn end_document(&mut self, child: Bson) {
        self.bson.append_document_end(child);
    }

    /// Opens a nested array element.
    pub fn start_array(&mut self) -> BsonArray {
        let name = self.next_name();
        self.bson.append_array_start(&name)
    }

    pub fn end_array(&mut self, child: BsonArray) {
        self.bson.append_array_end(child);
    }

    /// Terminates the array and backpatches its length prefix.
    pub fn finish(&mut self) {
        self.bson.finish();
    }

    pub fn is_finished(&self) -> bool {
        self.bson.is_finished()
    }

    /// Number of elements pushed through this builder.
    pub fn len(&self) -> usize {
        self.index
    }

    pub fn is_empty(&self) -> bool {
        self.index == 0
    }

    /// The finished array's bytes. Panics on an unfinished builder.
    pub fn raw(&self) -> &[u8] {
        self.bson.raw()
    }

    /// The declared total length from the prefix.
    pub fn len_prefix(&self) -> i32 {
        self.bson.len_prefix()
    }

    pub fn validate(&self) -> Result<(), BsonError> {
        self.bson.validate()
    }

    /// A cursor over the finished array's elements.
    pub fn iter(&self) -> Result<BsonIter<'_>, BsonError> {
        self.bson.iter()
    }

    /// Element values projected map-wise: nested documents become maps.
    pub fn to_map_values(&self) -> Result<Vec<BsonValue>, BsonError> {
        view::map_values(self.raw())
    }

    /// Element values projected doc-wise: nested documents stay ordered.
    pub fn to_doc_values(&self) -> Result<Vec<BsonValue>, BsonError> {
        view::doc_values(self.raw())
    }
}

impl Default for BsonArray {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for BsonArray {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.is_finished() {
            return write!(f, "<unfinished array>");
        }
        let mut out = String::new();
        match render::render_array(self.raw(), &mut out) {
            Ok(()) => f.write_str(&out),
            Err(e) => write!(f, "<invalid array: {e}>"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_names() {
        let mut arr = BsonArray::new();
        arr.push_i32(10);
        arr.push_str("x");
        arr.push_bool(false);
        arr.finish();

        let mut it = arr.iter().unwrap();
        let names: Vec<String> = std::iter::from_fn(|| it.try_next().unwrap())
            .map(|e| e.name().to_string())
            .collect();
        assert_eq!(names, ["0", "1", "2"]);
    }

    #[test]
    fn test_empty_array() {
        let mut arr = BsonArray::new();
        arr.finish();
        assert_eq!(arr.raw(), &[0x05, 0x00, 0x00, 0x00, 0x00]);
        assert!(arr.is_empty());
        assert_eq!(arr.to_string(), "[]");
    }

    #[test]
    fn test_display() {
        let mut arr = BsonArray::new();
        arr.push_i32(1);
        arr.push_str("two");
        arr.push_null();
        arr.finish();
        assert_eq!(arr.to_string(), r#"[1, "two", null]"#);
    }

    #[test]
    fn test_nested_document_in_array() {
        let mut arr = BsonArray::new();
        let mut doc = arr.start_document();
        doc.append_i32("a", 1);
        doc.finish();
        arr.end_document(doc);
        arr.finish();
        arr.validate().unwrap();
        assert_eq!(arr.to_string(), r#"[{"a":1}]"#);
    }

    #[test]
    fn test_nested_array_in_array() {
        let mut arr = BsonArray::new();
        let mut inner = arr.start_array();
        inner.push_i32(1);
        inner.push_i32(2);
        inner.finish();
        arr.end_array(inner);
        arr.finish();
        arr.validate().unwrap();
        assert_eq!(arr.to_string(), "[[1, 2]]");
    }

    #[test]
    fn test_push_applies_narrowing() {
        let mut arr = BsonArray::new();
        arr.push(5i64); // fits in int32
        arr.push(i64::from(i32::MAX) + 1);
        arr.finish();

        let mut it = arr.iter().unwrap();
        let first = it.try_next().unwrap().unwrap();
        assert_eq!(first.tag(), crate::tag::ElementTag::Int32);
        let second = it.try_next().unwrap().unwrap();
        assert_eq!(second.tag(), crate::tag::ElementTag::Int64);
    }

    #[test]
    fn test_map_and_doc_values() {
        let mut arr = BsonArray::new();
        let mut doc = arr.start_document();
        doc.append_i32("k", 9);
        doc.finish();
        arr.end_document(doc);
        arr.finish();

        match &arr.to_map_values().unwrap()[0] {
            BsonValue::Map(m) => assert_eq!(m.get("k"), Some(&BsonValue::Int32(9))),
            other => panic!("expected map, got {other:?}"),
        }
        match &arr.to_doc_values().unwrap()[0] {
            BsonValue::Document(d) => assert_eq!(d.get("k"), Some(&BsonValue::Int32(9))),
            other => panic!("expected doc, got {other:?}"),
        }
    }
}
