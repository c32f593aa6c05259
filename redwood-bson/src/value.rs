//! Generic value bridge.
//!
//! [`ToBson`] maps Rust values onto document elements with fixed narrowing
//! rules; [`BsonValue`] is the closed union the iterator and the
//! projections hand back.

use std::collections::HashMap;

use crate::document::Bson;
use crate::error::BsonError;
use crate::types::{Binary, Date, ObjectId, OrderKey, RegEx, Timestamp};
use crate::view::{Doc, Map};

/// A decoded element value.
///
/// Sub-documents appear either ordered ([`Doc`]) or unordered ([`Map`])
/// depending on which projection produced them; both kinds are appendable.
#[derive(Debug, Clone, PartialEq)]
pub enum BsonValue {
    Float64(f64),
    String(String),
    Document(Doc),
    Map(Map),
    Array(Vec<BsonValue>),
    Binary(Binary),
    ObjectId(ObjectId),
    Bool(bool),
    Date(Date),
    Null,
    RegEx(RegEx),
    Int32(i32),
    Timestamp(Timestamp),
    Int64(i64),
    MinKey,
    MaxKey,
}

impl BsonValue {
    /// Short kind name used in conversion errors.
    pub fn kind(&self) -> &'static str {
        match self {
            BsonValue::Float64(_) => "float64",
            BsonValue::String(_) => "string",
            BsonValue::Document(_) => "document",
            BsonValue::Map(_) => "map",
            BsonValue::Array(_) => "array",
            BsonValue::Binary(_) => "binary",
            BsonValue::ObjectId(_) => "ObjectId",
            BsonValue::Bool(_) => "bool",
            BsonValue::Date(_) => "date",
            BsonValue::Null => "null",
            BsonValue::RegEx(_) => "regex",
            BsonValue::Int32(_) => "int32",
            BsonValue::Timestamp(_) => "timestamp",
            BsonValue::Int64(_) => "int64",
            BsonValue::MinKey => "MinKey",
            BsonValue::MaxKey => "MaxKey",
        }
    }
}

/// Values that can be appended to a document under a name.
///
/// Integer widths narrow per the wire format: anything representable in a
/// signed 32-bit element is stored as Int32, wider signed values as Int64.
/// Unsigned values above `i64::MAX` panic because the format has no
/// unsigned 64-bit element.
pub trait ToBson {
    fn append_to(&self, bson: &mut Bson, name: &str);
}

fn append_narrowed_i64(bson: &mut Bson, name: &str, value: i64) {
    if (i64::from(i32::MIN)..=i64::from(i32::MAX)).contains(&value) {
        bson.append_i32(name, value as i32);
    } else {
        bson.append_i64(name, value);
    }
}

impl ToBson for f64 {
    fn append_to(&self, bson: &mut Bson, name: &str) {
        bson.append_f64(name, *self);
    }
}

impl ToBson for f32 {
    fn append_to(&self, bson: &mut Bson, name: &str) {
        bson.append_f64(name, f64::from(*self));
    }
}

impl ToBson for i8 {
    fn append_to(&self, bson: &mut Bson, name: &str) {
        bson.append_i32(name, i32::from(*self));
    }
}

impl ToBson for i16 {
    fn append_to(&self, bson: &mut Bson, name: &str) {
        bson.append_i32(name, i32::from(*self));
    }
}

impl ToBson for i32 {
    fn append_to(&self, bson: &mut Bson, name: &str) {
        bson.append_i32(name, *self);
    }
}

impl ToBson for i64 {
    fn append_to(&self, bson: &mut Bson, name: &str) {
        append_narrowed_i64(bson, name, *self);
    }
}

impl ToBson for isize {
    fn append_to(&self, bson: &mut Bson, name: &str) {
        append_narrowed_i64(bson, name, *self as i64);
    }
}

impl ToBson for u8 {
    fn append_to(&self, bson: &mut Bson, name: &str) {
        bson.append_i32(name, i32::from(*self));
    }
}

impl ToBson for u16 {
    fn append_to(&self, bson: &mut Bson, name: &str) {
        bson.append_i32(name, i32::from(*self));
    }
}

impl ToBson for u32 {
    fn append_to(&self, bson: &mut Bson, name: &str) {
        match i32::try_from(*self) {
            Ok(v) => bson.append_i32(name, v),
            Err(_) => bson.append_i64(name, i64::from(*self)),
        }
    }
}

impl ToBson for u64 {
    fn append_to(&self, bson: &mut Bson, name: &str) {
        let Ok(v) = i64::try_from(*self) else {
            panic!("no unsigned 64-bit element type; {self} does not fit in int64");
        };
        append_narrowed_i64(bson, name, v);
    }
}

impl ToBson for usize {
    fn append_to(&self, bson: &mut Bson, name: &str) {
        (*self as u64).append_to(bson, name);
    }
}

impl ToBson for bool {
    fn append_to(&self, bson: &mut Bson, name: &str) {
        bson.append_bool(name, *self);
    }
}

impl ToBson for str {
    fn append_to(&self, bson: &mut Bson, name: &str) {
        bson.append_str(name, self);
    }
}

impl ToBson for String {
    fn append_to(&self, bson: &mut Bson, name: &str) {
        bson.append_str(name, self);
    }
}

impl ToBson for ObjectId {
    fn append_to(&self, bson: &mut Bson, name: &str) {
        bson.append_object_id(name, *self);
    }
}

impl ToBson for Date {
    fn append_to(&self, bson: &mut Bson, name: &str) {
        bson.append_date(name, *self);
    }
}

impl ToBson for Timestamp {
    fn append_to(&self, bson: &mut Bson, name: &str) {
        bson.append_timestamp(name, *self);
    }
}

impl ToBson for RegEx {
    fn append_to(&self, bson: &mut Bson, name: &str) {
        bson.append_regex(name, self);
    }
}

impl ToBson for Binary {
    fn append_to(&self, bson: &mut Bson, name: &str) {
        bson.append_binary(name, self);
    }
}

impl ToBson for OrderKey {
    fn append_to(&self, bson: &mut Bson, name: &str) {
        match self {
            OrderKey::MinKey => bson.append_min_key(name),
            OrderKey::MaxKey => bson.append_max_key(name),
        }
    }
}

impl ToBson for Bson {
    fn append_to(&self, bson: &mut Bson, name: &str) {
        bson.append_bson(name, self);
    }
}

impl<T: ToBson> ToBson for Option<T> {
    fn append_to(&self, bson: &mut Bson, name: &str) {
        match self {
            Some(value) => value.append_to(bson, name),
            None => bson.append_null(name),
        }
    }
}

impl<T: ToBson + ?Sized> ToBson for &T {
    fn append_to(&self, bson: &mut Bson, name: &str) {
        (**self).append_to(bson, name);
    }
}

impl<T: ToBson> ToBson for [T] {
    fn append_to(&self, bson: &mut Bson, name: &str) {
        let mut child = bson.append_array_start(name);
        for item in self {
            child.push(item);
        }
        child.finish();
        bson.append_array_end(child);
    }
}

impl<T: ToBson> ToBson for Vec<T> {
    fn append_to(&self, bson: &mut Bson, name: &str) {
        self.as_slice().append_to(bson, name);
    }
}

impl<T: ToBson, const N: usize> ToBson for [T; N] {
    fn append_to(&self, bson: &mut Bson, name: &str) {
        self.as_slice().append_to(bson, name);
    }
}

impl<T: ToBson> ToBson for HashMap<String, T> {
    fn append_to(&self, bson: &mut Bson, name: &str) {
        let mut child = bson.append_document_start(name);
        for (key, value) in self {
            value.append_to(&mut child, key);
        }
        child.finish();
        bson.append_document_end(child);
    }
}

impl ToBson for BsonValue {
    fn append_to(&self, bson: &mut Bson, name: &str) {
        match self {
            BsonValue::Float64(v) => bson.append_f64(name, *v),
            BsonValue::String(v) => bson.append_str(name, v),
            BsonValue::Document(d) => d.append_to(bson, name),
            BsonValue::Map(m) => m.append_to(bson, name),
            BsonValue::Array(items) => {
                let mut child = bson.append_array_start(name);
                for item in items {
                    child.push(item);
                }
                child.finish();
                bson.append_array_end(child);
            }
            BsonValue::Binary(b) => bson.append_binary(name, b),
            BsonValue::ObjectId(id) => bson.append_object_id(name, *id),
            BsonValue::Bool(v) => bson.append_bool(name, *v),
            BsonValue::Date(v) => bson.append_date(name, *v),
            BsonValue::Null => bson.append_null(name),
            BsonValue::RegEx(r) => bson.append_regex(name, r),
            BsonValue::Int32(v) => bson.append_i32(name, *v),
            BsonValue::Timestamp(v) => bson.append_timestamp(name, *v),
            BsonValue::Int64(v) => append_narrowed_i64(bson, name, *v),
            BsonValue::MinKey => bson.append_min_key(name),
            BsonValue::MaxKey => bson.append_max_key(name),
        }
    }
}

/// Record types embeddable as sub-documents.
///
/// `append_fields` writes the fields in declaration order under their own
/// names; `from_doc` rebuilds the record from an ordered projection,
/// matching element names case-sensitively. Use [`bson_record!`] to derive
/// both from a field list.
pub trait BsonRecord {
    fn append_fields(&self, bson: &mut Bson);

    fn from_doc(doc: &Doc) -> Result<Self, BsonError>
    where
        Self: Sized;
}

/// Implements [`BsonRecord`] for a struct from its field list.
///
/// ```
/// use redwood_bson::{bson_record, Bson};
///
/// struct Point {
///     x: i32,
///     y: i32,
/// }
/// bson_record!(Point { x, y });
///
/// let mut bson = Bson::new();
/// bson.append_record("p", &Point { x: 1, y: 2 });
/// bson.finish();
/// ```
#[macro_export]
macro_rules! bson_record {
    ($ty:ident { $($field:ident),+ $(,)? }) => {
        impl $crate::BsonRecord for $ty {
            fn append_fields(&self, bson: &mut $crate::Bson) {
                $( bson.append(stringify!($field), &self.$field); )+
            }

            fn from_doc(doc: &$crate::Doc) -> Result<Self, $crate::BsonError> {
                Ok(Self {
                    $( $field: doc.extract(stringify!($field))?, )+
                })
            }
        }
    };
}

impl TryFrom<BsonValue> for f64 {
    type Error = BsonError;

    fn try_from(value: BsonValue) -> Result<Self, BsonError> {
        match value {
            BsonValue::Float64(v) => Ok(v),
            other => Err(BsonError::UnexpectedValue {
                expected: "float64",
                actual: other.kind(),
            }),
        }
    }
}

impl TryFrom<BsonValue> for i32 {
    type Error = BsonError;

    fn try_from(value: BsonValue) -> Result<Self, BsonError> {
        match value {
            BsonValue::Int32(v) => Ok(v),
            BsonValue::Int64(v) => i32::try_from(v).map_err(|_| BsonError::UnexpectedValue {
                expected: "int32",
                actual: "int64",
            }),
            other => Err(BsonError::UnexpectedValue {
                expected: "int32",
                actual: other.kind(),
            }),
        }
    }
}

impl TryFrom<BsonValue> for i64 {
    type Error = BsonError;

    /// Accepts Int32 too: the narrowing rules may have shrunk a 64-bit
    /// field on the way in.
    fn try_from(value: BsonValue) -> Result<Self, BsonError> {
        match value {
            BsonValue::Int32(v) => Ok(i64::from(v)),
            BsonValue::Int64(v) => Ok(v),
            other => Err(BsonError::UnexpectedValue {
                expected: "int64",
                actual: other.kind(),
            }),
        }
    }
}

impl TryFrom<BsonValue> for bool {
    type Error = BsonError;

    fn try_from(value: BsonValue) -> Result<Self, BsonError> {
        match value {
            BsonValue::Bool(v) => Ok(v),
            other => Err(BsonError::UnexpectedValue {
                expected: "bool",
                actual: other.kind(),
            }),
        }
    }
}

impl TryFrom<BsonValue> for String {
    type Error = BsonError;

    fn try_from(value: BsonValue) -> Result<Self, BsonError> {
        match value {
            BsonValue::String(v) => Ok(v),
            other => Err(BsonError::UnexpectedValue {
                expected: "string",
                actual: other.kind(),
            }),
        }
    }
}

impl TryFrom<BsonValue> for Date {
    type Error = BsonError;

    fn try_from(value: BsonValue) -> Result<Self, BsonError> {
        match value {
            BsonValue::Date(v) => Ok(v),
            other => Err(BsonError::UnexpectedValue {
                expected: "date",
                actual: other.kind(),
            }),
        }
    }
}

impl TryFrom<BsonValue> for ObjectId {
    type Error = BsonError;

    fn try_from(value: BsonValue) -> Result<Self, BsonError> {
        match value {
            BsonValue::ObjectId(v) => Ok(v),
            other => Err(BsonError::UnexpectedValue {
                expected: "ObjectId",
                actual: other.kind(),
            }),
        }
    }
}

impl TryFrom<BsonValue> for Timestamp {
    type Error = BsonError;

    fn try_from(value: BsonValue) -> Result<Self, BsonError> {
        match value {
            BsonValue::Timestamp(v) => Ok(v),
            other => Err(BsonError::UnexpectedValue {
                expected: "timestamp",
                actual: other.kind(),
            }),
        }
    }
}

impl TryFrom<BsonValue> for RegEx {
    type Error = BsonError;

    fn try_from(value: BsonValue) -> Result<Self, BsonError> {
        match value {
            BsonValue::RegEx(v) => Ok(v),
            other => Err(BsonError::UnexpectedValue {
                expected: "regex",
                actual: other.kind(),
            }),
        }
    }
}

impl TryFrom<BsonValue> for Binary {
    type Error = BsonError;

    fn try_from(value: BsonValue) -> Result<Self, BsonError> {
        match value {
            BsonValue::Binary(v) => Ok(v),
            other => Err(BsonError::UnexpectedValue {
                expected: "binary",
                actual: other.kind(),
            }),
        }
    }
}

impl TryFrom<BsonValue> for Doc {
    type Error = BsonError;

    fn try_from(value: BsonValue) -> Result<Self, BsonError> {
        match value {
            BsonValue::Document(v) => Ok(v),
            other => Err(BsonError::UnexpectedValue {
                expected: "document",
                actual: other.kind(),
            }),
        }
    }
}

impl TryFrom<BsonValue> for Map {
    type Error = BsonError;

    fn try_from(value: BsonValue) -> Result<Self, BsonError> {
        match value {
            BsonValue::Map(v) => Ok(v),
            other => Err(BsonError::UnexpectedValue {
                expected: "map",
                actual: other.kind(),
            }),
        }
    }
}

impl TryFrom<BsonValue> for Vec<BsonValue> {
    type Error = BsonError;

    fn try_from(value: BsonValue) -> Result<Self, BsonError> {
        match value {
            BsonValue::Array(v) => Ok(v),
            other => Err(BsonError::UnexpectedValue {
                expected: "array",
                actual: other.kind(),
            }),
        }
    }
}
