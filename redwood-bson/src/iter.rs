//! Forward iterator over finished document bytes.

use std::str;

use crate::byteorder::ByteOrder;
use crate::error::BsonError;
use crate::tag::ElementTag;
use crate::types::{Binary, Date, ObjectId, RegEx, Timestamp};
use crate::value::BsonValue;
use crate::view::{self, Doc};
use crate::{EOD, MIN_DOCUMENT_SIZE};

const LE: ByteOrder = ByteOrder::Little;

/// A forward, non-restartable cursor over a finished document.
///
/// The cursor never reads past the declared total length; a decode failure
/// leaves it stuck at the failing element.
pub struct BsonIter<'a> {
    raw: &'a [u8],
    pos: usize,
}

impl<'a> BsonIter<'a> {
    /// Wraps document bytes, checking the length prefix against the slice.
    pub fn new(raw: &'a [u8]) -> Result<Self, BsonError> {
        if raw.len() < MIN_DOCUMENT_SIZE {
            return Err(BsonError::Truncated("document header"));
        }
        let declared = LE.read_i32(raw);
        if declared < MIN_DOCUMENT_SIZE as i32 || declared as usize != raw.len() {
            return Err(BsonError::InvalidLength {
                declared: i64::from(declared),
                actual: raw.len(),
            });
        }
        Ok(BsonIter { raw, pos: 4 })
    }

    /// True when another element follows the current position.
    pub fn more(&self) -> bool {
        self.pos < self.raw.len() && self.raw[self.pos] != EOD
    }

    /// Advances to the next element; `None` once the terminator is reached.
    pub fn try_next(&mut self) -> Result<Option<Element<'a>>, BsonError> {
        if self.pos >= self.raw.len() {
            return Err(BsonError::MissingTerminator);
        }
        let tag_byte = self.raw[self.pos];
        if tag_byte == EOD {
            if self.pos != self.raw.len() - 1 {
                // bytes after the terminator contradict the length prefix
                return Err(BsonError::InvalidLength {
                    declared: self.raw.len() as i64,
                    actual: self.pos + 1,
                });
            }
            return Ok(None);
        }
        let tag = ElementTag::try_from(tag_byte)?;

        let name_start = self.pos + 1;
        let name_end = match self.raw[name_start..].iter().position(|&b| b == 0) {
            Some(i) => name_start + i,
            None => return Err(BsonError::Truncated("element name")),
        };
        let name = str::from_utf8(&self.raw[name_start..name_end])
            .map_err(|_| BsonError::InvalidName)?;

        let value_start = name_end + 1;
        let value_len = self.value_len(tag, value_start)?;
        let value = &self.raw[value_start..value_start + value_len];
        self.pos = value_start + value_len;
        Ok(Some(Element { tag, name, value }))
    }

    /// Size of the value starting at `pos`, bounded by the terminator.
    fn value_len(&self, tag: ElementTag, pos: usize) -> Result<usize, BsonError> {
        // the last byte of the document is the terminator, never value data
        let avail = (self.raw.len() - 1).saturating_sub(pos);
        let fixed = |need: usize, what: &'static str| {
            if avail < need {
                Err(BsonError::Truncated(what))
            } else {
                Ok(need)
            }
        };
        match tag {
            ElementTag::Float64 => fixed(8, "float64 value"),
            ElementTag::String => {
                fixed(4, "string length")?;
                let len = LE.read_i32(&self.raw[pos..]);
                if len < 1 {
                    return Err(BsonError::InvalidLength {
                        declared: i64::from(len),
                        actual: avail,
                    });
                }
                fixed(4 + len as usize, "string value")
            }
            ElementTag::Document | ElementTag::Array => {
                fixed(4, "document length")?;
                let len = LE.read_i32(&self.raw[pos..]);
                if len < MIN_DOCUMENT_SIZE as i32 {
                    return Err(BsonError::InvalidLength {
                        declared: i64::from(len),
                        actual: avail,
                    });
                }
                fixed(len as usize, "nested document")
            }
            ElementTag::Binary => {
                fixed(5, "binary length")?;
                let len = LE.read_i32(&self.raw[pos..]);
                if len < 0 {
                    return Err(BsonError::InvalidLength {
                        declared: i64::from(len),
                        actual: avail,
                    });
                }
                fixed(5 + len as usize, "binary value")
            }
            ElementTag::ObjectId => fixed(12, "ObjectId value"),
            ElementTag::Bool => fixed(1, "bool value"),
            ElementTag::Date => fixed(8, "date value"),
            ElementTag::RegEx => {
                let limit = self.raw.len() - 1;
                let rest = &self.raw[pos.min(limit)..limit];
                let first = rest
                    .iter()
                    .position(|&b| b == 0)
                    .ok_or(BsonError::Truncated("regex pattern"))?;
                let second = rest[first + 1..]
                    .iter()
                    .position(|&b| b == 0)
                    .ok_or(BsonError::Truncated("regex options"))?;
                Ok(first + 1 + second + 1)
            }
            ElementTag::Int32 => fixed(4, "int32 value"),
            ElementTag::Timestamp => fixed(8, "timestamp value"),
            ElementTag::Int64 => fixed(8, "int64 value"),
            ElementTag::Null | ElementTag::MinKey | ElementTag::MaxKey => Ok(0),
        }
    }
}

impl<'a> Iterator for BsonIter<'a> {
    type Item = Result<Element<'a>, BsonError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.try_next().transpose()
    }
}

/// One `(tag, name, value)` triple borrowed from a document.
///
/// Typed accessors check the tag and fail with
/// [`BsonError::UnexpectedTag`] on a mismatch.
#[derive(Debug, Clone, Copy)]
pub struct Element<'a> {
    tag: ElementTag,
    name: &'a str,
    value: &'a [u8],
}

impl<'a> Element<'a> {
    pub fn tag(&self) -> ElementTag {
        self.tag
    }

    pub fn name(&self) -> &'a str {
        self.name
    }

    /// The raw payload bytes of this element.
    pub fn value_bytes(&self) -> &'a [u8] {
        self.value
    }

    fn expect_tag(&self, expected: ElementTag) -> Result<(), BsonError> {
        if self.tag != expected {
            return Err(BsonError::UnexpectedTag {
                expected,
                actual: self.tag,
            });
        }
        Ok(())
    }

    pub fn as_f64(&self) -> Result<f64, BsonError> {
        self.expect_tag(ElementTag::Float64)?;
        Ok(LE.read_f64(self.value))
    }

    pub fn as_str(&self) -> Result<&'a str, BsonError> {
        self.expect_tag(ElementTag::String)?;
        let len = LE.read_i32(self.value) as usize;
        str::from_utf8(&self.value[4..4 + len - 1]).map_err(|_| BsonError::InvalidUtf8)
    }

    pub fn as_i32(&self) -> Result<i32, BsonError> {
        self.expect_tag(ElementTag::Int32)?;
        Ok(LE.read_i32(self.value))
    }

    pub fn as_i64(&self) -> Result<i64, BsonError> {
        self.expect_tag(ElementTag::Int64)?;
        Ok(LE.read_i64(self.value))
    }

    pub fn as_bool(&self) -> Result<bool, BsonError> {
        self.expect_tag(ElementTag::Bool)?;
        Ok(self.value[0] != 0)
    }

    pub fn as_date(&self) -> Result<Date, BsonError> {
        self.expect_tag(ElementTag::Date)?;
        Ok(Date(LE.read_i64(self.value)))
    }

    pub fn as_object_id(&self) -> Result<ObjectId, BsonError> {
        self.expect_tag(ElementTag::ObjectId)?;
        let bytes: [u8; 12] = self.value.try_into().unwrap();
        Ok(ObjectId::from_bytes(bytes))
    }

    pub fn as_binary(&self) -> Result<Binary, BsonError> {
        self.expect_tag(ElementTag::Binary)?;
        Ok(Binary {
            subtype: self.value[4],
            data: self.value[5..].to_vec(),
        })
    }

    pub fn as_regex(&self) -> Result<RegEx, BsonError> {
        self.expect_tag(ElementTag::RegEx)?;
        // value_len guarantees both NULs are present
        let split = self.value.iter().position(|&b| b == 0).unwrap();
        let pattern =
            str::from_utf8(&self.value[..split]).map_err(|_| BsonError::InvalidUtf8)?;
        let options = str::from_utf8(&self.value[split + 1..self.value.len() - 1])
            .map_err(|_| BsonError::InvalidUtf8)?;
        Ok(RegEx::new(pattern, options))
    }

    pub fn as_timestamp(&self) -> Result<Timestamp, BsonError> {
        self.expect_tag(ElementTag::Timestamp)?;
        Ok(Timestamp {
            increment: LE.read_i32(self.value),
            second: LE.read_i32(&self.value[4..]),
        })
    }

    /// A cursor over a nested document element.
    pub fn as_document(&self) -> Result<BsonIter<'a>, BsonError> {
        self.expect_tag(ElementTag::Document)?;
        BsonIter::new(self.value)
    }

    /// A cursor over a nested array element.
    pub fn as_array(&self) -> Result<BsonIter<'a>, BsonError> {
        self.expect_tag(ElementTag::Array)?;
        BsonIter::new(self.value)
    }

    /// The element's value as the generic tagged union. Nested documents
    /// materialize as ordered [`Doc`] projections.
    pub fn value(&self) -> Result<BsonValue, BsonError> {
        let value = match self.tag {
            ElementTag::Float64 => BsonValue::Float64(self.as_f64()?),
            ElementTag::String => BsonValue::String(self.as_str()?.to_string()),
            ElementTag::Document => BsonValue::Document(Doc::from_raw(self.value)?),
            ElementTag::Array => BsonValue::Array(view::doc_values(self.value)?),
            ElementTag::Binary => BsonValue::Binary(self.as_binary()?),
            ElementTag::ObjectId => BsonValue::ObjectId(self.as_object_id()?),
            ElementTag::Bool => BsonValue::Bool(self.as_bool()?),
            ElementTag::Date => BsonValue::Date(self.as_date()?),
            ElementTag::Null => BsonValue::Null,
            ElementTag::RegEx => BsonValue::RegEx(self.as_regex()?),
            ElementTag::Int32 => BsonValue::Int32(self.as_i32()?),
            ElementTag::Timestamp => BsonValue::Timestamp(self.as_timestamp()?),
            ElementTag::Int64 => BsonValue::Int64(self.as_i64()?),
            ElementTag::MinKey => BsonValue::MinKey,
            ElementTag::MaxKey => BsonValue::MaxKey,
        };
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Bson;

    fn sample() -> Bson {
        let mut bson = Bson::new();
        bson.append_f64("f", 2.25);
        bson.append_str("s", "text");
        bson.append_i32("i", -1);
        bson.append_i64("l", i64::MAX);
        bson.append_bool("b", false);
        bson.append_date("d", Date(1234));
        bson.append_timestamp("t", Timestamp::new(1, 2));
        bson.append_regex("r", &RegEx::new("a+", "im"));
        bson.append_binary("bin", &Binary::new(2, vec![1, 2, 3]));
        bson.append_object_id("oid", ObjectId::from_bytes([7; 12]));
        bson.append_null("n");
        bson.finish();
        bson
    }

    #[test]
    fn test_typed_accessors() {
        let bson = sample();
        let mut it = bson.iter().unwrap();

        let e = it.try_next().unwrap().unwrap();
        assert_eq!(e.name(), "f");
        assert_eq!(e.as_f64().unwrap(), 2.25);

        let e = it.try_next().unwrap().unwrap();
        assert_eq!(e.as_str().unwrap(), "text");

        let e = it.try_next().unwrap().unwrap();
        assert_eq!(e.as_i32().unwrap(), -1);

        let e = it.try_next().unwrap().unwrap();
        assert_eq!(e.as_i64().unwrap(), i64::MAX);

        let e = it.try_next().unwrap().unwrap();
        assert!(!e.as_bool().unwrap());

        let e = it.try_next().unwrap().unwrap();
        assert_eq!(e.as_date().unwrap(), Date(1234));

        let e = it.try_next().unwrap().unwrap();
        assert_eq!(e.as_timestamp().unwrap(), Timestamp::new(1, 2));

        let e = it.try_next().unwrap().unwrap();
        assert_eq!(e.as_regex().unwrap(), RegEx::new("a+", "im"));

        let e = it.try_next().unwrap().unwrap();
        assert_eq!(e.as_binary().unwrap(), Binary::new(2, vec![1, 2, 3]));

        let e = it.try_next().unwrap().unwrap();
        assert_eq!(e.as_object_id().unwrap(), ObjectId::from_bytes([7; 12]));

        let e = it.try_next().unwrap().unwrap();
        assert_eq!(e.tag(), ElementTag::Null);
        assert!(!it.more());
        assert!(it.try_next().unwrap().is_none());
    }

    #[test]
    fn test_accessor_tag_mismatch() {
        let bson = sample();
        let mut it = bson.iter().unwrap();
        let e = it.try_next().unwrap().unwrap(); // "f", Float64
        assert!(matches!(
            e.as_i32(),
            Err(BsonError::UnexpectedTag {
                expected: ElementTag::Int32,
                actual: ElementTag::Float64,
            })
        ));
    }

    #[test]
    fn test_more() {
        let mut bson = Bson::new();
        bson.append_i32("a", 1);
        bson.append_i32("b", 2);
        bson.finish();

        let mut it = bson.iter().unwrap();
        it.try_next().unwrap().unwrap();
        assert!(it.more());
        it.try_next().unwrap().unwrap();
        assert!(!it.more());
    }

    #[test]
    fn test_iterator_adapter() {
        let bson = sample();
        let names: Vec<&str> = bson.iter().unwrap().map(|e| e.unwrap().name()).collect();
        assert_eq!(
            names,
            ["f", "s", "i", "l", "b", "d", "t", "r", "bin", "oid", "n"]
        );
    }

    #[test]
    fn test_nested_document_cursor() {
        let mut bson = Bson::new();
        let mut child = bson.append_document_start("sub");
        child.append_i32("x", 5);
        child.finish();
        bson.append_document_end(child);
        bson.finish();

        let mut it = bson.iter().unwrap();
        let e = it.try_next().unwrap().unwrap();
        let mut sub = e.as_document().unwrap();
        let inner = sub.try_next().unwrap().unwrap();
        assert_eq!(inner.name(), "x");
        assert_eq!(inner.as_i32().unwrap(), 5);
    }

    #[test]
    fn test_rejects_short_buffer() {
        assert!(matches!(
            BsonIter::new(&[0x04, 0x00, 0x00, 0x00]),
            Err(BsonError::Truncated(_))
        ));
    }

    #[test]
    fn test_rejects_length_mismatch() {
        assert!(matches!(
            BsonIter::new(&[0x09, 0x00, 0x00, 0x00, 0x00]),
            Err(BsonError::InvalidLength { declared: 9, .. })
        ));
    }

    #[test]
    fn test_rejects_truncated_value() {
        // declares an int32 element but only two payload bytes fit
        let raw = [0x0A, 0x00, 0x00, 0x00, 0x10, 0x61, 0x00, 0x01, 0x00, 0x00];
        let mut it = BsonIter::new(&raw).unwrap();
        assert!(matches!(
            it.try_next(),
            Err(BsonError::Truncated("int32 value"))
        ));
    }

    #[test]
    fn test_rejects_value_overlapping_terminator() {
        // the int32 payload would need the terminator byte
        let raw = [0x0B, 0x00, 0x00, 0x00, 0x10, 0x61, 0x00, 0x01, 0x00, 0x00, 0x00];
        let mut it = BsonIter::new(&raw).unwrap();
        assert!(matches!(
            it.try_next(),
            Err(BsonError::Truncated("int32 value"))
        ));
    }

    #[test]
    fn test_rejects_invalid_name_utf8() {
        // name bytes 0xFF 0xFE are not UTF-8
        let raw = [0x0C, 0x00, 0x00, 0x00, 0x10, 0xFF, 0xFE, 0x00, 0x01, 0x00, 0x00, 0x00];
        let mut it = BsonIter::new(&raw).unwrap();
        assert!(matches!(it.try_next(), Err(BsonError::InvalidName)));
    }

    #[test]
    fn test_rejects_deprecated_tag() {
        // tag 0x0D (code) under name "a"
        let raw = [0x08, 0x00, 0x00, 0x00, 0x0D, 0x61, 0x00, 0x00];
        let mut it = BsonIter::new(&raw).unwrap();
        assert!(matches!(it.try_next(), Err(BsonError::InvalidTag(0x0D))));
    }

    #[test]
    fn test_generic_value() {
        let bson = sample();
        for element in bson.iter().unwrap() {
            let element = element.unwrap();
            let value = element.value().unwrap();
            if element.name() == "l" {
                assert_eq!(value, BsonValue::Int64(i64::MAX));
            }
        }
    }
}
