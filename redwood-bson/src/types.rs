//! Primitive value types carried by document elements.

use std::fmt;

use chrono::{DateTime, TimeZone, Utc};

use crate::error::BsonError;

/// A 12-byte object identifier.
///
/// The all-zero id is the canonical invalid value; the builder rejects it
/// on append.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObjectId([u8; 12]);

impl ObjectId {
    /// The invalid all-zero id.
    pub const ZERO: ObjectId = ObjectId([0; 12]);

    pub const fn from_bytes(bytes: [u8; 12]) -> Self {
        ObjectId(bytes)
    }

    pub const fn bytes(&self) -> &[u8; 12] {
        &self.0
    }

    /// Parses 24 hex digits.
    pub fn parse_str(s: &str) -> Result<Self, BsonError> {
        if s.len() != 24 || !s.is_ascii() {
            return Err(BsonError::InvalidObjectId(s.to_string()));
        }
        let mut bytes = [0u8; 12];
        for (i, byte) in bytes.iter_mut().enumerate() {
            *byte = u8::from_str_radix(&s[2 * i..2 * i + 2], 16)
                .map_err(|_| BsonError::InvalidObjectId(s.to_string()))?;
        }
        Ok(ObjectId(bytes))
    }

    /// The bare 24-digit hex form.
    pub fn to_hex(&self) -> String {
        let mut hex = String::with_capacity(24);
        for b in &self.0 {
            hex.push_str(&format!("{b:02x}"));
        }
        hex
    }

    /// Valid iff any byte is non-zero.
    pub fn is_valid(&self) -> bool {
        self.0 != [0; 12]
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectId(\"{}\")", self.to_hex())
    }
}

/// Milliseconds since the Unix epoch, signed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Date(pub i64);

impl Date {
    pub fn now() -> Self {
        Date(Utc::now().timestamp_millis())
    }

    pub const fn millis(self) -> i64 {
        self.0
    }

    /// `None` when the value is outside chrono's representable range.
    pub fn to_datetime(self) -> Option<DateTime<Utc>> {
        Utc.timestamp_millis_opt(self.0).single()
    }
}

impl From<DateTime<Utc>> for Date {
    fn from(dt: DateTime<Utc>) -> Self {
        Date(dt.timestamp_millis())
    }
}

impl fmt::Display for Date {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_datetime() {
            Some(dt) => write!(f, "Date(\"{}\")", dt.to_rfc3339()),
            None => write!(f, "Date({})", self.0),
        }
    }
}

/// An internal timestamp: an increment counter paired with a second counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Timestamp {
    pub increment: i32,
    pub second: i32,
}

impl Timestamp {
    pub const fn new(increment: i32, second: i32) -> Self {
        Timestamp { increment, second }
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Timestamp({}, {})", self.second, self.increment)
    }
}

/// A regular expression: pattern plus option flags.
///
/// Both parts are encoded as cstrings and must not contain interior NUL.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct RegEx {
    pub pattern: String,
    pub options: String,
}

impl RegEx {
    pub fn new(pattern: impl Into<String>, options: impl Into<String>) -> Self {
        RegEx {
            pattern: pattern.into(),
            options: options.into(),
        }
    }
}

impl fmt::Display for RegEx {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}/{}", self.pattern, self.options)
    }
}

/// A binary blob with a one-byte subtype. An empty payload is legal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Binary {
    pub subtype: u8,
    pub data: Vec<u8>,
}

impl Binary {
    pub fn new(subtype: u8, data: Vec<u8>) -> Self {
        Binary { subtype, data }
    }
}

impl fmt::Display for Binary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BinData({}, 0x", self.subtype)?;
        for b in &self.data {
            write!(f, "{b:02x}")?;
        }
        write!(f, ")")
    }
}

/// Ordering sentinels: `MinKey` sorts below every other value and `MaxKey`
/// above every other value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OrderKey {
    MinKey,
    MaxKey,
}

impl fmt::Display for OrderKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderKey::MinKey => write!(f, "MinKey"),
            OrderKey::MaxKey => write!(f, "MaxKey"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_id_hex_roundtrip() {
        let id = ObjectId::from_bytes([
            0x50, 0x7f, 0x19, 0x1e, 0x81, 0x0c, 0x19, 0x72, 0x9d, 0xe8, 0x60, 0xea,
        ]);
        assert_eq!(id.to_hex(), "507f191e810c19729de860ea");
        assert_eq!(ObjectId::parse_str("507f191e810c19729de860ea").unwrap(), id);
        assert_eq!(id.to_string(), "ObjectId(\"507f191e810c19729de860ea\")");
    }

    #[test]
    fn test_object_id_parse_rejects_garbage() {
        assert!(ObjectId::parse_str("507f191e").is_err());
        assert!(ObjectId::parse_str("zz7f191e810c19729de860ea").is_err());
        assert!(ObjectId::parse_str("507f191e810c19729de860ea00").is_err());
    }

    #[test]
    fn test_object_id_validity() {
        assert!(!ObjectId::ZERO.is_valid());
        assert!(ObjectId::from_bytes([1; 12]).is_valid());
    }

    #[test]
    fn test_date_display() {
        let epoch = Date(0);
        assert_eq!(epoch.to_string(), "Date(\"1970-01-01T00:00:00+00:00\")");

        let out_of_range = Date(i64::MAX);
        assert_eq!(out_of_range.to_string(), format!("Date({})", i64::MAX));
    }

    #[test]
    fn test_date_datetime_conversion() {
        let date = Date(1_500_000_000_123);
        let dt = date.to_datetime().unwrap();
        assert_eq!(Date::from(dt), date);
    }

    #[test]
    fn test_display_forms() {
        assert_eq!(Timestamp::new(7, 42).to_string(), "Timestamp(42, 7)");
        assert_eq!(RegEx::new("^a.*b$", "i").to_string(), "/^a.*b$/i");
        assert_eq!(
            Binary::new(0, vec![0xDE, 0xAD]).to_string(),
            "BinData(0, 0xdead)"
        );
        assert_eq!(OrderKey::MinKey.to_string(), "MinKey");
        assert_eq!(OrderKey::MaxKey.to_string(), "MaxKey");
    }
}
