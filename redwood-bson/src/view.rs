//! Ordered and unordered projections of a finished document.

use std::collections::HashMap;
use std::ops::{Deref, DerefMut};

use crate::document::Bson;
use crate::error::BsonError;
use crate::iter::BsonIter;
use crate::tag::ElementTag;
use crate::value::{BsonValue, ToBson};

/// Unordered name→value projection of a document.
///
/// Nested documents project as nested maps, arrays as value sequences.
/// Element order is lost; duplicate names keep the last occurrence.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Map(pub HashMap<String, BsonValue>);

impl Map {
    pub fn new() -> Self {
        Map(HashMap::new())
    }

    pub(crate) fn from_raw(raw: &[u8]) -> Result<Self, BsonError> {
        let mut map = HashMap::new();
        let mut it = BsonIter::new(raw)?;
        while let Some(element) = it.try_next()? {
            let value = match element.tag() {
                ElementTag::Document => BsonValue::Map(Map::from_raw(element.value_bytes())?),
                ElementTag::Array => BsonValue::Array(map_values(element.value_bytes())?),
                _ => element.value()?,
            };
            map.insert(element.name().to_string(), value);
        }
        Ok(Map(map))
    }

    /// Encodes this map as a standalone finished document.
    pub fn to_bson(&self) -> Bson {
        let mut bson = Bson::new();
        for (name, value) in &self.0 {
            bson.append(name, value);
        }
        bson.finish();
        bson
    }
}

impl Deref for Map {
    type Target = HashMap<String, BsonValue>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl DerefMut for Map {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

impl FromIterator<(String, BsonValue)> for Map {
    fn from_iter<I: IntoIterator<Item = (String, BsonValue)>>(iter: I) -> Self {
        Map(iter.into_iter().collect())
    }
}

impl ToBson for Map {
    fn append_to(&self, bson: &mut Bson, name: &str) {
        let mut child = bson.append_document_start(name);
        for (key, value) in &self.0 {
            value.append_to(&mut child, key);
        }
        child.finish();
        bson.append_document_end(child);
    }
}

/// One named element of an ordered projection.
#[derive(Debug, Clone, PartialEq)]
pub struct DocElement {
    pub name: String,
    pub value: BsonValue,
}

/// Ordered projection preserving element order.
///
/// Nested documents project as nested docs, arrays as value sequences.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Doc(pub Vec<DocElement>);

impl Doc {
    pub fn new() -> Self {
        Doc(Vec::new())
    }

    pub(crate) fn from_raw(raw: &[u8]) -> Result<Self, BsonError> {
        let mut elements = Vec::new();
        let mut it = BsonIter::new(raw)?;
        while let Some(element) = it.try_next()? {
            let value = match element.tag() {
                ElementTag::Document => BsonValue::Document(Doc::from_raw(element.value_bytes())?),
                ElementTag::Array => BsonValue::Array(doc_values(element.value_bytes())?),
                _ => element.value()?,
            };
            elements.push(DocElement {
                name: element.name().to_string(),
                value,
            });
        }
        Ok(Doc(elements))
    }

    pub fn push(&mut self, name: impl Into<String>, value: BsonValue) {
        self.0.push(DocElement {
            name: name.into(),
            value,
        });
    }

    /// First element with the given name.
    pub fn get(&self, name: &str) -> Option<&BsonValue> {
        self.0.iter().find(|e| e.name == name).map(|e| &e.value)
    }

    /// Typed lookup used to populate record fields.
    pub fn extract<T>(&self, name: &'static str) -> Result<T, BsonError>
    where
        T: TryFrom<BsonValue, Error = BsonError>,
    {
        let value = self.get(name).ok_or(BsonError::MissingField(name))?;
        T::try_from(value.clone())
    }

    /// Like [`extract`](Doc::extract), but an absent or null element is
    /// `None` instead of an error.
    pub fn extract_opt<T>(&self, name: &str) -> Result<Option<T>, BsonError>
    where
        T: TryFrom<BsonValue, Error = BsonError>,
    {
        match self.get(name) {
            None | Some(BsonValue::Null) => Ok(None),
            Some(value) => Ok(Some(T::try_from(value.clone())?)),
        }
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, DocElement> {
        self.0.iter()
    }

    /// Encodes this doc as a standalone finished document, element order
    /// preserved.
    pub fn to_bson(&self) -> Bson {
        let mut bson = Bson::new();
        for element in &self.0 {
            bson.append(&element.name, &element.value);
        }
        bson.finish();
        bson
    }
}

impl FromIterator<(String, BsonValue)> for Doc {
    fn from_iter<I: IntoIterator<Item = (String, BsonValue)>>(iter: I) -> Self {
        Doc(iter
            .into_iter()
            .map(|(name, value)| DocElement { name, value })
            .collect())
    }
}

impl ToBson for Doc {
    fn append_to(&self, bson: &mut Bson, name: &str) {
        let mut child = bson.append_document_start(name);
        for element in &self.0 {
            element.value.append_to(&mut child, &element.name);
        }
        child.finish();
        bson.append_document_end(child);
    }
}

/// Array elements projected map-wise.
pub(crate) fn map_values(raw: &[u8]) -> Result<Vec<BsonValue>, BsonError> {
    let mut values = Vec::new();
    let mut it = BsonIter::new(raw)?;
    while let Some(element) = it.try_next()? {
        let value = match element.tag() {
            ElementTag::Document => BsonValue::Map(Map::from_raw(element.value_bytes())?),
            ElementTag::Array => BsonValue::Array(map_values(element.value_bytes())?),
            _ => element.value()?,
        };
        values.push(value);
    }
    Ok(values)
}

/// Array elements projected doc-wise.
pub(crate) fn doc_values(raw: &[u8]) -> Result<Vec<BsonValue>, BsonError> {
    let mut values = Vec::new();
    let mut it = BsonIter::new(raw)?;
    while let Some(element) = it.try_next()? {
        values.push(element.value()?);
    }
    Ok(values)
}
