//! JSON-like diagnostic rendering.
//!
//! Scalars render as JSON literals, documents recurse, arrays use
//! brackets, and the domain types use their own display forms. The output
//! is for error messages and logs only; it is not reversible.

use std::fmt::Write;

use crate::error::BsonError;
use crate::iter::{BsonIter, Element};
use crate::tag::ElementTag;

pub(crate) fn render_document(raw: &[u8], out: &mut String) -> Result<(), BsonError> {
    out.push('{');
    let mut it = BsonIter::new(raw)?;
    while let Some(element) = it.try_next()? {
        let _ = write!(out, "\"{}\":", element.name());
        render_value(&element, out)?;
        if it.more() {
            out.push_str(", ");
        }
    }
    out.push('}');
    Ok(())
}

pub(crate) fn render_array(raw: &[u8], out: &mut String) -> Result<(), BsonError> {
    out.push('[');
    let mut it = BsonIter::new(raw)?;
    while let Some(element) = it.try_next()? {
        render_value(&element, out)?;
        if it.more() {
            out.push_str(", ");
        }
    }
    out.push(']');
    Ok(())
}

fn render_value(element: &Element<'_>, out: &mut String) -> Result<(), BsonError> {
    match element.tag() {
        ElementTag::Float64 => {
            let _ = write!(out, "{}", element.as_f64()?);
        }
        ElementTag::String => {
            let _ = write!(out, "\"{}\"", element.as_str()?);
        }
        ElementTag::Document => render_document(element.value_bytes(), out)?,
        ElementTag::Array => render_array(element.value_bytes(), out)?,
        ElementTag::Binary => {
            let _ = write!(out, "{}", element.as_binary()?);
        }
        ElementTag::ObjectId => {
            let _ = write!(out, "{}", element.as_object_id()?);
        }
        ElementTag::Bool => {
            let _ = write!(out, "{}", element.as_bool()?);
        }
        ElementTag::Date => {
            let _ = write!(out, "{}", element.as_date()?);
        }
        ElementTag::Null => out.push_str("null"),
        ElementTag::RegEx => {
            let _ = write!(out, "{}", element.as_regex()?);
        }
        ElementTag::Int32 => {
            let _ = write!(out, "{}", element.as_i32()?);
        }
        ElementTag::Timestamp => {
            let _ = write!(out, "{}", element.as_timestamp()?);
        }
        ElementTag::Int64 => {
            let _ = write!(out, "{}", element.as_i64()?);
        }
        ElementTag::MinKey => out.push_str("MinKey"),
        ElementTag::MaxKey => out.push_str("MaxKey"),
    }
    Ok(())
}
