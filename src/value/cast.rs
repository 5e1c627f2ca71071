//! Coercion of script results to a property's native kind.
//!
//! The rules mirror common scripting-language coercions:
//!
//! | target | accepted                                                     |
//! |--------|--------------------------------------------------------------|
//! | bool   | bool, int/float (nonzero), string (non-empty), nil (false)   |
//! | int    | int, float (truncated), bool                                 |
//! | float  | float, int, bool                                             |
//! | string | string, bool, int, float, color                              |
//! | color  | color, string (hex or name), int (`0xRRGGBB`)                |
//! | list   | list (element-wise), nil (empty)                             |
//!
//! Anything else is a [`Error::Type`] naming both kinds.

use super::color::Color;
use super::kind::ValueKind;
use super::variant::Variant;
use crate::error::{Error, Result};

/// Coerce `value` to `kind`.
pub fn cast(value: Variant, kind: &ValueKind) -> Result<Variant> {
    let mismatch = |value: &Variant| Error::type_mismatch(kind, value.kind_name());

    match kind {
        ValueKind::Bool => match value {
            Variant::Bool(_) => Ok(value),
            Variant::Int(i) => Ok(Variant::Bool(i != 0)),
            Variant::Float(f) => Ok(Variant::Bool(f != 0.0)),
            Variant::Str(ref s) => Ok(Variant::Bool(!s.is_empty())),
            Variant::Nil => Ok(Variant::Bool(false)),
            ref other => Err(mismatch(other)),
        },
        ValueKind::Int => match value {
            Variant::Int(_) => Ok(value),
            Variant::Float(f) if f.is_finite() => Ok(Variant::Int(f.trunc() as i64)),
            Variant::Bool(b) => Ok(Variant::Int(i64::from(b))),
            ref other => Err(mismatch(other)),
        },
        ValueKind::Float => match value {
            Variant::Float(_) => Ok(value),
            Variant::Int(i) => Ok(Variant::Float(i as f64)),
            Variant::Bool(b) => Ok(Variant::Float(if b { 1.0 } else { 0.0 })),
            ref other => Err(mismatch(other)),
        },
        ValueKind::String => match value {
            Variant::Str(_) => Ok(value),
            Variant::Bool(_) | Variant::Int(_) | Variant::Float(_) | Variant::Color(_) => {
                Ok(Variant::Str(value.to_text()))
            }
            ref other => Err(mismatch(other)),
        },
        ValueKind::Color => match value {
            Variant::Color(_) => Ok(value),
            Variant::Str(ref s) => Color::parse(s)
                .map(Variant::Color)
                .ok_or_else(|| mismatch(&value)),
            Variant::Int(i) => Color::from_packed(i)
                .map(Variant::Color)
                .ok_or_else(|| mismatch(&value)),
            ref other => Err(mismatch(other)),
        },
        ValueKind::List(element) => match value {
            Variant::List(items) => items
                .into_iter()
                .map(|item| cast(item, element))
                .collect::<Result<Vec<_>>>()
                .map(Variant::List),
            Variant::Nil => Ok(Variant::List(Vec::new())),
            ref other => Err(mismatch(other)),
        },
        ValueKind::Group(_) => match value {
            Variant::Record(_) => Ok(value),
            ref other => Err(mismatch(other)),
        },
        ValueKind::Component => match value {
            Variant::Component(_) | Variant::Nil => Ok(value),
            ref other => Err(mismatch(other)),
        },
        ValueKind::Function => match value {
            Variant::Function(_) | Variant::Nil => Ok(value),
            ref other => Err(mismatch(other)),
        },
        ValueKind::Optional(inner) => match value {
            Variant::Nil => Ok(Variant::Nil),
            other => cast(other, inner),
        },
        ValueKind::Static(inner) => cast(value, inner),
        ValueKind::Alias => Err(Error::Internal(
            "alias properties hold no value of their own".into(),
        )),
    }
}
