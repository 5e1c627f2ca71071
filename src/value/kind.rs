//! Declared property kinds.

use std::fmt;

use super::color::Color;
use super::variant::Variant;

/// The native kind of a property.
#[derive(Debug, Clone, PartialEq)]
pub enum ValueKind {
    Bool,
    Int,
    Float,
    String,
    Color,
    /// Ordered elements of one kind.
    List(Box<ValueKind>),
    /// Fixed, pre-declared members.
    Group(Vec<(String, ValueKind)>),
    /// A reference to another component.
    Component,
    Function,
    /// A value that may be unset.
    Optional(Box<ValueKind>),
    /// Forwards to another property resolved from a path.
    Alias,
    /// A constant computed once when the component is loaded.
    Static(Box<ValueKind>),
}

impl ValueKind {
    pub fn list(element: ValueKind) -> Self {
        ValueKind::List(Box::new(element))
    }

    pub fn optional(inner: ValueKind) -> Self {
        ValueKind::Optional(Box::new(inner))
    }

    pub fn constant(inner: ValueKind) -> Self {
        ValueKind::Static(Box::new(inner))
    }

    /// A group schema from `(member, kind)` pairs.
    pub fn group<I, S>(members: I) -> Self
    where
        I: IntoIterator<Item = (S, ValueKind)>,
        S: Into<String>,
    {
        ValueKind::Group(
            members
                .into_iter()
                .map(|(name, kind)| (name.into(), kind))
                .collect(),
        )
    }

    /// The value a freshly declared literal property starts with.
    pub fn default_value(&self) -> Variant {
        match self {
            ValueKind::Bool => Variant::Bool(false),
            ValueKind::Int => Variant::Int(0),
            ValueKind::Float => Variant::Float(0.0),
            ValueKind::String => Variant::Str(String::new()),
            ValueKind::Color => Variant::Color(Color::TRANSPARENT),
            ValueKind::List(_) => Variant::List(Vec::new()),
            ValueKind::Optional(inner) | ValueKind::Static(inner) => inner.default_value(),
            ValueKind::Group(_)
            | ValueKind::Component
            | ValueKind::Function
            | ValueKind::Alias => Variant::Nil,
        }
    }

    /// Infer the kind of a literal, if it has an obvious one.
    pub fn infer(value: &Variant) -> Option<ValueKind> {
        match value {
            Variant::Bool(_) => Some(ValueKind::Bool),
            Variant::Int(_) => Some(ValueKind::Int),
            Variant::Float(_) => Some(ValueKind::Float),
            Variant::Str(_) => Some(ValueKind::String),
            Variant::Color(_) => Some(ValueKind::Color),
            Variant::Component(_) => Some(ValueKind::Component),
            Variant::Function(_) => Some(ValueKind::Function),
            Variant::List(items) => {
                let element = items.first().map_or(Some(ValueKind::Int), ValueKind::infer)?;
                Some(ValueKind::list(element))
            }
            Variant::Nil | Variant::Record(_) | Variant::Object(_) => None,
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueKind::Bool => f.write_str("bool"),
            ValueKind::Int => f.write_str("int"),
            ValueKind::Float => f.write_str("float"),
            ValueKind::String => f.write_str("string"),
            ValueKind::Color => f.write_str("color"),
            ValueKind::List(element) => write!(f, "list<{element}>"),
            ValueKind::Group(_) => f.write_str("group"),
            ValueKind::Component => f.write_str("component"),
            ValueKind::Function => f.write_str("function"),
            ValueKind::Optional(inner) => write!(f, "optional<{inner}>"),
            ValueKind::Alias => f.write_str("alias"),
            ValueKind::Static(inner) => write!(f, "static<{inner}>"),
        }
    }
}
