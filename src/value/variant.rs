//! The runtime value sum type shared by properties and scripts.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use super::color::Color;
use super::ValueId;
use crate::component::ComponentId;
use crate::error::Result;

// ---------------------------------------------------------------------------
// Function
// ---------------------------------------------------------------------------

type NativeFn = dyn Fn(&[Variant]) -> Result<Variant> + Send + Sync;

/// A callable value: a script built-in, a component method, or a library
/// function imported through a namespace.
///
/// Two functions compare equal only when they share the same underlying
/// closure.
#[derive(Clone)]
pub struct Function {
    name: Arc<str>,
    call: Arc<NativeFn>,
}

impl Function {
    /// Wrap a native closure.
    pub fn new<F>(name: impl Into<Arc<str>>, call: F) -> Self
    where
        F: Fn(&[Variant]) -> Result<Variant> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            call: Arc::new(call),
        }
    }

    /// The name the function was registered under.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Invoke the function.
    pub fn call(&self, args: &[Variant]) -> Result<Variant> {
        (self.call)(args)
    }
}

impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Function({})", self.name)
    }
}

impl PartialEq for Function {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.call, &other.call)
    }
}

// ---------------------------------------------------------------------------
// Handle
// ---------------------------------------------------------------------------

/// An engine object a script can only reach members of.
///
/// Handles are produced by the access collector and consumed by it again
/// on member access, so reads through them are still attributed to the
/// evaluating expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Handle {
    /// A group property; members are read individually.
    Group(ValueId),
    /// An enumeration declared on a component.
    Enumeration { owner: ComponentId, name: String },
    /// An imported library namespace.
    Namespace(String),
}

// ---------------------------------------------------------------------------
// Variant
// ---------------------------------------------------------------------------

/// A dynamically-typed value.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Variant {
    #[default]
    Nil,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Color(Color),
    List(Vec<Variant>),
    Record(BTreeMap<String, Variant>),
    Component(ComponentId),
    Function(Function),
    Object(Handle),
}

impl Variant {
    /// The runtime kind name used in type errors.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Variant::Nil => "nil",
            Variant::Bool(_) => "bool",
            Variant::Int(_) => "int",
            Variant::Float(_) => "float",
            Variant::Str(_) => "string",
            Variant::Color(_) => "color",
            Variant::List(_) => "list",
            Variant::Record(_) => "record",
            Variant::Component(_) => "component",
            Variant::Function(_) => "function",
            Variant::Object(Handle::Group(_)) => "group",
            Variant::Object(Handle::Enumeration { .. }) => "enumeration",
            Variant::Object(Handle::Namespace(_)) => "namespace",
        }
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, Variant::Nil)
    }

    /// Script truthiness: nil, false, zero and empty strings/lists are false.
    pub fn truthy(&self) -> bool {
        match self {
            Variant::Nil => false,
            Variant::Bool(b) => *b,
            Variant::Int(i) => *i != 0,
            Variant::Float(f) => *f != 0.0,
            Variant::Str(s) => !s.is_empty(),
            Variant::List(items) => !items.is_empty(),
            _ => true,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Variant::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Variant::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Numeric view: ints are widened to floats.
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Variant::Float(f) => Some(*f),
            Variant::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Variant::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_color(&self) -> Option<Color> {
        match self {
            Variant::Color(c) => Some(*c),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Variant]> {
        match self {
            Variant::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_component(&self) -> Option<ComponentId> {
        match self {
            Variant::Component(id) => Some(*id),
            _ => None,
        }
    }

    /// Plain text form used for string coercion and concatenation.
    ///
    /// Unlike `Display`, strings are not quoted.
    pub fn to_text(&self) -> String {
        match self {
            Variant::Str(s) => s.clone(),
            other => other.to_string(),
        }
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Variant::Nil => f.write_str("nil"),
            Variant::Bool(b) => write!(f, "{b}"),
            Variant::Int(i) => write!(f, "{i}"),
            Variant::Float(x) => write!(f, "{x:?}"),
            Variant::Str(s) => write!(f, "{s:?}"),
            Variant::Color(c) => write!(f, "{c}"),
            Variant::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
            Variant::Record(fields) => {
                f.write_str("{")?;
                for (i, (key, value)) in fields.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, " {key}: {value}")?;
                }
                f.write_str(" }")
            }
            Variant::Component(_) => f.write_str("<component>"),
            Variant::Function(func) => write!(f, "<function {}>", func.name()),
            Variant::Object(handle) => match handle {
                Handle::Group(_) => f.write_str("<group>"),
                Handle::Enumeration { name, .. } => write!(f, "<enum {name}>"),
                Handle::Namespace(name) => write!(f, "<namespace {name}>"),
            },
        }
    }
}

impl From<bool> for Variant {
    fn from(b: bool) -> Self {
        Variant::Bool(b)
    }
}

impl From<i64> for Variant {
    fn from(i: i64) -> Self {
        Variant::Int(i)
    }
}

impl From<i32> for Variant {
    fn from(i: i32) -> Self {
        Variant::Int(i64::from(i))
    }
}

impl From<f64> for Variant {
    fn from(f: f64) -> Self {
        Variant::Float(f)
    }
}

impl From<&str> for Variant {
    fn from(s: &str) -> Self {
        Variant::Str(s.to_owned())
    }
}

impl From<String> for Variant {
    fn from(s: String) -> Self {
        Variant::Str(s)
    }
}

impl From<Color> for Variant {
    fn from(c: Color) -> Self {
        Variant::Color(c)
    }
}

impl From<ComponentId> for Variant {
    fn from(id: ComponentId) -> Self {
        Variant::Component(id)
    }
}

impl From<Function> for Variant {
    fn from(f: Function) -> Self {
        Variant::Function(f)
    }
}

impl<T: Into<Variant>> From<Vec<T>> for Variant {
    fn from(items: Vec<T>) -> Self {
        Variant::List(items.into_iter().map(Into::into).collect())
    }
}
