//! Component types: ComponentId, ComponentData, Enumeration, Namespace.

use std::collections::HashMap;

use slotmap::new_key_type;

use crate::value::{Function, ValueId, Variant};

new_key_type! {
    /// Unique identifier for a component. Copy, lightweight (u64).
    pub struct ComponentId;
}

/// A named set of variants declared on a component.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Enumeration {
    pub name: String,
    pub variants: Vec<String>,
}

impl Enumeration {
    pub fn new(name: impl Into<String>, variants: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            name: name.into(),
            variants: variants.into_iter().map(Into::into).collect(),
        }
    }

    pub fn contains(&self, variant: &str) -> bool {
        self.variants.iter().any(|v| v == variant)
    }
}

/// Data associated with a single component.
#[derive(Debug, Clone)]
pub struct ComponentData {
    /// Component type name (e.g. "Rectangle", "Window").
    pub kind: String,
    /// Optional id, resolvable by name from expressions.
    pub id: Option<String>,
    pub(crate) properties: HashMap<String, ValueId>,
    /// Every value the component owns, in declaration order. Group members
    /// follow their group.
    pub(crate) order: Vec<ValueId>,
    pub(crate) enums: HashMap<String, Enumeration>,
    pub(crate) methods: HashMap<String, Function>,
}

impl ComponentData {
    /// Create a new `ComponentData` with the given type name.
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            id: None,
            properties: HashMap::new(),
            order: Vec::new(),
            enums: HashMap::new(),
            methods: HashMap::new(),
        }
    }

    /// Set the id (builder).
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// The value bound to a top-level property name.
    pub fn property(&self, name: &str) -> Option<ValueId> {
        self.properties.get(name).copied()
    }

    /// Every owned value in declaration order.
    pub fn values(&self) -> &[ValueId] {
        &self.order
    }

    pub fn enumeration(&self, name: &str) -> Option<&Enumeration> {
        self.enums.get(name)
    }

    pub fn method(&self, name: &str) -> Option<&Function> {
        self.methods.get(name)
    }

    /// Display form used in diagnostics: `Kind#id`, or `Kind` without an id.
    pub fn label(&self) -> String {
        match &self.id {
            Some(id) => format!("{}#{id}", self.kind),
            None => self.kind.clone(),
        }
    }
}

/// An imported library object: named constants and functions reachable as
/// `name.member` from any expression.
#[derive(Debug, Clone, Default)]
pub struct Namespace {
    members: HashMap<String, Variant>,
}

impl Namespace {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a constant member (builder).
    pub fn with_constant(mut self, name: impl Into<String>, value: impl Into<Variant>) -> Self {
        self.members.insert(name.into(), value.into());
        self
    }

    /// Add a function member under its own name (builder).
    pub fn with_function(mut self, function: Function) -> Self {
        self.members
            .insert(function.name().to_owned(), Variant::Function(function));
        self
    }

    pub fn get(&self, name: &str) -> Option<&Variant> {
        self.members.get(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn label_with_and_without_id() {
        assert_eq!(ComponentData::new("Rect").with_id("a").label(), "Rect#a");
        assert_eq!(ComponentData::new("Rect").label(), "Rect");
    }

    #[test]
    fn enumeration_membership() {
        let align = Enumeration::new("Align", ["Left", "Right"]);
        assert!(align.contains("Left"));
        assert!(!align.contains("Center"));
    }

    #[test]
    fn namespace_members() {
        let math = Namespace::new()
            .with_constant("pi", 3.5)
            .with_function(Function::new("twice", |args| {
                Ok(Variant::Int(args[0].as_int().unwrap_or(0) * 2))
            }));
        assert_eq!(math.get("pi"), Some(&Variant::Float(3.5)));
        assert!(matches!(math.get("twice"), Some(Variant::Function(_))));
        assert!(math.get("tau").is_none());
    }
}
