//! Component definitions: the parsed, not-yet-live form of a component.
//!
//! A definition tree is what a front-end parser hands to
//! [`Engine::instantiate`](crate::engine::Engine::instantiate). Each
//! property carries a path, an optional declared kind, optional source text
//! and any component definitions nested in it.

use crate::component::Enumeration;
use crate::position::Position;
use crate::value::ValueKind;

/// One property binding inside a [`ComponentDefinition`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PropertyDefinition {
    /// `["width"]`, or `["border", "color"]` for a group member.
    pub path: Vec<String>,
    /// Declared kind. Inferred from a literal source when absent.
    pub kind: Option<ValueKind>,
    pub source: Option<String>,
    pub position: Position,
    /// Component definitions given as the property's value.
    pub components: Vec<ComponentDefinition>,
}

impl PropertyDefinition {
    /// A property at a dotted path.
    pub fn new(path: &str) -> Self {
        Self {
            path: path.split('.').map(str::to_owned).collect(),
            ..Self::default()
        }
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn with_kind(mut self, kind: ValueKind) -> Self {
        self.kind = Some(kind);
        self
    }

    pub fn at(mut self, position: Position) -> Self {
        self.position = position;
        self
    }

    pub fn with_component(mut self, component: ComponentDefinition) -> Self {
        self.components.push(component);
        self
    }

    /// The full dotted name.
    pub fn name(&self) -> String {
        self.path.join(".")
    }
}

/// A component type to instantiate, with its properties and children.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ComponentDefinition {
    pub kind: String,
    pub id: Option<String>,
    pub properties: Vec<PropertyDefinition>,
    pub children: Vec<ComponentDefinition>,
    pub enums: Vec<Enumeration>,
}

impl ComponentDefinition {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            ..Self::default()
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_property(mut self, property: PropertyDefinition) -> Self {
        self.properties.push(property);
        self
    }

    pub fn with_child(mut self, child: ComponentDefinition) -> Self {
        self.children.push(child);
        self
    }

    pub fn with_enum(mut self, enumeration: Enumeration) -> Self {
        self.enums.push(enumeration);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn property_paths_split_on_dots() {
        let property = PropertyDefinition::new("border.color").with_source("\"red\"");
        assert_eq!(property.path, vec!["border".to_string(), "color".to_string()]);
        assert_eq!(property.name(), "border.color");
        assert_eq!(property.source.as_deref(), Some("\"red\""));
    }

    #[test]
    fn builders_accumulate() {
        let definition = ComponentDefinition::new("Window")
            .with_id("root")
            .with_property(PropertyDefinition::new("title").with_kind(ValueKind::String))
            .with_child(ComponentDefinition::new("Rect"))
            .with_child(ComponentDefinition::new("Rect"));
        assert_eq!(definition.id.as_deref(), Some("root"));
        assert_eq!(definition.properties.len(), 1);
        assert_eq!(definition.children.len(), 2);
    }
}
