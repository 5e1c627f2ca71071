//! Building live components from definitions.

use tracing::{debug, warn};

use super::Engine;
use crate::component::{ComponentData, ComponentId};
use crate::definition::{ComponentDefinition, PropertyDefinition};
use crate::error::{Error, Result};
use crate::value::{ValueKind, Variant};

impl Engine {
    /// Instantiate `definition` under `parent`, or as the root when `parent`
    /// is `None`.
    ///
    /// Properties are declared and bound in definition order, then children
    /// are instantiated, then statics are computed so they can read the
    /// whole subtree. Literal sources are bound as literals and every other
    /// source as an expression; nothing is evaluated until the next
    /// [`update_expressions`](Self::update_expressions). On failure the
    /// partially built component is removed again.
    pub fn instantiate(
        &mut self,
        parent: Option<ComponentId>,
        definition: &ComponentDefinition,
    ) -> Result<ComponentId> {
        let mut data = ComponentData::new(definition.kind.clone());
        data.id = definition.id.clone();
        let component = match parent {
            Some(parent) => self.add_child(parent, data)?,
            None => self.create_root(data)?,
        };

        match self.populate(component, definition) {
            Ok(()) => {
                debug!(
                    component = %self.component_label(component),
                    properties = definition.properties.len(),
                    children = definition.children.len(),
                    "instantiated component"
                );
                Ok(component)
            }
            Err(err) => {
                if let Err(cleanup) = self.remove_component(component) {
                    warn!(error = %cleanup, "could not remove partially built component");
                }
                Err(err)
            }
        }
    }

    fn populate(&mut self, component: ComponentId, definition: &ComponentDefinition) -> Result<()> {
        for enumeration in &definition.enums {
            self.define_enum(component, enumeration.clone())?;
        }
        let (statics, bindings): (Vec<_>, Vec<_>) = definition
            .properties
            .iter()
            .partition(|p| matches!(p.kind, Some(ValueKind::Static(_))));

        for property in bindings {
            self.bind_property(component, property)?;
        }
        for child in &definition.children {
            self.instantiate(Some(component), child)?;
        }
        for property in statics {
            let name = single_segment(property)?;
            let source = property.source.as_deref().ok_or_else(|| {
                Error::Definition(format!("static `{name}` needs a source expression"))
            })?;
            let Some(kind) = property.kind.clone() else {
                continue;
            };
            self.declare_static(component, name, kind, source, property.position.clone())?;
        }
        Ok(())
    }

    fn bind_property(&mut self, component: ComponentId, property: &PropertyDefinition) -> Result<()> {
        if !property.components.is_empty() {
            return self.bind_components(component, property);
        }
        if matches!(property.kind, Some(ValueKind::Alias)) {
            let name = single_segment(property)?;
            let path = property.source.as_deref().ok_or_else(|| {
                Error::Definition(format!("alias `{name}` needs a target path"))
            })?;
            self.declare_alias(component, name, path.trim(), property.position.clone())?;
            return Ok(());
        }

        let constant = property
            .source
            .as_deref()
            .and_then(|source| self.runtime.compile(source).ok())
            .and_then(|program| program.constant());

        let value = match property.path.as_slice() {
            [name] => {
                let cannot_infer = || {
                    Error::Definition(format!("cannot infer the kind of `{name}`; declare it"))
                };
                let kind = match (&property.kind, &constant) {
                    (Some(kind), _) => kind.clone(),
                    (None, Some(constant)) => ValueKind::infer(constant).ok_or_else(cannot_infer)?,
                    (None, None) => return Err(cannot_infer()),
                };
                let settled = property.source.is_none() || constant.is_some();
                self.insert_value(component, name, kind, settled)?
            }
            _ => self.require_property(component, &property.name())?,
        };

        match (&property.source, constant) {
            (None, _) => Ok(()),
            (Some(_), Some(constant)) => self.set_value(value, constant),
            (Some(source), None) => self
                .set_expression(value, source, property.position.clone())
                .map(drop),
        }
    }

    /// Instantiate nested definitions as children and reference them from
    /// the property: one becomes a component reference, several (or a list
    /// kind) a list of references.
    fn bind_components(&mut self, component: ComponentId, property: &PropertyDefinition) -> Result<()> {
        let name = single_segment(property)?;
        let mut children = Vec::with_capacity(property.components.len());
        for definition in &property.components {
            children.push(self.instantiate(Some(component), definition)?);
        }

        let as_list = children.len() > 1 || matches!(property.kind, Some(ValueKind::List(_)));
        let (kind, literal) = match children.as_slice() {
            [single] if !as_list => (ValueKind::Component, Variant::Component(*single)),
            _ => (
                ValueKind::list(ValueKind::Component),
                Variant::List(children.into_iter().map(Variant::Component).collect()),
            ),
        };
        let value = self.insert_value(component, name, kind, true)?;
        self.set_value(value, literal)
    }
}

fn single_segment(property: &PropertyDefinition) -> Result<&str> {
    match property.path.as_slice() {
        [name] => Ok(name.as_str()),
        _ => Err(Error::Definition(format!(
            "`{}` must be a plain property name",
            property.name()
        ))),
    }
}
