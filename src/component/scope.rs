//! Identifier resolution in a component's scope.
//!
//! Stages are tried in order and the first match wins:
//!
//! 1. the component's own id, or `self`
//! 2. `parent`
//! 3. a property, enumeration or method declared on the component
//! 4. a descendant component with that id (nearest first)
//! 5. the same lookup in the parent's scope
//!
//! Once the root is exhausted, imported namespaces are consulted.

use std::collections::HashMap;

use super::node::{ComponentData, ComponentId, Namespace};
use super::tree::Tree;
use crate::error::{Error, Result};
use crate::value::{Function, ValueId};

/// What an identifier resolved to.
#[derive(Debug, Clone, PartialEq)]
pub enum Entity {
    Component(ComponentId),
    Value(ValueId),
    Enumeration { owner: ComponentId, name: String },
    Method(Function),
    Namespace(String),
}

/// Resolve `name` starting in the scope of `scope`.
///
/// `Ok(None)` means nothing matched; the caller decides whether a fallback
/// (such as a built-in function) applies before reporting it unresolved.
pub fn resolve(
    tree: &Tree,
    namespaces: &HashMap<String, Namespace>,
    scope: ComponentId,
    name: &str,
) -> Result<Option<Entity>> {
    let mut current = scope;
    loop {
        let data = tree.get(current).ok_or(Error::Stale("component"))?;
        if name == "self" || data.id.as_deref() == Some(name) {
            return Ok(Some(Entity::Component(current)));
        }
        if name == "parent" {
            return parent_of(tree, current, data).map(Some);
        }
        if let Some(entity) = declared(current, data, name) {
            return Ok(Some(entity));
        }
        if let Some(child) = tree.find_descendant(current, name) {
            return Ok(Some(Entity::Component(child)));
        }
        match tree.parent(current) {
            Some(parent) => current = parent,
            None => break,
        }
    }
    Ok(namespaces
        .contains_key(name)
        .then(|| Entity::Namespace(name.to_owned())))
}

/// Resolve `name` as a member of `component`: `parent`, its own
/// declarations, or a descendant id. Enclosing scopes are not searched.
pub fn resolve_member(tree: &Tree, component: ComponentId, name: &str) -> Result<Option<Entity>> {
    let data = tree.get(component).ok_or(Error::Stale("component"))?;
    if name == "parent" {
        return parent_of(tree, component, data).map(Some);
    }
    if let Some(entity) = declared(component, data, name) {
        return Ok(Some(entity));
    }
    Ok(tree
        .find_descendant(component, name)
        .map(Entity::Component))
}

fn parent_of(tree: &Tree, component: ComponentId, data: &ComponentData) -> Result<Entity> {
    tree.parent(component)
        .map(Entity::Component)
        .ok_or_else(|| Error::NoParent {
            component: data.label(),
        })
}

fn declared(owner: ComponentId, data: &ComponentData, name: &str) -> Option<Entity> {
    if let Some(&value) = data.properties.get(name) {
        return Some(Entity::Value(value));
    }
    if data.enums.contains_key(name) {
        return Some(Entity::Enumeration {
            owner,
            name: name.to_owned(),
        });
    }
    data.methods.get(name).cloned().map(Entity::Method)
}
