//! The reactive property engine.
//!
//! [`Engine`] owns the component tree together with the value and
//! expression arenas. Dependency edges between them are stored as arena
//! keys, so removing a component is index invalidation plus a sweep of the
//! edge sets that mention it.
//!
//! - `properties`: declaring, binding and reading values
//! - `graph`: expression evaluation and dirty propagation
//! - `alias`: alias path resolution
//! - `update`: the per-value update and the fixpoint loop
//! - `instantiate`: building components from definitions

mod alias;
mod graph;
mod instantiate;
mod properties;
mod update;

pub use update::{UpdateReport, ValueUpdate};

use std::collections::{HashMap, HashSet};

use slotmap::SlotMap;
use tracing::debug;

use crate::component::{scope, ComponentData, ComponentId, Entity, Enumeration, Namespace, Tree};
use crate::config::EngineConfig;
use crate::error::{Error, Result};
use crate::expression::{ExprId, Expression};
use crate::position::Position;
use crate::script::Runtime;
use crate::value::{Function, Value, ValueId};

/// Owner of the live component tree and its property graph.
#[derive(Debug)]
pub struct Engine {
    tree: Tree,
    values: SlotMap<ValueId, Value>,
    exprs: SlotMap<ExprId, Expression>,
    namespaces: HashMap<String, Namespace>,
    runtime: Runtime,
    config: EngineConfig,
    /// Bumped on every structural change; unresolved aliases retry once
    /// per epoch.
    epoch: u64,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

impl Engine {
    /// An empty engine with default configuration and its own runtime.
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    pub fn with_config(config: EngineConfig) -> Self {
        Self::with_runtime(Runtime::new(), config)
    }

    /// An engine sharing an existing script runtime.
    pub fn with_runtime(runtime: Runtime, config: EngineConfig) -> Self {
        Self {
            tree: Tree::new(),
            values: SlotMap::with_key(),
            exprs: SlotMap::with_key(),
            namespaces: HashMap::new(),
            runtime,
            config,
            epoch: 0,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn runtime(&self) -> &Runtime {
        &self.runtime
    }

    // -----------------------------------------------------------------------
    // Structure
    // -----------------------------------------------------------------------

    /// Create the root component.
    pub fn create_root(&mut self, data: ComponentData) -> Result<ComponentId> {
        if self.tree.root().is_some() {
            return Err(Error::Definition("the engine already has a root component".into()));
        }
        let id = self.tree.insert(data);
        self.structure_changed();
        Ok(id)
    }

    /// Attach a new component as the last child of `parent`.
    pub fn add_child(&mut self, parent: ComponentId, data: ComponentData) -> Result<ComponentId> {
        let id = self
            .tree
            .insert_child(parent, data)
            .ok_or(Error::Stale("component"))?;
        self.structure_changed();
        Ok(id)
    }

    /// Detach and destroy `component` with its subtree.
    ///
    /// Every value and expression owned by the subtree is removed and
    /// unregistered from the surviving graph. Surviving expressions that
    /// read a removed value are marked dirty, and aliases that pointed into
    /// the subtree are reset so they resolve again.
    pub fn remove_component(&mut self, component: ComponentId) -> Result<()> {
        if !self.tree.contains(component) {
            return Err(Error::Stale("component"));
        }
        let label = self.component_label(component);
        let removed = self.tree.remove(component);
        let doomed: HashSet<ValueId> = removed
            .iter()
            .flat_map(|(_, data)| data.order.iter().copied())
            .collect();

        let mut readers = Vec::new();
        for &id in &doomed {
            if let Some(value) = self.values.remove(id) {
                if let Some(expr) = value.expression {
                    self.drop_expression(expr);
                }
                readers.extend(value.dependents);
            }
        }
        readers.retain(|&expr| self.exprs.contains_key(expr));

        for (_, expr) in self.exprs.iter_mut() {
            expr.dependencies.retain(|v| !doomed.contains(v));
            expr.wake.retain(|v| !doomed.contains(v));
            expr.writes.retain(|v| !doomed.contains(v));
        }

        let mut reset = Vec::new();
        for (id, value) in self.values.iter_mut() {
            if let Some(alias) = value.alias_state_mut() {
                if alias.target.is_some_and(|t| doomed.contains(&t)) {
                    alias.target = None;
                    alias.failed_epoch = None;
                    reset.push(id);
                }
            }
        }

        debug!(
            component = %label,
            components = removed.len(),
            values = doomed.len(),
            "removed component"
        );
        self.structure_changed();
        readers.sort();
        readers.dedup();
        self.mark_dirty(None, readers)?;
        self.propagate_dirty(None, &reset)
    }

    /// Record a structural change: unresolved aliases may now resolve and
    /// failed expressions get another chance.
    fn structure_changed(&mut self) {
        self.epoch += 1;
        for (_, expr) in self.exprs.iter_mut() {
            if expr.last_error.is_some() {
                expr.dirty = true;
            }
        }
    }

    pub fn root(&self) -> Option<ComponentId> {
        self.tree.root()
    }

    pub fn parent(&self, component: ComponentId) -> Option<ComponentId> {
        self.tree.parent(component)
    }

    pub fn children(&self, component: ComponentId) -> &[ComponentId] {
        self.tree.children(component)
    }

    pub fn component(&self, component: ComponentId) -> Option<&ComponentData> {
        self.tree.get(component)
    }

    /// The component's declared id.
    pub fn component_id(&self, component: ComponentId) -> Option<&str> {
        self.tree.get(component).and_then(|data| data.id.as_deref())
    }

    pub fn tree(&self) -> &Tree {
        &self.tree
    }

    // -----------------------------------------------------------------------
    // Scope contents
    // -----------------------------------------------------------------------

    /// Declare an enumeration on `component`, readable as `Name.Variant`.
    pub fn define_enum(&mut self, component: ComponentId, enumeration: Enumeration) -> Result<()> {
        let data = self.tree.get_mut(component).ok_or(Error::Stale("component"))?;
        data.enums.insert(enumeration.name.clone(), enumeration);
        self.structure_changed();
        Ok(())
    }

    /// Declare a method on `component`, callable by name from its scope.
    pub fn define_method(&mut self, component: ComponentId, method: Function) -> Result<()> {
        let data = self.tree.get_mut(component).ok_or(Error::Stale("component"))?;
        data.methods.insert(method.name().to_owned(), method);
        self.structure_changed();
        Ok(())
    }

    /// Make a library namespace reachable by `name` from every scope.
    pub fn import(&mut self, name: impl Into<String>, namespace: Namespace) {
        self.namespaces.insert(name.into(), namespace);
        self.structure_changed();
    }

    /// Resolve `name` as an expression in `component`'s scope would.
    pub fn resolve_variable(&self, component: ComponentId, name: &str) -> Result<Option<Entity>> {
        scope::resolve(&self.tree, &self.namespaces, component, name)
    }

    // -----------------------------------------------------------------------
    // Diagnostics
    // -----------------------------------------------------------------------

    fn component_label(&self, component: ComponentId) -> String {
        self.tree
            .get(component)
            .map_or_else(|| "<removed>".to_owned(), ComponentData::label)
    }

    /// `Kind#id.property`, with group members as `Kind#id.group.member`.
    pub fn label(&self, value: ValueId) -> String {
        let Some(slot) = self.values.get(value) else {
            return "<removed>".to_owned();
        };
        let component = self.component_label(slot.owner);
        match slot.group.and_then(|group| self.values.get(group)) {
            Some(group) => format!("{component}.{}.{}", group.name, slot.name),
            None => format!("{component}.{}", slot.name),
        }
    }

    fn property_path(&self, value: ValueId) -> String {
        let Some(slot) = self.values.get(value) else {
            return String::new();
        };
        match slot.group.and_then(|group| self.values.get(group)) {
            Some(group) => format!("{}.{}", group.name, slot.name),
            None => slot.name.clone(),
        }
    }

    /// Wrap `source` with the component, property and position it came from.
    ///
    /// Cycle and convergence errors already name their chain and are passed
    /// through unchanged.
    fn contextualize(&self, value: ValueId, position: &Position, source: Error) -> Error {
        let owner = self.values.get(value).map(|slot| slot.owner);
        self.context_error(owner, self.property_path(value), position, source)
    }

    fn context_error(
        &self,
        owner: Option<ComponentId>,
        property: String,
        position: &Position,
        source: Error,
    ) -> Error {
        if matches!(
            source,
            Error::Cycle { .. }
                | Error::AliasCycle { .. }
                | Error::NotConverged { .. }
                | Error::Evaluation { .. }
        ) {
            return source;
        }
        let (component, id) = owner
            .and_then(|owner| self.tree.get(owner))
            .map_or_else(
                || ("<removed>".to_owned(), String::new()),
                |data| (data.kind.clone(), data.id.clone().unwrap_or_default()),
            );
        Error::Evaluation {
            component,
            id,
            property,
            position: position.clone(),
            source: Box::new(source),
        }
    }
}
