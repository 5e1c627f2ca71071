//! Dependency discovery during one expression run.
//!
//! [`AccessCollector`] is the [`Bridge`] every expression runs against. All
//! component state an expression sees passes through it, so each property
//! read and write is recorded before the value reaches the script.

use std::collections::{BTreeMap, HashMap, HashSet};

use slotmap::SlotMap;

use crate::component::{scope, ComponentId, Entity, Namespace, Tree};
use crate::error::{Error, Result};
use crate::script::Bridge;
use crate::value::group::apply_record;
use crate::value::{cast, Handle, State, Value, ValueId, Variant};

/// Per-run bridge between a script and the component tree.
///
/// Sub-collectors created with [`scoped`](Self::scoped) share the read and
/// write sets of their parent, so a run that crosses into a child
/// component still attributes every access to the evaluating expression.
pub(crate) struct AccessCollector<'a> {
    tree: &'a Tree,
    values: &'a mut SlotMap<ValueId, Value>,
    namespaces: &'a HashMap<String, Namespace>,
    scope: ComponentId,
    reads: &'a mut HashSet<ValueId>,
    writes: &'a mut HashSet<ValueId>,
    /// Written values whose exposed value actually changed.
    touched: &'a mut Vec<ValueId>,
}

/// The sets an [`AccessCollector`] fills in.
#[derive(Debug, Default)]
pub(crate) struct Accesses {
    pub reads: HashSet<ValueId>,
    pub writes: HashSet<ValueId>,
    pub touched: Vec<ValueId>,
}

impl<'a> AccessCollector<'a> {
    pub fn new(
        tree: &'a Tree,
        values: &'a mut SlotMap<ValueId, Value>,
        namespaces: &'a HashMap<String, Namespace>,
        scope: ComponentId,
        accesses: &'a mut Accesses,
    ) -> Self {
        Self {
            tree,
            values,
            namespaces,
            scope,
            reads: &mut accesses.reads,
            writes: &mut accesses.writes,
            touched: &mut accesses.touched,
        }
    }

    /// A collector bound to another component's scope, sharing this one's sets.
    pub fn scoped(&mut self, scope: ComponentId) -> AccessCollector<'_> {
        AccessCollector {
            tree: self.tree,
            values: &mut *self.values,
            namespaces: self.namespaces,
            scope,
            reads: &mut *self.reads,
            writes: &mut *self.writes,
            touched: &mut *self.touched,
        }
    }

    fn slot(&self, id: ValueId) -> Result<&Value> {
        self.values.get(id).ok_or(Error::Stale("value"))
    }

    /// Record `id` as read and return what the script should see.
    fn read(&mut self, id: ValueId) -> Result<Variant> {
        self.reads.insert(id);
        let value = self.slot(id)?;
        match &value.state {
            State::Alias(alias) => match alias.target {
                Some(target) => self.read(target),
                None => Err(Error::Unsettled),
            },
            State::Group(_) => Ok(Variant::Object(Handle::Group(id))),
            _ => value.current.clone().ok_or(Error::Unsettled),
        }
    }

    /// Cast and store `value` into `id`, following aliases.
    fn write(&mut self, id: ValueId, value: Variant) -> Result<()> {
        let target = match &self.slot(id)?.state {
            State::Alias(alias) => alias.target.ok_or(Error::Unsettled)?,
            _ => id,
        };
        let slot = self.slot(target)?;
        match &slot.state {
            State::Static => Err(Error::script(format!(
                "cannot assign to static property `{}`",
                slot.name
            ))),
            State::Alias(_) => Err(Error::Internal(format!(
                "alias `{}` resolved to another alias",
                slot.name
            ))),
            State::Group(_) => {
                let Variant::Record(record) = cast(value, &slot.kind)? else {
                    return Err(Error::Internal("group cast produced a non-record".into()));
                };
                let name = slot.name.clone();
                let outcome = apply_record(self.values, target, record, false)?;
                self.writes.insert(target);
                self.touched.extend(outcome.changed.iter().copied());
                outcome.into_error(name).map_or(Ok(()), Err)
            }
            State::Plain | State::Optional { .. } => {
                let value = cast(value, &slot.kind)?;
                let group = slot.group;
                let name = slot.name.clone();
                if let Some(group) = group {
                    if let Some(member) = self
                        .values
                        .get_mut(group)
                        .and_then(Value::group_state_mut)
                        .and_then(|state| state.member_mut(&name))
                    {
                        member.assigned = true;
                    }
                }
                self.writes.insert(target);
                let changed = self
                    .values
                    .get_mut(target)
                    .ok_or(Error::Stale("value"))?
                    .store(value);
                if changed {
                    self.touched.push(target);
                }
                Ok(())
            }
        }
    }

    /// Turn a resolved entity into a script value, recording value reads.
    fn materialize(&mut self, entity: Entity) -> Result<Variant> {
        match entity {
            Entity::Value(id) => self.read(id),
            Entity::Component(id) => Ok(Variant::Component(id)),
            Entity::Enumeration { owner, name } => {
                Ok(Variant::Object(Handle::Enumeration { owner, name }))
            }
            Entity::Method(function) => Ok(Variant::Function(function)),
            Entity::Namespace(name) => Ok(Variant::Object(Handle::Namespace(name))),
        }
    }

    fn group_member(&self, group: ValueId, name: &str) -> Result<ValueId> {
        let value = self.slot(group)?;
        value
            .group_state()
            .and_then(|state| state.member(name))
            .map(|member| member.value)
            .ok_or_else(|| Error::UnknownProperty {
                component: value.name.clone(),
                name: name.to_owned(),
            })
    }

    fn component_label(&self, id: ComponentId) -> String {
        self.tree
            .get(id)
            .map_or_else(|| "<removed>".to_owned(), |data| data.label())
    }
}

impl Bridge for AccessCollector<'_> {
    fn has(&mut self, name: &str) -> bool {
        matches!(
            scope::resolve(self.tree, self.namespaces, self.scope, name),
            Ok(Some(_))
        )
    }

    fn get(&mut self, name: &str) -> Result<Option<Variant>> {
        match scope::resolve(self.tree, self.namespaces, self.scope, name)? {
            Some(entity) => self.materialize(entity).map(Some),
            None => Ok(None),
        }
    }

    fn set(&mut self, name: &str, value: Variant) -> Result<()> {
        match scope::resolve(self.tree, self.namespaces, self.scope, name)? {
            Some(Entity::Value(id)) => self.write(id, value),
            Some(_) => Err(Error::script(format!("`{name}` is not an assignable property"))),
            None => Err(Error::Unresolved {
                name: name.to_owned(),
            }),
        }
    }

    fn member(&mut self, object: &Variant, name: &str) -> Result<Variant> {
        match object {
            Variant::Component(id) => {
                let mut nested = self.scoped(*id);
                match scope::resolve_member(nested.tree, *id, name)? {
                    Some(entity) => nested.materialize(entity),
                    None => Err(Error::UnknownProperty {
                        component: nested.component_label(*id),
                        name: name.to_owned(),
                    }),
                }
            }
            Variant::Object(Handle::Group(group)) => {
                let member = self.group_member(*group, name)?;
                self.read(member)
            }
            Variant::Object(Handle::Enumeration { owner, name: enumeration }) => {
                let known = self
                    .tree
                    .get(*owner)
                    .ok_or(Error::Stale("component"))?
                    .enumeration(enumeration)
                    .is_some_and(|e| e.contains(name));
                if known {
                    Ok(Variant::Str(name.to_owned()))
                } else {
                    Err(Error::Unresolved {
                        name: format!("{enumeration}.{name}"),
                    })
                }
            }
            Variant::Object(Handle::Namespace(namespace)) => {
                let member = self
                    .namespaces
                    .get(namespace)
                    .and_then(|ns| ns.get(name))
                    .ok_or_else(|| Error::Unresolved {
                        name: format!("{namespace}.{name}"),
                    })?;
                match member {
                    Variant::Object(_) => Err(Error::Internal(format!(
                        "namespace member `{namespace}.{name}` has an unsupported type"
                    ))),
                    other => Ok(other.clone()),
                }
            }
            other => Err(Error::Internal(format!(
                "member access on unsupported {}",
                other.kind_name()
            ))),
        }
    }

    fn set_member(&mut self, object: &Variant, name: &str, value: Variant) -> Result<()> {
        match object {
            Variant::Component(id) => {
                let mut nested = self.scoped(*id);
                match scope::resolve_member(nested.tree, *id, name)? {
                    Some(Entity::Value(target)) => nested.write(target, value),
                    Some(_) => Err(Error::script(format!("`{name}` is not an assignable property"))),
                    None => Err(Error::UnknownProperty {
                        component: nested.component_label(*id),
                        name: name.to_owned(),
                    }),
                }
            }
            Variant::Object(Handle::Group(group)) => {
                let member = self.group_member(*group, name)?;
                self.write(member, value)
            }
            other => Err(Error::script(format!(
                "cannot assign to member `{name}` of {}",
                other.kind_name()
            ))),
        }
    }

    fn settle(&mut self, handle: &Handle) -> Result<Variant> {
        match handle {
            Handle::Group(group) => {
                let members: Vec<(String, ValueId)> = self
                    .slot(*group)?
                    .group_state()
                    .map(|state| {
                        state
                            .members
                            .iter()
                            .map(|m| (m.name.clone(), m.value))
                            .collect()
                    })
                    .unwrap_or_default();
                let mut record = BTreeMap::new();
                for (name, member) in members {
                    record.insert(name, self.read(member)?);
                }
                Ok(Variant::Record(record))
            }
            other => Ok(Variant::Object(other.clone())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::ComponentData;
    use crate::script::Runtime;
    use crate::value::ValueKind;
    use pretty_assertions::assert_eq;

    struct World {
        tree: Tree,
        values: SlotMap<ValueId, Value>,
        namespaces: HashMap<String, Namespace>,
        root: ComponentId,
        child: ComponentId,
    }

    impl World {
        /// `Window#root { size: 4 }` with child `Rect#a { width: 10 }`.
        fn new() -> (Self, ValueId, ValueId) {
            let mut tree = Tree::new();
            let root = tree.insert(ComponentData::new("Window").with_id("root"));
            let child = tree
                .insert_child(root, ComponentData::new("Rect").with_id("a"))
                .unwrap();
            let mut world = Self {
                tree,
                values: SlotMap::with_key(),
                namespaces: HashMap::new(),
                root,
                child,
            };
            let size = world.declare(root, "size", ValueKind::Int, Variant::Int(4));
            let width = world.declare(child, "width", ValueKind::Int, Variant::Int(10));
            (world, size, width)
        }

        fn declare(&mut self, owner: ComponentId, name: &str, kind: ValueKind, value: Variant) -> ValueId {
            let mut slot = Value::new(owner, name, kind);
            slot.store(value);
            let id = self.values.insert(slot);
            let data = self.tree.get_mut(owner).unwrap();
            data.properties.insert(name.into(), id);
            data.order.push(id);
            id
        }

        fn run(&mut self, scope: ComponentId, source: &str) -> (Result<Variant>, Accesses) {
            let runtime = Runtime::new();
            let program = runtime.compile(source).unwrap();
            let mut accesses = Accesses::default();
            let result = {
                let mut collector = AccessCollector::new(
                    &self.tree,
                    &mut self.values,
                    &self.namespaces,
                    scope,
                    &mut accesses,
                );
                runtime.run(&program, &mut collector)
            };
            (result, accesses)
        }
    }

    #[test]
    fn reads_across_components_are_recorded() {
        let (mut world, size, width) = World::new();
        let root = world.root;
        let (result, accesses) = world.run(root, "a.width + size");
        assert_eq!(result.unwrap(), Variant::Int(14));
        assert_eq!(accesses.reads, HashSet::from([size, width]));
        assert!(accesses.writes.is_empty());
    }

    #[test]
    fn writes_are_cast_and_recorded() {
        let (mut world, _size, width) = World::new();
        let root = world.root;
        let (result, accesses) = world.run(root, "a.width = 2.9");
        assert_eq!(result.unwrap(), Variant::Float(2.9));
        assert_eq!(world.values[width].current, Some(Variant::Int(2)));
        assert_eq!(accesses.writes, HashSet::from([width]));
        assert_eq!(accesses.touched, vec![width]);
    }

    #[test]
    fn unpopulated_values_are_unsettled() {
        let (mut world, _size, width) = World::new();
        world.values[width].current = None;
        let root = world.root;
        let (result, accesses) = world.run(root, "a.width");
        assert_eq!(result.unwrap_err(), Error::Unsettled);
        assert!(accesses.reads.contains(&width));
    }

    #[test]
    fn unknown_member_names_the_component() {
        let (mut world, ..) = World::new();
        let root = world.root;
        let (result, _) = world.run(root, "a.height");
        insta::assert_snapshot!(result.unwrap_err(), @"unknown property `height` on Rect#a");
    }

    #[test]
    fn child_scope_sees_parent_properties() {
        let (mut world, size, _) = World::new();
        let child = world.child;
        let (result, accesses) = world.run(child, "size * 2");
        assert_eq!(result.unwrap(), Variant::Int(8));
        assert_eq!(accesses.reads, HashSet::from([size]));
    }

    #[test]
    fn namespace_members_and_unsupported_types() {
        let (mut world, ..) = World::new();
        world.namespaces.insert(
            "theme".into(),
            Namespace::new()
                .with_constant("gap", 3)
                .with_constant("bad", Variant::Object(Handle::Namespace("x".into()))),
        );
        let root = world.root;
        assert_eq!(world.run(root, "theme.gap").0.unwrap(), Variant::Int(3));
        assert!(matches!(world.run(root, "theme.bad").0, Err(Error::Internal(_))));
    }
}
