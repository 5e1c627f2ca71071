//! Declaring, binding and reading property values.

use std::collections::BTreeMap;

use super::Engine;
use crate::collector::{AccessCollector, Accesses};
use crate::component::ComponentId;
use crate::config::GroupReset;
use crate::error::{Error, Result};
use crate::expression::{ExprId, Expression};
use crate::position::Position;
use crate::value::group::apply_record;
use crate::value::{cast, AliasState, Member, State, Value, ValueId, ValueKind, Variant};

fn check_name(name: &str) -> Result<()> {
    let valid = name
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    if valid {
        Ok(())
    } else {
        Err(Error::Definition(format!("`{name}` is not a valid property name")))
    }
}

impl Engine {
    // -----------------------------------------------------------------------
    // Declaration
    // -----------------------------------------------------------------------

    /// Declare a literal property holding its kind's default value.
    ///
    /// Group kinds also declare one value per member. Aliases and statics
    /// have dedicated constructors.
    pub fn declare(&mut self, component: ComponentId, name: &str, kind: ValueKind) -> Result<ValueId> {
        match kind {
            ValueKind::Alias => Err(Error::Definition(format!(
                "alias `{name}` must be declared with a target path"
            ))),
            ValueKind::Static(_) => Err(Error::Definition(format!(
                "static `{name}` must be declared with its source"
            ))),
            kind => self.insert_value(component, name, kind, true),
        }
    }

    /// Insert a value (and its group members) into `component`.
    ///
    /// Unsettled values read as "not ready" until first populated.
    pub(crate) fn insert_value(
        &mut self,
        component: ComponentId,
        name: &str,
        kind: ValueKind,
        settled: bool,
    ) -> Result<ValueId> {
        check_name(name)?;
        let data = self.tree.get(component).ok_or(Error::Stale("component"))?;
        if data.properties.contains_key(name) {
            return Err(Error::Definition(format!(
                "`{name}` is already declared on {}",
                data.label()
            )));
        }
        if let ValueKind::Group(members) = &kind {
            for (member, member_kind) in members {
                check_name(member)?;
                if matches!(
                    member_kind,
                    ValueKind::Group(_) | ValueKind::Alias | ValueKind::Static(_)
                ) {
                    return Err(Error::Definition(format!(
                        "group member `{name}.{member}` cannot be {member_kind}"
                    )));
                }
            }
        }

        let settle = |value: Value| if settled { value } else { value.unsettled() };
        let id = self.values.insert(settle(Value::new(component, name, kind.clone())));
        let mut order = vec![id];
        if let ValueKind::Group(members) = kind {
            let mut declared = Vec::with_capacity(members.len());
            for (member, member_kind) in members {
                let mut value = settle(Value::new(component, member.clone(), member_kind));
                value.group = Some(id);
                let member_id = self.values.insert(value);
                order.push(member_id);
                declared.push(Member {
                    name: member,
                    value: member_id,
                    assigned: false,
                });
            }
            if let Some(state) = self.values.get_mut(id).and_then(Value::group_state_mut) {
                state.members = declared;
            }
        }

        let data = self.tree.get_mut(component).ok_or(Error::Stale("component"))?;
        data.properties.insert(name.to_owned(), id);
        data.order.extend(order);
        self.structure_changed();
        Ok(id)
    }

    /// Declare an alias forwarding to the property at `path` (e.g.
    /// `"panel.border.color"`), resolved lazily from `component`'s scope.
    pub fn declare_alias(
        &mut self,
        component: ComponentId,
        name: &str,
        path: &str,
        position: Position,
    ) -> Result<ValueId> {
        let segments: Vec<String> = path.split('.').map(|s| s.trim().to_owned()).collect();
        for segment in &segments {
            check_name(segment)
                .map_err(|_| Error::Definition(format!("invalid alias path `{path}`")))?;
        }
        let id = self.insert_value(component, name, ValueKind::Alias, false)?;
        if let Some(value) = self.values.get_mut(id) {
            value.state = State::Alias(AliasState {
                path: segments,
                position,
                target: None,
                failed_epoch: None,
            });
        }
        Ok(id)
    }

    /// Declare a constant computed once from `source` and frozen.
    pub fn declare_static(
        &mut self,
        component: ComponentId,
        name: &str,
        kind: ValueKind,
        source: &str,
        position: Position,
    ) -> Result<ValueId> {
        let kind = match kind {
            ValueKind::Static(_) => kind,
            other => ValueKind::constant(other),
        };
        let wrap = |engine: &Self, err| {
            engine.context_error(Some(component), name.to_owned(), &position, err)
        };

        let program = self.runtime.compile(source).map_err(|error| {
            wrap(
                self,
                Error::Compile {
                    position: position.clone(),
                    error,
                },
            )
        })?;
        let mut accesses = Accesses::default();
        let result = {
            let mut collector = AccessCollector::new(
                &self.tree,
                &mut self.values,
                &self.namespaces,
                component,
                &mut accesses,
            );
            self.runtime.run(&program, &mut collector)
        };
        self.propagate_dirty(None, &accesses.touched)?;
        let value = result
            .and_then(|value| cast(value, &kind))
            .map_err(|err| wrap(self, err))?;

        let id = self.insert_value(component, name, kind, true)?;
        if let Some(slot) = self.values.get_mut(id) {
            slot.store(value);
        }
        Ok(id)
    }

    // -----------------------------------------------------------------------
    // Lookup
    // -----------------------------------------------------------------------

    /// The value at `path` on `component`: `"width"` or `"border.color"`.
    pub fn property(&self, component: ComponentId, path: &str) -> Option<ValueId> {
        let mut segments = path.split('.');
        let mut current = self.tree.get(component)?.property(segments.next()?)?;
        for segment in segments {
            current = self
                .values
                .get(current)?
                .group_state()?
                .member(segment)?
                .value;
        }
        Some(current)
    }

    pub(super) fn require_property(&self, component: ComponentId, path: &str) -> Result<ValueId> {
        self.property(component, path)
            .ok_or_else(|| Error::UnknownProperty {
                component: self.component_label(component),
                name: path.to_owned(),
            })
    }

    /// The slot behind `value`.
    pub fn get(&self, value: ValueId) -> Option<&Value> {
        self.values.get(value)
    }

    pub fn expression(&self, expr: ExprId) -> Option<&Expression> {
        self.exprs.get(expr)
    }

    /// Current exposed value. `None` for unsettled or removed values.
    ///
    /// Aliases read through to their target and groups are rendered as a
    /// record of their members.
    pub fn value(&self, value: ValueId) -> Option<Variant> {
        let slot = self.values.get(value)?;
        match &slot.state {
            State::Alias(alias) => self.value(alias.target?),
            State::Group(group) => group
                .members
                .iter()
                .map(|m| Some((m.name.clone(), self.value(m.value)?)))
                .collect::<Option<BTreeMap<_, _>>>()
                .map(Variant::Record),
            _ => slot.current.clone(),
        }
    }

    pub fn is_set(&self, value: ValueId) -> bool {
        self.values.get(value).is_some_and(Value::is_set)
    }

    /// Read and clear the `changed` flag. Groups report whether any member
    /// changed; aliases report their target.
    pub fn take_changed(&mut self, value: ValueId) -> bool {
        let Some(slot) = self.values.get_mut(value) else {
            return false;
        };
        let own = std::mem::take(&mut slot.changed);
        match &slot.state {
            State::Alias(alias) => match alias.target {
                Some(target) => self.take_changed(target) || own,
                None => own,
            },
            State::Group(group) => {
                let members: Vec<ValueId> = group.members.iter().map(|m| m.value).collect();
                members
                    .into_iter()
                    .fold(own, |any, member| self.take_changed(member) || any)
            }
            _ => own,
        }
    }

    // -----------------------------------------------------------------------
    // Mutation
    // -----------------------------------------------------------------------

    /// Follow an alias to its target; other values are returned unchanged.
    fn forward(&self, value: ValueId) -> Result<ValueId> {
        let slot = self.values.get(value).ok_or(Error::Stale("value"))?;
        match &slot.state {
            State::Alias(alias) => alias.target.ok_or_else(|| Error::Unresolved {
                name: alias.path.join("."),
            }),
            _ => Ok(value),
        }
    }

    /// Mark `value` as individually assigned within its group.
    fn mark_assigned(&mut self, value: ValueId) {
        let Some(slot) = self.values.get(value) else {
            return;
        };
        let (Some(group), name) = (slot.group, slot.name.clone()) else {
            return;
        };
        if let Some(member) = self
            .values
            .get_mut(group)
            .and_then(Value::group_state_mut)
            .and_then(|state| state.member_mut(&name))
        {
            member.assigned = true;
        }
    }

    /// Remove the expression bound to `value`, if any.
    fn unbind(&mut self, value: ValueId) {
        if let Some(expr) = self.values.get_mut(value).and_then(|slot| slot.expression.take()) {
            self.drop_expression(expr);
        }
    }

    /// Overwrite `value` with a literal.
    ///
    /// The literal is cast to the value's kind first; on a type error
    /// nothing changes. Any bound expression is dropped and every dependent
    /// is marked dirty. Setting a group applies the record to its members.
    pub fn set_value(&mut self, value: ValueId, literal: impl Into<Variant>) -> Result<()> {
        let target = self.forward(value)?;
        let slot = self.values.get(target).ok_or(Error::Stale("value"))?;
        if matches!(slot.state, State::Static) {
            return Err(Error::Definition(format!(
                "static property {} cannot be set",
                self.label(target)
            )));
        }
        let literal = cast(literal.into(), &slot.kind)?;
        let is_group = matches!(slot.state, State::Group(_));
        self.unbind(target);

        if !is_group {
            self.mark_assigned(target);
            let changed = self
                .values
                .get_mut(target)
                .is_some_and(|slot| slot.store(literal));
            if changed {
                self.propagate_dirty(None, &[target])?;
            }
            return Ok(());
        }

        let Variant::Record(record) = literal else {
            return Err(Error::Internal("group cast produced a non-record".into()));
        };
        let reset_all = self.config.group_reset == GroupReset::All;
        if let Some(state) = self.values.get_mut(target).and_then(Value::group_state_mut) {
            state.reset_pending = false;
            if reset_all {
                state.members.iter_mut().for_each(|m| m.assigned = false);
            }
        }
        let outcome = apply_record(&mut self.values, target, record, true)?;
        self.propagate_dirty(None, &outcome.changed)?;
        match outcome.into_error(self.label(target)) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Bind `code` to `value`, replacing any previous binding.
    ///
    /// The previous expression's dependency edges are dropped before the new
    /// code runs. Compile errors are kept and reported when the expression
    /// is first evaluated. Rebinding a group resets its members'
    /// individual-assignment flags according to
    /// [`EngineConfig::group_reset`](crate::config::EngineConfig::group_reset).
    ///
    /// Waking the value's readers can hit a circular dependency among them.
    /// That error is returned, but the new binding stays installed.
    pub fn set_expression(&mut self, value: ValueId, code: &str, position: Position) -> Result<ExprId> {
        let slot = self.values.get(value).ok_or(Error::Stale("value"))?;
        match slot.state {
            State::Static | State::Alias(_) => {
                return Err(Error::Definition(format!(
                    "{} cannot be bound to an expression",
                    self.label(value)
                )))
            }
            _ => {}
        }
        let owner = slot.owner;
        let is_group = matches!(slot.state, State::Group(_));
        let program = self.runtime.compile(code);

        let expr = match slot.expression {
            Some(expr) => {
                let entry = self.exprs.get_mut(expr).ok_or(Error::Stale("expression"))?;
                let old = entry.recompile(code, position, program);
                self.unregister(expr, old);
                expr
            }
            None => {
                let expr = self
                    .exprs
                    .insert(Expression::new(value, owner, code, position, program));
                if let Some(slot) = self.values.get_mut(value) {
                    slot.expression = Some(expr);
                }
                expr
            }
        };

        self.mark_assigned(value);
        if is_group {
            let policy = self.config.group_reset;
            if let Some(state) = self.values.get_mut(value).and_then(Value::group_state_mut) {
                match policy {
                    GroupReset::All => state.members.iter_mut().for_each(|m| m.assigned = false),
                    GroupReset::Scoped => state.reset_pending = true,
                }
            }
        }
        self.propagate_dirty(Some(expr), &[value])?;
        Ok(expr)
    }

    /// [`set_value`](Self::set_value) by property path.
    pub fn set_property(
        &mut self,
        component: ComponentId,
        path: &str,
        literal: impl Into<Variant>,
    ) -> Result<()> {
        let value = self.require_property(component, path)?;
        self.set_value(value, literal)
    }

    /// [`set_expression`](Self::set_expression) by property path.
    pub fn set_property_expression(
        &mut self,
        component: ComponentId,
        path: &str,
        code: &str,
        position: Position,
    ) -> Result<ExprId> {
        let value = self.require_property(component, path)?;
        self.set_expression(value, code, position)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::ComponentData;
    use crate::config::EngineConfig;
    use pretty_assertions::assert_eq;

    fn window(config: EngineConfig) -> (Engine, ComponentId) {
        let mut engine = Engine::with_config(config);
        let root = engine
            .create_root(ComponentData::new("Window").with_id("root"))
            .unwrap();
        (engine, root)
    }

    fn border_kind() -> ValueKind {
        ValueKind::group([("color", ValueKind::String), ("width", ValueKind::Int)])
    }

    #[test]
    fn declare_rejects_duplicates_and_bad_names() {
        let (mut engine, root) = window(EngineConfig::default());
        engine.declare(root, "width", ValueKind::Int).unwrap();
        insta::assert_snapshot!(
            engine.declare(root, "width", ValueKind::Int).unwrap_err(),
            @"invalid definition: `width` is already declared on Window#root"
        );
        assert!(engine.declare(root, "a.b", ValueKind::Int).is_err());
        assert!(engine.declare(root, "x", ValueKind::Alias).is_err());
    }

    #[test]
    fn set_value_casts_and_reports_type_errors() {
        let (mut engine, root) = window(EngineConfig::default());
        let width = engine.declare(root, "width", ValueKind::Int).unwrap();
        engine.set_value(width, 2.7).unwrap();
        assert_eq!(engine.value(width), Some(Variant::Int(2)));

        let err = engine.set_value(width, vec![1]).unwrap_err();
        assert_eq!(err, Error::type_mismatch("int", "list"));
        assert_eq!(engine.value(width), Some(Variant::Int(2)));
    }

    #[test]
    fn set_value_drops_the_expression() {
        let (mut engine, root) = window(EngineConfig::default());
        let width = engine.declare(root, "width", ValueKind::Int).unwrap();
        let expr = engine.set_expression(width, "1 + 1", Position::unknown()).unwrap();
        engine.set_value(width, 5).unwrap();
        assert_eq!(engine.get(width).unwrap().expression(), None);
        assert!(engine.expression(expr).is_none());
    }

    #[test]
    fn group_value_reads_as_record() {
        let (mut engine, root) = window(EngineConfig::default());
        let border = engine.declare(root, "border", border_kind()).unwrap();
        engine.set_property(root, "border.color", "blue").unwrap();
        assert_eq!(
            engine.value(border),
            Some(Variant::Record(BTreeMap::from([
                ("color".to_string(), Variant::from("blue")),
                ("width".to_string(), Variant::Int(0)),
            ])))
        );
        assert!(engine.take_changed(border));
        assert!(!engine.take_changed(border));
    }

    #[test]
    fn group_literal_respects_individual_assignment_until_rebound() {
        let (mut engine, root) = window(EngineConfig::default());
        let border = engine.declare(root, "border", border_kind()).unwrap();
        let color = engine.property(root, "border.color").unwrap();
        engine.set_value(color, "blue").unwrap();

        let record = Variant::Record(BTreeMap::from([("width".to_string(), Variant::Int(3))]));
        engine.set_value(border, record).unwrap();
        assert_eq!(engine.value(color), Some(Variant::from("blue")));

        let record = Variant::Record(BTreeMap::from([("color".to_string(), Variant::from("red"))]));
        engine.set_value(border, record).unwrap();
        assert_eq!(engine.value(color), Some(Variant::from("red")));
    }

    #[test]
    fn rebinding_with_reset_all_clears_every_flag() {
        let (mut engine, root) = window(EngineConfig::new().with_group_reset(GroupReset::All));
        let border = engine.declare(root, "border", border_kind()).unwrap();
        let color = engine.property(root, "border.color").unwrap();
        engine.set_value(color, "blue").unwrap();
        engine
            .set_expression(border, "{ width: 1 }", Position::unknown())
            .unwrap();
        let state = engine.get(border).unwrap().group_state().unwrap();
        assert!(state.members.iter().all(|m| !m.assigned));
    }

    #[test]
    fn optional_tracks_being_set() {
        let (mut engine, root) = window(EngineConfig::default());
        let hint = engine
            .declare(root, "hint", ValueKind::optional(ValueKind::String))
            .unwrap();
        assert!(!engine.is_set(hint));
        assert_eq!(engine.value(hint), Some(Variant::Nil));
        engine.set_value(hint, "tip").unwrap();
        assert!(engine.is_set(hint));
    }

    #[test]
    fn statics_are_computed_once_and_frozen() {
        let (mut engine, root) = window(EngineConfig::default());
        let base = engine.declare(root, "base", ValueKind::Int).unwrap();
        engine.set_value(base, 4).unwrap();
        let scale = engine
            .declare_static(root, "scale", ValueKind::Int, "base * 10", Position::unknown())
            .unwrap();
        assert_eq!(engine.value(scale), Some(Variant::Int(40)));
        assert!(engine.set_value(scale, 1).is_err());
        assert!(engine
            .set_expression(scale, "1", Position::unknown())
            .is_err());
    }

    #[test]
    fn static_errors_carry_context() {
        let (mut engine, root) = window(EngineConfig::default());
        let err = engine
            .declare_static(root, "scale", ValueKind::Int, "missing", Position::new(3, 7))
            .unwrap_err();
        insta::assert_snapshot!(err, @"3:7: Window#root.scale: unresolved identifier `missing`");
        assert_eq!(engine.property(root, "scale"), None);
    }

    #[test]
    fn unknown_property_by_path() {
        let (mut engine, root) = window(EngineConfig::default());
        insta::assert_snapshot!(
            engine.set_property(root, "height", 1).unwrap_err(),
            @"unknown property `height` on Window#root"
        );
    }

    #[test]
    fn static_writes_wake_readers() {
        let (mut engine, root) = window(EngineConfig::default());
        let x = engine.declare(root, "x", ValueKind::Int).unwrap();
        let y = engine.declare(root, "y", ValueKind::Int).unwrap();
        engine.set_expression(y, "x + 1", Position::unknown()).unwrap();
        engine.update_expressions().unwrap();
        assert_eq!(engine.value(y), Some(Variant::Int(1)));

        engine
            .declare_static(root, "k", ValueKind::Int, "x = 5; 1", Position::unknown())
            .unwrap();
        engine.update_expressions().unwrap();
        assert_eq!(engine.value(x), Some(Variant::Int(5)));
        assert_eq!(engine.value(y), Some(Variant::Int(6)));
    }

    #[test]
    fn rebind_keeps_the_binding_when_readers_form_a_cycle() {
        let (mut engine, root) = window(EngineConfig::default());
        let w = engine.declare(root, "w", ValueKind::Int).unwrap();
        let x = engine.declare(root, "x", ValueKind::Int).unwrap();
        let y = engine.declare(root, "y", ValueKind::Int).unwrap();
        engine.set_expression(x, "y * 0 + w * 0", Position::unknown()).unwrap();
        engine.set_expression(y, "x * 0", Position::unknown()).unwrap();
        engine.update_expressions().unwrap();

        let err = engine.set_expression(w, "1", Position::unknown()).unwrap_err();
        insta::assert_snapshot!(
            err,
            @"circular dependency: Window#root.x -> Window#root.y -> Window#root.x"
        );
        assert!(engine.get(w).unwrap().expression().is_some());
    }
}
