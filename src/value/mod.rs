//! Typed property slots.
//!
//! A [`Value`] lives in the engine's value arena and is addressed by a
//! [`ValueId`]. It holds either a literal or the result of its bound
//! expression, plus the bookkeeping the update loop needs: the `changed`
//! flag, the set of expressions that read it, and variant-specific state
//! for groups, aliases, optionals and statics.

pub mod cast;
pub mod color;
pub mod group;
pub mod kind;
pub mod variant;

use std::collections::HashSet;

use slotmap::new_key_type;

pub use cast::cast;
pub use color::Color;
pub use kind::ValueKind;
pub use variant::{Function, Handle, Variant};

use crate::component::ComponentId;
use crate::expression::ExprId;
use crate::position::Position;

new_key_type! {
    /// Stable handle to a property slot. Copy, lightweight (u64).
    pub struct ValueId;
}

// ---------------------------------------------------------------------------
// Variant-specific state
// ---------------------------------------------------------------------------

/// One declared member of a group.
#[derive(Debug, Clone)]
pub(crate) struct Member {
    pub name: String,
    pub value: ValueId,
    /// Set when the member was assigned individually; the group-level
    /// expression then leaves it alone.
    pub assigned: bool,
}

#[derive(Debug, Clone, Default)]
pub(crate) struct GroupState {
    pub members: Vec<Member>,
    /// The group expression was rebound; its next result clears the
    /// `assigned` flag of every member it mentions.
    pub reset_pending: bool,
}

impl GroupState {
    pub fn member(&self, name: &str) -> Option<&Member> {
        self.members.iter().find(|m| m.name == name)
    }

    pub fn member_mut(&mut self, name: &str) -> Option<&mut Member> {
        self.members.iter_mut().find(|m| m.name == name)
    }
}

#[derive(Debug, Clone)]
pub(crate) struct AliasState {
    pub path: Vec<String>,
    pub position: Position,
    pub target: Option<ValueId>,
    /// Structure epoch of the last failed resolution attempt.
    pub failed_epoch: Option<u64>,
}

#[derive(Debug, Clone)]
pub(crate) enum State {
    Plain,
    Group(GroupState),
    Alias(AliasState),
    Optional { is_set: bool },
    Static,
}

// ---------------------------------------------------------------------------
// Value
// ---------------------------------------------------------------------------

/// A typed, observable property slot.
#[derive(Debug, Clone)]
pub struct Value {
    pub(crate) owner: ComponentId,
    pub(crate) name: String,
    pub(crate) kind: ValueKind,
    /// `None` until the value is first populated; reads then report the
    /// dependency as unsettled.
    pub(crate) current: Option<Variant>,
    pub(crate) expression: Option<ExprId>,
    pub(crate) changed: bool,
    pub(crate) dependents: HashSet<ExprId>,
    /// The group this value is a member of.
    pub(crate) group: Option<ValueId>,
    pub(crate) state: State,
}

impl Value {
    pub(crate) fn new(owner: ComponentId, name: impl Into<String>, kind: ValueKind) -> Self {
        let state = match &kind {
            ValueKind::Group(_) => State::Group(GroupState::default()),
            ValueKind::Optional(_) => State::Optional { is_set: false },
            ValueKind::Static(_) => State::Static,
            _ => State::Plain,
        };
        let current = match &kind {
            ValueKind::Optional(_) => Some(Variant::Nil),
            other => Some(other.default_value()),
        };
        Self {
            owner,
            name: name.into(),
            kind,
            current,
            expression: None,
            changed: false,
            dependents: HashSet::new(),
            group: None,
            state,
        }
    }

    /// Mark as not yet populated.
    pub(crate) fn unsettled(mut self) -> Self {
        self.current = None;
        self
    }

    /// Store an already-cast value, returning whether the exposed value
    /// changed. An optional becoming set counts as a change even when the
    /// stored value is equal.
    pub(crate) fn store(&mut self, value: Variant) -> bool {
        let became_set = match &mut self.state {
            State::Optional { is_set } => !std::mem::replace(is_set, true),
            _ => false,
        };
        let differs = became_set || self.current.as_ref() != Some(&value);
        if differs {
            self.current = Some(value);
            self.changed = true;
        }
        differs
    }

    pub(crate) fn group_state(&self) -> Option<&GroupState> {
        match &self.state {
            State::Group(group) => Some(group),
            _ => None,
        }
    }

    pub(crate) fn group_state_mut(&mut self) -> Option<&mut GroupState> {
        match &mut self.state {
            State::Group(group) => Some(group),
            _ => None,
        }
    }

    pub(crate) fn alias_state(&self) -> Option<&AliasState> {
        match &self.state {
            State::Alias(alias) => Some(alias),
            _ => None,
        }
    }

    pub(crate) fn alias_state_mut(&mut self) -> Option<&mut AliasState> {
        match &mut self.state {
            State::Alias(alias) => Some(alias),
            _ => None,
        }
    }

    /// Property name. Group members carry their member name only.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> &ValueKind {
        &self.kind
    }

    /// The component that owns this value.
    pub fn owner(&self) -> ComponentId {
        self.owner
    }

    /// The bound expression, if the value is not a literal.
    pub fn expression(&self) -> Option<ExprId> {
        self.expression
    }

    /// Whether the value changed since the flag was last taken.
    pub fn is_changed(&self) -> bool {
        self.changed
    }

    /// The group this value belongs to, for group members.
    pub fn group(&self) -> Option<ValueId> {
        self.group
    }

    /// Expressions that read this value on their last run.
    pub fn dependents(&self) -> impl Iterator<Item = ExprId> + '_ {
        self.dependents.iter().copied()
    }

    /// Whether the value has been populated. Optionals report whether they
    /// were explicitly set.
    pub fn is_set(&self) -> bool {
        match &self.state {
            State::Optional { is_set } => *is_set,
            State::Alias(alias) => alias.target.is_some(),
            _ => self.current.is_some(),
        }
    }

    pub fn is_alias(&self) -> bool {
        matches!(self.state, State::Alias(_))
    }

    pub fn is_static(&self) -> bool {
        matches!(self.state, State::Static)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use slotmap::KeyData;

    fn owner() -> ComponentId {
        ComponentId::from(KeyData::from_ffi(1))
    }

    #[test]
    fn literal_starts_with_default() {
        let value = Value::new(owner(), "width", ValueKind::Int);
        assert_eq!(value.current, Some(Variant::Int(0)));
        assert!(!value.is_changed());
    }

    #[test]
    fn store_reports_differences_only() {
        let mut value = Value::new(owner(), "width", ValueKind::Int);
        assert!(value.store(Variant::Int(3)));
        assert!(value.is_changed());
        value.changed = false;
        assert!(!value.store(Variant::Int(3)));
        assert!(!value.is_changed());
    }

    #[test]
    fn optional_becoming_set_is_a_change() {
        let mut value = Value::new(owner(), "hint", ValueKind::optional(ValueKind::String));
        assert!(!value.is_set());
        assert!(value.store(Variant::Nil));
        assert!(value.is_set());
        assert!(!value.store(Variant::Nil));
    }

    #[test]
    fn unsettled_value_is_not_set() {
        let value = Value::new(owner(), "x", ValueKind::Int).unsettled();
        assert!(!value.is_set());
    }
}
