//! Alias path resolution.

use super::Engine;
use crate::component::{scope, ComponentId, Entity};
use crate::error::{Error, Result};
use crate::value::{Value, ValueId};

impl Engine {
    /// Resolve `alias` to the first non-alias value along its chain.
    ///
    /// Intermediate aliases that were already resolved contribute their
    /// memoized target. A chain that comes back to one of its own links is
    /// an [`Error::AliasCycle`] naming every link.
    pub(super) fn resolve_alias(&self, alias: ValueId) -> Result<ValueId> {
        let mut chain = vec![alias];
        let mut current = alias;
        loop {
            let slot = self.values.get(current).ok_or(Error::Stale("value"))?;
            let state = slot
                .alias_state()
                .ok_or_else(|| Error::Internal(format!("`{}` is not an alias", slot.name)))?;
            let next = match state.target {
                Some(target) if current != alias => target,
                _ => self.resolve_path(slot.owner, &state.path)?,
            };
            if !self.values.get(next).is_some_and(Value::is_alias) {
                return Ok(next);
            }
            if chain.contains(&next) {
                chain.push(next);
                return Err(Error::AliasCycle {
                    chain: chain.into_iter().map(|id| self.label(id)).collect(),
                });
            }
            chain.push(next);
            current = next;
        }
    }

    /// Walk a dotted path from `scope` to a value.
    ///
    /// The first segment resolves like an identifier in an expression; the
    /// rest are members of a component or of a group.
    pub(super) fn resolve_path(&self, scope: ComponentId, path: &[String]) -> Result<ValueId> {
        let joined = path.join(".");
        let (first, rest) = path
            .split_first()
            .ok_or_else(|| Error::Definition("empty alias path".into()))?;
        let unresolved = |name: &str| Error::Unresolved {
            name: name.to_owned(),
        };

        let mut entity = scope::resolve(&self.tree, &self.namespaces, scope, first)?
            .ok_or_else(|| unresolved(first))?;
        for segment in rest {
            entity = match entity {
                Entity::Component(component) => {
                    scope::resolve_member(&self.tree, component, segment)?
                        .ok_or_else(|| unresolved(&joined))?
                }
                Entity::Value(group) => self
                    .values
                    .get(group)
                    .and_then(Value::group_state)
                    .and_then(|state| state.member(segment))
                    .map(|member| Entity::Value(member.value))
                    .ok_or_else(|| unresolved(&joined))?,
                _ => {
                    return Err(Error::Definition(format!(
                        "alias path `{joined}` does not name a property"
                    )))
                }
            };
        }
        match entity {
            Entity::Value(value) => Ok(value),
            _ => Err(Error::Definition(format!(
                "alias path `{joined}` does not name a property"
            ))),
        }
    }
}
