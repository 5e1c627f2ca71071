//! Populating a group's members from a record.

use std::collections::BTreeMap;

use slotmap::SlotMap;

use super::cast::cast;
use super::variant::Variant;
use super::{Value, ValueId};
use crate::error::{Error, Result};

/// Outcome of applying a record to a group.
#[derive(Debug, Default)]
pub(crate) struct GroupApply {
    /// Members whose exposed value changed.
    pub changed: Vec<ValueId>,
    /// Per-key failures; the other keys were still applied.
    pub errors: Vec<(String, Error)>,
}

impl GroupApply {
    /// Fold per-key failures into a single group error.
    pub fn into_error(self, group: String) -> Option<Error> {
        if self.errors.is_empty() {
            None
        } else {
            Some(Error::Group {
                group,
                errors: self.errors,
            })
        }
    }
}

/// Clear and return the group's pending reset request.
pub(crate) fn take_reset_pending(values: &mut SlotMap<ValueId, Value>, group: ValueId) -> bool {
    values
        .get_mut(group)
        .and_then(Value::group_state_mut)
        .is_some_and(|state| std::mem::take(&mut state.reset_pending))
}

/// Write `record` into the members of `group`.
///
/// Members flagged as individually assigned are skipped unless `reset` is
/// set, in which case the flag is cleared for every key present in the
/// record first. Members the record never mentions and that were never
/// populated fall back to their kind's default.
pub(crate) fn apply_record(
    values: &mut SlotMap<ValueId, Value>,
    group: ValueId,
    record: BTreeMap<String, Variant>,
    reset: bool,
) -> Result<GroupApply> {
    let (group_name, members) = {
        let value = values.get_mut(group).ok_or(Error::Stale("value"))?;
        let group_name = value.name.clone();
        let state = value
            .group_state_mut()
            .ok_or_else(|| Error::Internal(format!("`{group_name}` is not a group")))?;
        if reset {
            for member in &mut state.members {
                if record.contains_key(&member.name) {
                    member.assigned = false;
                }
            }
        }
        (group_name, state.members.clone())
    };

    let mut outcome = GroupApply::default();
    for (key, item) in record {
        let Some(member) = members.iter().find(|m| m.name == key) else {
            outcome.errors.push((
                key.clone(),
                Error::UnknownProperty {
                    component: group_name.clone(),
                    name: key,
                },
            ));
            continue;
        };
        if member.assigned {
            continue;
        }
        let Some(slot) = values.get_mut(member.value) else {
            outcome.errors.push((key, Error::Stale("value")));
            continue;
        };
        match cast(item, &slot.kind) {
            Ok(item) => {
                if slot.store(item) {
                    outcome.changed.push(member.value);
                }
            }
            Err(err) => outcome.errors.push((key, err)),
        }
    }

    for member in members.iter().filter(|m| !m.assigned) {
        if let Some(slot) = values.get_mut(member.value) {
            if slot.current.is_none() {
                let default = slot.kind.default_value();
                slot.store(default);
                outcome.changed.push(member.value);
            }
        }
    }
    Ok(outcome)
}
