//! The per-value update and the fixpoint loop that drives it.

use tracing::{debug, error, warn};

use super::Engine;
use crate::error::{Error, ErrorSet, Result};
use crate::expression::ExprId;
use crate::value::group::{apply_record, take_reset_pending};
use crate::value::{cast, State, Value, ValueId, Variant};

/// Outcome of one [`Engine::update_value`] call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValueUpdate {
    /// Whether the exposed value changed.
    pub changed: bool,
    pub error: Option<Error>,
}

impl ValueUpdate {
    fn unchanged() -> Self {
        Self::default()
    }

    fn changed(changed: bool) -> Self {
        Self {
            changed,
            error: None,
        }
    }

    fn failed(error: Error) -> Self {
        Self {
            changed: false,
            error: Some(error),
        }
    }
}

/// Summary of a converged [`Engine::update_expressions`] run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpdateReport {
    /// Passes run, including the final pass that changed nothing.
    pub passes: usize,
    /// Values that changed, summed over every pass.
    pub changed: usize,
    /// Recovered per-property failures.
    pub errors: ErrorSet,
    /// Values that still wait on a dependency with no value.
    pub unsettled: Vec<ValueId>,
}

/// Tally of a single pass.
#[derive(Default)]
struct Pass {
    changed: usize,
    errors: ErrorSet,
}

impl Engine {
    /// Bring one value up to date.
    ///
    /// Literals and clean expressions report no change without running
    /// anything, except that a fatal failure of the current binding is
    /// reported again. A dependency with no value yet is not an error: the value
    /// stays dirty and reports no change so a later pass retries it.
    pub fn update_value(&mut self, value: ValueId) -> ValueUpdate {
        let Some(slot) = self.values.get_mut(value) else {
            return ValueUpdate::failed(Error::Stale("value"));
        };
        match slot.state {
            State::Static => {
                slot.changed = false;
                return ValueUpdate::unchanged();
            }
            State::Alias(_) => return self.update_alias(value),
            _ => {}
        }
        let Some(expr) = slot.expression else {
            return ValueUpdate::unchanged();
        };
        let Some(entry) = self.exprs.get(expr) else {
            return ValueUpdate::unchanged();
        };
        let position = entry.position.clone();
        if !entry.dirty {
            // A binding that cannot compile stays fatal until it is replaced.
            return match entry.last_error.clone().filter(Error::is_fatal) {
                Some(err) => ValueUpdate::failed(self.contextualize(value, &position, err)),
                None => ValueUpdate::unchanged(),
            };
        }

        let result = match self.evaluate(expr) {
            Ok(result) => result,
            Err(Error::Unsettled) => return ValueUpdate::unchanged(),
            Err(err) => return ValueUpdate::failed(self.contextualize(value, &position, err)),
        };
        match self.store_result(value, expr, result) {
            Ok(changed) => ValueUpdate::changed(changed),
            Err(err) => ValueUpdate::failed(self.contextualize(value, &position, err)),
        }
    }

    /// Resolve an alias the first time it is updated.
    ///
    /// A failed resolution is retried once per structural change. A cycle
    /// is detected again on every update.
    fn update_alias(&mut self, value: ValueId) -> ValueUpdate {
        let Some(alias) = self.values.get(value).and_then(Value::alias_state) else {
            return ValueUpdate::unchanged();
        };
        if alias.target.is_some() || alias.failed_epoch == Some(self.epoch) {
            return ValueUpdate::unchanged();
        }
        let position = alias.position.clone();

        match self.resolve_alias(value) {
            Ok(target) => {
                if let Some(alias) = self.values.get_mut(value).and_then(Value::alias_state_mut) {
                    alias.target = Some(target);
                    alias.failed_epoch = None;
                }
                debug!(alias = %self.label(value), target = %self.label(target), "resolved alias");
                match self.propagate_dirty(None, &[value]) {
                    Ok(()) => ValueUpdate::changed(true),
                    Err(err) => ValueUpdate::failed(err),
                }
            }
            Err(err @ Error::AliasCycle { .. }) => ValueUpdate::failed(err),
            Err(err) => {
                let epoch = self.epoch;
                if let Some(alias) = self.values.get_mut(value).and_then(Value::alias_state_mut) {
                    alias.failed_epoch = Some(epoch);
                }
                ValueUpdate::failed(self.contextualize(value, &position, err))
            }
        }
    }

    /// Cast an expression result and store it, waking readers on change.
    fn store_result(&mut self, value: ValueId, expr: ExprId, result: Variant) -> Result<bool> {
        let slot = self.values.get(value).ok_or(Error::Stale("value"))?;
        let result = match cast(result, &slot.kind) {
            Ok(result) => result,
            Err(err) => {
                if let Some(entry) = self.exprs.get_mut(expr) {
                    entry.last_error = Some(err.clone());
                }
                return Err(err);
            }
        };

        if let Variant::Record(record) = result {
            let reset = take_reset_pending(&mut self.values, value);
            let outcome = apply_record(&mut self.values, value, record, reset)?;
            let changed = !outcome.changed.is_empty();
            self.propagate_dirty(Some(expr), &outcome.changed)?;
            return match outcome.into_error(self.property_path(value)) {
                Some(err) => Err(err),
                None => Ok(changed),
            };
        }

        let changed = self
            .values
            .get_mut(value)
            .is_some_and(|slot| slot.store(result));
        if changed {
            self.propagate_dirty(Some(expr), &[value])?;
        }
        Ok(changed)
    }

    /// Run passes over the whole tree until one changes nothing.
    ///
    /// Recovered failures are collected into the report. A fatal failure
    /// (compile error, cycle, pass ceiling) stops the loop and returns every
    /// error collected so far.
    pub fn update_expressions(&mut self) -> Result<UpdateReport, ErrorSet> {
        let mut report = UpdateReport::default();
        loop {
            let pass = self.update_pass();
            report.passes += 1;
            report.changed += pass.changed;
            let fatal = pass.errors.has_fatal();
            report.errors.extend(pass.errors);

            if fatal {
                for err in report.errors.fatal() {
                    error!(pass = report.passes, error = %err, "update halted");
                }
                return Err(report.errors);
            }
            if pass.changed == 0 {
                break;
            }
            if report.passes >= self.config.max_passes {
                error!(passes = report.passes, "update did not converge");
                report.errors.push(Error::NotConverged {
                    passes: report.passes,
                });
                return Err(report.errors);
            }
        }

        report.unsettled = self.unsettled_values();
        debug!(
            passes = report.passes,
            changed = report.changed,
            errors = report.errors.len(),
            unsettled = report.unsettled.len(),
            "update converged"
        );
        Ok(report)
    }

    /// Update every value once, components depth-first from the root.
    fn update_pass(&mut self) -> Pass {
        let mut pass = Pass::default();
        let Some(root) = self.tree.root() else {
            return pass;
        };
        for component in self.tree.walk_depth_first(root) {
            let order = match self.tree.get(component) {
                Some(data) => data.order.clone(),
                None => continue,
            };
            for value in order {
                let update = self.update_value(value);
                if update.changed {
                    pass.changed += 1;
                }
                let Some(err) = update.error else {
                    continue;
                };
                if err.is_fatal() {
                    pass.errors.push(err);
                    return pass;
                }
                warn!(property = %self.label(value), error = %err, "property update failed");
                pass.errors.push(err);
            }
        }
        pass
    }

    /// Values whose expression is still waiting on a dependency, or aliases
    /// that never resolved.
    fn unsettled_values(&self) -> Vec<ValueId> {
        let mut unsettled: Vec<ValueId> = self
            .values
            .iter()
            .filter(|(_, slot)| match &slot.state {
                State::Alias(alias) => alias.target.is_none(),
                _ => slot
                    .expression
                    .and_then(|expr| self.exprs.get(expr))
                    .is_some_and(|entry| entry.dirty),
            })
            .map(|(id, _)| id)
            .collect();
        unsettled.sort();
        unsettled
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::{ComponentData, ComponentId};
    use crate::config::EngineConfig;
    use crate::position::Position;
    use crate::value::ValueKind;
    use pretty_assertions::assert_eq;

    fn window(config: EngineConfig) -> (Engine, ComponentId) {
        let mut engine = Engine::with_config(config);
        let root = engine
            .create_root(ComponentData::new("Window").with_id("root"))
            .unwrap();
        (engine, root)
    }

    #[test]
    fn literal_reports_no_change() {
        let (mut engine, root) = window(EngineConfig::default());
        let width = engine.declare(root, "width", ValueKind::Int).unwrap();
        engine.set_value(width, 3).unwrap();
        assert_eq!(engine.update_value(width), ValueUpdate::default());
    }

    #[test]
    fn expression_updates_once_then_is_clean() {
        let (mut engine, root) = window(EngineConfig::default());
        let width = engine.declare(root, "width", ValueKind::Int).unwrap();
        engine.set_expression(width, "2 * 21", Position::unknown()).unwrap();
        assert!(engine.update_value(width).changed);
        assert_eq!(engine.value(width), Some(Variant::Int(42)));
        assert!(!engine.update_value(width).changed);
    }

    #[test]
    fn cast_failure_keeps_the_old_value() {
        let (mut engine, root) = window(EngineConfig::default());
        let width = engine.declare(root, "width", ValueKind::Int).unwrap();
        engine.set_expression(width, "[1]", Position::new(1, 9)).unwrap();
        let update = engine.update_value(width);
        insta::assert_snapshot!(
            update.error.unwrap(),
            @"1:9: Window#root.width: type error: expected int, got list"
        );
        assert_eq!(engine.value(width), Some(Variant::Int(0)));
    }

    #[test]
    fn statics_only_clear_their_flag() {
        let (mut engine, root) = window(EngineConfig::default());
        let scale = engine
            .declare_static(root, "scale", ValueKind::Int, "3", Position::unknown())
            .unwrap();
        assert!(engine.get(scale).unwrap().is_changed());
        assert_eq!(engine.update_value(scale), ValueUpdate::default());
        assert!(!engine.get(scale).unwrap().is_changed());
    }

    #[test]
    fn aliases_resolve_and_retry_after_structure_changes() {
        let (mut engine, root) = window(EngineConfig::default());
        let alias = engine
            .declare_alias(root, "w", "panel.width", Position::unknown())
            .unwrap();
        assert!(engine.update_value(alias).error.is_some());
        assert_eq!(engine.update_value(alias), ValueUpdate::default());

        let panel = engine
            .add_child(root, ComponentData::new("Panel").with_id("panel"))
            .unwrap();
        let width = engine.declare(panel, "width", ValueKind::Int).unwrap();
        engine.set_value(width, 8).unwrap();
        assert!(engine.update_value(alias).changed);
        assert_eq!(engine.value(alias), Some(Variant::Int(8)));
    }

    #[test]
    fn loop_reports_passes_and_changes() {
        let (mut engine, root) = window(EngineConfig::default());
        let a = engine.declare(root, "a", ValueKind::Int).unwrap();
        let b = engine.declare(root, "b", ValueKind::Int).unwrap();
        engine.set_value(a, 5).unwrap();
        engine.set_expression(b, "a + 1", Position::unknown()).unwrap();

        let report = engine.update_expressions().unwrap();
        assert_eq!((report.passes, report.changed), (2, 1));
        assert!(report.errors.is_empty());
        assert_eq!(engine.value(b), Some(Variant::Int(6)));
    }

    #[test]
    fn recovered_errors_do_not_stop_siblings() {
        let (mut engine, root) = window(EngineConfig::default());
        let bad = engine.declare(root, "bad", ValueKind::Int).unwrap();
        let good = engine.declare(root, "good", ValueKind::Int).unwrap();
        engine.set_expression(bad, "missing", Position::unknown()).unwrap();
        engine.set_expression(good, "4", Position::unknown()).unwrap();

        let report = engine.update_expressions().unwrap();
        assert_eq!(report.errors.len(), 1);
        assert_eq!(engine.value(good), Some(Variant::Int(4)));
    }

    #[test]
    fn unsettled_values_are_reported() {
        let (mut engine, root) = window(EngineConfig::default());
        let late = engine.insert_value(root, "late", ValueKind::Int, false).unwrap();
        let out = engine.declare(root, "out", ValueKind::Int).unwrap();
        engine.set_expression(out, "late * 2", Position::unknown()).unwrap();

        let report = engine.update_expressions().unwrap();
        assert!(report.errors.is_empty());
        assert_eq!(report.unsettled, vec![out]);

        engine.set_value(late, 4).unwrap();
        let report = engine.update_expressions().unwrap();
        assert!(report.unsettled.is_empty());
        assert_eq!(engine.value(out), Some(Variant::Int(8)));
    }

    #[test]
    fn compile_errors_stay_fatal_until_rebound() {
        let (mut engine, root) = window(EngineConfig::default());
        let width = engine.declare(root, "width", ValueKind::Int).unwrap();
        engine.set_expression(width, "1 +", Position::new(2, 4)).unwrap();

        for _ in 0..2 {
            let errors = engine.update_expressions().unwrap_err();
            assert!(errors.has_fatal());
        }

        engine.set_expression(width, "1 + 2", Position::new(2, 4)).unwrap();
        assert!(engine.update_expressions().is_ok());
        assert_eq!(engine.value(width), Some(Variant::Int(3)));
    }

    #[test]
    fn alias_cycles_are_reported_on_every_update() {
        let (mut engine, root) = window(EngineConfig::default());
        let a = engine.declare_alias(root, "a", "b", Position::unknown()).unwrap();
        engine.declare_alias(root, "b", "a", Position::unknown()).unwrap();

        for _ in 0..2 {
            let errors = engine.update_expressions().unwrap_err();
            assert!(errors.has_fatal());
            assert!(engine.update_value(a).error.is_some_and(|err| err.is_fatal()));
        }
    }
}
