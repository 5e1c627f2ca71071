//! Expression evaluation and dirty propagation.
//!
//! Edges are discovered by running expressions: every value an expression
//! reads becomes a dependency, and the expression is registered as a
//! dependent of that value. Writes are recorded too, so a change to a
//! written value reaches the readers of the writer.

use std::collections::HashSet;

use tracing::trace;

use super::Engine;
use crate::collector::{AccessCollector, Accesses};
use crate::error::{Error, Result};
use crate::expression::ExprId;
use crate::value::{ValueId, Variant};

/// One step of the iterative dirty walk.
enum Step {
    Enter(ExprId),
    Exit,
}

impl Engine {
    /// Register `expr` as a dependent of every value in `values`.
    pub(super) fn register(&mut self, expr: ExprId, values: &HashSet<ValueId>) {
        for &value in values {
            if let Some(slot) = self.values.get_mut(value) {
                slot.dependents.insert(expr);
            }
        }
    }

    pub(super) fn unregister(&mut self, expr: ExprId, values: impl IntoIterator<Item = ValueId>) {
        for value in values {
            if let Some(slot) = self.values.get_mut(value) {
                slot.dependents.remove(&expr);
            }
        }
    }

    /// Delete `expr` and every edge that mentions it.
    pub(super) fn drop_expression(&mut self, expr: ExprId) {
        let Some(entry) = self.exprs.remove(expr) else {
            return;
        };
        self.unregister(expr, entry.registered().collect::<Vec<_>>());
        if let Some(slot) = self.values.get_mut(entry.value) {
            if slot.expression == Some(expr) {
                slot.expression = None;
            }
        }
    }

    /// Run `expr` once and fold what it touched into the graph.
    ///
    /// A successful run replaces the dependency set and drops any wake-up
    /// edges. A failed run leaves the dependency set alone; what it read is
    /// kept as wake-up edges so the expression runs again when one of those
    /// values changes. A run that stopped on an unsettled dependency stays
    /// dirty. Any other failure marks the expression clean.
    pub(super) fn evaluate(&mut self, expr: ExprId) -> Result<Variant> {
        let entry = self.exprs.get(expr).ok_or(Error::Stale("expression"))?;
        let program = match &entry.program {
            Ok(program) => program.clone(),
            Err(error) => {
                let err = Error::Compile {
                    position: entry.position.clone(),
                    error: error.clone(),
                };
                if let Some(entry) = self.exprs.get_mut(expr) {
                    entry.dirty = false;
                    entry.last_error = Some(err.clone());
                }
                return Err(err);
            }
        };
        let scope = entry.scope;
        if self.config.trace_evaluations {
            trace!(
                property = %self.expr_label(expr),
                source = %entry.source,
                "evaluating expression"
            );
        }

        let mut accesses = Accesses::default();
        let result = {
            let mut collector = AccessCollector::new(
                &self.tree,
                &mut self.values,
                &self.namespaces,
                scope,
                &mut accesses,
            );
            self.runtime.run(&program, &mut collector)
        };
        let Accesses {
            reads,
            writes,
            touched,
        } = accesses;

        let previous: Vec<ValueId> = self
            .exprs
            .get(expr)
            .map(|entry| entry.registered().filter(|v| !reads.contains(v)).collect())
            .unwrap_or_default();
        self.register(expr, &reads);
        match &result {
            Ok(_) => {
                self.unregister(expr, previous);
                if let Some(entry) = self.exprs.get_mut(expr) {
                    entry.dependencies = reads;
                    entry.wake.clear();
                    entry.writes = writes;
                    entry.dirty = false;
                    entry.last_error = None;
                }
            }
            Err(err) => {
                if let Some(entry) = self.exprs.get_mut(expr) {
                    entry.wake.extend(reads);
                    entry.writes.extend(writes);
                    if !err.is_unsettled() {
                        entry.dirty = false;
                        entry.last_error = Some(err.clone());
                    }
                }
            }
        }

        self.propagate_dirty(Some(expr), &touched)?;
        result
    }

    /// Mark every reader of `sources` dirty, transitively.
    ///
    /// `origin` is the expression whose run caused the change, if any;
    /// reaching it again is a circular dependency.
    pub(super) fn propagate_dirty(&mut self, origin: Option<ExprId>, sources: &[ValueId]) -> Result<()> {
        let mut start: Vec<ExprId> = sources
            .iter()
            .flat_map(|&value| self.notify_targets(value))
            .collect();
        start.sort();
        start.dedup();
        self.mark_dirty(origin, start)
    }

    /// Depth-first walk from `start` marking each expression dirty.
    ///
    /// Expressions on the current path are gray and finished ones are
    /// black. Entering a gray expression is a cycle; the error names every
    /// property from the first occurrence back to itself.
    pub(super) fn mark_dirty(&mut self, origin: Option<ExprId>, start: Vec<ExprId>) -> Result<()> {
        let mut path: Vec<ExprId> = origin.into_iter().collect();
        let mut done: HashSet<ExprId> = HashSet::new();
        let mut stack: Vec<Step> = start.into_iter().rev().map(Step::Enter).collect();

        while let Some(step) = stack.pop() {
            let expr = match step {
                Step::Exit => {
                    if let Some(finished) = path.pop() {
                        done.insert(finished);
                    }
                    continue;
                }
                Step::Enter(expr) => expr,
            };
            if let Some(at) = path.iter().position(|&on_path| on_path == expr) {
                let chain = path[at..]
                    .iter()
                    .chain(std::iter::once(&expr))
                    .map(|&e| self.expr_label(e))
                    .collect();
                return Err(Error::Cycle { chain });
            }
            if done.contains(&expr) {
                continue;
            }
            let Some(entry) = self.exprs.get_mut(expr) else {
                continue;
            };
            entry.dirty = true;
            path.push(expr);
            stack.push(Step::Exit);
            stack.extend(self.successors(expr).into_iter().rev().map(Step::Enter));
        }
        Ok(())
    }

    /// Expressions to wake after `expr` runs: readers of its own value and
    /// of everything it writes.
    fn successors(&self, expr: ExprId) -> Vec<ExprId> {
        let Some(entry) = self.exprs.get(expr) else {
            return Vec::new();
        };
        let mut next = self.notify_targets(entry.value);
        for &written in &entry.writes {
            next.extend(self.notify_targets(written));
        }
        next.sort();
        next.dedup();
        next
    }

    /// Readers of `value`, including readers of its group members.
    fn notify_targets(&self, value: ValueId) -> Vec<ExprId> {
        let Some(slot) = self.values.get(value) else {
            return Vec::new();
        };
        let mut targets: Vec<ExprId> = slot.dependents().collect();
        if let Some(group) = slot.group_state() {
            for member in &group.members {
                if let Some(member) = self.values.get(member.value) {
                    targets.extend(member.dependents());
                }
            }
        }
        targets
    }

    fn expr_label(&self, expr: ExprId) -> String {
        self.exprs
            .get(expr)
            .map_or_else(|| "<removed>".to_owned(), |entry| self.label(entry.value))
    }

    /// Values `expr` read on its most recent run, in key order.
    pub fn dependencies(&self, expr: ExprId) -> Vec<ValueId> {
        let mut values: Vec<ValueId> = self
            .exprs
            .get(expr)
            .map(|entry| entry.dependencies.iter().copied().collect())
            .unwrap_or_default();
        values.sort();
        values
    }

    /// Expressions that read `value`, in key order.
    pub fn dependents(&self, value: ValueId) -> Vec<ExprId> {
        let mut exprs: Vec<ExprId> = self
            .values
            .get(value)
            .map(|slot| slot.dependents().collect())
            .unwrap_or_default();
        exprs.sort();
        exprs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::{ComponentData, ComponentId};
    use crate::position::Position;
    use crate::value::ValueKind;
    use pretty_assertions::assert_eq;

    fn window() -> (Engine, ComponentId) {
        let mut engine = Engine::new();
        let root = engine
            .create_root(ComponentData::new("Window").with_id("root"))
            .unwrap();
        (engine, root)
    }

    #[test]
    fn evaluation_records_reads() {
        let (mut engine, root) = window();
        let a = engine.declare(root, "a", ValueKind::Int).unwrap();
        let b = engine.declare(root, "b", ValueKind::Int).unwrap();
        let sum = engine.declare(root, "sum", ValueKind::Int).unwrap();
        let expr = engine.set_expression(sum, "a + b", Position::unknown()).unwrap();

        assert_eq!(engine.evaluate(expr).unwrap(), Variant::Int(0));
        let mut expected = vec![a, b];
        expected.sort();
        assert_eq!(engine.dependencies(expr), expected);
        assert_eq!(engine.dependents(a), vec![expr]);
        assert!(!engine.expression(expr).unwrap().is_dirty());
    }

    #[test]
    fn setting_a_dependency_dirties_the_reader() {
        let (mut engine, root) = window();
        let a = engine.declare(root, "a", ValueKind::Int).unwrap();
        let double = engine.declare(root, "double", ValueKind::Int).unwrap();
        let expr = engine.set_expression(double, "a * 2", Position::unknown()).unwrap();
        engine.evaluate(expr).unwrap();

        engine.set_value(a, 3).unwrap();
        assert!(engine.expression(expr).unwrap().is_dirty());
    }

    #[test]
    fn unsettled_run_stays_dirty_and_keeps_reads() {
        let (mut engine, root) = window();
        let late = engine.insert_value(root, "late", ValueKind::Int, false).unwrap();
        let out = engine.declare(root, "out", ValueKind::Int).unwrap();
        let expr = engine.set_expression(out, "late + 1", Position::unknown()).unwrap();

        assert_eq!(engine.evaluate(expr), Err(Error::Unsettled));
        assert!(engine.expression(expr).unwrap().is_dirty());
        assert_eq!(engine.dependents(late), vec![expr]);
    }

    #[test]
    fn failed_run_is_clean_with_last_error() {
        let (mut engine, root) = window();
        let out = engine.declare(root, "out", ValueKind::Int).unwrap();
        let expr = engine.set_expression(out, "1 / 0", Position::unknown()).unwrap();

        assert!(engine.evaluate(expr).is_err());
        let entry = engine.expression(expr).unwrap();
        assert!(!entry.is_dirty());
        assert!(entry.last_error().is_some());
    }

    #[test]
    fn compile_errors_surface_on_evaluation() {
        let (mut engine, root) = window();
        let out = engine.declare(root, "out", ValueKind::Int).unwrap();
        let expr = engine.set_expression(out, "1 +", Position::new(2, 5)).unwrap();
        let err = engine.evaluate(expr).unwrap_err();
        assert!(matches!(err, Error::Compile { .. }));
        assert!(err.is_fatal());
    }

    #[test]
    fn written_values_wake_their_readers() {
        let (mut engine, root) = window();
        let target = engine.declare(root, "target", ValueKind::Int).unwrap();
        let reader = engine.declare(root, "reader", ValueKind::Int).unwrap();
        let writer = engine.declare(root, "writer", ValueKind::Int).unwrap();
        let read = engine.set_expression(reader, "target", Position::unknown()).unwrap();
        let write = engine
            .set_expression(writer, "target = 7; 1", Position::unknown())
            .unwrap();
        engine.evaluate(read).unwrap();

        engine.evaluate(write).unwrap();
        assert_eq!(engine.value(target), Some(Variant::Int(7)));
        assert!(engine.expression(read).unwrap().is_dirty());
    }

    #[test]
    fn revisiting_the_path_is_a_cycle() {
        let (mut engine, root) = window();
        let x = engine.declare(root, "x", ValueKind::Int).unwrap();
        let y = engine.declare(root, "y", ValueKind::Int).unwrap();
        engine.set_expression(x, "y + 1", Position::unknown()).unwrap();
        engine.set_expression(y, "x + 1", Position::unknown()).unwrap();
        assert!(engine.update_value(x).error.is_none());

        let err = engine.update_value(y).error.unwrap();
        insta::assert_snapshot!(
            err,
            @"circular dependency: Window#root.y -> Window#root.x -> Window#root.y"
        );
    }

    #[test]
    fn failed_run_keeps_the_last_successful_dependencies() {
        let (mut engine, root) = window();
        let f = engine.declare(root, "f", ValueKind::Bool).unwrap();
        let a = engine.declare(root, "a", ValueKind::Int).unwrap();
        let b = engine.declare(root, "b", ValueKind::Int).unwrap();
        let out = engine.declare(root, "out", ValueKind::Int).unwrap();
        engine.set_value(f, true).unwrap();
        let expr = engine
            .set_expression(out, "f ? a : b / 0", Position::unknown())
            .unwrap();
        engine.evaluate(expr).unwrap();
        let mut expected = vec![f, a];
        expected.sort();

        engine.set_value(f, false).unwrap();
        assert!(engine.evaluate(expr).is_err());
        assert_eq!(engine.dependencies(expr), expected);
        assert_eq!(engine.dependents(b), vec![expr]);

        engine.set_value(f, true).unwrap();
        assert!(engine.expression(expr).unwrap().is_dirty());
        engine.evaluate(expr).unwrap();
        assert_eq!(engine.dependencies(expr), expected);
        assert!(engine.dependents(b).is_empty());
    }
}
