//! Compiled scripted bindings.

use std::collections::HashSet;

use slotmap::new_key_type;

use crate::component::ComponentId;
use crate::error::Error;
use crate::position::Position;
use crate::script::{CompileError, Program};
use crate::value::ValueId;

new_key_type! {
    /// Stable handle to a bound expression.
    pub struct ExprId;
}

/// A compiled body bound to one [`Value`](crate::value::Value).
///
/// A compile failure is kept rather than raised so it can be reported with
/// the owning property's context when the expression is first evaluated.
#[derive(Debug, Clone)]
pub struct Expression {
    pub(crate) value: ValueId,
    pub(crate) scope: ComponentId,
    pub(crate) source: String,
    pub(crate) position: Position,
    pub(crate) program: Result<Program, CompileError>,
    pub(crate) dirty: bool,
    /// Values read during the most recent successful run.
    pub(crate) dependencies: HashSet<ValueId>,
    /// Values read by failed runs since then. Changes to them wake the
    /// expression without counting as dependencies.
    pub(crate) wake: HashSet<ValueId>,
    /// Values assigned during the most recent run.
    pub(crate) writes: HashSet<ValueId>,
    pub(crate) last_error: Option<Error>,
}

impl Expression {
    pub(crate) fn new(
        value: ValueId,
        scope: ComponentId,
        source: impl Into<String>,
        position: Position,
        program: Result<Program, CompileError>,
    ) -> Self {
        Self {
            value,
            scope,
            source: source.into(),
            position,
            program,
            dirty: true,
            dependencies: HashSet::new(),
            wake: HashSet::new(),
            writes: HashSet::new(),
            last_error: None,
        }
    }

    /// Swap in new code. Returns every value the old code was registered
    /// with so the caller can unregister them.
    pub(crate) fn recompile(
        &mut self,
        source: impl Into<String>,
        position: Position,
        program: Result<Program, CompileError>,
    ) -> HashSet<ValueId> {
        self.source = source.into();
        self.position = position;
        self.program = program;
        self.dirty = true;
        self.writes.clear();
        self.last_error = None;
        let mut old = std::mem::take(&mut self.dependencies);
        old.extend(self.wake.drain());
        old
    }

    /// Every value this expression is registered with as a dependent.
    pub(crate) fn registered(&self) -> impl Iterator<Item = ValueId> + '_ {
        self.dependencies.union(&self.wake).copied()
    }

    /// The value this expression produces.
    pub fn value(&self) -> ValueId {
        self.value
    }

    /// The component whose scope identifiers resolve in.
    pub fn scope(&self) -> ComponentId {
        self.scope
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn position(&self) -> &Position {
        &self.position
    }

    /// Whether the expression must run on the next pass.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// The error from the most recent run, if it failed.
    pub fn last_error(&self) -> Option<&Error> {
        self.last_error.as_ref()
    }

    pub fn compile_error(&self) -> Option<&CompileError> {
        self.program.as_ref().err()
    }
}
