//! Engine error taxonomy and the per-pass aggregate [`ErrorSet`].

use std::fmt;

use crate::position::Position;
use crate::script::CompileError;

/// Result alias used throughout the engine.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Every failure the engine can report.
///
/// `Unsettled` is not a real failure: it signals that a dependency has no
/// value yet and the update loop should retry on a later pass. It never
/// reaches an [`ErrorSet`].
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Error {
    /// A result could not be coerced to the kind of the receiving value.
    #[error("type error: expected {expected}, got {actual}")]
    Type {
        expected: String,
        actual: &'static str,
    },

    /// A dependency could not produce a value yet.
    #[error("dependency not settled yet")]
    Unsettled,

    /// A failure while updating one property, with its context.
    #[error("{position}: {component}#{id}.{property}: {source}")]
    Evaluation {
        component: String,
        id: String,
        property: String,
        position: Position,
        source: Box<Error>,
    },

    /// The bound source text does not compile.
    #[error("{position}: compile error: {error}")]
    Compile {
        position: Position,
        error: CompileError,
    },

    /// A true circular data dependency between expressions.
    #[error("circular dependency: {}", .chain.join(" -> "))]
    Cycle { chain: Vec<String> },

    /// An alias chain that points back at itself.
    #[error("alias cycle: {}", .chain.join(" -> "))]
    AliasCycle { chain: Vec<String> },

    /// An identifier matched nothing in any enclosing scope.
    #[error("unresolved identifier `{name}`")]
    Unresolved { name: String },

    /// `parent` was used from the root component.
    #[error("`parent` used in {component}, which has no parent")]
    NoParent { component: String },

    /// A property name that the component does not declare.
    #[error("unknown property `{name}` on {component}")]
    UnknownProperty { component: String, name: String },

    /// Per-member failures collected while populating a group.
    #[error("group {group}: {}", render_members(.errors))]
    Group {
        group: String,
        errors: Vec<(String, Error)>,
    },

    /// The script raised an error while running.
    #[error("script error: {0}")]
    Script(String),

    /// The engine met a state it has no handling for.
    #[error("internal engine error: {0}")]
    Internal(String),

    /// The update loop hit its pass ceiling.
    #[error("did not converge after {passes} passes")]
    NotConverged { passes: usize },

    /// A definition or declaration is malformed.
    #[error("invalid definition: {0}")]
    Definition(String),

    /// A handle refers to a component, value or expression that was removed.
    #[error("stale {0} handle")]
    Stale(&'static str),
}

fn render_members(errors: &[(String, Error)]) -> String {
    errors
        .iter()
        .map(|(key, err)| format!("{key}: {err}"))
        .collect::<Vec<_>>()
        .join("; ")
}

impl Error {
    /// Build a type error from an expected kind name and the actual runtime kind.
    pub fn type_mismatch(expected: impl fmt::Display, actual: &'static str) -> Self {
        Error::Type {
            expected: expected.to_string(),
            actual,
        }
    }

    /// Shorthand for a script runtime error.
    pub fn script(message: impl Into<String>) -> Self {
        Error::Script(message.into())
    }

    /// Whether this error halts the update loop.
    pub fn is_fatal(&self) -> bool {
        match self {
            Error::Compile { .. }
            | Error::Cycle { .. }
            | Error::AliasCycle { .. }
            | Error::NotConverged { .. } => true,
            Error::Evaluation { source, .. } => source.is_fatal(),
            _ => false,
        }
    }

    /// Whether this is the "try again next pass" sentinel.
    pub fn is_unsettled(&self) -> bool {
        matches!(self, Error::Unsettled)
    }

    /// The innermost error, skipping evaluation context wrappers.
    pub fn root_cause(&self) -> &Error {
        match self {
            Error::Evaluation { source, .. } => source.root_cause(),
            other => other,
        }
    }
}

// ---------------------------------------------------------------------------
// ErrorSet
// ---------------------------------------------------------------------------

/// Errors collected from one or more update passes.
///
/// Each member keeps its own context (component, property, position), so
/// iterating the set never loses per-property information.
#[derive(Debug, Clone, Default, PartialEq, thiserror::Error)]
#[error("{}", render_set(.errors))]
pub struct ErrorSet {
    errors: Vec<Error>,
}

fn render_set(errors: &[Error]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("\n")
}

impl ErrorSet {
    /// An empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an error. The unsettled sentinel is dropped.
    pub fn push(&mut self, error: Error) {
        if !error.is_unsettled() {
            self.errors.push(error);
        }
    }

    /// Whether nothing failed.
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// Number of collected errors.
    pub fn len(&self) -> usize {
        self.errors.len()
    }

    /// Iterate over the collected errors in the order they were reported.
    pub fn iter(&self) -> std::slice::Iter<'_, Error> {
        self.errors.iter()
    }

    /// Whether any member is fatal to the update loop.
    pub fn has_fatal(&self) -> bool {
        self.errors.iter().any(Error::is_fatal)
    }

    /// Iterate over the fatal members only.
    pub fn fatal(&self) -> impl Iterator<Item = &Error> {
        self.errors.iter().filter(|e| e.is_fatal())
    }

    /// Consume the set, returning the underlying errors.
    pub fn into_vec(self) -> Vec<Error> {
        self.errors
    }
}

impl Extend<Error> for ErrorSet {
    fn extend<I: IntoIterator<Item = Error>>(&mut self, iter: I) {
        for error in iter {
            self.push(error);
        }
    }
}

impl FromIterator<Error> for ErrorSet {
    fn from_iter<I: IntoIterator<Item = Error>>(iter: I) -> Self {
        let mut set = ErrorSet::new();
        set.extend(iter);
        set
    }
}

impl IntoIterator for ErrorSet {
    type Item = Error;
    type IntoIter = std::vec::IntoIter<Error>;

    fn into_iter(self) -> Self::IntoIter {
        self.errors.into_iter()
    }
}

impl<'a> IntoIterator for &'a ErrorSet {
    type Item = &'a Error;
    type IntoIter = std::slice::Iter<'a, Error>;

    fn into_iter(self) -> Self::IntoIter {
        self.errors.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn evaluation(source: Error) -> Error {
        Error::Evaluation {
            component: "Rectangle".into(),
            id: "box".into(),
            property: "width".into(),
            position: Position::new(4, 9),
            source: Box::new(source),
        }
    }

    #[test]
    fn type_error_names_both_kinds() {
        let err = Error::type_mismatch("int", "string");
        assert_eq!(err.to_string(), "type error: expected int, got string");
    }

    #[test]
    fn evaluation_error_carries_context() {
        let err = evaluation(Error::Unresolved { name: "foo".into() });
        insta::assert_snapshot!(err.to_string(), @"4:9: Rectangle#box.width: unresolved identifier `foo`");
    }

    #[test]
    fn cycle_names_chain() {
        let err = Error::AliasCycle {
            chain: vec!["a".into(), "b".into(), "a".into()],
        };
        assert_eq!(err.to_string(), "alias cycle: a -> b -> a");
        assert!(err.is_fatal());
    }

    #[test]
    fn fatal_through_wrapper() {
        assert!(evaluation(Error::Cycle { chain: vec![] }).is_fatal());
        assert!(!evaluation(Error::Script("boom".into())).is_fatal());
        assert!(Error::NotConverged { passes: 3 }.is_fatal());
    }

    #[test]
    fn root_cause_unwraps() {
        let err = evaluation(evaluation(Error::Script("inner".into())));
        assert_eq!(err.root_cause(), &Error::Script("inner".into()));
    }

    #[test]
    fn group_error_lists_members() {
        let err = Error::Group {
            group: "border".into(),
            errors: vec![
                (
                    "colour".into(),
                    Error::UnknownProperty {
                        component: "border".into(),
                        name: "colour".into(),
                    },
                ),
                ("width".into(), Error::type_mismatch("int", "list")),
            ],
        };
        insta::assert_snapshot!(
            err.to_string(),
            @"group border: colour: unknown property `colour` on border; width: type error: expected int, got list"
        );
    }

    // ── ErrorSet ─────────────────────────────────────────────────────

    #[test]
    fn set_drops_unsettled() {
        let mut set = ErrorSet::new();
        set.push(Error::Unsettled);
        assert!(set.is_empty());
        set.push(Error::Script("x".into()));
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn set_fatal_filtering() {
        let set: ErrorSet = vec![
            Error::Script("recoverable".into()),
            Error::Cycle {
                chain: vec!["a".into(), "a".into()],
            },
        ]
        .into_iter()
        .collect();
        assert!(set.has_fatal());
        assert_eq!(set.fatal().count(), 1);
    }

    #[test]
    fn set_display_one_per_line() {
        let set: ErrorSet = vec![Error::Script("one".into()), Error::Script("two".into())]
            .into_iter()
            .collect();
        assert_eq!(set.to_string(), "script error: one\nscript error: two");
    }
}
