//! Engine configuration.

// ---------------------------------------------------------------------------
// GroupReset
// ---------------------------------------------------------------------------

/// What happens to group members' "individually assigned" flags when the
/// group-level expression is rebound.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GroupReset {
    /// Clear the flag only for members present in the new expression's
    /// first result. Members the new expression never mentions keep their
    /// individual assignment.
    #[default]
    Scoped,
    /// Clear every member's flag as soon as the group expression is rebound.
    All,
}

// ---------------------------------------------------------------------------
// EngineConfig
// ---------------------------------------------------------------------------

/// Configuration for an [`Engine`](crate::engine::Engine).
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Maximum number of full tree passes one `update_expressions` call may
    /// run before reporting non-convergence.
    pub max_passes: usize,
    /// Group member reset policy on group expression rebinding.
    pub group_reset: GroupReset,
    /// Emit a `trace` event for every evaluated expression.
    pub trace_evaluations: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_passes: 64,
            group_reset: GroupReset::Scoped,
            trace_evaluations: true,
        }
    }
}

impl EngineConfig {
    /// Create a new default config.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the pass ceiling (builder). Values below 1 are raised to 1.
    pub fn with_max_passes(mut self, max_passes: usize) -> Self {
        self.max_passes = max_passes.max(1);
        self
    }

    /// Set the group reset policy (builder).
    pub fn with_group_reset(mut self, group_reset: GroupReset) -> Self {
        self.group_reset = group_reset;
        self
    }

    /// Enable or disable per-evaluation trace events (builder).
    pub fn with_trace_evaluations(mut self, enabled: bool) -> Self {
        self.trace_evaluations = enabled;
        self
    }
}
