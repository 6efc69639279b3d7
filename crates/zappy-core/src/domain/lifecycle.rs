//! Orchestrator lifecycle
//!
//! ```text
//! Idle ──→ Validating ──→ [Reconciling] ──→ Watching ──→ StoppingOnSignal ──→ Terminated
//!               │               │
//!               └───→ Aborted ←─┘
//! ```
//!
//! A signal during the startup scan goes straight from `Reconciling` to
//! `StoppingOnSignal`.

use std::fmt::{self, Display};

use tracing::debug;

use super::errors::DomainError;

/// Phase of a single `zappy` run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OrchestratorState {
    Idle,
    Validating,
    /// Startup failed; terminal
    Aborted,
    /// Startup scan (`--upload-missing`) in progress
    Reconciling,
    Watching,
    StoppingOnSignal,
    /// Clean shutdown finished; terminal
    Terminated,
}

impl OrchestratorState {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Idle => "Idle",
            Self::Validating => "Validating",
            Self::Aborted => "Aborted",
            Self::Reconciling => "Reconciling",
            Self::Watching => "Watching",
            Self::StoppingOnSignal => "StoppingOnSignal",
            Self::Terminated => "Terminated",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Aborted | Self::Terminated)
    }

    /// Checks if a transition is valid
    ///
    /// Valid transitions:
    /// - Idle -> Validating
    /// - Validating -> Reconciling, Watching, Aborted
    /// - Reconciling -> Watching, StoppingOnSignal, Aborted
    /// - Watching -> StoppingOnSignal, Aborted (event stream lost)
    /// - StoppingOnSignal -> Terminated
    pub fn can_transition_to(&self, target: OrchestratorState) -> bool {
        use OrchestratorState::*;

        matches!(
            (self, target),
            (Idle, Validating)
                | (Validating, Reconciling)
                | (Validating, Watching)
                | (Validating, Aborted)
                | (Reconciling, Watching)
                | (Reconciling, StoppingOnSignal)
                | (Reconciling, Aborted)
                | (Watching, StoppingOnSignal)
                | (Watching, Aborted)
                | (StoppingOnSignal, Terminated)
        )
    }
}

impl Display for OrchestratorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Current orchestrator state plus the path taken to reach it
#[derive(Debug, Clone)]
pub struct Lifecycle {
    state: OrchestratorState,
    history: Vec<OrchestratorState>,
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}

impl Lifecycle {
    pub fn new() -> Self {
        Self {
            state: OrchestratorState::Idle,
            history: vec![OrchestratorState::Idle],
        }
    }

    pub fn state(&self) -> OrchestratorState {
        self.state
    }

    /// Every state visited, starting with `Idle`
    pub fn history(&self) -> &[OrchestratorState] {
        &self.history
    }

    /// Attempts to move to `target`
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidState` if the transition is not allowed.
    pub fn transition_to(&mut self, target: OrchestratorState) -> Result<(), DomainError> {
        if !self.state.can_transition_to(target) {
            return Err(DomainError::InvalidState {
                from: self.state.name().to_string(),
                to: target.name().to_string(),
            });
        }
        debug!(from = %self.state, to = %target, "Orchestrator state change");
        self.state = target;
        self.history.push(target);
        Ok(())
    }
}
