//! Delegation state machine.
//!
//! ```text
//!   Idle ──prepare──▶ Prepared ──transfer──▶ Transferred ──compute──▶ Computed
//!                                                 │                      │
//!                                                 └───────retrieve───────┴──▶ Retrieved ──verify──▶ Verified
//!
//!   any step ──error──▶ Failed
//! ```
//!
//! `compute` runs in the computing party's own invocation. The delegating
//! party resumes in `Transferred` and retrieves directly; it cannot observe
//! `Computed` other than through the result being present.

mod computing;
mod delegating;

pub use computing::ComputingParty;
pub use delegating::DelegatingParty;

use crate::error::{ProtocolError, ProtocolResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Protocol state of one party's run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProtocolState {
    Idle,
    Prepared,
    Transferred,
    Computed,
    Retrieved,
    Verified,
    Failed,
}

impl fmt::Display for ProtocolState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ProtocolState::Idle => "idle",
            ProtocolState::Prepared => "prepared",
            ProtocolState::Transferred => "transferred",
            ProtocolState::Computed => "computed",
            ProtocolState::Retrieved => "retrieved",
            ProtocolState::Verified => "verified",
            ProtocolState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Protocol step (state transition)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    /// Idle -> Prepared
    Prepare,
    /// Prepared -> Transferred
    Transfer,
    /// Transferred -> Computed
    Compute,
    /// Transferred | Computed -> Retrieved
    Retrieve,
    /// Retrieved -> Verified
    Verify,
}

impl Stage {
    /// Whether the step may start from `state`
    pub fn accepts(&self, state: ProtocolState) -> bool {
        use ProtocolState::*;
        match self {
            Stage::Prepare => state == Idle,
            Stage::Transfer => state == Prepared,
            Stage::Compute => state == Transferred,
            Stage::Retrieve => matches!(state, Transferred | Computed),
            Stage::Verify => state == Retrieved,
        }
    }

    /// State reached when the step succeeds
    pub fn target(&self) -> ProtocolState {
        match self {
            Stage::Prepare => ProtocolState::Prepared,
            Stage::Transfer => ProtocolState::Transferred,
            Stage::Compute => ProtocolState::Computed,
            Stage::Retrieve => ProtocolState::Retrieved,
            Stage::Verify => ProtocolState::Verified,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Prepare => "prepare",
            Stage::Transfer => "transfer",
            Stage::Compute => "compute",
            Stage::Retrieve => "retrieve",
            Stage::Verify => "verify",
        };
        f.write_str(name)
    }
}

/// Current state plus the transition bookkeeping shared by both parties
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct StateCell {
    state: ProtocolState,
}

impl StateCell {
    pub(crate) fn new(state: ProtocolState) -> Self {
        Self { state }
    }

    pub(crate) fn get(&self) -> ProtocolState {
        self.state
    }

    /// Check that `stage` may start now
    pub(crate) fn begin(&self, stage: Stage) -> ProtocolResult<()> {
        if !stage.accepts(self.state) {
            return Err(ProtocolError::InvalidTransition {
                stage,
                state: self.state,
            });
        }
        Ok(())
    }

    /// Record a step outcome: success moves to the stage's target state,
    /// any error moves to `Failed`.
    pub(crate) fn finish<T>(&mut self, stage: Stage, outcome: ProtocolResult<T>) -> ProtocolResult<T> {
        match outcome {
            Ok(value) => {
                self.state = stage.target();
                Ok(value)
            }
            Err(err) => {
                tracing::error!(stage = %stage, error = %err, "Protocol step failed");
                self.state = ProtocolState::Failed;
                Err(err)
            }
        }
    }
}
