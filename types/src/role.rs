//! Operand roles.
//!
//! A role is derived from the shape of the loaded data, never configured.
//! See `veil_protocol::resolver::resolve` for the derivation rule.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Which operand(s) a party supplies for a computation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperandRole {
    /// Owns A and B (typically local verification runs)
    BothOperands,
    /// Owns A only
    OperandA,
    /// Owns B only
    OperandB,
    /// Neither vector matches the declared length
    Invalid,
}

impl OperandRole {
    pub fn is_valid(&self) -> bool {
        !matches!(self, OperandRole::Invalid)
    }

    pub fn owns(&self, slot: OperandSlot) -> bool {
        match (self, slot) {
            (OperandRole::BothOperands, _) => true,
            (OperandRole::OperandA, OperandSlot::A) => true,
            (OperandRole::OperandB, OperandSlot::B) => true,
            _ => false,
        }
    }

    /// Short id used in logs ('S', 'A', 'B', 'N')
    pub fn code(&self) -> char {
        match self {
            OperandRole::BothOperands => 'S',
            OperandRole::OperandA => 'A',
            OperandRole::OperandB => 'B',
            OperandRole::Invalid => 'N',
        }
    }
}

impl fmt::Display for OperandRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperandRole::BothOperands => write!(f, "both_operands"),
            OperandRole::OperandA => write!(f, "operand_a"),
            OperandRole::OperandB => write!(f, "operand_b"),
            OperandRole::Invalid => write!(f, "invalid"),
        }
    }
}

/// Operand position in `A <op> B`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OperandSlot {
    A,
    B,
}

impl fmt::Display for OperandSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperandSlot::A => write!(f, "A"),
            OperandSlot::B => write!(f, "B"),
        }
    }
}

/// The two protocol parties
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Party {
    /// Data owner delegating the computation ("client", Alice)
    Delegating,
    /// Party evaluating the primitive operation ("server", Bob)
    Computing,
}

impl fmt::Display for Party {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Party::Delegating => write!(f, "delegating"),
            Party::Computing => write!(f, "computing"),
        }
    }
}
