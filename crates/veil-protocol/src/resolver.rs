//! Operand role resolution.

use crate::error::{ProtocolError, ProtocolResult};
use crate::protocol::Stage;
use veil_types::OperandRole;

/// Classify which operand(s) the local party owns.
///
/// Precedence: both full, A only (B empty), B only (A empty), otherwise
/// `Invalid`. A zero declared length is always `Invalid`.
pub fn resolve(declared_length: usize, a: &[f64], b: &[f64]) -> OperandRole {
    if declared_length == 0 {
        return OperandRole::Invalid;
    }

    let a_full = a.len() == declared_length;
    let b_full = b.len() == declared_length;

    match (a_full, b_full) {
        (true, true) => OperandRole::BothOperands,
        (true, false) if b.is_empty() => OperandRole::OperandA,
        (false, true) if a.is_empty() => OperandRole::OperandB,
        _ => OperandRole::Invalid,
    }
}

/// [`resolve`], turning `Invalid` into a shape error
pub fn require_valid_role(
    stage: Stage,
    declared_length: usize,
    a: &[f64],
    b: &[f64],
) -> ProtocolResult<OperandRole> {
    match resolve(declared_length, a, b) {
        OperandRole::Invalid => Err(ProtocolError::shape(
            stage,
            format!(
                "declared length {declared_length}, A has {} elements, B has {}",
                a.len(),
                b.len()
            ),
        )),
        role => Ok(role),
    }
}
