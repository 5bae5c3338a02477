//! Operation translation.
//!
//! Rewrites a requested [`Operation`] into the single [`PrimitiveOperation`]
//! the engine evaluates, plus element-wise transforms for A, B and the
//! reference result:
//!
//! | Requested | Primitive | A       | B    | Reference |
//! |-----------|-----------|---------|------|-----------|
//! | add       | add       | -       | -    | -         |
//! | sub       | sub       | -       | -    | -         |
//! | mul       | mul       | -       | -    | -         |
//! | div       | mul       | -       | 1/B  | -         |
//! | exp       | mul       | log2(A) | -    | log2(R)   |
//!
//! The returned result of `exp` stays in log2 space; verification compares it
//! against the log2 reference. [`result_to_linear`] converts it back when a
//! caller needs `A^B` itself.
//!
//! Domain preconditions (B nonzero for div, A positive for exp) are not
//! enforced here; [`check_domain`] reports violations on request.

use crate::error::{ProtocolError, ProtocolResult};
use crate::protocol::Stage;
use veil_types::{OperandSlot, Operation, PrimitiveOperation};

/// Element-wise pre/post transform
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementTransform {
    Identity,
    Reciprocal,
    Log2,
}

impl ElementTransform {
    pub fn apply(&self, value: f64) -> f64 {
        match self {
            ElementTransform::Identity => value,
            ElementTransform::Reciprocal => 1.0 / value,
            ElementTransform::Log2 => value.log2(),
        }
    }

    /// Transform a vector; empty stays empty
    pub fn apply_all(&self, values: &[f64]) -> Vec<f64> {
        match self {
            ElementTransform::Identity => values.to_vec(),
            _ => values.iter().map(|v| self.apply(*v)).collect(),
        }
    }
}

/// Translation table row for one requested operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TranslationRule {
    pub primitive: PrimitiveOperation,
    pub operand_a: ElementTransform,
    pub operand_b: ElementTransform,
    pub reference: ElementTransform,
}

/// Table row for `op`
pub fn rule(op: Operation) -> TranslationRule {
    use ElementTransform::*;

    let (primitive, operand_a, operand_b, reference) = match op {
        Operation::Add => (PrimitiveOperation::Add, Identity, Identity, Identity),
        Operation::Sub => (PrimitiveOperation::Sub, Identity, Identity, Identity),
        Operation::Mul => (PrimitiveOperation::Mul, Identity, Identity, Identity),
        Operation::Div => (PrimitiveOperation::Mul, Identity, Reciprocal, Identity),
        Operation::Exp => (PrimitiveOperation::Mul, Log2, Identity, Log2),
    };
    TranslationRule {
        primitive,
        operand_a,
        operand_b,
        reference,
    }
}

pub fn primitive_for(op: Operation) -> PrimitiveOperation {
    rule(op).primitive
}

/// Pre-transform one operand
pub fn translate_operand(op: Operation, slot: OperandSlot, values: &[f64]) -> Vec<f64> {
    let rule = rule(op);
    match slot {
        OperandSlot::A => rule.operand_a.apply_all(values),
        OperandSlot::B => rule.operand_b.apply_all(values),
    }
}

pub fn translate_reference(op: Operation, reference: &[f64]) -> Vec<f64> {
    rule(op).reference.apply_all(reference)
}

/// Primitive-safe form of a request
#[derive(Debug, Clone, PartialEq)]
pub struct Translation {
    pub requested: Operation,
    pub primitive: PrimitiveOperation,
    pub operand_a: Vec<f64>,
    pub operand_b: Vec<f64>,
    pub reference: Vec<f64>,
}

/// Translate a request. Vectors that are empty on input stay empty.
pub fn translate(op: Operation, a: &[f64], b: &[f64], reference: &[f64]) -> Translation {
    let rule = rule(op);
    Translation {
        requested: op,
        primitive: rule.primitive,
        operand_a: rule.operand_a.apply_all(a),
        operand_b: rule.operand_b.apply_all(b),
        reference: rule.reference.apply_all(reference),
    }
}

/// Convert a decoded result back to the requested operation's domain
pub fn result_to_linear(op: Operation, values: &[f64]) -> Vec<f64> {
    match op {
        Operation::Exp => values.iter().map(|v| v.exp2()).collect(),
        _ => values.to_vec(),
    }
}

/// Report the first operand violating the operation's domain
pub fn check_domain(op: Operation, a: &[f64], b: &[f64]) -> ProtocolResult<()> {
    match op {
        Operation::Div => {
            if let Some(i) = b.iter().position(|v| *v == 0.0) {
                return Err(ProtocolError::domain(
                    Stage::Prepare,
                    format!("division by zero: B[{i}] = 0"),
                ));
            }
        }
        Operation::Exp => {
            if let Some(i) = a.iter().position(|v| !(*v > 0.0)) {
                return Err(ProtocolError::domain(
                    Stage::Prepare,
                    format!("logarithm of non-positive value: A[{i}] = {}", a[i]),
                ));
            }
        }
        Operation::Add | Operation::Sub | Operation::Mul => {}
    }
    Ok(())
}
