//! Operation types.
//!
//! Two closed sets:
//!
//! - [`Operation`]: what the data owner asks for (`add`, `sub`, `mul`, `div`, `exp`)
//! - [`PrimitiveOperation`]: what a confidentiality engine evaluates directly
//!   on encoded vectors (`add`, `sub`, `mul`)
//!
//! Every `Operation` is rewritten into exactly one `PrimitiveOperation` by the
//! operation translator in `veil-protocol`.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// User-level operation requested by the delegating party
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    /// A + B
    Add,
    /// A - B
    Sub,
    /// A * B
    Mul,
    /// A / B
    Div,
    /// A ^ B
    Exp,
}

impl Operation {
    pub const ALL: [Operation; 5] = [
        Operation::Add,
        Operation::Sub,
        Operation::Mul,
        Operation::Div,
        Operation::Exp,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Add => "add",
            Operation::Sub => "sub",
            Operation::Mul => "mul",
            Operation::Div => "div",
            Operation::Exp => "exp",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Operation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "add" => Ok(Operation::Add),
            "sub" => Ok(Operation::Sub),
            "mul" => Ok(Operation::Mul),
            "div" => Ok(Operation::Div),
            "exp" => Ok(Operation::Exp),
            other => Err(format!("unknown operation: {other}")),
        }
    }
}

/// Element-wise operation a confidentiality engine can evaluate on encoded data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrimitiveOperation {
    Add,
    Sub,
    Mul,
}

impl PrimitiveOperation {
    /// Apply the operation to two plaintext values.
    ///
    /// Engines that reconstruct values internally (mock, simulated sharing)
    /// share this so they agree on the arithmetic.
    pub fn apply(&self, lhs: f64, rhs: f64) -> f64 {
        match self {
            PrimitiveOperation::Add => lhs + rhs,
            PrimitiveOperation::Sub => lhs - rhs,
            PrimitiveOperation::Mul => lhs * rhs,
        }
    }
}

impl fmt::Display for PrimitiveOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PrimitiveOperation::Add => write!(f, "add"),
            PrimitiveOperation::Sub => write!(f, "sub"),
            PrimitiveOperation::Mul => write!(f, "mul"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operation_parse_and_display() {
        for op in Operation::ALL {
            let parsed: Operation = op.to_string().parse().unwrap();
            assert_eq!(parsed, op);
        }
        assert_eq!("DIV".parse::<Operation>().unwrap(), Operation::Div);
        assert!("pow".parse::<Operation>().is_err());
    }

    #[test]
    fn test_operation_serde_lowercase() {
        let json = serde_json::to_string(&Operation::Exp).unwrap();
        assert_eq!(json, "\"exp\"");

        let op: PrimitiveOperation = serde_json::from_str("\"mul\"").unwrap();
        assert_eq!(op, PrimitiveOperation::Mul);
    }

    #[test]
    fn test_primitive_apply() {
        assert_eq!(PrimitiveOperation::Add.apply(2.0, 3.0), 5.0);
        assert_eq!(PrimitiveOperation::Sub.apply(2.0, 3.0), -1.0);
        assert_eq!(PrimitiveOperation::Mul.apply(2.0, 3.0), 6.0);
    }
}
